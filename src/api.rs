use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::{HYPIXEL_API_BASE, MOJANG_API_BASE, USER_AGENT};

/// Hypixel `/status` response.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(default)]
    pub session: Session,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub online: bool,
}

/// Hypixel `/player` response.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerResponse {
    pub success: bool,
    pub player: Option<Player>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Player {
    #[serde(default)]
    pub uuid: String,
    #[serde(rename = "displayname", default)]
    pub display_name: String,
    #[serde(default)]
    pub stats: PlayerStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerStats {
    #[serde(rename = "SkyBlock", default)]
    pub skyblock: SkyblockStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkyblockStats {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileRef>,
}

/// One entry of a player's Skyblock profile list.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileRef {
    pub profile_id: String,
    #[serde(default)]
    pub cute_name: String,
}

impl Player {
    /// Finds the Skyblock profile whose cute name equals `cute_name`.
    pub fn profile_named(&self, cute_name: &str) -> Option<&ProfileRef> {
        self.stats
            .skyblock
            .profiles
            .values()
            .find(|p| p.cute_name == cute_name)
    }
}

/// Hypixel `/skyblock/profile` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub profile: Option<SkyblockProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkyblockProfile {
    #[serde(default)]
    pub members: HashMap<String, Member>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Member {
    #[serde(rename = "inv_contents", default)]
    pub inventory: Container,
    #[serde(rename = "ender_chest_contents", default)]
    pub ender_chest: Container,
}

/// Base64 encoded, gzip compressed NBT blob.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub data: String,
}

/// Hypixel `/skyblock/auction` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AuctionsResponse {
    pub success: bool,
    #[serde(default)]
    pub auctions: Vec<Auction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Auction {
    pub uuid: String,
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub bin: bool,
    #[serde(default)]
    pub highest_bid_amount: u64,
}

impl Auction {
    /// A buy-it-now listing with a bid on it has been bought.
    pub fn is_completed_sale(&self) -> bool {
        self.bin && self.highest_bid_amount != 0
    }
}

/// Read side of the game API used by the monitor.
#[async_trait]
pub trait GameApi: Send + Sync {
    async fn online(&self, key: &str, player: &Uuid) -> Result<bool>;

    async fn player(&self, key: &str, player: &Uuid) -> Result<Player>;

    async fn profile(&self, key: &str, profile_id: &str) -> Result<SkyblockProfile>;

    /// Listings of a player, addressed by undashed UUID.
    async fn auctions(&self, key: &str, short_id: &str) -> Result<Vec<Auction>>;
}

/// reqwest-backed client for the public Hypixel API.
#[derive(Debug, Clone)]
pub struct HypixelClient {
    http: Client,
    base: String,
}

impl HypixelClient {
    pub fn new(http: Client) -> Self {
        Self::with_base(http, HYPIXEL_API_BASE)
    }

    pub fn with_base(http: Client, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/{}", self.base, path);
        let resp = self.http.get(&url).query(query).send().await?;
        let body = json_or_status(resp).await?;
        debug!("GET {path} ok");
        Ok(body)
    }
}

#[async_trait]
impl GameApi for HypixelClient {
    async fn online(&self, key: &str, player: &Uuid) -> Result<bool> {
        let uuid = player.to_string();
        let resp: StatusResponse = self
            .get("status", &[("key", key), ("uuid", &uuid)])
            .await?;
        if !resp.success {
            return Err(Error::UpstreamRejected("status".into()));
        }
        Ok(resp.session.online)
    }

    async fn player(&self, key: &str, player: &Uuid) -> Result<Player> {
        let uuid = player.to_string();
        let resp: PlayerResponse = self
            .get("player", &[("key", key), ("uuid", &uuid)])
            .await?;
        if !resp.success {
            return Err(Error::UpstreamRejected("player".into()));
        }
        resp.player
            .ok_or_else(|| Error::not_found(format!("player {player}")))
    }

    async fn profile(&self, key: &str, profile_id: &str) -> Result<SkyblockProfile> {
        let resp: ProfileResponse = self
            .get("skyblock/profile", &[("key", key), ("profile", profile_id)])
            .await?;
        if !resp.success {
            return Err(Error::UpstreamRejected("skyblock/profile".into()));
        }
        resp.profile
            .ok_or_else(|| Error::not_found(format!("skyblock profile {profile_id}")))
    }

    async fn auctions(&self, key: &str, short_id: &str) -> Result<Vec<Auction>> {
        let resp: AuctionsResponse = self
            .get("skyblock/auction", &[("key", key), ("player", short_id)])
            .await?;
        if !resp.success {
            return Err(Error::UpstreamRejected("skyblock/auction".into()));
        }
        Ok(resp.auctions)
    }
}

#[derive(Debug, Deserialize)]
struct MojangProfile {
    id: String,
}

/// Mojang profile lookup URL with `name` as one encoded path segment.
pub fn mojang_profile_url(name: &str) -> Result<Url> {
    let mut url = Url::parse(MOJANG_API_BASE)
        .map_err(|e| Error::config(format!("mojang base url: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| Error::config("mojang base url cannot take a path"))?
        .pop_if_empty()
        .extend(["users", "profiles", "minecraft", name]);
    Ok(url)
}

/// Resolves a Minecraft username to its UUID through the Mojang API.
pub async fn resolve_uuid(http: &Client, name: &str) -> Result<Uuid> {
    let url = mojang_profile_url(name)?;
    let resp = http
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await?;
    if resp.status() == reqwest::StatusCode::NO_CONTENT
        || resp.status() == reqwest::StatusCode::NOT_FOUND
    {
        return Err(Error::not_found(format!("minecraft account {name}")));
    }
    let profile: MojangProfile = json_or_status(resp).await?;
    Uuid::parse_str(&profile.id).map_err(|e| Error::Malformed(format!("mojang uuid: {e}")))
}

/// Wait applied when a 429 carries no usable header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Server-requested wait of a 429, or [`DEFAULT_RETRY_AFTER`].
pub fn rate_limit_wait(resp: &Response) -> Duration {
    retry_after(resp).unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Parses a 429's wait from `Retry-After`, falling back to
/// `X-RateLimit-Reset-After`. Both carry (possibly fractional) seconds.
pub fn retry_after(resp: &Response) -> Option<Duration> {
    ["Retry-After", "X-RateLimit-Reset-After"]
        .iter()
        .find_map(|name| {
            let secs = resp.headers().get(*name)?.to_str().ok()?.parse::<f64>().ok()?;
            (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
        })
}

async fn json_or_status<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(Error::RateLimited(rate_limit_wait(&resp)));
    }
    if !status.is_success() {
        return Err(Error::UpstreamUnavailable(format!(
            "invalid status code: {status}"
        )));
    }
    let body = resp.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| Error::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn too_many_requests(headers: &[(&str, &str)]) -> Response {
        let mut builder = http::Response::builder().status(429);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        Response::from(builder.body("").unwrap())
    }

    #[test]
    fn retry_after_header_wins_over_reset_after() {
        let resp = too_many_requests(&[("Retry-After", "5"), ("X-RateLimit-Reset-After", "9")]);
        assert_eq!(rate_limit_wait(&resp), Duration::from_secs(5));
    }

    #[test]
    fn reset_after_used_when_alone() {
        let resp = too_many_requests(&[("X-RateLimit-Reset-After", "3")]);
        assert_eq!(rate_limit_wait(&resp), Duration::from_secs(3));
    }

    #[test]
    fn fractional_seconds_are_kept() {
        let resp = too_many_requests(&[("X-RateLimit-Reset-After", "1.25")]);
        assert_eq!(rate_limit_wait(&resp), Duration::from_millis(1250));
    }

    #[test]
    fn garbage_retry_after_falls_back_to_reset_after() {
        let resp = too_many_requests(&[("Retry-After", "soon"), ("X-RateLimit-Reset-After", "2")]);
        assert_eq!(rate_limit_wait(&resp), Duration::from_secs(2));
    }

    #[test]
    fn missing_or_invalid_headers_default_to_one_second() {
        assert_eq!(rate_limit_wait(&too_many_requests(&[])), DEFAULT_RETRY_AFTER);

        let resp = too_many_requests(&[("Retry-After", "-4"), ("X-RateLimit-Reset-After", "x")]);
        assert_eq!(retry_after(&resp), None);
        assert_eq!(rate_limit_wait(&resp), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn rate_limited_body_maps_to_error() {
        let resp = too_many_requests(&[("Retry-After", "7")]);
        let err = json_or_status::<StatusResponse>(resp).await.unwrap_err();
        assert!(matches!(err, Error::RateLimited(d) if d == Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn non_success_status_is_unavailable() {
        let resp = Response::from(http::Response::builder().status(503).body("").unwrap());
        let err = json_or_status::<StatusResponse>(resp).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn garbage_body_is_malformed() {
        let resp = Response::from(http::Response::builder().status(200).body("<html>").unwrap());
        let err = json_or_status::<StatusResponse>(resp).await.unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }

    #[test]
    fn mojang_url_encodes_name() {
        let url = mojang_profile_url("a b/c").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.mojang.com/users/profiles/minecraft/a%20b%2Fc"
        );
    }

    #[test]
    fn status_without_session_is_offline() {
        let resp: StatusResponse = serde_json::from_value(json!({"success": true})).unwrap();
        assert!(!resp.session.online);
    }

    #[test]
    fn player_profile_lookup_by_cute_name() {
        let resp: PlayerResponse = serde_json::from_value(json!({
            "success": true,
            "player": {
                "uuid": "069a79f444e94726a5befca90e38aaf5",
                "displayname": "Notch",
                "stats": {"SkyBlock": {"profiles": {
                    "p1": {"profile_id": "p1", "cute_name": "Apple"},
                    "p2": {"profile_id": "p2", "cute_name": "Banana"}
                }}}
            }
        }))
        .unwrap();
        let player = resp.player.unwrap();
        assert_eq!(player.display_name, "Notch");
        assert_eq!(player.profile_named("Banana").unwrap().profile_id, "p2");
        assert!(player.profile_named("banana").is_none());
    }

    #[test]
    fn player_without_skyblock_has_no_profiles() {
        let resp: PlayerResponse = serde_json::from_value(json!({
            "success": true,
            "player": {"uuid": "x", "displayname": "Someone", "stats": {}}
        }))
        .unwrap();
        assert!(resp.player.unwrap().profile_named("Apple").is_none());
    }

    #[test]
    fn member_containers_default_when_api_disabled() {
        let resp: ProfileResponse = serde_json::from_value(json!({
            "success": true,
            "profile": {"members": {"abc": {}}}
        }))
        .unwrap();
        let member = &resp.profile.unwrap().members["abc"];
        assert!(member.inventory.data.is_empty());
        assert!(member.ender_chest.data.is_empty());
    }

    #[test]
    fn completed_sale_requires_bin_and_bid() {
        let auctions: AuctionsResponse = serde_json::from_value(json!({
            "success": true,
            "auctions": [
                {"uuid": "a", "item_name": "Sold", "bin": true, "highest_bid_amount": 500},
                {"uuid": "b", "item_name": "Listed", "bin": true, "highest_bid_amount": 0},
                {"uuid": "c", "item_name": "Auction", "bin": false, "highest_bid_amount": 900}
            ]
        }))
        .unwrap();
        let completed: Vec<&str> = auctions
            .auctions
            .iter()
            .filter(|a| a.is_completed_sale())
            .map(|a| a.uuid.as_str())
            .collect();
        assert_eq!(completed, ["a"]);
    }
}
