use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::{self, GameApi};
use crate::error::{Error, Result};

static DISCORD_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{17,20}$").unwrap());

/// Where an account's notifications are delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyTarget {
    /// Discord user id, mentioned in a webhook message.
    Discord(String),
    /// Opaque push key.
    Push(String),
}

impl NotifyTarget {
    /// Discord ids only route to the webhook when one is configured;
    /// anything else is treated as a push key.
    pub fn classify(raw: &str, webhook_configured: bool) -> Self {
        if webhook_configured && DISCORD_ID.is_match(raw) {
            Self::Discord(raw.to_string())
        } else {
            Self::Push(raw.to_string())
        }
    }
}

/// Unresolved account descriptor, as written in config or on the CLI.
///
/// CLI form: `PLAYER:PROFILE:TARGET[:ITEM,ITEM...]` where `PLAYER` is a
/// username or UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSpec {
    pub player: String,
    pub profile: String,
    pub notify: String,
    #[serde(default)]
    pub items: Vec<String>,
}

impl AccountSpec {
    pub fn validate(&self) -> Result<()> {
        if self.player.trim().is_empty() {
            return Err(Error::config("account player cannot be empty"));
        }
        if self.profile.trim().is_empty() {
            return Err(Error::config(format!(
                "invalid skyblock profile for {}",
                self.player
            )));
        }
        if self.notify.trim().is_empty() {
            return Err(Error::config(format!(
                "invalid push key or discord id for {}",
                self.player
            )));
        }
        Ok(())
    }

    /// Resolves the player to a UUID and display name.
    pub async fn resolve(
        &self,
        http: &reqwest::Client,
        api: &dyn GameApi,
        key: &str,
        webhook_configured: bool,
    ) -> Result<Account> {
        self.validate()?;

        let id = match Uuid::parse_str(&self.player) {
            Ok(id) => id,
            Err(_) => api::resolve_uuid(http, &self.player).await.map_err(|e| {
                Error::config(format!("cannot resolve player {}: {e}", self.player))
            })?,
        };
        let player = api
            .player(key, &id)
            .await
            .map_err(|e| Error::config(format!("cannot fetch player {}: {e}", self.player)))?;
        let name = if player.display_name.is_empty() {
            self.player.clone()
        } else {
            player.display_name
        };

        let account = Account::new(
            id,
            name,
            self.profile.clone(),
            NotifyTarget::classify(&self.notify, webhook_configured),
            self.items.clone(),
        );
        info!("Tracking {account}");
        Ok(account)
    }
}

impl FromStr for AccountSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() < 3 {
            return Err(Error::config(format!("invalid account descriptor {s:?}")));
        }
        let items = parts
            .get(3)
            .map(|list| {
                list.split(',')
                    .filter(|i| !i.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let spec = Self {
            player: parts[0].to_string(),
            profile: parts[1].to_string(),
            notify: parts[2].to_string(),
            items,
        };
        spec.validate()?;
        Ok(spec)
    }
}

/// A tracked Skyblock account.
#[derive(Debug)]
pub struct Account {
    pub id: Uuid,
    /// Undashed UUID, as used by the auctions endpoint and profile members.
    pub short_id: String,
    pub name: String,
    pub profile: String,
    pub target: NotifyTarget,
    pub items: Vec<String>,
    online: AtomicBool,
}

impl Account {
    pub fn new(
        id: Uuid,
        name: String,
        profile: String,
        target: NotifyTarget,
        items: Vec<String>,
    ) -> Self {
        Self {
            id,
            short_id: id.simple().to_string(),
            name,
            profile,
            target,
            items,
            online: AtomicBool::new(false),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, profile {})", self.name, self.short_id, self.profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_descriptor() {
        let spec: AccountSpec = "Notch:Apple:123456789012345678:Hyperion,Grappling Hook"
            .parse()
            .unwrap();
        assert_eq!(spec.player, "Notch");
        assert_eq!(spec.profile, "Apple");
        assert_eq!(spec.notify, "123456789012345678");
        assert_eq!(spec.items, ["Hyperion", "Grappling Hook"]);
    }

    #[test]
    fn items_are_optional_and_blanks_skipped() {
        let spec: AccountSpec = "Notch:Apple:key".parse().unwrap();
        assert!(spec.items.is_empty());

        let spec: AccountSpec = "Notch:Apple:key:,Hyperion,,".parse().unwrap();
        assert_eq!(spec.items, ["Hyperion"]);
    }

    #[test]
    fn rejects_short_descriptor() {
        assert!(matches!(
            "Notch:Apple".parse::<AccountSpec>(),
            Err(Error::ConfigurationInvalid(_))
        ));
    }

    #[test]
    fn rejects_empty_fields() {
        assert!("Notch::key".parse::<AccountSpec>().is_err());
        assert!("Notch:Apple:".parse::<AccountSpec>().is_err());
        assert!(":Apple:key".parse::<AccountSpec>().is_err());
    }

    #[test]
    fn discord_target_needs_webhook() {
        assert_eq!(
            NotifyTarget::classify("123456789012345678", true),
            NotifyTarget::Discord("123456789012345678".into())
        );
        assert_eq!(
            NotifyTarget::classify("123456789012345678", false),
            NotifyTarget::Push("123456789012345678".into())
        );
    }

    #[test]
    fn non_numeric_target_is_push_key() {
        assert_eq!(
            NotifyTarget::classify("dKx9-abc", true),
            NotifyTarget::Push("dKx9-abc".into())
        );
        assert_eq!(
            NotifyTarget::classify("1234", true),
            NotifyTarget::Push("1234".into())
        );
    }

    #[test]
    fn short_id_is_undashed() {
        let id = Uuid::parse_str("069a79f4-44e9-4726-a5be-fca90e38aaf5").unwrap();
        let account = Account::new(
            id,
            "Notch".into(),
            "Apple".into(),
            NotifyTarget::Push("k".into()),
            Vec::new(),
        );
        assert_eq!(account.short_id, "069a79f444e94726a5befca90e38aaf5");
        assert!(!account.is_online());
        account.set_online(true);
        assert!(account.is_online());
    }
}
