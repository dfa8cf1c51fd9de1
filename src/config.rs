use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::account::AccountSpec;
use crate::error::Error;

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Hypixel API keys, rotated round robin.
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub accounts: Vec<AccountSpec>,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Time between two checks of the same account, in seconds.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Timeout applied to every outbound HTTP request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Poll auction listings for completed sales.
    #[serde(default = "default_track_sales")]
    pub track_sales: bool,
}

fn default_check_interval() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    30
}

fn default_track_sales() -> bool {
    true
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            request_timeout_secs: default_request_timeout(),
            track_sales: default_track_sales(),
        }
    }
}

/// Discord integration. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Webhook used to notify users by mention.
    pub webhook_url: Option<String>,
    /// Bot token used to update the presence channel topic.
    pub bot_token: Option<String>,
    /// Channel whose topic lists online players.
    pub channel_id: Option<String>,
}

impl DiscordConfig {
    /// Bot token and channel, when both are set.
    pub fn topic_channel(&self) -> Option<(&str, &str)> {
        match (self.bot_token.as_deref(), self.channel_id.as_deref()) {
            (Some(token), Some(channel)) => Some((token, channel)),
            _ => None,
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.settings.check_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.request_timeout_secs)
    }

    /// Trims keys, drops blank ones and removes repeats, keeping the first
    /// occurrence in place so rotation order follows the config.
    pub fn normalize_keys(&mut self) {
        let mut seen = HashSet::new();
        self.api_keys = std::mem::take(&mut self.api_keys)
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && seen.insert(k.clone()))
            .collect();
    }

    /// Rejects configurations the daemon cannot start with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.api_keys.iter().all(|k| k.trim().is_empty()) {
            return Err(Error::config("invalid hypixel api key"));
        }
        if self.accounts.is_empty() {
            return Err(Error::config("invalid number of accounts"));
        }
        if self.settings.check_interval_secs == 0 {
            return Err(Error::config("check interval must be positive"));
        }
        if self.settings.request_timeout_secs == 0 {
            return Err(Error::config("request timeout must be positive"));
        }
        if self.discord.bot_token.is_some() != self.discord.channel_id.is_some() {
            return Err(Error::config(
                "discord bot token and channel id must be set together",
            ));
        }
        for account in &self.accounts {
            account.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
api_keys = ["k1", "k2"]

[settings]
check_interval_secs = 120

[discord]
webhook_url = "https://discord.com/api/webhooks/1/abc"

[[accounts]]
player = "Notch"
profile = "Apple"
notify = "123456789012345678"
items = ["Hyperion"]

[[accounts]]
player = "069a79f4-44e9-4726-a5be-fca90e38aaf5"
profile = "Banana"
notify = "push-key"
"#;

    #[test]
    fn parses_sample_with_defaults() {
        let config: AppConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.api_keys, ["k1", "k2"]);
        assert_eq!(config.check_interval(), Duration::from_secs(120));
        assert_eq!(config.settings.request_timeout_secs, 30);
        assert!(config.settings.track_sales);
        assert_eq!(config.accounts.len(), 2);
        assert!(config.accounts[1].items.is_empty());
        assert!(config.discord.topic_channel().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn repeated_keys_removed_in_first_seen_order() {
        let mut config = AppConfig {
            api_keys: ["k2", "k1", " ", "k2", "k3", "k1 "]
                .map(String::from)
                .to_vec(),
            ..AppConfig::default()
        };
        config.normalize_keys();
        assert_eq!(config.api_keys, ["k2", "k1", "k3"]);
    }

    #[test]
    fn empty_file_fails_validation() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(matches!(
            config.validate(),
            Err(Error::ConfigurationInvalid(_))
        ));
    }

    #[test]
    fn half_configured_topic_channel_rejected() {
        let mut config: AppConfig = toml::from_str(SAMPLE).unwrap();
        config.discord.bot_token = Some("token".into());
        assert!(config.validate().is_err());

        config.discord.channel_id = Some("42".into());
        config.validate().unwrap();
        assert_eq!(config.discord.topic_channel(), Some(("token", "42")));
    }

    #[test]
    fn zero_interval_rejected() {
        let mut config: AppConfig = toml::from_str(SAMPLE).unwrap();
        config.settings.check_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("forgoven-{}.toml", std::process::id()));
        let config: AppConfig = toml::from_str(SAMPLE).unwrap();
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.accounts, config.accounts);
        assert_eq!(loaded.api_keys, config.api_keys);
    }
}
