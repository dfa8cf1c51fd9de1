pub mod account;
pub mod api;
pub mod config;
pub mod error;
pub mod inventory;
pub mod keys;
pub mod monitor;
pub mod notifier;
pub mod presence;
pub mod topic;

pub use error::{Error, Result};

/// Hypixel public API base URL (key passed as query parameter)
pub const HYPIXEL_API_BASE: &str = "https://api.hypixel.net";

/// Mojang API base URL, used once at startup to resolve usernames
pub const MOJANG_API_BASE: &str = "https://api.mojang.com";

/// Discord REST API base URL (channel topic updates)
pub const DISCORD_API_BASE: &str = "https://discord.com/api";

/// Push delivery endpoint; the push key is appended as the last path segment
pub const PUSH_ENDPOINT: &str = "https://maker.ifttt.com/trigger/notigo/with/key";

/// User agent sent on every outbound request.
pub const USER_AGENT: &str = "Forgoven";
