use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::PUSH_ENDPOINT;
use crate::account::NotifyTarget;
use crate::error::{Error, Result};

/// Title used for push notifications.
pub const PUSH_TITLE: &str = "Hypixel - Skyblock";

/// Something worth telling an account owner about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Watched items still sitting in storage after logging off.
    LeftItems(Vec<String>),
    /// Buy-it-now listings that have been bought.
    SaleCompleted(Vec<String>),
}

impl Notification {
    fn items(&self) -> &[String] {
        match self {
            Self::LeftItems(items) | Self::SaleCompleted(items) => items,
        }
    }

    /// Sentence body without addressee, starting lowercase.
    fn sentence(&self) -> String {
        let noun = plural("item", self.items().len());
        let list = self.items().join(", ");
        match self {
            Self::LeftItems(_) => format!("you still have the following {noun} on you: {list}."),
            Self::SaleCompleted(_) => {
                format!("your following {noun} has been sold at the auctions house: {list}.")
            }
        }
    }

    /// Webhook text mentioning the Discord user.
    pub fn discord_message(&self, user: &str) -> String {
        format!("<@{user}>, {}", self.sentence())
    }

    /// Push body, capitalised since it stands alone.
    pub fn push_message(&self) -> String {
        let sentence = self.sentence();
        let mut chars = sentence.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => sentence,
        }
    }
}

pub fn plural(noun: &str, count: usize) -> String {
    if count >= 2 {
        format!("{noun}s")
    } else {
        noun.to_string()
    }
}

/// Delivers notifications to account owners.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, target: &NotifyTarget, notification: &Notification) -> Result<()>;
}

/// Delivers over a Discord webhook or a push key.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    http: Client,
    webhook_url: Option<String>,
    push_endpoint: String,
}

impl Dispatcher {
    pub fn new(http: Client, webhook_url: Option<String>) -> Self {
        Self {
            http,
            webhook_url,
            push_endpoint: PUSH_ENDPOINT.to_string(),
        }
    }

    pub fn with_push_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.push_endpoint = endpoint.into();
        self
    }

    pub fn has_webhook(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn post(&self, url: &str, body: &serde_json::Value) -> Result<()> {
        let resp = self.http.post(url).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "notification delivery failed: {status}"
            )));
        }
        Ok(())
    }
}

impl Dispatcher {
    /// Destination URL and JSON body for one delivery.
    fn delivery(
        &self,
        target: &NotifyTarget,
        notification: &Notification,
    ) -> Result<(String, serde_json::Value)> {
        match target {
            NotifyTarget::Discord(user) => {
                let url = self
                    .webhook_url
                    .clone()
                    .ok_or_else(|| Error::config("no discord webhook configured"))?;
                Ok((url, json!({ "content": notification.discord_message(user) })))
            }
            NotifyTarget::Push(key) => Ok((
                format!("{}/{}", self.push_endpoint.trim_end_matches('/'), key),
                json!({
                    "value1": PUSH_TITLE,
                    "value2": notification.push_message(),
                }),
            )),
        }
    }
}

#[async_trait]
impl Notifier for Dispatcher {
    async fn notify(&self, target: &NotifyTarget, notification: &Notification) -> Result<()> {
        let (url, body) = self.delivery(target, notification)?;
        self.post(&url, &body).await?;
        match target {
            NotifyTarget::Discord(user) => debug!("Webhook notification sent to <@{user}>"),
            NotifyTarget::Push(_) => debug!("Push notification sent"),
        }
        Ok(())
    }
}
