//! Channel topic updates that survive Discord rate limiting.
//!
//! [`TopicUpdater`] is a two-state machine: Idle, or PendingRetry while a
//! deferred retry task is armed after a 429. Every call to
//! [`TopicUpdater::change`] replaces whatever retry is pending, so at most one
//! retry is outstanding per updater.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::{DISCORD_API_BASE, USER_AGENT};

/// A channel whose topic can be set.
#[async_trait]
pub trait StatusChannel: Send + Sync + 'static {
    /// Sets the topic. A rate-limited request fails with [`Error::RateLimited`].
    async fn set_topic(&self, topic: &str) -> Result<()>;
}

/// Discord text channel, updated through the bot API.
#[derive(Debug, Clone)]
pub struct DiscordChannel {
    http: Client,
    bot_token: String,
    channel_id: String,
    base: String,
}

impl DiscordChannel {
    pub fn new(http: Client, bot_token: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            http,
            bot_token: bot_token.into(),
            channel_id: channel_id.into(),
            base: DISCORD_API_BASE.to_string(),
        }
    }
}

#[async_trait]
impl StatusChannel for DiscordChannel {
    async fn set_topic(&self, topic: &str) -> Result<()> {
        let url = format!("{}/channels/{}", self.base, self.channel_id);
        let resp = self
            .http
            .patch(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.bot_token))
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&json!({ "topic": topic }))
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimited(crate::api::rate_limit_wait(&resp)));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::UpstreamUnavailable(format!(
                "topic update failed: {status} - {body}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct PendingRetry {
    id: u64,
    topic: String,
    handle: JoinHandle<()>,
}

#[derive(Debug, Default)]
struct State {
    /// Last topic the channel accepted.
    last_topic: Option<String>,
    pending: Option<PendingRetry>,
    next_retry_id: u64,
}

/// Serialized, self-rescheduling topic updater.
pub struct TopicUpdater<C> {
    channel: C,
    state: Mutex<State>,
}

impl<C: StatusChannel> TopicUpdater<C> {
    pub fn new(channel: C) -> Arc<Self> {
        Arc::new(Self {
            channel,
            state: Mutex::new(State::default()),
        })
    }

    /// Requests `topic`, superseding any pending retry.
    pub async fn change(self: &Arc<Self>, topic: &str) {
        self.apply(topic, None).await;
    }

    /// Whether a rate-limit retry is currently armed.
    pub async fn has_pending_retry(&self) -> bool {
        self.state.lock().await.pending.is_some()
    }

    /// Topic of the armed retry, if any.
    pub async fn pending_topic(&self) -> Option<String> {
        self.state
            .lock()
            .await
            .pending
            .as_ref()
            .map(|p| p.topic.clone())
    }

    pub async fn last_topic(&self) -> Option<String> {
        self.state.lock().await.last_topic.clone()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// `retry` is the id of the pending retry making this call, which must not
    /// abort itself.
    async fn apply(self: &Arc<Self>, topic: &str, retry: Option<u64>) {
        let mut state = self.state.lock().await;

        if let Some(id) = retry {
            // superseded while waiting for the lock
            if state.pending.as_ref().map(|p| p.id) != Some(id) {
                return;
            }
            state.pending = None;
        } else if let Some(pending) = state.pending.take() {
            debug!("Dropping pending topic retry for {:?}", pending.topic);
            pending.handle.abort();
        }

        if state.last_topic.as_deref() == Some(topic) {
            debug!("Topic already set, skipping update");
            return;
        }

        match self.channel.set_topic(topic).await {
            Ok(()) => {
                info!("Channel topic set to {topic:?}");
                state.last_topic = Some(topic.to_string());
            }
            Err(Error::RateLimited(wait)) => {
                let id = state.next_retry_id;
                state.next_retry_id += 1;
                warn!("Topic update rate limited, retrying in {wait:?}");
                let handle = tokio::spawn(self.clone().schedule_retry(wait, topic.to_string(), id));
                state.pending = Some(PendingRetry {
                    id,
                    topic: topic.to_string(),
                    handle,
                });
            }
            Err(e) => warn!("Failed to update channel topic: {e}"),
        }
    }

    fn schedule_retry(
        self: Arc<Self>,
        wait: Duration,
        topic: String,
        id: u64,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move {
            tokio::time::sleep(wait).await;
            self.apply(&topic, Some(id)).await;
        })
    }
}
