use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::account::Account;
use crate::topic::{StatusChannel, TopicUpdater};

/// Prefix of the topic listing online players.
pub const ONLINE_PREFIX: &str = "Online on Hypixel: ";

/// Diffs the set of online accounts between polls.
#[derive(Debug, Default)]
pub struct Presence {
    last: Option<String>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the topic to publish, or `None` when nothing changed.
    ///
    /// The first observation always publishes, to establish a baseline.
    pub fn observe(&mut self, accounts: &[Arc<Account>]) -> Option<String> {
        let online = online_names(accounts);
        if self.last.as_deref() == Some(online.as_str()) {
            return None;
        }
        let topic = topic_for(&online);
        self.last = Some(online);
        Some(topic)
    }
}

/// Display names of online accounts, in configuration order.
pub fn online_names(accounts: &[Arc<Account>]) -> String {
    accounts
        .iter()
        .filter(|a| a.is_online())
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Empty list clears the topic.
pub fn topic_for(online: &str) -> String {
    if online.is_empty() {
        String::new()
    } else {
        format!("{ONLINE_PREFIX}{online}")
    }
}

/// Publishes presence changes to the channel topic until cancelled.
pub fn spawn_presence_loop<C: StatusChannel>(
    accounts: Vec<Arc<Account>>,
    updater: Arc<TopicUpdater<C>>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut presence = Presence::new();
        loop {
            if let Some(topic) = presence.observe(&accounts) {
                debug!("Presence changed: {topic:?}");
                updater.change(&topic).await;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        debug!("Presence loop stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::NotifyTarget;
    use crate::error::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use uuid::Uuid;

    fn accounts(names: &[&str]) -> Vec<Arc<Account>> {
        names
            .iter()
            .map(|name| {
                Arc::new(Account::new(
                    Uuid::new_v4(),
                    name.to_string(),
                    "Apple".into(),
                    NotifyTarget::Push("key".into()),
                    Vec::new(),
                ))
            })
            .collect()
    }

    #[test]
    fn first_observation_always_publishes() {
        let accounts = accounts(&["Notch", "jeb_"]);
        let mut presence = Presence::new();
        assert_eq!(presence.observe(&accounts), Some(String::new()));
        assert_eq!(presence.observe(&accounts), None);
    }

    #[test]
    fn publishes_only_on_change_in_config_order() {
        let accounts = accounts(&["Notch", "jeb_", "Dinnerbone"]);
        let mut presence = Presence::new();
        presence.observe(&accounts);

        accounts[2].set_online(true);
        accounts[0].set_online(true);
        assert_eq!(
            presence.observe(&accounts).as_deref(),
            Some("Online on Hypixel: Notch, Dinnerbone")
        );
        assert_eq!(presence.observe(&accounts), None);

        accounts[0].set_online(false);
        accounts[2].set_online(false);
        assert_eq!(presence.observe(&accounts), Some(String::new()));
    }

    #[derive(Default)]
    struct RecordingChannel {
        topics: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StatusChannel for RecordingChannel {
        async fn set_topic(&self, topic: &str) -> Result<()> {
            self.topics.lock().push(topic.to_string());
            Ok(())
        }
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn loop_pushes_changes_to_updater() {
        let accounts = accounts(&["Notch", "jeb_"]);
        let updater = TopicUpdater::new(RecordingChannel::default());
        let cancel = CancellationToken::new();
        let handle = spawn_presence_loop(
            accounts.clone(),
            updater.clone(),
            Duration::from_secs(60),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        accounts[1].set_online(true);
        tokio::time::sleep(Duration::from_secs(60)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(
            *updater.channel().topics.lock(),
            ["", "Online on Hypixel: jeb_"]
        );
    }
}
