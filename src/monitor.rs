use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::account::Account;
use crate::api::GameApi;
use crate::error::{Error, Result};
use crate::inventory::Storage;
use crate::keys::KeyRotator;
use crate::notifier::{Notification, Notifier};

/// Dedup state of the left-items signal, owned by the items task.
#[derive(Debug, Default, Clone)]
pub struct ItemsWatch {
    /// Signature of the last notified match set; empty when nothing is pending.
    pub last_signature: String,
}

/// Dedup state of the completed-sale signal, owned by the sales task.
#[derive(Debug, Default, Clone)]
pub struct SalesWatch {
    /// Listing ids already reported since the last empty snapshot.
    pub seen: Vec<String>,
}

impl SalesWatch {
    pub fn has_seen(&self, id: &str) -> bool {
        self.seen.iter().any(|s| s == id)
    }
}

/// Outcome of one left-items evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemsVerdict {
    /// Player is online; pending signature cleared.
    Online,
    /// Nothing new to report (no matches, or same matches as last time).
    Unchanged,
    /// A new match set was reported.
    Notified(Vec<String>),
}

/// Outcome of one completed-sale evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SalesVerdict {
    Unchanged,
    /// New sales were recorded but the owner is online.
    Suppressed(Vec<String>),
    Notified(Vec<String>),
}

/// Evaluates the per-account signals and dispatches notifications.
pub struct Monitor {
    api: Arc<dyn GameApi>,
    keys: Arc<KeyRotator>,
    notifier: Arc<dyn Notifier>,
}

impl Monitor {
    pub fn new(api: Arc<dyn GameApi>, keys: Arc<KeyRotator>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            keys,
            notifier,
        }
    }

    /// Refreshes the online flag from the status endpoint.
    pub async fn refresh_online(&self, account: &Account) -> Result<bool> {
        let online = self.api.online(self.keys.next(), &account.id).await?;
        if online != account.is_online() {
            info!(
                "{} is now {}",
                account.name,
                if online { "online" } else { "offline" }
            );
        }
        account.set_online(online);
        Ok(online)
    }

    /// Decodes the storage of the account's configured profile.
    pub async fn fetch_storage(&self, account: &Account) -> Result<Storage> {
        let player = self.api.player(self.keys.next(), &account.id).await?;
        let profile = player
            .profile_named(&account.profile)
            .ok_or_else(|| Error::not_found(format!("skyblock profile {}", account.profile)))?;

        let profile = self
            .api
            .profile(self.keys.next(), &profile.profile_id)
            .await?;
        let member = profile
            .members
            .get(&account.short_id)
            .ok_or_else(|| Error::not_found(format!("skyblock member {}", account.short_id)))?;

        Storage::decode(member)
    }

    /// Runs one left-items cycle.
    ///
    /// A given match set is reported once per continuous occurrence: it
    /// re-fires only after the player comes online, or when the set changes.
    pub async fn check_items(
        &self,
        account: &Account,
        watch: &mut ItemsWatch,
    ) -> Result<ItemsVerdict> {
        if self.refresh_online(account).await? {
            watch.last_signature.clear();
            return Ok(ItemsVerdict::Online);
        }

        let storage = self.fetch_storage(account).await?;
        let matched: Vec<String> = storage
            .matches(&account.items)
            .into_iter()
            .map(str::to_string)
            .collect();
        let signature = matched.join(", ");

        if matched.is_empty() || signature == watch.last_signature {
            watch.last_signature = signature;
            return Ok(ItemsVerdict::Unchanged);
        }

        watch.last_signature = signature;
        info!("{} left {} watched item(s) behind", account.name, matched.len());
        self.dispatch(account, Notification::LeftItems(matched.clone()))
            .await;
        Ok(ItemsVerdict::Notified(matched))
    }

    /// Runs one completed-sale cycle.
    ///
    /// The online flag is refreshed here as well, before any bookkeeping.
    /// Sales found while the owner is online are marked seen without a
    /// notification.
    pub async fn check_sales(
        &self,
        account: &Account,
        watch: &mut SalesWatch,
    ) -> Result<SalesVerdict> {
        let auctions = self
            .api
            .auctions(self.keys.next(), &account.short_id)
            .await?;
        let online = self.refresh_online(account).await?;

        let mut sold = Vec::new();
        for auction in &auctions {
            if !auction.is_completed_sale() || watch.has_seen(&auction.uuid) {
                continue;
            }
            sold.push(auction.item_name.clone());
            watch.seen.push(auction.uuid.clone());
        }

        if auctions.is_empty() && !watch.seen.is_empty() {
            debug!("{} has no listings, resetting seen sales", account.name);
            watch.seen.clear();
        }

        if sold.is_empty() {
            return Ok(SalesVerdict::Unchanged);
        }
        if online {
            debug!(
                "{} sold {} item(s) while online, not notifying",
                account.name,
                sold.len()
            );
            return Ok(SalesVerdict::Suppressed(sold));
        }

        info!("{} sold {} item(s)", account.name, sold.len());
        self.dispatch(account, Notification::SaleCompleted(sold.clone()))
            .await;
        Ok(SalesVerdict::Notified(sold))
    }

    async fn dispatch(&self, account: &Account, notification: Notification) {
        if let Err(e) = self.notifier.notify(&account.target, &notification).await {
            warn!("Failed to notify {}: {e}", account.name);
        }
    }
}

/// Polls the left-items signal of one account until cancelled.
pub fn spawn_items_loop(
    monitor: Arc<Monitor>,
    account: Arc<Account>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut watch = ItemsWatch::default();
        loop {
            if let Err(e) = monitor.check_items(&account, &mut watch).await {
                warn!("[{}] Items check failed: {e}", account.name);
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        debug!("[{}] Items loop stopped", account.name);
    })
}

/// Polls the completed-sale signal of one account until cancelled.
pub fn spawn_sales_loop(
    monitor: Arc<Monitor>,
    account: Arc<Account>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut watch = SalesWatch::default();
        loop {
            if let Err(e) = monitor.check_sales(&account, &mut watch).await {
                warn!("[{}] Sales check failed: {e}", account.name);
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        debug!("[{}] Sales loop stopped", account.name);
    })
}
