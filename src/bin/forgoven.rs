use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use forgoven::USER_AGENT;
use forgoven::account::{Account, AccountSpec};
use forgoven::api::{GameApi, HypixelClient};
use forgoven::config::{AppConfig, CONFIG_PATH};
use forgoven::keys::KeyRotator;
use forgoven::monitor::{self, Monitor};
use forgoven::notifier::{Dispatcher, Notifier};
use forgoven::presence;
use forgoven::topic::{DiscordChannel, TopicUpdater};

#[derive(Parser)]
#[command(
    name = "forgoven",
    about = "Notify Skyblock players about items left in storage and completed sales"
)]
struct Args {
    /// Config file; flags below extend or override it
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Hypixel API key(s)
    #[arg(short = 'k', long = "api-key", env = "HYPIXEL_API_KEYS", value_delimiter = ',')]
    api_keys: Vec<String>,

    /// Seconds between two checks
    #[arg(short = 'd', long)]
    interval: Option<u64>,

    /// Webhook url used to notify users on discord
    #[arg(short = 'w', long, env = "DISCORD_WEBHOOK")]
    webhook: Option<String>,

    /// USERNAME|UUID:SKYBLOCK_PROFILE:DISCORD_USER_ID|PUSH_KEY[:ITEM,ITEM...]
    #[arg(short = 'u', long = "user")]
    users: Vec<AccountSpec>,

    /// Discord bot token used to update the channel topic with online players
    #[arg(short = 't', long, env = "DISCORD_BOT_TOKEN")]
    bot_token: Option<String>,

    /// Discord channel id used to update the channel topic with online players
    #[arg(short = 'c', long, env = "DISCORD_CHANNEL")]
    channel: Option<String>,

    /// Disable completed-sale notifications
    #[arg(long)]
    no_sales: bool,

    /// Write the merged configuration to --config and exit
    #[arg(long)]
    init: bool,
}

impl Args {
    /// Loads the config file (if any) and layers the flags on top.
    fn into_config(self) -> Result<(AppConfig, PathBuf, bool)> {
        let mut config = if self.config.exists() {
            let config = AppConfig::load(&self.config)?;
            info!("Loaded config from {}", self.config.display());
            config
        } else {
            AppConfig::default()
        };

        config.api_keys.extend(self.api_keys);
        config.accounts.extend(self.users);
        if let Some(secs) = self.interval {
            config.settings.check_interval_secs = secs;
        }
        if self.webhook.is_some() {
            config.discord.webhook_url = self.webhook;
        }
        if self.bot_token.is_some() {
            config.discord.bot_token = self.bot_token;
        }
        if self.channel.is_some() {
            config.discord.channel_id = self.channel;
        }
        if self.no_sales {
            config.settings.track_sales = false;
        }
        config.normalize_keys();

        Ok((config, self.config, self.init))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();
    let (config, config_path, init) = Args::parse().into_config()?;
    config.validate()?;

    if init {
        config.save(&config_path)?;
        info!("Wrote config to {}", config_path.display());
        return Ok(());
    }

    let http = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.request_timeout())
        .build()
        .context("failed to build HTTP client")?;

    let keys = Arc::new(KeyRotator::new(config.api_keys.clone())?);
    let api: Arc<dyn GameApi> = Arc::new(HypixelClient::new(http.clone()));
    let dispatcher = Dispatcher::new(http.clone(), config.discord.webhook_url.clone());
    let webhook_configured = dispatcher.has_webhook();
    let notifier: Arc<dyn Notifier> = Arc::new(dispatcher);

    // --- Resolve accounts (fatal on failure) ---
    let mut accounts: Vec<Arc<Account>> = Vec::with_capacity(config.accounts.len());
    for spec in &config.accounts {
        let account = spec
            .resolve(&http, api.as_ref(), keys.next(), webhook_configured)
            .await
            .with_context(|| format!("invalid account {}", spec.player))?;
        accounts.push(Arc::new(account));
    }

    let interval = config.check_interval();
    info!(
        "Starting forgoven: accounts={} keys={} interval={}s sales={}",
        accounts.len(),
        keys.len(),
        interval.as_secs(),
        config.settings.track_sales,
    );

    let monitor = Arc::new(Monitor::new(api, keys, notifier));
    let cancel = CancellationToken::new();
    let mut handles = Vec::new();

    for account in &accounts {
        handles.push(monitor::spawn_items_loop(
            monitor.clone(),
            account.clone(),
            interval,
            cancel.child_token(),
        ));
        if config.settings.track_sales {
            handles.push(monitor::spawn_sales_loop(
                monitor.clone(),
                account.clone(),
                interval,
                cancel.child_token(),
            ));
        }
    }

    if let Some((token, channel)) = config.discord.topic_channel() {
        let updater = TopicUpdater::new(DiscordChannel::new(http.clone(), token, channel));
        handles.push(presence::spawn_presence_loop(
            accounts.clone(),
            updater,
            interval,
            cancel.child_token(),
        ));
        info!("Publishing online players to channel {channel}");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    cancel.cancel();

    for result in futures_util::future::join_all(handles).await {
        if let Err(e) = result {
            warn!("Task ended abnormally: {e}");
        }
    }
    Ok(())
}
