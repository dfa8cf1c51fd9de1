//! Probe: raw Hypixel responses for one player
//!
//! Resolves a username (or takes a UUID), then hits the status, player,
//! skyblock profile and auction endpoints and documents:
//! - Response shape and latency
//! - Which Skyblock profiles exist and their cute names
//! - Whether the watched items show up in the decoded containers
//! - Which listings count as completed sales

use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use uuid::Uuid;

use forgoven::api::{self, GameApi, HypixelClient};
use forgoven::inventory::Storage;

#[derive(Parser)]
#[command(name = "probe_player", about = "Dump what the monitor sees for one player")]
struct Cli {
    /// Username or UUID
    player: String,

    /// Skyblock profile cute name; defaults to the first one listed
    #[arg(long)]
    profile: Option<String>,

    /// Item names to look for in storage
    #[arg(long = "item")]
    items: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let key = std::env::var("HYPIXEL_API_KEYS")
        .context("HYPIXEL_API_KEYS not set")?
        .split(',')
        .next()
        .unwrap_or_default()
        .to_string();

    let http = reqwest::Client::builder()
        .user_agent(forgoven::USER_AGENT)
        .build()?;
    let client = HypixelClient::new(http.clone());

    println!("=== Probe: player {} ===\n", cli.player);

    // 1. Resolve
    let id = match Uuid::parse_str(&cli.player) {
        Ok(id) => id,
        Err(_) => api::resolve_uuid(&http, &cli.player).await?,
    };
    println!("UUID: {id} (short {})", id.simple());
    println!();

    // 2. Status
    println!("--- 1. Status ---");
    let start = Instant::now();
    let online = client.online(&key, &id).await?;
    println!("Online: {online}");
    println!("Latency: {:?}", start.elapsed());
    println!();

    // 3. Player + profiles
    println!("--- 2. Skyblock profiles ---");
    let player = client.player(&key, &id).await?;
    println!("Display name: {}", player.display_name);
    let profiles = &player.stats.skyblock.profiles;
    if profiles.is_empty() {
        bail!("player has no skyblock profiles");
    }
    for profile in profiles.values() {
        println!("  {:<16} {}", profile.cute_name, profile.profile_id);
    }
    println!();

    let profile = match &cli.profile {
        Some(name) => player
            .profile_named(name)
            .with_context(|| format!("no profile named {name}"))?,
        None => profiles.values().next().context("no profiles")?,
    };

    // 4. Storage
    println!("--- 3. Storage of {} ---", profile.cute_name);
    let start = Instant::now();
    let skyblock = client.profile(&key, &profile.profile_id).await?;
    println!("Latency: {:?}", start.elapsed());
    let short_id = id.simple().to_string();
    match skyblock.members.get(&short_id) {
        Some(member) => {
            let storage = Storage::decode(member)?;
            println!("Inventory:   {} bytes", storage.inventory.len());
            println!("Ender chest: {} bytes", storage.ender_chest.len());
            for item in &cli.items {
                let found = storage.contains(item);
                println!("  {:<32} {}", item, if found { "✓" } else { "✗" });
            }
        }
        None => println!("Member {short_id} not in profile (members: {})", skyblock.members.len()),
    }
    println!();

    // 5. Auctions
    println!("--- 4. Auctions ---");
    let auctions = client.auctions(&key, &short_id).await?;
    println!("Listings: {}", auctions.len());
    println!(
        "{:<36} {:<32} {:>5} {:>12} {:>6}",
        "UUID", "Item", "BIN", "Highest bid", "Sold"
    );
    println!("{}", "-".repeat(95));
    for a in &auctions {
        let name: String = a.item_name.chars().take(30).collect();
        println!(
            "{:<36} {:<32} {:>5} {:>12} {:>6}",
            a.uuid,
            name,
            a.bin,
            a.highest_bid_amount,
            if a.is_completed_sale() { "yes" } else { "no" }
        );
    }
    println!();

    println!("=== Probe Complete ===");
    Ok(())
}
