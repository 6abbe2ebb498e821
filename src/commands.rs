//! CLI command implementations for everything except `init` and `sync`.
//!
//! Each command builds a [`Gunsmith`], does its work, shuts it down and
//! prints to stdout. Failures bubble up as `anyhow::Error`; the binary uses
//! [`describe_failure`] to tell an operator whether content is simply not
//! synchronized yet or the remote service is failing.

use anyhow::Result;

use crate::api::{CharacterRef, Rotation};
use crate::app::Gunsmith;
use crate::config::Config;
use crate::error::Error;
use crate::models::{ContentTable, MembershipType};

/// Print the current manifest record.
pub async fn run_current(config: &Config) -> Result<()> {
    let app = Gunsmith::init(config.clone()).await?;
    let current = app.store().current().await;
    let locale = app.content().locale().to_string();
    app.shutdown().await;

    match current? {
        Some(record) => {
            println!("id:        {}", record.id);
            if let Some(ts) = record.created_at() {
                println!("fetched:   {}", ts.format("%Y-%m-%dT%H:%M:%SZ"));
            }
            println!("version:   {}", record.version().unwrap_or("(unversioned)"));
            println!(
                "content:   {}",
                record
                    .content_file_name(&locale)
                    .unwrap_or_else(|| format!("(none for locale '{}')", locale))
            );
        }
        None => return Err(Error::ContentNotSynchronized.into()),
    }
    Ok(())
}

/// Print up to `limit` manifest records, newest first.
pub async fn run_history(config: &Config, limit: usize) -> Result<()> {
    let app = Gunsmith::init(config.clone()).await?;
    let history = app.store().history(limit).await;
    app.shutdown().await;

    let history = history?;
    if history.is_empty() {
        println!("No manifests recorded. Run `gunsmith sync` first.");
        return Ok(());
    }
    for record in history {
        println!(
            "{}  {}",
            record.id,
            record.version().unwrap_or("(unversioned)")
        );
    }
    Ok(())
}

/// Look up one definition and print it as pretty JSON.
pub async fn run_lookup(config: &Config, table: ContentTable, hash: u32) -> Result<()> {
    let app = Gunsmith::init(config.clone()).await?;
    let found = app.lookup(table, hash).await;
    app.shutdown().await;

    match found? {
        Some(doc) => println!("{}", serde_json::to_string_pretty(&doc)?),
        None => println!("No {} with hash {}.", table, hash),
    }
    Ok(())
}

/// List the sale items of one rotation.
pub async fn run_vendor(
    config: &Config,
    rotation: Rotation,
    character: &CharacterRef,
    access_token: Option<&str>,
) -> Result<()> {
    let app = Gunsmith::init(config.clone()).await?;
    let items = app.rotation(rotation, character, access_token).await;
    app.shutdown().await;

    let items = items?;
    println!("--- {} ({}) ---", rotation.category(), items.len());
    if items.is_empty() {
        println!("Nothing on sale.");
    }
    for item in &items {
        println!("{}  x{}", item.item_hash, item.quantity);
    }
    Ok(())
}

/// Resolve and print a membership id.
pub async fn run_player(
    config: &Config,
    membership_type: MembershipType,
    display_name: &str,
) -> Result<()> {
    let app = Gunsmith::init(config.clone()).await?;
    let id = app.membership_id_for(membership_type, display_name).await;
    app.shutdown().await;

    match id? {
        Some(id) => println!("{}", id),
        None => println!("No player named '{}'.", display_name),
    }
    Ok(())
}

/// One-line operator-facing description of a command failure.
pub fn describe_failure(err: &anyhow::Error) -> String {
    let core = err.chain().find_map(|e| e.downcast_ref::<Error>());
    match core {
        Some(Error::ContentNotSynchronized) => {
            "content not synchronized: run `gunsmith sync` first".to_string()
        }
        Some(Error::FileNotFound(path)) => format!(
            "content database missing at {}: run `gunsmith sync` to download it",
            path.display()
        ),
        Some(e @ Error::MissingContentPath { .. }) => e.to_string(),
        Some(e @ Error::Network(_)) => format!("transient failure, try again later: {}", e),
        Some(e @ (Error::Remote { .. } | Error::UnexpectedResponse { .. })) => {
            format!("remote service failure: {}", e)
        }
        _ => format!("{:#}", err),
    }
}
