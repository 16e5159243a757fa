//! Inspect and maintain the local scrobble history store.
//!
//! Usage:
//!   scrobble-history --store scrobble_history.json stats
//!   scrobble-history --store scrobble_history.json list --days 3
//!   scrobble-history --store scrobble_history.json cleanup --force
//!   scrobble-history --store scrobble_history.json search --query drake
//!   scrobble-history --store scrobble_history.json auto-cleanup

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scrobble_sync::config::{EngineConfig, DEFAULT_RETENTION_DAYS};
use scrobble_sync::progress::{format_timestamp, format_track_length};
use scrobble_sync::safety::validate_store_path;
use scrobble_sync::store::{track_id_from_key, HistoryEntry, HistoryStore};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "scrobble-history")]
#[command(about = "Inspect and clean up the scrobble history store")]
struct Args {
    /// Scrobble history store (JSON)
    #[arg(long, default_value = "scrobble_history.json")]
    store: PathBuf,

    /// Engine configuration (TOML), for the retention window
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Totals, date range and top artists
    Stats,

    /// Entries from the last N days, newest first
    List {
        #[arg(long, default_value = "7")]
        days: i64,
    },

    /// Show entries past retention; remove them with --force
    Cleanup {
        #[arg(long)]
        force: bool,
    },

    /// Case-insensitive search over artist, title and album
    Search {
        #[arg(long)]
        query: String,
    },

    /// Remove entries past retention without prompting
    AutoCleanup,
}

fn print_entry(key: &str, entry: &HistoryEntry) {
    println!("{} - {}", entry.artist, entry.title);
    if !entry.album.is_empty() {
        println!("  Album: {}", entry.album);
    }
    println!("  Scrobbled: {}", format_timestamp(entry.scrobbled_at));
    println!("  Duration: {}", format_track_length(entry.duration_seconds));
    println!("  Track: {}", track_id_from_key(key));
    if !entry.canonical_url.is_empty() {
        println!("  URL: {}", entry.canonical_url);
    }
    println!();
}

fn show_stats(store: &HistoryStore, now: i64, retention_days: i64) {
    let stats = store.stats(now, retention_days * 24 * 60 * 60);

    println!("\n{:=<60}", "");
    println!("Scrobble history statistics");
    println!("{:=<60}", "");
    println!("  Total scrobbles: {}", stats.total);
    println!("  Recent (last {} days): {}", retention_days, stats.recent);
    println!("  Old (eligible for cleanup): {}", stats.old);
    println!("  Unique tracks: {}", stats.unique_tracks);
    if let (Some(earliest), Some(latest)) = (stats.earliest, stats.latest) {
        println!("  Date range: {} to {}", format_timestamp(earliest), format_timestamp(latest));
    }

    if !stats.top_artists.is_empty() {
        println!("\nTop artists:");
        for (artist, count) in &stats.top_artists {
            println!("  {:<40} {}", artist, count);
        }
    }
    println!();
}

fn list_recent(store: &HistoryStore, now: i64, days: i64) {
    let recent = store.recent(now - days * 24 * 60 * 60);
    println!("\nScrobbles from the last {} days ({} found):", days, recent.len());
    println!("{:-<80}", "");
    for (key, entry) in recent {
        print_entry(key, entry);
    }
}

fn search(store: &HistoryStore, query: &str) {
    let matches = store.search(query);
    if matches.is_empty() {
        println!("No scrobbles matching '{}'.", query);
        return;
    }
    println!("\nScrobbles matching '{}' ({} found):", query, matches.len());
    println!("{:-<80}", "");
    for (key, entry) in matches {
        print_entry(key, entry);
    }
}

fn cleanup(store: &mut HistoryStore, path: &Path, now: i64, retention_days: i64, force: bool) -> Result<()> {
    let cutoff = now - retention_days * 24 * 60 * 60;
    let expired = store.expired(cutoff);
    if expired.is_empty() {
        println!("No scrobbles older than {} days.", retention_days);
        return Ok(());
    }

    println!("\n{} scrobbles older than {} days:", expired.len(), retention_days);
    println!("{:-<80}", "");
    for (_, entry) in &expired {
        println!(
            "  {} - {} ({})",
            entry.artist,
            entry.title,
            format_timestamp(entry.scrobbled_at)
        );
    }

    if !force {
        println!("\nDry run: re-run with --force to remove them.");
        return Ok(());
    }

    let removed = store.prune(cutoff);
    store
        .save(path)
        .with_context(|| format!("Failed to save store {}", path.display()))?;
    println!("\nRemoved {} scrobbles, {} remaining.", removed, store.len());
    Ok(())
}

fn auto_cleanup(store: &mut HistoryStore, path: &Path, now: i64, retention_days: i64) -> Result<()> {
    let before = store.len();
    let removed = store.prune(now - retention_days * 24 * 60 * 60);
    if removed > 0 {
        store
            .save(path)
            .with_context(|| format!("Failed to save store {}", path.display()))?;
    }
    println!("Auto-cleanup: {} -> {} scrobbles ({} removed)", before, store.len(), removed);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    validate_store_path(&args.store, &[])?;

    let retention_days = match args.config.as_deref() {
        Some(path) => {
            EngineConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?
                .retention_days
        }
        None => DEFAULT_RETENTION_DAYS,
    };
    let now = chrono::Utc::now().timestamp();
    let mut store = HistoryStore::load(&args.store);

    match args.command {
        Command::Stats => show_stats(&store, now, retention_days),
        Command::List { days } => list_recent(&store, now, days),
        Command::Search { query } => search(&store, &query),
        Command::Cleanup { force } => cleanup(&mut store, &args.store, now, retention_days, force)?,
        Command::AutoCleanup => auto_cleanup(&mut store, &args.store, now, retention_days)?,
    }

    Ok(())
}
