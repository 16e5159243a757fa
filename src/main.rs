use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use scrobble_sync::config::EngineConfig;
use scrobble_sync::engine::ReconciliationEngine;
use scrobble_sync::matcher::{CandidateMatcher, MatchQuery};
use scrobble_sync::models::Submission;
use scrobble_sync::normalize::{clean_track_metadata, comparison_key, normalize_for_comparison};
use scrobble_sync::progress::{format_duration, format_timestamp, set_log_only};
use scrobble_sync::providers::{CatalogSearch, JsonHistorySource, OutboxSink, SearchProvider, SubmissionSink};
use scrobble_sync::safety::validate_store_path;
use scrobble_sync::scoring::{similarity_score, weighted_score};
use scrobble_sync::store::HistoryStore;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Pause between submissions when no config file sets one
const CLI_SUBMIT_DELAY_MS: u64 = 2000;

#[derive(Parser)]
#[command(name = "scrobble-sync")]
#[command(about = "Reconcile a streaming play log with a scrobble ledger")]
struct Args {
    /// Log-only mode: no progress bars, periodic progress lines instead
    #[arg(long, global = true)]
    log_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan, match and submit new plays from an exported play log
    Reconcile {
        /// Play log export (JSON array, newest first)
        #[arg(long)]
        history: PathBuf,

        /// Scrobble history store (JSON), rewritten after the run
        #[arg(long)]
        store: PathBuf,

        /// Catalog used for canonical matching (JSON array with listener counts)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Outbox receiving one JSON line per submission
        #[arg(long)]
        outbox: PathBuf,

        /// Engine configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the pause between submissions
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Abort when no catalog is given
        #[arg(long)]
        require_matcher: bool,

        /// Log what would be submitted without touching the outbox or store
        #[arg(long)]
        dry_run: bool,

        /// Current time as epoch seconds (defaults to the system clock)
        #[arg(long)]
        now: Option<i64>,

        /// Write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show how one track's metadata gets cleaned
    Clean {
        artist: String,
        title: String,

        #[arg(long, default_value = "")]
        album: String,
    },

    /// Show catalog candidates and the selected canonical match for one track
    Match {
        #[arg(long)]
        catalog: PathBuf,

        artist: String,
        title: String,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Sink used by `--dry-run`: accepts everything and only logs.
struct DryRunSink {
    count: usize,
}

impl SubmissionSink for DryRunSink {
    fn submit(&mut self, submission: &Submission) -> Result<()> {
        self.count += 1;
        info!(
            "[DRY RUN] Would scrobble: {} - {} at {}",
            submission.artist,
            submission.title,
            format_timestamp(submission.timestamp)
        );
        Ok(())
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(EngineConfig {
            submit_delay_ms: CLI_SUBMIT_DELAY_MS,
            ..Default::default()
        }),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_reconcile(
    history: PathBuf,
    store_path: PathBuf,
    catalog: Option<PathBuf>,
    outbox: PathBuf,
    config: Option<PathBuf>,
    delay_ms: Option<u64>,
    require_matcher: bool,
    dry_run: bool,
    now: Option<i64>,
    report_path: Option<PathBuf>,
) -> Result<()> {
    let start = Instant::now();

    let mut sources: Vec<&Path> = vec![history.as_path(), outbox.as_path()];
    if let Some(catalog) = catalog.as_deref() {
        sources.push(catalog);
    }
    validate_store_path(&store_path, &sources)?;

    let mut config = load_config(config.as_deref())?;
    if let Some(delay) = delay_ms {
        config.submit_delay_ms = delay;
    }
    if require_matcher {
        config.require_matcher = true;
    }
    if dry_run {
        config.submit_delay_ms = 0;
    }
    let engine = ReconciliationEngine::new(config);

    let search = match catalog.as_deref() {
        Some(path) => Some(CatalogSearch::load(path)?),
        None => {
            info!("No catalog given, submitting cleaned metadata without canonical matching");
            None
        }
    };
    let search_ref = search.as_ref().map(|s| s as &dyn SearchProvider);
    engine.ensure_ready(search_ref)?;

    let now = now.unwrap_or_else(|| chrono::Utc::now().timestamp());
    info!("Starting reconciliation at {}", format_timestamp(now));

    let mut store = HistoryStore::load(&store_path);

    let source = JsonHistorySource::new(&history);
    let report = if dry_run {
        let mut sink = DryRunSink { count: 0 };
        let report = engine.reconcile(&source, &mut store, search_ref, &mut sink, now);
        info!("[DRY RUN] {} submissions, store left unchanged", sink.count);
        report
    } else {
        let mut sink = OutboxSink::new(&outbox);
        let report = engine.reconcile(&source, &mut store, search_ref, &mut sink, now);
        store
            .save(&store_path)
            .with_context(|| format!("Failed to save store {}", store_path.display()))?;
        report
    };

    report.log_summary();
    if let Some(path) = report_path {
        report.write_to_file(&path)?;
        info!("Report written to {}", path.display());
    }

    println!("\n{:=<60}", "");
    println!("Reconciliation complete!");
    println!("  Fetched:  {}", report.fetched);
    println!("  Planned:  {} ({} skipped as duplicates)", report.planned, report.skipped);
    println!("  Accepted: {} ({} canonical matches)", report.accepted, report.matched);
    println!("  Failed:   {}", report.failed);
    println!("  Pruned:   {}", report.pruned);
    println!("  Elapsed:  {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    if report.accepted == 0 && report.failed > 0 {
        bail!("All {} submissions failed", report.failed);
    }
    Ok(())
}

fn run_clean(artist: &str, title: &str, album: &str) {
    let (clean_artist, clean_title, clean_album) = clean_track_metadata(artist, title, album);

    println!("Display form:");
    println!("  Artist: {:?} -> {:?}", artist, clean_artist);
    println!("  Title:  {:?} -> {:?}", title, clean_title);
    if !album.is_empty() {
        println!("  Album:  {:?} -> {:?}", album, clean_album);
    }

    println!("Comparison form:");
    println!("  Artist: {:?}", normalize_for_comparison(&clean_artist, true));
    println!("  Title:  {:?}", normalize_for_comparison(&clean_title, false));
    println!("  Key:    {:?}", comparison_key(&clean_artist, &clean_title));
}

fn run_match(catalog: &Path, artist: &str, title: &str, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let search = CatalogSearch::load(catalog)?;
    let (clean_artist, clean_title, clean_album) = clean_track_metadata(artist, title, "");
    let target = comparison_key(&clean_artist, &clean_title);

    println!("\nCandidates for '{} - {}':", clean_artist, clean_title);
    println!("{:-<80}", "");

    let candidates = search.search(&clean_artist, &clean_title, config.matcher.search_limit)?;
    if candidates.is_empty() {
        println!("No candidates found.");
    }
    let popularity: Vec<u64> = candidates
        .iter()
        .map(|c| search.popularity(c).unwrap_or(0))
        .collect();
    let max_popularity = popularity.iter().copied().max().unwrap_or(0);
    for (candidate, &listeners) in candidates.iter().zip(&popularity) {
        let similarity = similarity_score(&target, &comparison_key(&candidate.artist, &candidate.title));
        let weighted = weighted_score(
            similarity,
            listeners,
            max_popularity,
            config.matcher.similarity_weight,
        );
        println!(
            "{} - {} ({}) similarity={} listeners={} weighted={:.1}",
            candidate.artist,
            candidate.title,
            candidate.album.as_deref().unwrap_or("Unknown"),
            similarity,
            listeners,
            weighted
        );
    }

    let matcher = CandidateMatcher::new(config.matcher);
    let query = MatchQuery::new(&clean_artist, &clean_title, &clean_album).with_fallback(artist, title);
    println!("{:-<80}", "");
    match matcher.find_best_match(&search, &query) {
        Some(best) => println!(
            "Selected: {} - {} (similarity={}, weighted={:.1})",
            best.canonical_artist, best.canonical_title, best.similarity_score, best.weighted_score
        ),
        None => println!("No plausible match, cleaned metadata would be submitted."),
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    set_log_only(args.log_only);

    match args.command {
        Command::Reconcile {
            history,
            store,
            catalog,
            outbox,
            config,
            delay_ms,
            require_matcher,
            dry_run,
            now,
            report,
        } => run_reconcile(
            history,
            store,
            catalog,
            outbox,
            config,
            delay_ms,
            require_matcher,
            dry_run,
            now,
            report,
        ),
        Command::Clean { artist, title, album } => {
            run_clean(&artist, &title, &album);
            Ok(())
        }
        Command::Match {
            catalog,
            artist,
            title,
            config,
        } => run_match(&catalog, &artist, &title, config.as_deref()),
    }
}
