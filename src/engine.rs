//! Batch reconciliation: plan which plays to record, then submit them.
//!
//! A run reads the source play log (newest first), assigns each play a
//! synthetic timestamp, drops plays that would duplicate an earlier
//! recording of the same track, resolves the survivors to canonical
//! metadata and hands them to the sink. The history store only grows on
//! successful submissions and is pruned to the retention window.

use log::{error, info, warn};
use rustc_hash::FxHashMap;
use std::time::{Duration, Instant};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::guard::DuplicateGuard;
use crate::matcher::{CandidateMatcher, MatchQuery};
use crate::models::{PlannedScrobble, PlayRecord, RunReport, Submission};
use crate::normalize::clean_track_metadata;
use crate::progress::{create_progress_bar, format_duration, format_timestamp, log_progress};
use crate::providers::{SearchProvider, SourceHistoryProvider, SubmissionSink};
use crate::store::{HistoryEntry, HistoryStore};

pub struct ReconciliationEngine {
    config: EngineConfig,
    guard: DuplicateGuard,
    matcher: CandidateMatcher,
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ReconciliationEngine {
    pub fn new(config: EngineConfig) -> Self {
        let guard = DuplicateGuard::new(config.gap_buffer_secs, config.default_duration_secs);
        let matcher = CandidateMatcher::new(config.matcher.clone());
        Self { config, guard, matcher }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fails when canonical matching is required but no search provider was given.
    pub fn ensure_ready(&self, search: Option<&dyn SearchProvider>) -> Result<()> {
        if self.config.require_matcher && search.is_none() {
            return Err(Error::NoSearchProvider);
        }
        Ok(())
    }

    // ========================================================================
    // Planning
    // ========================================================================

    /// Assign timestamps to a newest-first batch and keep the plays the
    /// duplicate guard accepts, oldest first.
    ///
    /// The oldest play lands at `now - (N-1) * spacing`, the newest at `now`.
    /// A play is checked against the store and against plays of the same
    /// track accepted earlier in this batch.
    pub fn plan<'a>(&self, newest_first: &'a [PlayRecord], store: &HistoryStore, now: i64) -> Vec<PlannedScrobble<'a>> {
        let total = newest_first.len() as i64;
        let mut accepted_in_batch: FxHashMap<&str, Vec<i64>> = FxHashMap::default();
        let mut planned = Vec::new();

        for (i, record) in newest_first.iter().rev().enumerate() {
            let proposed = now - (total - i as i64 - 1) * self.config.spacing_secs;

            let mut prior = store.prior_timestamps(&record.id);
            if let Some(batch) = accepted_in_batch.get(record.id.as_str()) {
                prior.extend_from_slice(batch);
                prior.sort_unstable();
            }

            let decision = self.guard.can_accept(record, proposed, &prior);
            if decision.accept {
                info!("Accept {} - {}: {}", record.primary_artist(), record.title, decision.reason);
                accepted_in_batch.entry(record.id.as_str()).or_default().push(proposed);
                planned.push(PlannedScrobble {
                    record,
                    timestamp: proposed,
                });
            } else {
                info!("Skip {} - {}: {}", record.primary_artist(), record.title, decision.reason);
            }
        }

        info!("Found {} of {} tracks that can be scrobbled", planned.len(), newest_first.len());
        planned
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Clean the record's metadata and swap in the canonical match when one
    /// is found. Without a search provider (or a match) the cleaned
    /// metadata is submitted as is.
    pub fn resolve(&self, record: &PlayRecord, timestamp: i64, search: Option<&dyn SearchProvider>) -> Submission {
        let original_artist = record.primary_artist();
        let original_album = record.album_name();
        let (artist, title, album) = clean_track_metadata(original_artist, &record.title, original_album);

        if artist != original_artist || title != record.title {
            info!("Cleaned: {} - {} -> {} - {}", original_artist, record.title, artist, title);
        }
        if album != original_album {
            info!("Cleaned album: {} -> {}", original_album, album);
        }

        let matched = search.and_then(|provider| {
            let query = MatchQuery::new(&artist, &title, &album).with_fallback(original_artist, &record.title);
            self.matcher.find_best_match(provider, &query)
        });

        let cleaned_album = Some(album).filter(|a| !a.is_empty());
        match matched {
            Some(candidate) => {
                info!(
                    "Using canonical match: {} - {}",
                    candidate.canonical_artist, candidate.canonical_title
                );
                Submission {
                    artist: candidate.canonical_artist,
                    title: candidate.canonical_title,
                    timestamp,
                    album: candidate.canonical_album.filter(|a| !a.is_empty()).or(cleaned_album),
                    matched: true,
                }
            }
            None => {
                if search.is_some() {
                    warn!("No good match found, using cleaned metadata: {} - {}", artist, title);
                }
                Submission {
                    artist,
                    title,
                    timestamp,
                    album: cleaned_album,
                    matched: false,
                }
            }
        }
    }

    /// Store entry for a submitted play. Keeps the source metadata, not the
    /// cleaned or canonical form.
    pub fn history_entry(&self, record: &PlayRecord, timestamp: i64) -> HistoryEntry {
        HistoryEntry {
            artist: record.primary_artist().to_string(),
            title: record.title.clone(),
            album: record.album_name().to_string(),
            scrobbled_at: timestamp,
            duration_seconds: self.guard.duration_seconds(record),
            canonical_url: format!("{}{}", self.config.canonical_url_prefix, record.id),
        }
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Submit every planned play, record the successful ones and prune the
    /// store. Sink failures are logged and counted; they never stop the batch.
    pub fn execute(
        &self,
        plan: &[PlannedScrobble<'_>],
        store: &mut HistoryStore,
        search: Option<&dyn SearchProvider>,
        sink: &mut dyn SubmissionSink,
        now: i64,
    ) -> RunReport {
        let start = Instant::now();
        let total = plan.len() as u64;
        let mut report = RunReport {
            planned: plan.len(),
            ..Default::default()
        };

        let pb = create_progress_bar(total, "Submitting scrobbles");
        for (idx, planned) in plan.iter().enumerate() {
            let record = planned.record;
            info!(
                "Scrobbling track {}/{}: {} - {} at {}",
                idx + 1,
                plan.len(),
                record.primary_artist(),
                record.title,
                format_timestamp(planned.timestamp)
            );

            let submission = self.resolve(record, planned.timestamp, search);
            match sink.submit(&submission) {
                Ok(()) => {
                    store.insert(&record.id, self.history_entry(record, planned.timestamp));
                    report.accepted += 1;
                    if submission.matched {
                        report.matched += 1;
                    }
                }
                Err(e) => {
                    error!("Failed to scrobble {} - {}: {:#}", submission.artist, submission.title, e);
                    report.failed += 1;
                }
            }

            pb.inc(1);
            log_progress("submit", idx as u64 + 1, total, 10);

            if self.config.submit_delay_ms > 0 && idx + 1 < plan.len() {
                std::thread::sleep(Duration::from_millis(self.config.submit_delay_ms));
            }
        }
        pb.finish_with_message(format!(
            "Submitted {} scrobbles ({} failed)",
            report.accepted, report.failed
        ));

        report.pruned = store.prune(now - self.config.retention_secs());

        info!(
            "Scrobbled {}/{} tracks in {}",
            report.accepted,
            plan.len(),
            format_duration(start.elapsed())
        );
        report
    }

    /// Fetch, prune, plan and execute in one go.
    ///
    /// A failed or empty fetch leaves the store untouched and yields an
    /// all-zero report.
    pub fn reconcile(
        &self,
        source: &dyn SourceHistoryProvider,
        store: &mut HistoryStore,
        search: Option<&dyn SearchProvider>,
        sink: &mut dyn SubmissionSink,
        now: i64,
    ) -> RunReport {
        let records = match source.fetch_history() {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to fetch listening history: {:#}", e);
                return RunReport::default();
            }
        };
        if records.is_empty() {
            info!("No listening history available");
            return RunReport::default();
        }
        info!("Fetched {} tracks from listening history", records.len());

        let pruned = store.prune(now - self.config.retention_secs());
        let plan = self.plan(&records, store, now);

        let mut report = if plan.is_empty() {
            info!("No new tracks to scrobble");
            RunReport::default()
        } else {
            self.execute(&plan, store, search, sink, now)
        };
        report.fetched = records.len();
        report.skipped = records.len() - plan.len();
        report.pruned += pruned;
        report
    }
}
