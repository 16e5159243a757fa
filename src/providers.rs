//! Collaborator interfaces and their file-backed implementations.
//!
//! The engine only talks to these traits. Network clients for the real
//! services live outside this crate; the JSON-backed providers here let the
//! whole pipeline run offline from exported files.

use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::Deserialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use crate::models::{CandidateTrack, PlayRecord, Submission};
use crate::normalize::comparison_key;
use crate::scoring::similarity_score;

// ============================================================================
// Traits
// ============================================================================

/// Source of truth play log. Returns newest-first.
pub trait SourceHistoryProvider {
    fn fetch_history(&self) -> Result<Vec<PlayRecord>>;
}

/// Destination catalog search.
pub trait SearchProvider {
    /// Up to `limit` candidate tracks for (artist, title).
    fn search(&self, artist: &str, title: &str, limit: usize) -> Result<Vec<CandidateTrack>>;

    /// Listener/play count for a candidate returned by `search`.
    fn popularity(&self, candidate: &CandidateTrack) -> Result<u64>;
}

/// Destination ledger. `Ok(())` means the scrobble was recorded.
pub trait SubmissionSink {
    fn submit(&mut self, submission: &Submission) -> Result<()>;
}

// ============================================================================
// JSON Play Log
// ============================================================================

/// Reads an exported listening history (JSON array, newest first).
pub struct JsonHistorySource {
    path: PathBuf,
}

impl JsonHistorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SourceHistoryProvider for JsonHistorySource {
    fn fetch_history(&self) -> Result<Vec<PlayRecord>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open play log {}", self.path.display()))?;
        let raw: Vec<Value> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse play log {}", self.path.display()))?;

        // Entries convert one by one; unusable ones are skipped
        let total = raw.len();
        let records: Vec<PlayRecord> = raw
            .into_iter()
            .enumerate()
            .filter_map(|(idx, value)| match serde_json::from_value::<PlayRecord>(value) {
                Ok(record) if !record.id.trim().is_empty() => Some(record),
                Ok(_) => {
                    warn!("Skipping play log entry {} without a track id", idx);
                    None
                }
                Err(e) => {
                    warn!("Skipping unreadable play log entry {}: {}", idx, e);
                    None
                }
            })
            .collect();
        if records.len() < total {
            warn!("Read {} of {} play log entries from {}", records.len(), total, self.path.display());
        }
        Ok(records)
    }
}

// ============================================================================
// JSON Catalog Search
// ============================================================================

/// One track of an exported destination catalog.
#[derive(Clone, Debug, Deserialize)]
pub struct CatalogTrack {
    pub artist: String,
    pub title: String,
    #[serde(default)]
    pub album: Option<String>,
    /// Missing listener counts make `popularity` fail for that track.
    #[serde(default)]
    pub listeners: Option<u64>,
}

/// Offline search over a catalog file, ranked by similarity to the query.
pub struct CatalogSearch {
    tracks: Vec<CatalogTrack>,
}

impl CatalogSearch {
    pub fn new(tracks: Vec<CatalogTrack>) -> Self {
        Self { tracks }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open catalog {}", path.display()))?;
        let tracks: Vec<CatalogTrack> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse catalog {}", path.display()))?;
        log::info!("Loaded {} catalog tracks from {}", tracks.len(), path.display());
        Ok(Self::new(tracks))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl SearchProvider for CatalogSearch {
    fn search(&self, artist: &str, title: &str, limit: usize) -> Result<Vec<CandidateTrack>> {
        let query = comparison_key(artist, title);

        let mut ranked: Vec<(usize, u8)> = self
            .tracks
            .iter()
            .enumerate()
            .map(|(idx, t)| (idx, similarity_score(&query, &comparison_key(&t.artist, &t.title))))
            .filter(|&(_, score)| score > 0)
            .collect();
        // Stable: equal scores keep catalog order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(idx, _)| {
                let t = &self.tracks[idx];
                CandidateTrack {
                    id: idx.to_string(),
                    artist: t.artist.clone(),
                    title: t.title.clone(),
                    album: t.album.clone(),
                }
            })
            .collect())
    }

    fn popularity(&self, candidate: &CandidateTrack) -> Result<u64> {
        let idx: usize = candidate
            .id
            .parse()
            .with_context(|| format!("Invalid catalog handle '{}'", candidate.id))?;
        let track = self
            .tracks
            .get(idx)
            .ok_or_else(|| anyhow!("Catalog handle {} out of range", idx))?;
        track
            .listeners
            .ok_or_else(|| anyhow!("No listener count for {} - {}", track.artist, track.title))
    }
}

// ============================================================================
// JSON Lines Outbox
// ============================================================================

/// Appends one JSON object per accepted submission.
pub struct OutboxSink {
    path: PathBuf,
}

impl OutboxSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SubmissionSink for OutboxSink {
    fn submit(&mut self, submission: &Submission) -> Result<()> {
        let mut line = serde_json::to_string(submission)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open outbox {}", self.path.display()))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}
