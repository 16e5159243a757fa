//! Core data models for play-log reconciliation.
//!
//! This module contains the records read from the source play log, the
//! candidate tracks returned by a search provider, and the per-run report.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Source Play Log
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRef {
    #[serde(default)]
    pub name: String,
}

/// One entry of the streaming service's listening history.
///
/// Field names follow the history export of the source service
/// (`videoId`, `duration` as "M:SS" text, optional `duration_seconds`).
/// Only `videoId` is required. Every other field tolerates `null` and
/// unexpected types, which read as missing so the documented defaults apply.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRecord {
    #[serde(rename = "videoId", alias = "id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_artists")]
    pub artists: Vec<ArtistRef>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_album")]
    pub album: Option<AlbumRef>,
    /// "M:SS" or "H:MM:SS"
    #[serde(default, rename = "duration", deserialize_with = "lenient_duration_text")]
    pub duration_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    pub duration_seconds: Option<i64>,
}

impl PlayRecord {
    /// First credited artist, or "" when the record has none.
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(|a| a.name.as_str()).unwrap_or("")
    }

    pub fn album_name(&self) -> &str {
        self.album.as_ref().map(|a| a.name.as_str()).unwrap_or("")
    }
}

// ============================================================================
// Lenient Field Parsing
// ============================================================================

/// Name of an `{"name": ...}` object or a bare string. Objects without a
/// usable name keep their slot with an empty name.
fn name_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => Some(map.get("name").and_then(Value::as_str).unwrap_or("").to_string()),
        _ => None,
    }
}

fn lenient_artists<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<ArtistRef>, D::Error> {
    let artists = match Value::deserialize(deserializer)? {
        Value::Array(items) => items.iter().filter_map(name_of).map(|name| ArtistRef { name }).collect(),
        _ => Vec::new(),
    };
    Ok(artists)
}

fn lenient_album<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<AlbumRef>, D::Error> {
    Ok(name_of(&Value::deserialize(deserializer)?).map(|name| AlbumRef { name }))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let text = match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    Ok(text)
}

fn lenient_duration_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

/// Whole seconds from an integer, an integral float or a digit string.
fn lenient_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let seconds = match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(seconds)
}

// ============================================================================
// Search Provider Models
// ============================================================================

/// Raw search hit from the destination service's catalog.
/// `id` is an opaque handle the provider uses to look up popularity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateTrack {
    pub id: String,
    pub artist: String,
    pub title: String,
    pub album: Option<String>,
}

/// Best canonical record selected for a noisy input. Never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchCandidate {
    pub canonical_artist: String,
    pub canonical_title: String,
    pub canonical_album: Option<String>,
    /// 0-100
    pub similarity_score: u8,
    /// Listener/play count, 0 when unknown
    pub popularity: u64,
    pub weighted_score: f64,
}

// ============================================================================
// Reconciliation Models
// ============================================================================

/// A play accepted by the duplicate guard, with its synthetic timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlannedScrobble<'a> {
    pub record: &'a PlayRecord,
    pub timestamp: i64,
}

/// What gets handed to the submission sink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub artist: String,
    pub title: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// True when the metadata came from a canonical match rather than cleaned fallback
    pub matched: bool,
}

/// Counters for one reconciliation run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Records returned by the source
    pub fetched: usize,
    /// Records that passed the duplicate guard
    pub planned: usize,
    /// Records rejected by the duplicate guard
    pub skipped: usize,
    /// Successful submissions
    pub accepted: usize,
    /// Submissions rejected by the sink
    pub failed: usize,
    /// Successful submissions that used a canonical match
    pub matched: usize,
    /// Entries removed from the store by retention pruning
    pub pruned: usize,
}

impl RunReport {
    /// Log the report as a JSON line for tail-friendly output.
    pub fn log_summary(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            log::info!("[REPORT] {}", json);
        }
    }

    /// Write the report to a JSON file.
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
