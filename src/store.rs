//! Persisted scrobble history.
//!
//! Entries are keyed `"{track_id}_{timestamp}"` so repeated plays of one
//! track coexist. The store is a plain map with the handful of queries the
//! engine and the history tool need; JSON is only the on-disk format.

use log::{info, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default retention window (14 days)
pub const RETENTION_SECS: i64 = 14 * 24 * 60 * 60;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub scrobbled_at: i64,
    #[serde(default)]
    pub duration_seconds: i64,
    #[serde(default, alias = "youtube_url")]
    pub canonical_url: String,
}

/// Key for one recorded play.
pub fn scrobble_key(track_id: &str, timestamp: i64) -> String {
    format!("{}_{}", track_id, timestamp)
}

/// Track id part of a key: everything before the last '_'.
pub fn track_id_from_key(key: &str) -> &str {
    key.rsplit_once('_').map(|(id, _)| id).unwrap_or(key)
}

/// Summary for the history tool.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub total: usize,
    pub recent: usize,
    pub old: usize,
    pub earliest: Option<i64>,
    pub latest: Option<i64>,
    pub unique_tracks: usize,
    /// (artist, scrobble count), most played first
    pub top_artists: Vec<(String, usize)>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HistoryStore {
    entries: FxHashMap<String, HistoryEntry>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, HistoryEntry)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&HistoryEntry> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HistoryEntry)> {
        self.entries.iter()
    }

    /// Record a play under `"{track_id}_{scrobbled_at}"`. Returns the key.
    pub fn insert(&mut self, track_id: &str, entry: HistoryEntry) -> String {
        let key = scrobble_key(track_id, entry.scrobbled_at);
        self.entries.insert(key.clone(), entry);
        key
    }

    /// Swap the whole content for `entries`.
    pub fn replace_all(&mut self, entries: impl IntoIterator<Item = (String, HistoryEntry)>) {
        self.entries = entries.into_iter().collect();
    }

    /// Sorted recording times of `track_id`.
    ///
    /// Matches keys of the form `"{track_id}_{digits}"`, so a track whose id
    /// merely starts with `track_id` followed by '_' is not mixed in.
    pub fn prior_timestamps(&self, track_id: &str) -> Vec<i64> {
        let prefix = format!("{}_", track_id);
        let mut timestamps: Vec<i64> = self
            .entries
            .iter()
            .filter(|(key, _)| {
                key.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
            })
            .map(|(_, entry)| entry.scrobbled_at)
            .collect();
        timestamps.sort_unstable();
        timestamps
    }

    /// Entries older than `cutoff`, oldest first. Does not modify the store.
    pub fn expired(&self, cutoff: i64) -> Vec<(&String, &HistoryEntry)> {
        let mut old: Vec<_> = self.entries.iter().filter(|(_, e)| e.scrobbled_at < cutoff).collect();
        old.sort_by(|a, b| a.1.scrobbled_at.cmp(&b.1.scrobbled_at).then_with(|| a.0.cmp(b.0)));
        old
    }

    /// Drop every entry with `scrobbled_at < cutoff`. An entry exactly at the cutoff is kept.
    pub fn prune(&mut self, cutoff: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.scrobbled_at >= cutoff);
        let removed = before - self.entries.len();
        if removed > 0 {
            info!("Cleaned up {} old scrobble records", removed);
        }
        removed
    }

    /// Entries with `scrobbled_at >= since`, newest first.
    pub fn recent(&self, since: i64) -> Vec<(&String, &HistoryEntry)> {
        let mut recent: Vec<_> = self.entries.iter().filter(|(_, e)| e.scrobbled_at >= since).collect();
        sort_newest_first(&mut recent);
        recent
    }

    /// Case-insensitive substring search over artist, title and album, newest first.
    pub fn search(&self, query: &str) -> Vec<(&String, &HistoryEntry)> {
        let needle = query.to_lowercase();
        let mut matches: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, e)| {
                e.artist.to_lowercase().contains(&needle)
                    || e.title.to_lowercase().contains(&needle)
                    || e.album.to_lowercase().contains(&needle)
            })
            .collect();
        sort_newest_first(&mut matches);
        matches
    }

    pub fn stats(&self, now: i64, retention_secs: i64) -> HistoryStats {
        let cutoff = now - retention_secs;
        let recent = self.entries.values().filter(|e| e.scrobbled_at >= cutoff).count();

        let mut artist_counts: FxHashMap<&str, usize> = FxHashMap::default();
        for entry in self.entries.values() {
            let artist = if entry.artist.is_empty() { "Unknown" } else { entry.artist.as_str() };
            *artist_counts.entry(artist).or_default() += 1;
        }
        let mut top_artists: Vec<(String, usize)> =
            artist_counts.into_iter().map(|(a, n)| (a.to_string(), n)).collect();
        top_artists.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_artists.truncate(10);

        let unique_tracks = self
            .entries
            .keys()
            .map(|k| track_id_from_key(k))
            .collect::<rustc_hash::FxHashSet<_>>()
            .len();

        HistoryStats {
            total: self.entries.len(),
            recent,
            old: self.entries.len() - recent,
            earliest: self.entries.values().map(|e| e.scrobbled_at).min(),
            latest: self.entries.values().map(|e| e.scrobbled_at).max(),
            unique_tracks,
            top_artists,
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Load from a JSON object of key → entry.
    /// A missing, unreadable or corrupt file yields an empty store.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!("No scrobble history file at {}, starting fresh", path.display());
            return Self::new();
        }

        let parsed = fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|raw| serde_json::from_str::<FxHashMap<String, HistoryEntry>>(&raw).map_err(Error::from));

        match parsed {
            Ok(entries) => {
                info!("Loaded {} scrobbles from {}", entries.len(), path.display());
                Self { entries }
            }
            Err(e) => {
                warn!("Ignoring unreadable scrobble history {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    /// Write to `path` atomically: a sibling temp file is fully written,
    /// synced, then renamed over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = temp_path(path);
        {
            let sorted: BTreeMap<&String, &HistoryEntry> = self.entries.iter().collect();
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &sorted)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        info!("Saved {} scrobbles to {}", self.entries.len(), path.display());
        Ok(())
    }
}

fn sort_newest_first(entries: &mut [(&String, &HistoryEntry)]) {
    entries.sort_by(|a, b| b.1.scrobbled_at.cmp(&a.1.scrobbled_at).then_with(|| a.0.cmp(b.0)));
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn entry(artist: &str, title: &str, scrobbled_at: i64) -> HistoryEntry {
        HistoryEntry {
            artist: artist.to_string(),
            title: title.to_string(),
            album: String::new(),
            scrobbled_at,
            duration_seconds: 200,
            canonical_url: String::new(),
        }
    }

    #[test]
    fn test_track_id_from_key() {
        assert_eq!(track_id_from_key("abc_1700000000"), "abc");
        assert_eq!(track_id_from_key("a_b_c_1700000000"), "a_b_c");
        assert_eq!(track_id_from_key("legacy"), "legacy");
    }

    #[test]
    fn test_prior_timestamps_sorted_and_exact() {
        let mut store = HistoryStore::new();
        store.insert("abc", entry("A", "T", 300));
        store.insert("abc", entry("A", "T", 100));
        store.insert("abc_def", entry("B", "U", 200));
        store.insert("xyz", entry("C", "V", 150));

        assert_eq!(store.prior_timestamps("abc"), vec![100, 300]);
        assert_eq!(store.prior_timestamps("abc_def"), vec![200]);
        assert!(store.prior_timestamps("missing").is_empty());
    }

    #[test]
    fn test_prune_retention_boundary() {
        let cutoff = NOW - RETENTION_SECS;
        let mut store = HistoryStore::new();
        store.insert("edge", entry("A", "T", cutoff));
        store.insert("stale", entry("A", "T", cutoff - 1));

        assert_eq!(store.prune(cutoff), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(&scrobble_key("edge", cutoff)).is_some());
    }

    #[test]
    fn test_prune_keeps_recent_only() {
        let mut store = HistoryStore::new();
        store.insert("old", entry("A", "Old", NOW - 15 * 86_400));
        store.insert("new", entry("A", "New", NOW - 3_600));

        store.prune(NOW - RETENTION_SECS);
        let titles: Vec<&str> = store.iter().map(|(_, e)| e.title.as_str()).collect();
        assert_eq!(titles, vec!["New"]);
    }

    #[test]
    fn test_expired_does_not_modify() {
        let mut store = HistoryStore::new();
        store.insert("b", entry("A", "T", 50));
        store.insert("a", entry("A", "T", 10));
        store.insert("c", entry("A", "T", 500));
        let expired: Vec<&str> = store.expired(100).into_iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(expired, vec!["a_10", "b_50"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_recent_and_search_newest_first() {
        let mut store = HistoryStore::new();
        store.insert("a", entry("Drake", "God's Plan", 100));
        store.insert("b", entry("Drake", "Nonstop", 300));
        store.insert("c", entry("Adele", "Hello", 200));

        let recent: Vec<i64> = store.recent(150).into_iter().map(|(_, e)| e.scrobbled_at).collect();
        assert_eq!(recent, vec![300, 200]);

        let found: Vec<&str> = store.search("DRAKE").into_iter().map(|(_, e)| e.title.as_str()).collect();
        assert_eq!(found, vec!["Nonstop", "God's Plan"]);
    }

    #[test]
    fn test_stats() {
        let mut store = HistoryStore::new();
        store.insert("a", entry("Drake", "God's Plan", NOW - 100));
        store.insert("a", entry("Drake", "God's Plan", NOW - 1_000));
        store.insert("b", entry("Adele", "Hello", NOW - 20 * 86_400));

        let stats = store.stats(NOW, RETENTION_SECS);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.recent, 2);
        assert_eq!(stats.old, 1);
        assert_eq!(stats.unique_tracks, 2);
        assert_eq!(stats.earliest, Some(NOW - 20 * 86_400));
        assert_eq!(stats.latest, Some(NOW - 100));
        assert_eq!(stats.top_artists[0], ("Drake".to_string(), 2));
    }

    #[test]
    fn test_save_and_load_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("scrobble_history.json");

        let mut store = HistoryStore::new();
        store.insert(
            "vid1",
            HistoryEntry {
                artist: "Drake VEVO".to_string(),
                title: "God's Plan (Official Video)".to_string(),
                album: "Scorpion".to_string(),
                scrobbled_at: 1_700_000_123,
                duration_seconds: 199,
                canonical_url: "https://music.youtube.com/watch?v=vid1".to_string(),
            },
        );
        store.save(&path).unwrap();

        assert!(!temp_path(&path).exists());
        let loaded = HistoryStore::load(&path);
        assert_eq!(loaded, store);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(HistoryStore::load(&dir.path().join("nope.json")).is_empty());
    }

    #[test]
    fn test_load_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrobble_history.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(HistoryStore::load(&path).is_empty());
    }

    #[test]
    fn test_load_legacy_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrobble_history.json");
        fs::write(
            &path,
            r#"{"vid_100": {"artist": "A", "title": "T", "scrobbled_at": 100,
                 "duration_seconds": 180, "youtube_url": "https://music.youtube.com/watch?v=vid"}}"#,
        )
        .unwrap();
        let store = HistoryStore::load(&path);
        let entry = store.get("vid_100").unwrap();
        assert_eq!(entry.canonical_url, "https://music.youtube.com/watch?v=vid");
        assert_eq!(entry.album, "");
    }
}
