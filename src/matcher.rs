//! Canonical track selection.
//!
//! Given cleaned (artist, title), ask the search provider for candidates,
//! score them against the same normalization, keep the plausible ones and
//! pick the best by a similarity + popularity blend. Provider failures never
//! escape: a failed search is an empty result and a failed popularity
//! lookup counts as 0 listeners.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::models::{CandidateTrack, MatchCandidate};
use crate::normalize::comparison_key;
use crate::providers::SearchProvider;
use crate::scoring::{
    select_best, similarity_score, weighted_score, FALLBACK_MATCH_THRESHOLD, GOOD_MATCH_THRESHOLD,
    SIMILARITY_WEIGHT,
};

/// Maximum candidates requested from the provider per query
pub const DEFAULT_SEARCH_LIMIT: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub search_limit: usize,
    pub good_threshold: u8,
    pub fallback_threshold: u8,
    pub similarity_weight: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            search_limit: DEFAULT_SEARCH_LIMIT,
            good_threshold: GOOD_MATCH_THRESHOLD,
            fallback_threshold: FALLBACK_MATCH_THRESHOLD,
            similarity_weight: SIMILARITY_WEIGHT,
        }
    }
}

/// Input to `find_best_match`. The fallback pair is the original,
/// uncleaned metadata, tried only when the cleaned query finds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchQuery<'a> {
    pub artist: &'a str,
    pub title: &'a str,
    /// Log context only. Candidates are scored on artist and title.
    pub album: &'a str,
    pub fallback_artist: Option<&'a str>,
    pub fallback_title: Option<&'a str>,
}

impl<'a> MatchQuery<'a> {
    pub fn new(artist: &'a str, title: &'a str, album: &'a str) -> Self {
        Self {
            artist,
            title,
            album,
            fallback_artist: None,
            fallback_title: None,
        }
    }

    pub fn with_fallback(mut self, artist: &'a str, title: &'a str) -> Self {
        self.fallback_artist = Some(artist);
        self.fallback_title = Some(title);
        self
    }

    /// Fallback pair, if both halves are present, non-empty and differ from the primary pair.
    fn fallback(&self) -> Option<(&'a str, &'a str)> {
        match (self.fallback_artist, self.fallback_title) {
            (Some(artist), Some(title))
                if !artist.is_empty()
                    && !title.is_empty()
                    && (artist != self.artist || title != self.title) =>
            {
                Some((artist, title))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct ScoredCandidate {
    track: CandidateTrack,
    similarity: u8,
}

pub struct CandidateMatcher {
    config: MatcherConfig,
}

impl CandidateMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Best canonical record for the query, or `None` when nothing scores
    /// at least the fallback threshold.
    pub fn find_best_match(&self, provider: &dyn SearchProvider, query: &MatchQuery<'_>) -> Option<MatchCandidate> {
        if query.album.is_empty() {
            info!("Searching for best match: {} - {}", query.artist, query.title);
        } else {
            info!("Searching for best match: {} - {} ({})", query.artist, query.title, query.album);
        }
        let target = comparison_key(query.artist, query.title);

        let mut scored = self.search_scored(provider, query.artist, query.title, &target);
        if scored.is_empty() {
            if let Some((artist, title)) = query.fallback() {
                info!("No matches with cleaned metadata, trying original: {} - {}", artist, title);
                scored = self.search_scored(provider, artist, title, &target);
                if !scored.is_empty() {
                    info!("Found {} candidates using original metadata", scored.len());
                }
            }
        }

        if scored.is_empty() {
            warn!("No matches found for: {} - {}", query.artist, query.title);
            return None;
        }

        let survivors = self.filter_plausible(scored)?;
        info!("Found {} good candidates", survivors.len());

        let popularities: Vec<u64> = survivors
            .iter()
            .map(|c| match provider.popularity(&c.track) {
                Ok(listeners) => listeners,
                Err(e) => {
                    warn!("Could not get listener count for {} - {}: {:#}", c.track.artist, c.track.title, e);
                    0
                }
            })
            .collect();
        let max_popularity = popularities.iter().copied().max().unwrap_or(0);

        let weighted: Vec<f64> = survivors
            .iter()
            .zip(&popularities)
            .map(|(c, &popularity)| {
                let score = weighted_score(c.similarity, popularity, max_popularity, self.config.similarity_weight);
                info!(
                    "Candidate: {} - {} (similarity: {}, listeners: {}, weighted: {:.1})",
                    c.track.artist, c.track.title, c.similarity, popularity, score
                );
                score
            })
            .collect();

        let best_idx = select_best(&weighted)?;
        let best = &survivors[best_idx];
        info!(
            "Selected best match: {} - {} (weighted score: {:.1}, listeners: {})",
            best.track.artist, best.track.title, weighted[best_idx], popularities[best_idx]
        );

        Some(MatchCandidate {
            canonical_artist: best.track.artist.clone(),
            canonical_title: best.track.title.clone(),
            canonical_album: best.track.album.clone().filter(|a| !a.is_empty()),
            similarity_score: best.similarity,
            popularity: popularities[best_idx],
            weighted_score: weighted[best_idx],
        })
    }

    /// Run one search and score each hit against `target`. Errors become an empty list.
    fn search_scored(&self, provider: &dyn SearchProvider, artist: &str, title: &str, target: &str) -> Vec<ScoredCandidate> {
        let tracks = match provider.search(artist, title, self.config.search_limit) {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!("Error searching for {} - {}: {:#}", artist, title, e);
                return Vec::new();
            }
        };

        tracks
            .into_iter()
            .take(self.config.search_limit)
            .filter_map(|track| {
                if track.title.trim().is_empty() {
                    warn!("Skipping search result without a title (artist: {:?})", track.artist);
                    return None;
                }
                let similarity = similarity_score(target, &comparison_key(&track.artist, &track.title));
                Some(ScoredCandidate { track, similarity })
            })
            .collect()
    }

    /// Keep "good" candidates; otherwise the single best if it clears the fallback floor.
    fn filter_plausible(&self, scored: Vec<ScoredCandidate>) -> Option<Vec<ScoredCandidate>> {
        let best_similarity = scored.iter().map(|c| c.similarity).max()?;
        if best_similarity >= self.config.good_threshold {
            return Some(
                scored
                    .into_iter()
                    .filter(|c| c.similarity >= self.config.good_threshold)
                    .collect(),
            );
        }

        if best_similarity >= self.config.fallback_threshold {
            info!("Using best available match (score: {})", best_similarity);
            // First candidate with the top score
            return scored.into_iter().find(|c| c.similarity == best_similarity).map(|c| vec![c]);
        }

        warn!("No reasonable matches found (best score: {})", best_similarity);
        None
    }
}

impl Default for CandidateMatcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}
