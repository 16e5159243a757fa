//! Scoring functions for candidate selection.
//!
//! This module contains:
//! - Similarity scoring between comparison strings (0-100)
//! - Weighted similarity + popularity scoring
//! - Stable best-candidate selection

use crate::normalize::fold_to_ascii;

// ============================================================================
// Score Thresholds
// ============================================================================

/// Candidates at or above this similarity are "good" matches
pub const GOOD_MATCH_THRESHOLD: u8 = 80;

/// Last-resort floor: the single best candidate is kept if it reaches this
pub const FALLBACK_MATCH_THRESHOLD: u8 = 60;

/// Share of the weighted score that comes from similarity; popularity gets the rest
pub const SIMILARITY_WEIGHT: f64 = 0.7;

// ============================================================================
// Similarity
// ============================================================================

/// Textual similarity between two comparison strings, 0 to 100.
///
/// Normalized Levenshtein over ASCII-folded input, so "beyonce" and
/// "beyoncé" score 100. Two empty strings are identical.
pub fn similarity_score(a: &str, b: &str) -> u8 {
    let a = fold_to_ascii(a);
    let b = fold_to_ascii(b);
    let similarity = strsim::normalized_levenshtein(&a, &b);
    (similarity * 100.0).round().clamp(0.0, 100.0) as u8
}

// ============================================================================
// Weighted Scoring
// ============================================================================

/// `weight * similarity + (1 - weight) * normalized popularity`.
///
/// Popularity is scaled against the most popular surviving candidate. When
/// every candidate has popularity 0 the popularity term is 0 and selection
/// degrades to pure similarity.
pub fn weighted_score(similarity: u8, popularity: u64, max_popularity: u64, similarity_weight: f64) -> f64 {
    let normalized_popularity = if max_popularity > 0 {
        popularity as f64 / max_popularity as f64 * 100.0
    } else {
        0.0
    };
    similarity_weight * f64::from(similarity) + (1.0 - similarity_weight) * normalized_popularity
}

/// Index of the highest score; the first one wins ties.
pub fn select_best(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &score) in scores.iter().enumerate() {
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((idx, score)),
        }
    }
    best.map(|(idx, _)| idx)
}
