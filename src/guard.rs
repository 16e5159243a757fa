//! Duration-aware duplicate suppression.
//!
//! A play may only be recorded if it is at least one track length plus a
//! small buffer away from every earlier recording of the same track.

use crate::models::PlayRecord;

/// Margin added to the track length when spacing repeated plays
pub const GAP_BUFFER_SECS: i64 = 30;

/// Assumed length when the record carries no usable duration (3.5 minutes)
pub const DEFAULT_DURATION_SECS: i64 = 210;

/// Parse "M:SS" or "H:MM:SS" into seconds.
/// Every component must be a non-negative integer; anything else is `None`.
pub fn parse_duration_text(text: &str) -> Option<i64> {
    let parts: Vec<&str> = text.trim().split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }

    let mut total: i64 = 0;
    for part in parts {
        let part = part.trim();
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value: u32 = part.parse().ok()?;
        total = total.checked_mul(60)?.checked_add(i64::from(value))?;
    }
    Some(total)
}

/// Outcome of a gap check, with a human-readable reason for the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapDecision {
    pub accept: bool,
    pub reason: String,
}

impl GapDecision {
    fn accept(reason: impl Into<String>) -> Self {
        Self {
            accept: true,
            reason: reason.into(),
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            accept: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateGuard {
    gap_buffer_secs: i64,
    default_duration_secs: i64,
}

impl Default for DuplicateGuard {
    fn default() -> Self {
        Self::new(GAP_BUFFER_SECS, DEFAULT_DURATION_SECS)
    }
}

impl DuplicateGuard {
    pub fn new(gap_buffer_secs: i64, default_duration_secs: i64) -> Self {
        Self {
            gap_buffer_secs,
            default_duration_secs,
        }
    }

    /// Track length in seconds: duration text first, then the raw seconds
    /// field, then the default. Never fails.
    pub fn duration_seconds(&self, record: &PlayRecord) -> i64 {
        if let Some(secs) = record.duration_text.as_deref().and_then(parse_duration_text) {
            return secs;
        }
        if let Some(secs) = record.duration_seconds.filter(|&s| s > 0) {
            return secs;
        }
        log::debug!(
            "Could not determine duration for {}, using default {} seconds",
            record.id,
            self.default_duration_secs
        );
        self.default_duration_secs
    }

    pub fn required_gap(&self, record: &PlayRecord) -> i64 {
        self.duration_seconds(record) + self.gap_buffer_secs
    }

    /// Decide whether `record` may be recorded at `proposed`.
    ///
    /// `prior` holds earlier recording times of the same track. A gap equal
    /// to the required gap is accepted; one second less is rejected.
    pub fn can_accept(&self, record: &PlayRecord, proposed: i64, prior: &[i64]) -> GapDecision {
        if prior.is_empty() {
            return GapDecision::accept("No previous scrobbles found");
        }

        let required = self.required_gap(record);
        if let Some(gap) = prior
            .iter()
            .map(|&ts| (proposed - ts).abs())
            .find(|&gap| gap < required)
        {
            return GapDecision::reject(format!(
                "Too close to previous scrobble ({}m gap, need {}m)",
                gap / 60,
                required / 60
            ));
        }

        GapDecision::accept(format!("Sufficient gap from {} previous scrobbles", prior.len()))
    }
}
