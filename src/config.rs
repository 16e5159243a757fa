//! Engine configuration.
//!
//! Every knob has a default; a TOML file may override any subset:
//!
//! ```toml
//! retention_days = 14
//! submit_delay_ms = 2000
//!
//! [matcher]
//! good_threshold = 85
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::guard::{DEFAULT_DURATION_SECS, GAP_BUFFER_SECS};
use crate::matcher::MatcherConfig;

pub const DEFAULT_RETENTION_DAYS: i64 = 14;

/// Synthetic spacing between consecutive plays of one batch
pub const DEFAULT_SPACING_SECS: i64 = 120;

pub const DEFAULT_CANONICAL_URL_PREFIX: &str = "https://music.youtube.com/watch?v=";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retention_days: i64,
    pub gap_buffer_secs: i64,
    pub spacing_secs: i64,
    pub default_duration_secs: i64,
    /// Pause between submissions; 0 disables
    pub submit_delay_ms: u64,
    pub canonical_url_prefix: String,
    /// Refuse to run without a search provider instead of submitting cleaned metadata
    pub require_matcher: bool,
    pub matcher: MatcherConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention_days: DEFAULT_RETENTION_DAYS,
            gap_buffer_secs: GAP_BUFFER_SECS,
            spacing_secs: DEFAULT_SPACING_SECS,
            default_duration_secs: DEFAULT_DURATION_SECS,
            submit_delay_ms: 0,
            canonical_url_prefix: DEFAULT_CANONICAL_URL_PREFIX.to_string(),
            require_matcher: false,
            matcher: MatcherConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn retention_secs(&self) -> i64 {
        self.retention_days * 24 * 60 * 60
    }

    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retention_days <= 0 {
            return Err(Error::Config(format!("retention_days must be positive, got {}", self.retention_days)));
        }
        if self.gap_buffer_secs < 0 {
            return Err(Error::Config(format!("gap_buffer_secs must not be negative, got {}", self.gap_buffer_secs)));
        }
        if self.spacing_secs <= 0 {
            return Err(Error::Config(format!("spacing_secs must be positive, got {}", self.spacing_secs)));
        }
        if self.default_duration_secs <= 0 {
            return Err(Error::Config(format!(
                "default_duration_secs must be positive, got {}",
                self.default_duration_secs
            )));
        }

        let m = &self.matcher;
        if m.search_limit == 0 {
            return Err(Error::Config("matcher.search_limit must be at least 1".to_string()));
        }
        if m.good_threshold > 100 || m.fallback_threshold > m.good_threshold {
            return Err(Error::Config(format!(
                "matcher thresholds must satisfy fallback <= good <= 100, got {} / {}",
                m.fallback_threshold, m.good_threshold
            )));
        }
        if !(0.0..=1.0).contains(&m.similarity_weight) {
            return Err(Error::Config(format!(
                "matcher.similarity_weight must be within 0..=1, got {}",
                m.similarity_weight
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.retention_secs(), 14 * 86_400);
        assert_eq!(config.gap_buffer_secs, 30);
        assert_eq!(config.spacing_secs, 120);
        assert_eq!(config.matcher.search_limit, 15);
        assert_eq!(config.matcher.good_threshold, 80);
        assert_eq!(config.matcher.fallback_threshold, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            submit_delay_ms = 2000

            [matcher]
            good_threshold = 85
            "#,
        )
        .unwrap();
        assert_eq!(config.submit_delay_ms, 2000);
        assert_eq!(config.matcher.good_threshold, 85);
        assert_eq!(config.matcher.fallback_threshold, 60);
        assert_eq!(config.retention_days, 14);
    }

    #[test]
    fn test_load_rejects_invalid_thresholds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "[matcher]\ngood_threshold = 50\nfallback_threshold = 70\n").unwrap();
        let err = EngineConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("fallback <= good"));
    }

    #[test]
    fn test_load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "retention_days = \"two weeks\"\n").unwrap();
        assert!(matches!(EngineConfig::load(&path), Err(Error::TomlParse(_))));
    }
}
