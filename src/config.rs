//! YAML configuration for the estimation engine and inclusion windows.
//!
//! Every option has a default, so an empty file (or no file at all) yields a
//! usable configuration. Example:
//!
//! ```yaml
//! default_max_age_hours: 24
//! max_age_overrides:
//!   investing_market: 6
//!   investing_news: 12
//!   bbc: 48
//! estimated_sources: ["scraped_", "aggregator_"]
//! acceptance_threshold: 0.6
//! content_scan_timeout_secs: 5
//! scoring:
//!   url_pattern: 0.75
//!   plausible_age_overrides:
//!     investing_market: 24
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration as StdDuration;
use thiserror::Error;
use tracing::{info, instrument};

use crate::models::EstimationMethod;

/// Upper bound for the heuristic age offsets, ten years in hours.
pub const MAX_HEURISTIC_OFFSET_HOURS: f64 = 87_600.0;

/// Upper bound for `cache_retention_days`, ten years.
pub const MAX_RETENTION_DAYS: u32 = 3_650;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatelineConfig {
    /// Inclusion window applied when no override matches the source.
    pub default_max_age_hours: u32,
    /// Per-source inclusion windows, keyed by source-name prefix.
    pub max_age_overrides: BTreeMap<String, u32>,
    /// Source-name prefixes whose feed timestamps are not trusted and whose
    /// articles go through the estimating strategy.
    pub estimated_sources: Vec<String>,
    /// Minimum confidence at which a stage result ends the fallback chain.
    pub acceptance_threshold: f32,
    /// Hard time budget for one content scan.
    pub content_scan_timeout_secs: u64,
    /// Minimum confidence for writing an estimate back to the cache.
    pub cache_write_min_confidence: f32,
    /// Entries older than this are deleted by `cache prune`.
    pub cache_retention_days: u32,
    /// Entries below this confidence are invalidated by `cache invalidate`.
    pub invalidation_min_confidence: f32,
    /// Age spread between the first and the last item of a feed batch.
    pub feed_position_span_hours: f64,
    /// Assumed age of an article when nothing else is known.
    pub publishing_pattern_offset_hours: f64,
    pub scoring: ScoringConfig,
}

impl Default for DatelineConfig {
    fn default() -> Self {
        let max_age_overrides = BTreeMap::from([
            ("investing_market".to_string(), 6),
            ("investing_news".to_string(), 12),
            ("bbc".to_string(), 48),
        ]);
        Self {
            default_max_age_hours: 24,
            max_age_overrides,
            estimated_sources: vec!["scraped_".to_string(), "aggregator_".to_string()],
            acceptance_threshold: 0.6,
            content_scan_timeout_secs: 5,
            cache_write_min_confidence: 0.5,
            cache_retention_days: 30,
            invalidation_min_confidence: 0.3,
            feed_position_span_hours: 23.0,
            publishing_pattern_offset_hours: 6.0,
            scoring: ScoringConfig::default(),
        }
    }
}

impl DatelineConfig {
    /// Load configuration from a YAML file, or defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, is not valid YAML, or holds out of
    /// range values (see [`DatelineConfig::validate`]).
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                let config = Self::from_yaml(&raw)?;
                info!(path = %path.display(), "Loaded configuration");
                config
            }
            None => {
                info!("No config file given; using defaults");
                Self::default()
            }
        };
        Ok(config)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to a struct.
        let config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending field. Probabilities
    /// must lie in `[0, 1]`. Heuristic offsets must be finite and at most
    /// [`MAX_HEURISTIC_OFFSET_HOURS`]. Retention is capped at [`MAX_RETENTION_DAYS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let probabilities = [
            ("acceptance_threshold", self.acceptance_threshold),
            ("cache_write_min_confidence", self.cache_write_min_confidence),
            ("invalidation_min_confidence", self.invalidation_min_confidence),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{name} must be within [0, 1], got {value}")));
            }
        }
        if self.default_max_age_hours == 0 {
            return Err(ConfigError::Invalid("default_max_age_hours must be positive".into()));
        }
        if let Some((source, _)) = self.max_age_overrides.iter().find(|(_, h)| **h == 0) {
            return Err(ConfigError::Invalid(format!("max_age_overrides.{source} must be positive")));
        }
        if self.content_scan_timeout_secs == 0 {
            return Err(ConfigError::Invalid("content_scan_timeout_secs must be positive".into()));
        }
        let offsets = [
            ("feed_position_span_hours", self.feed_position_span_hours),
            ("publishing_pattern_offset_hours", self.publishing_pattern_offset_hours),
        ];
        for (name, value) in offsets {
            if !value.is_finite() || !(0.0..=MAX_HEURISTIC_OFFSET_HOURS).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within [0, {MAX_HEURISTIC_OFFSET_HOURS}], got {value}"
                )));
            }
        }
        if self.cache_retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigError::Invalid(format!(
                "cache_retention_days must be at most {MAX_RETENTION_DAYS}, got {}",
                self.cache_retention_days
            )));
        }
        self.scoring.validate()
    }

    pub fn content_scan_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.content_scan_timeout_secs)
    }

    pub fn default_max_age(&self) -> Duration {
        Duration::hours(i64::from(self.default_max_age_hours))
    }
}

/// Base scores and age-plausibility tuning for the scoring function.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub cache: f32,
    pub url_pattern: f32,
    pub content_scan: f32,
    pub rss_position: f32,
    pub publishing_pattern: f32,
    /// Age beyond which a candidate date starts to lose confidence.
    pub plausible_age_hours: f64,
    /// Per-source plausible-age horizons, keyed by source-name prefix.
    pub plausible_age_overrides: BTreeMap<String, f64>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            cache: 0.9,
            url_pattern: 0.75,
            content_scan: 0.65,
            rss_position: 0.4,
            publishing_pattern: 0.2,
            plausible_age_hours: 168.0,
            plausible_age_overrides: BTreeMap::new(),
        }
    }
}

impl ScoringConfig {
    /// Base confidence for `method` before future and age adjustments.
    pub fn base_score(&self, method: EstimationMethod) -> f32 {
        match method {
            EstimationMethod::Cache => self.cache,
            EstimationMethod::UrlPattern => self.url_pattern,
            EstimationMethod::ContentScan => self.content_scan,
            EstimationMethod::RssPosition => self.rss_position,
            EstimationMethod::PublishingPattern => self.publishing_pattern,
            EstimationMethod::None => 0.0,
        }
    }

    /// Plausible-age horizon in hours for `source`; the longest matching
    /// prefix wins.
    pub fn plausible_age_for(&self, source: &str) -> f64 {
        longest_prefix_match(&self.plausible_age_overrides, source)
            .copied()
            .unwrap_or(self.plausible_age_hours)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let bases = [
            ("cache", self.cache),
            ("url_pattern", self.url_pattern),
            ("content_scan", self.content_scan),
            ("rss_position", self.rss_position),
            ("publishing_pattern", self.publishing_pattern),
        ];
        for (name, value) in bases {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("scoring.{name} must be within [0, 1], got {value}")));
            }
        }
        let mut horizons =
            std::iter::once(self.plausible_age_hours).chain(self.plausible_age_overrides.values().copied());
        if horizons.any(|h| h.is_nan() || h <= 0.0) {
            return Err(ConfigError::Invalid("plausible age horizons must be positive".into()));
        }
        Ok(())
    }
}

/// Value of the longest key in `map` that prefixes `source`.
pub(crate) fn longest_prefix_match<'a, V>(map: &'a BTreeMap<String, V>, source: &str) -> Option<&'a V> {
    map.iter()
        .filter(|(prefix, _)| source.starts_with(prefix.as_str()))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, value)| value)
}
