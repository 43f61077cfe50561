//! Data models for feed articles, date estimates, and learned cache entries.
//!
//! This module defines the core data structures used throughout the crate:
//! - [`Article`]: A feed item as handed over by the collection component
//! - [`EstimationMethod`]: The tag describing where a date came from
//! - [`DateEstimationResult`]: An immutable, confidence-annotated date estimate
//! - [`CacheEntry`]: A learned extraction persisted by the learning cache
//! - [`DatelineReport`] / [`DatedArticle`]: The per-run output written to disk

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest confidence a dated estimate may carry.
///
/// A zero confidence is reserved for [`EstimationMethod::None`], so any
/// estimate that does carry a date is lifted to at least this value.
pub const MIN_DATED_CONFIDENCE: f32 = 0.01;

/// A news article as supplied by the collection component.
///
/// The estimation engine only ever reads articles; it never mutates them.
///
/// # Fields
///
/// * `source` - Source identifier such as `"bbc_business"`
/// * `url` - Canonical link of the article
/// * `published_at` - The timestamp the feed claims, if any
/// * `position` / `total` - Index within the feed batch and the batch size
/// * `content` - Body text (or raw HTML) when the collector has it
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Article {
    /// The source identifier this article was collected from.
    #[serde(default)]
    pub source: String,
    /// The article link.
    #[serde(default)]
    pub url: String,
    /// The article headline.
    #[serde(default)]
    pub title: String,
    /// The publish timestamp reported by the feed, if present.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    /// Zero-based index of the item within its feed batch.
    #[serde(default)]
    pub position: usize,
    /// Number of items in the feed batch.
    #[serde(default)]
    pub total: usize,
    /// Article body text, when already extracted.
    #[serde(default)]
    pub content: Option<String>,
}

impl Article {
    /// Copy of this article carrying a different publish timestamp.
    ///
    /// Used by callers that replace an unreliable feed date with an estimate.
    pub fn with_published_at(&self, published_at: Option<DateTime<Utc>>) -> Self {
        Self {
            published_at,
            ..self.clone()
        }
    }
}

/// Where an estimated publish date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationMethod {
    /// Reused from the learning cache.
    Cache,
    /// Parsed from a date embedded in the URL path.
    UrlPattern,
    /// Found by scanning the article title/body.
    ContentScan,
    /// Derived from the article's position in its feed batch.
    RssPosition,
    /// Generic news-cadence fallback.
    PublishingPattern,
    /// No estimate was possible.
    None,
}

impl EstimationMethod {
    /// Stable string tag, as persisted in the cache and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimationMethod::Cache => "cache",
            EstimationMethod::UrlPattern => "url_pattern",
            EstimationMethod::ContentScan => "content_scan",
            EstimationMethod::RssPosition => "rss_position",
            EstimationMethod::PublishingPattern => "publishing_pattern",
            EstimationMethod::None => "none",
        }
    }
}

impl fmt::Display for EstimationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of one date-estimation attempt.
///
/// Values are immutable once built. The only way to obtain a result without
/// a date is [`DateEstimationResult::none`], which always carries
/// `confidence == 0.0` and [`EstimationMethod::None`]; every dated result has
/// a confidence clamped into `[MIN_DATED_CONFIDENCE, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateEstimationResult {
    estimated_date: Option<DateTime<Utc>>,
    confidence: f32,
    method: EstimationMethod,
    rationale: String,
}

impl DateEstimationResult {
    /// Build a dated estimate.
    ///
    /// Passing [`EstimationMethod::None`] here is a caller bug; the method is
    /// kept but the confidence is still forced into the dated range so the
    /// invariant between date and confidence holds.
    pub fn estimated(
        date: DateTime<Utc>,
        confidence: f32,
        method: EstimationMethod,
        rationale: impl Into<String>,
    ) -> Self {
        let confidence = if confidence.is_nan() {
            MIN_DATED_CONFIDENCE
        } else {
            confidence.clamp(MIN_DATED_CONFIDENCE, 1.0)
        };
        Self {
            estimated_date: Some(date),
            confidence,
            method,
            rationale: rationale.into(),
        }
    }

    /// The terminal "no estimate possible" result.
    pub fn none(rationale: impl Into<String>) -> Self {
        Self {
            estimated_date: None,
            confidence: 0.0,
            method: EstimationMethod::None,
            rationale: rationale.into(),
        }
    }

    /// The estimated publish time, or `None` for [`EstimationMethod::None`].
    pub fn estimated_date(&self) -> Option<DateTime<Utc>> {
        self.estimated_date
    }

    /// Confidence in `[0.0, 1.0]`. Zero only when there is no date.
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// The stage that produced this result.
    pub fn method(&self) -> EstimationMethod {
        self.method
    }

    /// Human-readable explanation of how the date was found.
    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    /// `true` when this result carries a date.
    pub fn is_estimated(&self) -> bool {
        self.estimated_date.is_some()
    }
}

/// A learned extraction persisted by the learning cache.
///
/// One entry exists per normalized URL. `verification_count` starts at 1 and
/// grows by exactly one for every repeat sighting; invalidated entries stay
/// on disk until pruned but are never returned by lookups.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CacheEntry {
    /// SHA-256 content address of the normalized URL.
    pub url_hash: String,
    /// Source the article was first seen under.
    pub source_name: String,
    /// The learned publish time.
    pub extracted_date: DateTime<Utc>,
    /// The method that first produced this date.
    pub extraction_method: EstimationMethod,
    /// Confidence of the first extraction.
    pub confidence_score: f32,
    /// Free-text rationale from the original extraction.
    pub extraction_details: String,
    /// When the entry was created; retention pruning keys on this.
    pub created_at: DateTime<Utc>,
    /// Latest repeat sighting, `None` until the first one.
    pub last_verified_at: Option<DateTime<Utc>>,
    /// Number of sightings, including the first.
    pub verification_count: u32,
    /// `false` once invalidated; such entries are kept until pruned.
    pub is_valid: bool,
}

impl CacheEntry {
    /// Rehydrate the stored extraction as a cache-method estimate.
    pub fn to_estimate(&self) -> DateEstimationResult {
        DateEstimationResult::estimated(
            self.extracted_date,
            self.confidence_score,
            EstimationMethod::Cache,
            format!(
                "cached {} result (verified {}x): {}",
                self.extraction_method, self.verification_count, self.extraction_details
            ),
        )
    }
}

/// A single article after date resolution and window filtering.
#[derive(Debug, Serialize)]
pub struct DatedArticle {
    pub source: String,
    pub url: String,
    pub title: String,
    /// Name of the strategy that handled the article.
    pub strategy: String,
    /// The date used for the inclusion decision.
    pub effective_published_at: Option<DateTime<Utc>>,
    /// The estimate, for sources routed through the estimating strategy.
    pub estimation: Option<DateEstimationResult>,
    pub included: bool,
}

/// All articles handled in one run.
///
/// Mirrors the edition naming used for output files: `time_of_day` is one
/// of `"morning"`, `"afternoon"` or `"evening"`.
#[derive(Debug, Serialize)]
pub struct DatelineReport {
    /// The run date in `YYYY-MM-DD` format.
    pub local_date: String,
    pub time_of_day: String,
    pub local_time: String,
    pub articles: Vec<DatedArticle>,
}

impl DatelineReport {
    pub fn included_count(&self) -> usize {
        self.articles.iter().filter(|a| a.included).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_none_result_has_no_date_and_zero_confidence() {
        let result = DateEstimationResult::none("nothing found");
        assert!(result.estimated_date().is_none());
        assert_eq!(result.confidence(), 0.0);
        assert_eq!(result.method(), EstimationMethod::None);
        assert_eq!(result.rationale(), "nothing found");
    }

    #[test]
    fn test_estimated_confidence_is_clamped() {
        let date = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let high = DateEstimationResult::estimated(date, 1.7, EstimationMethod::UrlPattern, "x");
        assert_eq!(high.confidence(), 1.0);

        let low = DateEstimationResult::estimated(date, -0.2, EstimationMethod::UrlPattern, "x");
        assert_eq!(low.confidence(), MIN_DATED_CONFIDENCE);

        let nan = DateEstimationResult::estimated(date, f32::NAN, EstimationMethod::UrlPattern, "x");
        assert_eq!(nan.confidence(), MIN_DATED_CONFIDENCE);
    }

    #[test]
    fn test_method_serializes_snake_case() {
        let json = serde_json::to_string(&EstimationMethod::PublishingPattern).unwrap();
        assert_eq!(json, "\"publishing_pattern\"");
        assert_eq!(EstimationMethod::RssPosition.to_string(), "rss_position");
    }

    #[test]
    fn test_article_deserializes_with_defaults() {
        let json = r#"{ "source": "bbc_business", "url": "https://bbc.co.uk/a" }"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.source, "bbc_business");
        assert!(article.published_at.is_none());
        assert_eq!(article.total, 0);
        assert!(article.content.is_none());
    }

    #[test]
    fn test_cache_entry_to_estimate() {
        let date = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let entry = CacheEntry {
            url_hash: "abc".to_string(),
            source_name: "reuters".to_string(),
            extracted_date: date,
            extraction_method: EstimationMethod::UrlPattern,
            confidence_score: 0.75,
            extraction_details: "matched 2025-01-15".to_string(),
            created_at: date,
            last_verified_at: None,
            verification_count: 2,
            is_valid: true,
        };

        let estimate = entry.to_estimate();
        assert_eq!(estimate.method(), EstimationMethod::Cache);
        assert_eq!(estimate.confidence(), 0.75);
        assert_eq!(estimate.estimated_date(), Some(date));
        assert!(estimate.rationale().contains("url_pattern"));
    }

    #[test]
    fn test_report_included_count() {
        let report = DatelineReport {
            local_date: "2025-05-06".to_string(),
            time_of_day: "evening".to_string(),
            local_time: "20:30:00".to_string(),
            articles: vec![
                DatedArticle {
                    source: "bbc".to_string(),
                    url: "https://bbc.co.uk/1".to_string(),
                    title: "One".to_string(),
                    strategy: "bbc".to_string(),
                    effective_published_at: None,
                    estimation: None,
                    included: true,
                },
                DatedArticle {
                    source: "bbc".to_string(),
                    url: "https://bbc.co.uk/2".to_string(),
                    title: "Two".to_string(),
                    strategy: "bbc".to_string(),
                    effective_published_at: None,
                    estimation: None,
                    included: false,
                },
            ],
        };
        assert_eq!(report.included_count(), 1);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("evening"));
    }
}
