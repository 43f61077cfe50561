//! The estimating strategy: a confidence-scored fallback chain.
//!
//! For sources whose feed timestamps cannot be trusted, the publish date is
//! estimated by running the stages in [`STAGE_ORDER`]:
//!
//! ```text
//! cache → url_pattern → content_scan → rss_position → publishing_pattern
//! ```
//!
//! The chain stops at the first result whose confidence reaches the
//! acceptance threshold. If none does, the most confident result wins, with
//! ties going to the earlier stage. Stage failures are logged and skipped, so
//! the worst outcome is `method: none, confidence: 0`.
//!
//! Accepted estimates above the cache-write floor are stored in the learning
//! cache, so the next sighting of the same URL short-circuits at the cache.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::cache::LearningCache;
use crate::config::DatelineConfig;
use crate::models::{Article, DateEstimationResult, EstimationMethod};
use crate::scanner::ContentDateScanner;
use crate::scoring::score;
use crate::stages::{
    cache_lookup, content_scan, feed_position, publishing_pattern, url_pattern, Stage, STAGE_ORDER,
};
use crate::utils::url_hash;

use super::window::within_window;

/// Strategy for sources whose feed timestamps are missing or unreliable.
pub struct UniversalStrategy {
    prefixes: Vec<String>,
    cache: LearningCache,
    scanner: Arc<dyn ContentDateScanner>,
    config: Arc<DatelineConfig>,
}

impl std::fmt::Debug for UniversalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniversalStrategy")
            .field("prefixes", &self.prefixes)
            .field("acceptance_threshold", &self.config.acceptance_threshold)
            .finish_non_exhaustive()
    }
}

impl UniversalStrategy {
    /// Create the strategy.
    ///
    /// # Arguments
    ///
    /// * `prefixes` - Source-name prefixes this strategy claims
    /// * `cache` - Learning cache consulted first and written back to
    /// * `scanner` - Content scanner run under the configured timeout
    /// * `config` - Thresholds, windows and heuristic offsets
    pub fn new(
        prefixes: Vec<String>,
        cache: LearningCache,
        scanner: Arc<dyn ContentDateScanner>,
        config: Arc<DatelineConfig>,
    ) -> Self {
        Self {
            prefixes,
            cache,
            scanner,
            config,
        }
    }

    /// Whether `source_name` starts with one of the configured prefixes.
    pub fn supports(&self, source_name: &str) -> bool {
        self.prefixes.iter().any(|p| source_name.starts_with(p.as_str()))
    }

    /// The configured default window.
    pub fn max_age(&self) -> Duration {
        self.config.default_max_age()
    }

    /// Apply the default window to the article's (estimated) timestamp.
    ///
    /// # Arguments
    ///
    /// * `article` - The article, usually with `published_at` set from an estimate
    /// * `now` - Evaluation time
    ///
    /// # Returns
    ///
    /// `true` when the timestamp is missing or no older than [`Self::max_age`].
    pub fn should_include_at(&self, article: &Article, now: DateTime<Utc>) -> bool {
        within_window(article.published_at, self.max_age(), now)
    }

    /// Estimate when `article` was published, evaluated at the current time.
    pub async fn estimate(
        &self,
        article: &Article,
        position: usize,
        total: usize,
        source_name: &str,
    ) -> DateEstimationResult {
        self.estimate_at(article, position, total, source_name, Utc::now()).await
    }

    /// Run the fallback chain with an explicit evaluation time.
    ///
    /// # Arguments
    ///
    /// * `article` - The article to date
    /// * `position` - Zero-based index in its feed, newest first
    /// * `total` - Feed length
    /// * `source_name` - Source used for scoring overrides and cache records
    /// * `now` - Evaluation time
    ///
    /// # Returns
    ///
    /// Never fails. The worst outcome is [`DateEstimationResult::none`].
    #[instrument(level = "info", skip(self, article), fields(url = %article.url))]
    pub async fn estimate_at(
        &self,
        article: &Article,
        position: usize,
        total: usize,
        source_name: &str,
        now: DateTime<Utc>,
    ) -> DateEstimationResult {
        let threshold = self.config.acceptance_threshold;
        let mut best: Option<DateEstimationResult> = None;
        let mut cache_hit = false;

        for stage in STAGE_ORDER {
            let Some(result) = self
                .attempt(stage, article, position, total, source_name, now)
                .await
            else {
                debug!(?stage, "Stage produced no candidate");
                continue;
            };
            cache_hit |= stage == Stage::Cache;
            let accepted = result.confidence() >= threshold;
            debug!(
                ?stage,
                confidence = result.confidence(),
                accepted,
                "Stage produced a candidate"
            );

            if best.as_ref().is_none_or(|b| result.confidence() > b.confidence()) {
                best = Some(result);
            }
            if accepted {
                break;
            }
        }

        let Some(result) = best else {
            warn!(source = %source_name, "No stage produced a publish date");
            return DateEstimationResult::none("no stage produced a candidate date");
        };

        if !cache_hit {
            self.remember(article, source_name, &result, now).await;
        }

        info!(
            source = %source_name,
            method = %result.method(),
            confidence = result.confidence(),
            "Estimated publish date"
        );
        result
    }

    async fn attempt(
        &self,
        stage: Stage,
        article: &Article,
        position: usize,
        total: usize,
        source_name: &str,
        now: DateTime<Utc>,
    ) -> Option<DateEstimationResult> {
        let scored = |date: DateTime<Utc>, rationale: String| {
            let method = stage.method();
            let confidence = score(date, method, source_name, now, &self.config.scoring);
            DateEstimationResult::estimated(date, confidence, method, rationale)
        };

        match stage {
            Stage::Cache => match cache_lookup::lookup(&self.cache, &article.url, now).await {
                Ok(hit) => hit,
                Err(e) => {
                    warn!(error = %e, "Cache lookup failed; treating as a miss");
                    None
                }
            },
            Stage::UrlPattern => {
                let date = url_pattern::extract_date_from_url(&article.url)?;
                let timestamp = url_pattern::url_date_to_timestamp(date, now)?;
                Some(scored(timestamp, format!("URL path contains {date}")))
            }
            Stage::ContentScan => {
                let body = article.content.as_deref().unwrap_or_default();
                if article.title.trim().is_empty() && body.trim().is_empty() {
                    return None;
                }
                let found = content_scan::scan_with_budget(
                    Arc::clone(&self.scanner),
                    &article.title,
                    body,
                    self.config.content_scan_timeout(),
                )
                .await?;
                Some(scored(found, format!("content mentions {}", found.to_rfc3339())))
            }
            Stage::RssPosition => {
                if total == 0 {
                    return None;
                }
                let estimate = feed_position::estimate_from_position(
                    position,
                    total,
                    now,
                    self.config.feed_position_span_hours,
                )?;
                Some(scored(estimate, format!("item {} of {} in feed", position + 1, total)))
            }
            Stage::PublishingPattern => {
                let hours = self.config.publishing_pattern_offset_hours;
                let estimate = publishing_pattern::estimate_from_cadence(now, hours)?;
                Some(scored(estimate, format!("assumed typical {hours}h news cadence")))
            }
        }
    }

    /// Write an accepted, non-cache result back to the learning cache.
    async fn remember(&self, article: &Article, source_name: &str, result: &DateEstimationResult, now: DateTime<Utc>) {
        let storable = !matches!(result.method(), EstimationMethod::Cache | EstimationMethod::None)
            && result.confidence() >= self.config.cache_write_min_confidence
            && !article.url.trim().is_empty();
        if !storable {
            return;
        }
        if let Err(e) = self
            .cache
            .put(&url_hash(&article.url), source_name, result, now)
            .await
        {
            warn!(error = %e, "Failed to store estimate in cache; continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, CacheStore};
    use crate::models::CacheEntry;
    use crate::scanner::{ScanError, TextDateScanner};
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn strategy_with(cache: LearningCache, scanner: Arc<dyn ContentDateScanner>) -> UniversalStrategy {
        let config = DatelineConfig {
            content_scan_timeout_secs: 1,
            ..DatelineConfig::default()
        };
        UniversalStrategy::new(vec!["scraped_".to_string()], cache, scanner, Arc::new(config))
    }

    fn article(url: &str, content: Option<&str>) -> Article {
        Article {
            source: "scraped_blog".to_string(),
            url: url.to_string(),
            title: "Story".to_string(),
            content: content.map(str::to_string),
            ..Article::default()
        }
    }

    struct NeverScanner;

    #[async_trait]
    impl ContentDateScanner for NeverScanner {
        async fn scan_for_date(&self, _: &str, _: &str) -> Result<Option<DateTime<Utc>>, ScanError> {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok(None)
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _: &str) -> Result<Option<CacheEntry>, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn upsert(
            &self,
            _: &str,
            _: &str,
            _: &DateEstimationResult,
            _: DateTime<Utc>,
        ) -> Result<CacheEntry, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn verify(&self, _: &str, _: DateTime<Utc>) -> Result<Option<CacheEntry>, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn invalidate_below(&self, _: f32) -> Result<usize, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn prune_older_than(&self, _: DateTime<Utc>) -> Result<usize, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn valid_entries(&self, _: &str, _: DateTime<Utc>) -> Result<Vec<CacheEntry>, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn test_url_pattern_is_accepted_and_cached() {
        let cache = LearningCache::in_memory();
        let strategy = strategy_with(cache.clone(), Arc::new(TextDateScanner::at(now())));
        let article = article("https://example.com/news/2025-05-31/story", None);

        let result = strategy.estimate_at(&article, 0, 0, "scraped_blog", now()).await;
        assert_eq!(result.method(), EstimationMethod::UrlPattern);
        assert_eq!(result.estimated_date(), Some(Utc.with_ymd_and_hms(2025, 5, 31, 12, 0, 0).unwrap()));

        let entry = cache.get(&url_hash(&article.url)).await.unwrap().unwrap();
        assert_eq!(entry.verification_count, 1);
        assert_eq!(entry.extraction_method, EstimationMethod::UrlPattern);
    }

    #[tokio::test]
    async fn test_future_url_date_scores_low_and_is_not_cached() {
        let cache = LearningCache::in_memory();
        let strategy = strategy_with(cache.clone(), Arc::new(TextDateScanner::at(now())));
        let article = article("https://example.com/2031/01/01/story", None);

        let result = strategy.estimate_at(&article, 0, 0, "scraped_blog", now()).await;
        assert_eq!(result.method(), EstimationMethod::UrlPattern);
        assert!(result.confidence() < 0.3);
        assert_eq!(result.estimated_date(), Some(Utc.with_ymd_and_hms(2031, 1, 1, 12, 0, 0).unwrap()));
        assert!(cache.get(&url_hash(&article.url)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unrepresentable_heuristic_offsets_do_not_fail_the_chain() {
        let config = DatelineConfig {
            content_scan_timeout_secs: 1,
            feed_position_span_hours: f64::INFINITY,
            ..DatelineConfig::default()
        };
        let strategy = UniversalStrategy::new(
            vec!["scraped_".to_string()],
            LearningCache::in_memory(),
            Arc::new(TextDateScanner::at(now())),
            Arc::new(config.clone()),
        );
        let article = article("https://example.com/story", None);

        let result = strategy.estimate_at(&article, 3, 10, "scraped_blog", now()).await;
        assert_eq!(result.method(), EstimationMethod::PublishingPattern);

        let config = DatelineConfig {
            publishing_pattern_offset_hours: f64::INFINITY,
            ..config
        };
        let strategy = UniversalStrategy::new(
            vec!["scraped_".to_string()],
            LearningCache::in_memory(),
            Arc::new(TextDateScanner::at(now())),
            Arc::new(config),
        );
        let result = strategy.estimate_at(&article, 3, 10, "scraped_blog", now()).await;
        assert_eq!(result.method(), EstimationMethod::None);
        assert_eq!(result.confidence(), 0.0);
        assert!(result.estimated_date().is_none());
    }

    #[tokio::test]
    async fn test_second_sighting_short_circuits_at_cache() {
        let cache = LearningCache::in_memory();
        let strategy = strategy_with(cache.clone(), Arc::new(TextDateScanner::at(now())));
        let article = article("https://example.com/news/2025-05-31/story", None);

        let first = strategy.estimate_at(&article, 0, 0, "scraped_blog", now()).await;
        let second = strategy.estimate_at(&article, 0, 0, "scraped_blog", now()).await;
        assert_eq!(second.method(), EstimationMethod::Cache);
        assert_eq!(second.estimated_date(), first.estimated_date());
        assert_eq!(second.confidence(), first.confidence());

        let entry = cache.get(&url_hash(&article.url)).await.unwrap().unwrap();
        assert_eq!(entry.verification_count, 2);
    }

    #[tokio::test]
    async fn test_content_scan_when_url_has_no_date() {
        let cache = LearningCache::in_memory();
        let strategy = strategy_with(cache.clone(), Arc::new(TextDateScanner::at(now())));
        let article = article("https://example.com/story", Some("Filed May 30, 2025"));

        let result = strategy.estimate_at(&article, 2, 10, "scraped_blog", now()).await;
        assert_eq!(result.method(), EstimationMethod::ContentScan);
        assert!(cache.get(&url_hash(&article.url)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_heuristics_win_but_are_not_cached() {
        let cache = LearningCache::in_memory();
        let strategy = strategy_with(cache.clone(), Arc::new(TextDateScanner::at(now())));
        let article = article("https://example.com/story", None);

        let result = strategy.estimate_at(&article, 0, 10, "scraped_blog", now()).await;
        assert_eq!(result.method(), EstimationMethod::RssPosition);
        assert_eq!(result.estimated_date(), Some(now() - Duration::hours(1)));
        assert!(cache.get(&url_hash(&article.url)).await.unwrap().is_none());

        let no_feed = strategy.estimate_at(&article, 0, 0, "scraped_blog", now()).await;
        assert_eq!(no_feed.method(), EstimationMethod::PublishingPattern);
        assert_eq!(no_feed.estimated_date(), Some(now() - Duration::hours(6)));
    }

    #[tokio::test]
    async fn test_never_fails_with_empty_url_and_hanging_scanner() {
        let strategy = strategy_with(LearningCache::in_memory(), Arc::new(NeverScanner));
        let article = Article {
            source: "scraped_blog".to_string(),
            title: "Something happened".to_string(),
            ..Article::default()
        };

        let result = strategy.estimate_at(&article, 0, 0, "scraped_blog", now()).await;
        assert!(result.confidence() >= 0.0 && result.confidence() <= 1.0);
        assert_eq!(result.method(), EstimationMethod::PublishingPattern);
    }

    #[tokio::test]
    async fn test_broken_cache_degrades_to_other_stages() {
        let cache = LearningCache::new(Arc::new(BrokenStore));
        let strategy = strategy_with(cache, Arc::new(TextDateScanner::at(now())));
        let article = article("https://example.com/2025/05/31/story", None);

        let result = strategy.estimate_at(&article, 0, 0, "scraped_blog", now()).await;
        assert_eq!(result.method(), EstimationMethod::UrlPattern);
    }

    #[tokio::test]
    async fn test_zero_base_score_is_still_dated() {
        let mut config = DatelineConfig::default();
        config.scoring.publishing_pattern = 0.0;
        let strategy = UniversalStrategy::new(
            vec![],
            LearningCache::in_memory(),
            Arc::new(TextDateScanner::at(now())),
            Arc::new(config),
        );
        let article = article("", None);
        let result = strategy.estimate_at(&article, 0, 0, "scraped_blog", now()).await;
        // Still dated: a zero base score is lifted to the minimum dated confidence.
        assert!(result.is_estimated());
        assert!(result.confidence() > 0.0);
    }

    #[tokio::test]
    async fn test_low_confidence_cache_hit_is_not_double_counted() {
        let cache = LearningCache::in_memory();
        let url = "https://example.com/story";
        let weak = DateEstimationResult::estimated(
            now() - Duration::hours(2),
            0.55,
            EstimationMethod::ContentScan,
            "weak",
        );
        cache.put(&url_hash(url), "scraped_blog", &weak, now()).await.unwrap();

        let strategy = strategy_with(cache.clone(), Arc::new(TextDateScanner::at(now())));
        let result = strategy.estimate_at(&article(url, None), 0, 0, "scraped_blog", now()).await;
        assert_eq!(result.method(), EstimationMethod::Cache);

        let entry = cache.get(&url_hash(url)).await.unwrap().unwrap();
        assert_eq!(entry.verification_count, 2);
    }

    #[test]
    fn test_supports_and_window() {
        let strategy = strategy_with(LearningCache::in_memory(), Arc::new(TextDateScanner::default()));
        assert!(strategy.supports("scraped_blog"));
        assert!(!strategy.supports("bbc_business"));

        let fresh = Article {
            published_at: Some(now() - Duration::hours(23)),
            ..Article::default()
        };
        let stale = Article {
            published_at: Some(now() - Duration::hours(25)),
            ..Article::default()
        };
        assert!(strategy.should_include_at(&fresh, now()));
        assert!(!strategy.should_include_at(&stale, now()));
    }
}
