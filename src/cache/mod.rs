//! Learning cache for extracted publish dates.
//!
//! The cache maps the content address of a normalized article URL (see
//! [`crate::utils::url_hash`]) to the best-known extraction for it. Storage
//! sits behind the [`CacheStore`] trait; [`LearningCache`] adds the
//! aggregate views used for tuning.
//!
//! # Stores
//!
//! | Store | Module | Persistence |
//! |-------|--------|-------------|
//! | [`MemoryCacheStore`] | [`memory`] | none (tests, dry runs) |
//! | [`JsonFileCacheStore`] | [`json_file`] | JSON document, written on flush |
//!
//! # Concurrency
//!
//! Every store operation runs under the store's lock, so concurrent puts for
//! the same URL increment the verification count instead of overwriting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::models::{CacheEntry, DateEstimationResult, EstimationMethod};

pub mod json_file;
pub mod memory;
mod table;

pub use json_file::JsonFileCacheStore;
pub use memory::MemoryCacheStore;

/// Errors raised by cache stores.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache document is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("refusing to cache an estimate without a date")]
    Undated,
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage for learned extractions.
///
/// Implementations must make [`CacheStore::upsert`] and
/// [`CacheStore::verify`] atomic per key.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Valid entry for `url_hash`, if any.
    async fn get(&self, url_hash: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Create an entry with `verification_count = 1`, or verify the existing
    /// valid one without touching its extraction.
    ///
    /// An invalidated entry is left as it is and returned unchanged.
    async fn upsert(
        &self,
        url_hash: &str,
        source_name: &str,
        estimate: &DateEstimationResult,
        now: DateTime<Utc>,
    ) -> Result<CacheEntry, CacheError>;

    /// Record a repeat sighting of a valid entry.
    async fn verify(&self, url_hash: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, CacheError>;

    /// Mark valid entries below `min_confidence`, or never verified, invalid.
    async fn invalidate_below(&self, min_confidence: f32) -> Result<usize, CacheError>;

    /// Delete entries created before `cutoff`, valid or not.
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, CacheError>;

    /// Valid entries for `source_name` created at or after `since`.
    async fn valid_entries(&self, source_name: &str, since: DateTime<Utc>) -> Result<Vec<CacheEntry>, CacheError>;

    /// Persist pending changes. Stores without buffering do nothing.
    async fn flush(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Count and mean confidence of cached extractions for one method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodStats {
    pub method: EstimationMethod,
    /// Valid entries first extracted by `method`.
    pub count: usize,
    /// Mean `confidence_score` over those entries.
    pub average_confidence: f32,
}

/// How many cached URLs for a source were seen more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheHitRate {
    pub total_entries: usize,
    /// Entries with `verification_count > 1`.
    pub repeat_hits: usize,
}

impl CacheHitRate {
    /// `repeat_hits / total_entries`, or 0 for an empty window.
    pub fn ratio(&self) -> f64 {
        if self.total_entries == 0 {
            0.0
        } else {
            self.repeat_hits as f64 / self.total_entries as f64
        }
    }
}

/// The learning cache used by the estimating strategy.
#[derive(Clone)]
pub struct LearningCache {
    store: Arc<dyn CacheStore>,
}

impl std::fmt::Debug for LearningCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LearningCache").finish_non_exhaustive()
    }
}

impl LearningCache {
    /// Wrap any [`CacheStore`].
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Cache backed by a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCacheStore::default()))
    }

    /// Valid entry for `url_hash`, without counting a sighting.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn get(&self, url_hash: &str) -> Result<Option<CacheEntry>, CacheError> {
        self.store.get(url_hash).await
    }

    /// Look up a valid entry and count this sighting as a verification.
    pub async fn verify(&self, url_hash: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, CacheError> {
        self.store.verify(url_hash, now).await
    }

    /// Store `estimate` for `url_hash`, or verify the entry already there.
    ///
    /// # Arguments
    ///
    /// * `url_hash` - Content address of the normalized URL
    /// * `source_name` - Source recorded on a new entry
    /// * `estimate` - The accepted estimate; must carry a date
    /// * `now` - Creation or verification time
    ///
    /// # Returns
    ///
    /// The entry as stored. An invalidated entry comes back unchanged with
    /// `is_valid == false`.
    ///
    /// # Errors
    ///
    /// [`CacheError::Undated`] for an estimate without a date, otherwise any
    /// store failure.
    #[instrument(level = "debug", skip(self, estimate), fields(method = %estimate.method()))]
    pub async fn put(
        &self,
        url_hash: &str,
        source_name: &str,
        estimate: &DateEstimationResult,
        now: DateTime<Utc>,
    ) -> Result<CacheEntry, CacheError> {
        let entry = self.store.upsert(url_hash, source_name, estimate, now).await?;
        if entry.is_valid {
            debug!(
                verification_count = entry.verification_count,
                "Cache entry written"
            );
        } else {
            debug!("Invalidated entry retained until pruned; skipping write-back");
        }
        Ok(entry)
    }

    /// Invalidate valid entries below `min_confidence` or never verified.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    #[instrument(level = "info", skip(self))]
    pub async fn invalidate_low_confidence(&self, min_confidence: f32) -> Result<usize, CacheError> {
        let invalidated = self.store.invalidate_below(min_confidence).await?;
        info!(invalidated, "Invalidated low-confidence cache entries");
        Ok(invalidated)
    }

    /// Delete entries created before `cutoff` and return how many went.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    #[instrument(level = "info", skip(self))]
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, CacheError> {
        let removed = self.store.prune_older_than(cutoff).await?;
        info!(removed, "Pruned cache entries");
        Ok(removed)
    }

    /// Per-method count and mean confidence, ordered by method.
    pub async fn stats_by_source(
        &self,
        source_name: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<MethodStats>, CacheError> {
        let entries = self.store.valid_entries(source_name, since).await?;
        let stats = entries
            .into_iter()
            .into_group_map_by(|e| e.extraction_method)
            .into_iter()
            .map(|(method, group)| {
                let count = group.len();
                let total: f32 = group.iter().map(|e| e.confidence_score).sum();
                MethodStats {
                    method,
                    count,
                    average_confidence: total / count as f32,
                }
            })
            .sorted_by_key(|s| s.method)
            .collect();
        Ok(stats)
    }

    /// Share of valid entries for `source_name` seen more than once since `since`.
    pub async fn hit_rate(&self, source_name: &str, since: DateTime<Utc>) -> Result<CacheHitRate, CacheError> {
        let entries = self.store.valid_entries(source_name, since).await?;
        Ok(CacheHitRate {
            total_entries: entries.len(),
            repeat_hits: entries.iter().filter(|e| e.verification_count > 1).count(),
        })
    }

    /// Persist pending changes.
    ///
    /// # Errors
    ///
    /// Fails when a file-backed store cannot write its document.
    pub async fn flush(&self) -> Result<(), CacheError> {
        self.store.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn estimate(confidence: f32, method: EstimationMethod) -> DateEstimationResult {
        DateEstimationResult::estimated(t0() - Duration::hours(3), confidence, method, "test")
    }

    #[tokio::test]
    async fn test_repeated_put_increments_by_one() {
        let cache = LearningCache::in_memory();
        let mut last_verified = None;
        for i in 1..=4u32 {
            let now = t0() + Duration::minutes(i64::from(i));
            cache
                .put("h", "reuters", &estimate(0.75, EstimationMethod::UrlPattern), now)
                .await
                .unwrap();
            let entry = cache.get("h").await.unwrap().unwrap();
            assert_eq!(entry.verification_count, i);
            assert!(entry.last_verified_at >= last_verified);
            last_verified = entry.last_verified_at;
        }
    }

    #[tokio::test]
    async fn test_invalidate_low_confidence_hides_entries() {
        let cache = LearningCache::in_memory();
        cache
            .put("weak", "reuters", &estimate(0.5, EstimationMethod::ContentScan), t0())
            .await
            .unwrap();
        cache
            .put("strong", "reuters", &estimate(0.8, EstimationMethod::UrlPattern), t0())
            .await
            .unwrap();

        assert_eq!(cache.invalidate_low_confidence(0.6).await.unwrap(), 1);
        assert!(cache.get("weak").await.unwrap().is_none());
        assert!(cache.get("strong").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stats_by_source_groups_by_method() {
        let cache = LearningCache::in_memory();
        cache
            .put("a", "reuters", &estimate(0.7, EstimationMethod::UrlPattern), t0())
            .await
            .unwrap();
        cache
            .put("b", "reuters", &estimate(0.9, EstimationMethod::UrlPattern), t0())
            .await
            .unwrap();
        cache
            .put("c", "reuters", &estimate(0.6, EstimationMethod::ContentScan), t0())
            .await
            .unwrap();
        cache
            .put("d", "bbc", &estimate(0.6, EstimationMethod::ContentScan), t0())
            .await
            .unwrap();

        let stats = cache.stats_by_source("reuters", t0() - Duration::days(1)).await.unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].method, EstimationMethod::UrlPattern);
        assert_eq!(stats[0].count, 2);
        assert!((stats[0].average_confidence - 0.8).abs() < 1e-6);
        assert_eq!(stats[1].method, EstimationMethod::ContentScan);

        let later = cache.stats_by_source("reuters", t0() + Duration::days(1)).await.unwrap();
        assert!(later.is_empty());
    }

    #[tokio::test]
    async fn test_stats_exclude_invalid_entries() {
        let cache = LearningCache::in_memory();
        cache
            .put("a", "reuters", &estimate(0.4, EstimationMethod::ContentScan), t0())
            .await
            .unwrap();
        cache.invalidate_low_confidence(0.5).await.unwrap();
        let stats = cache.stats_by_source("reuters", t0() - Duration::days(1)).await.unwrap();
        assert!(stats.is_empty());
    }

    #[tokio::test]
    async fn test_hit_rate_counts_repeat_sightings() {
        let cache = LearningCache::in_memory();
        for hash in ["a", "b", "c"] {
            cache
                .put(hash, "reuters", &estimate(0.75, EstimationMethod::UrlPattern), t0())
                .await
                .unwrap();
        }
        cache.verify("a", t0()).await.unwrap();

        let rate = cache.hit_rate("reuters", t0() - Duration::days(1)).await.unwrap();
        assert_eq!(rate.total_entries, 3);
        assert_eq!(rate.repeat_hits, 1);
        assert!((rate.ratio() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_concurrent_puts_serialize_per_key() {
        let cache = LearningCache::in_memory();
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache
                        .put("same", "reuters", &estimate(0.75, EstimationMethod::UrlPattern), t0())
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        let entry = cache.get("same").await.unwrap().unwrap();
        assert_eq!(entry.verification_count, 16);
    }
}
