//! In-process cache table shared by the store implementations.
//!
//! All mutation rules live here so every store applies them the same way.
//! Callers hold the store's lock for the whole call, which makes each
//! operation an atomic read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::models::{CacheEntry, DateEstimationResult};

use super::{CacheError, CacheStore};

/// A store whose state is a [`CacheTable`] behind a mutex.
///
/// Implementors get [`CacheStore`] for free and only decide how (and
/// whether) the table is persisted.
#[async_trait]
pub trait TableBacked: Send + Sync {
    fn table(&self) -> &Mutex<CacheTable>;

    /// Persist `table` while the store lock is held.
    async fn persist(&self, _table: &mut CacheTable) -> Result<(), CacheError> {
        Ok(())
    }
}

#[async_trait]
impl<T: TableBacked> CacheStore for T {
    async fn get(&self, url_hash: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.table().lock().await.get(url_hash))
    }

    async fn upsert(
        &self,
        url_hash: &str,
        source_name: &str,
        estimate: &DateEstimationResult,
        now: DateTime<Utc>,
    ) -> Result<CacheEntry, CacheError> {
        self.table().lock().await.upsert(url_hash, source_name, estimate, now)
    }

    async fn verify(&self, url_hash: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.table().lock().await.verify(url_hash, now))
    }

    async fn invalidate_below(&self, min_confidence: f32) -> Result<usize, CacheError> {
        Ok(self.table().lock().await.invalidate_below(min_confidence))
    }

    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, CacheError> {
        Ok(self.table().lock().await.prune_older_than(cutoff))
    }

    async fn valid_entries(&self, source_name: &str, since: DateTime<Utc>) -> Result<Vec<CacheEntry>, CacheError> {
        Ok(self.table().lock().await.valid_for_source(source_name, since))
    }

    async fn flush(&self) -> Result<(), CacheError> {
        let mut table = self.table().lock().await;
        self.persist(&mut table).await
    }
}

#[derive(Debug, Default)]
pub struct CacheTable {
    entries: HashMap<String, CacheEntry>,
    dirty: bool,
}

impl CacheTable {
    pub(crate) fn from_entries(entries: Vec<CacheEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.url_hash.clone(), e)).collect(),
            dirty: false,
        }
    }

    /// Entries sorted by creation time, for stable serialization.
    pub(crate) fn snapshot(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.url_hash.cmp(&b.url_hash)));
        entries
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn get(&self, url_hash: &str) -> Option<CacheEntry> {
        self.entries.get(url_hash).filter(|e| e.is_valid).cloned()
    }

    /// Create an entry, or verify the existing valid one.
    ///
    /// The first successful extraction keeps its provenance: a repeat put
    /// only bumps `verification_count` and `last_verified_at`. An invalidated
    /// entry is kept untouched for audit until pruned and is returned as is,
    /// with `is_valid == false`.
    pub(crate) fn upsert(
        &mut self,
        url_hash: &str,
        source_name: &str,
        estimate: &DateEstimationResult,
        now: DateTime<Utc>,
    ) -> Result<CacheEntry, CacheError> {
        if let Some(existing) = self.entries.get_mut(url_hash) {
            if existing.is_valid {
                bump_verification(existing, now);
                self.dirty = true;
            }
            return Ok(existing.clone());
        }

        let extracted_date = estimate.estimated_date().ok_or(CacheError::Undated)?;
        let entry = CacheEntry {
            url_hash: url_hash.to_string(),
            source_name: source_name.to_string(),
            extracted_date,
            extraction_method: estimate.method(),
            confidence_score: estimate.confidence().clamp(0.0, 1.0),
            extraction_details: estimate.rationale().to_string(),
            created_at: now,
            last_verified_at: None,
            verification_count: 1,
            is_valid: true,
        };
        self.entries.insert(url_hash.to_string(), entry.clone());
        self.dirty = true;
        Ok(entry)
    }

    pub(crate) fn verify(&mut self, url_hash: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let entry = self.entries.get_mut(url_hash).filter(|e| e.is_valid)?;
        bump_verification(entry, now);
        self.dirty = true;
        Some(entry.clone())
    }

    pub(crate) fn invalidate_below(&mut self, min_confidence: f32) -> usize {
        let mut invalidated = 0;
        for entry in self.entries.values_mut().filter(|e| e.is_valid) {
            if entry.confidence_score < min_confidence || entry.verification_count == 0 {
                entry.is_valid = false;
                invalidated += 1;
            }
        }
        if invalidated > 0 {
            self.dirty = true;
        }
        invalidated
    }

    pub(crate) fn prune_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.created_at >= cutoff);
        let removed = before - self.entries.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    pub(crate) fn valid_for_source(&self, source_name: &str, since: DateTime<Utc>) -> Vec<CacheEntry> {
        self.entries
            .values()
            .filter(|e| e.is_valid && e.source_name == source_name && e.created_at >= since)
            .cloned()
            .collect()
    }
}

fn bump_verification(entry: &mut CacheEntry, now: DateTime<Utc>) {
    entry.verification_count = entry.verification_count.saturating_add(1);
    // Never move the verification clock backwards.
    entry.last_verified_at = Some(match entry.last_verified_at {
        Some(previous) if previous > now => previous,
        _ => now,
    });
}
