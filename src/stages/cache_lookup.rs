//! Learning-cache stage.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::cache::{CacheError, LearningCache};
use crate::models::DateEstimationResult;
use crate::utils::url_hash;

/// Reuse a cached extraction for `url`, counting the lookup as a verification.
///
/// Returns the stored date and confidence unchanged under the `cache`
/// method. URLs that are blank never hit the cache.
pub async fn lookup(
    cache: &LearningCache,
    url: &str,
    now: DateTime<Utc>,
) -> Result<Option<DateEstimationResult>, CacheError> {
    if url.trim().is_empty() {
        return Ok(None);
    }
    let hash = url_hash(url);
    let entry = cache.verify(&hash, now).await?;
    if let Some(entry) = &entry {
        debug!(
            url_hash = %hash,
            verification_count = entry.verification_count,
            "Cache hit"
        );
    }
    Ok(entry.map(|e| e.to_estimate()))
}
