//! Utility functions for URL normalization, edition naming, and file system checks.
//!
//! This module provides helper functions used throughout the crate:
//! - URL normalization and content addressing for cache keys
//! - Time classification for report naming
//! - String truncation for logging
//! - File system validation for output directories

use chrono::{DateTime, Duration, Local, NaiveTime, Timelike, Utc};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

/// Query parameters that never change which article a URL points at.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_cid", "mc_eid", "ocid", "cmpid", "ref", "src"];

/// Normalize an article URL so trivially different links share a cache key.
///
/// The normalization:
/// - lowercases scheme and host (done by [`Url`] itself)
/// - drops the fragment and any `utm_*` or known tracking parameters
/// - sorts the remaining query parameters
/// - strips a trailing slash from non-root paths
///
/// Unparsable input is trimmed and lowercased instead.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(
///     normalize_url("https://Example.com/a/?utm_source=x&b=2&a=1#top"),
///     "https://example.com/a?a=1&b=2"
/// );
/// ```
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_lowercase();
    };

    url.set_fragment(None);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| {
            let key = k.to_ascii_lowercase();
            !key.starts_with("utm_") && !TRACKING_PARAMS.contains(&key.as_str())
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    url.to_string()
}

/// Content address of an article URL: SHA-256 of its normalized form, hex encoded.
pub fn url_hash(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_url(raw).as_bytes());
    hex::encode(hasher.finalize())
}

/// Classify current local time into morning, afternoon, or evening.
///
/// The time boundaries are:
/// - **Morning**: 00:00 - 08:00
/// - **Afternoon**: 08:00 - 16:00
/// - **Evening**: 16:00 - 24:00
#[instrument]
pub fn time_of_day() -> String {
    let tod = Local::now().time();
    let which = classify_time_of_day(tod);
    tracing::debug!(%tod, %which, "Computed time_of_day");
    which.to_string()
}

fn classify_time_of_day(tod: NaiveTime) -> &'static str {
    match tod.hour() {
        0..=7 => "morning",
        8..=15 => "afternoon",
        _ => "evening",
    }
}

/// The instant `days` whole days before `now`.
///
/// # Returns
///
/// `None` when the result falls outside the representable date range.
pub fn days_before(now: DateTime<Utc>, days: u32) -> Option<DateTime<Utc>> {
    now.checked_sub_signed(Duration::try_days(i64::from(days))?)
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary)
/// with an ellipsis and byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and deletes a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url_strips_tracking_and_fragment() {
        assert_eq!(
            normalize_url("https://Example.com/a/?utm_source=x&b=2&a=1#top"),
            "https://example.com/a?a=1&b=2"
        );
        assert_eq!(
            normalize_url("https://example.com/story?fbclid=abc"),
            "https://example.com/story"
        );
    }

    #[test]
    fn test_normalize_url_keeps_root_slash() {
        assert_eq!(normalize_url("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn test_normalize_url_unparsable() {
        assert_eq!(normalize_url("  Not A URL  "), "not a url");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn test_url_hash_equivalent_urls_collide() {
        let a = url_hash("https://example.com/news/story/");
        let b = url_hash("https://EXAMPLE.com/news/story?utm_medium=rss");
        let c = url_hash("https://example.com/news/other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte_boundary() {
        let s = "ééééé";
        let result = truncate_for_log(s, 3);
        assert!(result.starts_with('é'));
    }

    #[test]
    fn test_days_before() {
        use chrono::TimeZone;
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(days_before(now, 30), Some(now - Duration::days(30)));
        assert_eq!(days_before(now, 0), Some(now));
        assert_eq!(days_before(now, u32::MAX), None);
        assert_eq!(days_before(now, 100_000_000), None);
    }

    #[test]
    fn test_classify_time_of_day() {
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(classify_time_of_day(at(6, 30)), "morning");
        assert_eq!(classify_time_of_day(at(8, 0)), "afternoon");
        assert_eq!(classify_time_of_day(at(15, 59)), "afternoon");
        assert_eq!(classify_time_of_day(at(20, 0)), "evening");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_writable_dir(nested.to_str().unwrap()).await.unwrap();
        assert!(nested.is_dir());
    }
}
