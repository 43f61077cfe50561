//! Feed-position age estimation.
//!
//! Feeds list newest items first, so an item's index is a rough proxy for
//! its age: the first item is placed one hour before `now`, the last one
//! `span_hours` further back, with linear spacing in between.

use chrono::{DateTime, Duration, Utc};

/// Age assumed for the first item of a feed.
const FIRST_ITEM_AGE_MINUTES: f64 = 60.0;

/// Estimated publish time of the item at `position` in a batch of `total`.
///
/// `total == 0` is treated as a single-item batch and positions past the end
/// are clamped to the last slot, so the result never gets later as
/// `position` grows.
///
/// # Returns
///
/// `None` when the resulting age does not fit a timestamp (for example an
/// infinite `span_hours`).
pub fn estimate_from_position(
    position: usize,
    total: usize,
    now: DateTime<Utc>,
    span_hours: f64,
) -> Option<DateTime<Utc>> {
    let total = total.max(1);
    let ratio = position.min(total) as f64 / total as f64;
    let age_minutes = FIRST_ITEM_AGE_MINUTES + ratio * span_hours.max(0.0) * 60.0;
    let age_seconds = (age_minutes * 60.0).round();
    if !age_seconds.is_finite() || age_seconds >= i64::MAX as f64 {
        return None;
    }
    now.checked_sub_signed(Duration::try_seconds(age_seconds as i64)?)
}
