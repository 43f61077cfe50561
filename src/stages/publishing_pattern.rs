//! Last-resort publishing-cadence heuristic.

use chrono::{DateTime, Duration, Utc};

/// Assume a typical news cadence: the article appeared `offset_hours` ago.
///
/// Negative offsets count as zero. Returns `None` when the offset does not
/// fit a timestamp.
pub fn estimate_from_cadence(now: DateTime<Utc>, offset_hours: f64) -> Option<DateTime<Utc>> {
    let seconds = (offset_hours.max(0.0) * 3600.0).round();
    if !seconds.is_finite() || seconds >= i64::MAX as f64 {
        return None;
    }
    now.checked_sub_signed(Duration::try_seconds(seconds as i64)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_six_hours_before_now() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(estimate_from_cadence(now, 6.0), Some(now - Duration::hours(6)));
        assert_eq!(estimate_from_cadence(now, -3.0), Some(now));
    }

    #[test]
    fn test_unrepresentable_offset_yields_nothing() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(estimate_from_cadence(now, f64::INFINITY), None);
        assert_eq!(estimate_from_cadence(now, 1.0e300), None);
    }
}
