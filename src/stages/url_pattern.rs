//! Publish dates embedded in article URLs.
//!
//! Recognized segments, scanned left to right:
//! - `/2025/01/15/` (also single-digit month/day)
//! - `/2025-01-15/`, `_2025-01-15.`, ...
//! - compact `/20250115/`
//!
//! The first segment that forms a real calendar date wins.

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static SLASHED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[/_-])(\d{4})/(\d{1,2})/(\d{1,2})(?:[/_.?#-]|$)").unwrap());
static DASHED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[/_.-])(\d{4})-(\d{2})-(\d{2})(?:[/_.?#-]|$)").unwrap());
static COMPACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[/_-])((?:19|20)\d{2})(\d{2})(\d{2})(?:[/_.?#-]|$)").unwrap());

const MIN_YEAR: i32 = 1990;
const MAX_YEAR: i32 = 2100;

/// Find the first calendrically valid date in `url`.
///
/// Percent-encoded URLs are decoded first. Returns `None` when nothing
/// matches or every match is invalid (e.g. month 13).
pub fn extract_date_from_url(url: &str) -> Option<NaiveDate> {
    let decoded = urlencoding::decode(url)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| url.to_string());

    let mut candidates: Vec<(usize, i32, u32, u32)> = [&*SLASHED, &*DASHED, &*COMPACT]
        .into_iter()
        .flat_map(|re| scan(re, &decoded))
        .collect();
    candidates.sort_by_key(|(start, ..)| *start);

    candidates
        .into_iter()
        .filter(|(_, year, ..)| (MIN_YEAR..=MAX_YEAR).contains(year))
        .find_map(|(_, year, month, day)| NaiveDate::from_ymd_opt(year, month, day))
}

/// All `(offset, year, month, day)` triples matched by `re`.
///
/// The boundary after a date may double as the boundary before the next
/// one, so scanning resumes right after the day digits.
fn scan(re: &Regex, text: &str) -> Vec<(usize, i32, u32, u32)> {
    let mut found: Vec<(usize, i32, u32, u32)> = Vec::new();
    let mut at = 0;
    while let Some(caps) = re.captures_at(text, at) {
        let (Some(y), Some(m), Some(d)) = (caps.get(1), caps.get(2), caps.get(3)) else {
            break;
        };
        at = d.end();
        if let (Ok(year), Ok(month), Ok(day)) = (y.as_str().parse(), m.as_str().parse(), d.as_str().parse()) {
            found.push((y.start(), year, month, day));
        }
    }
    found
}

/// Timestamp for a URL date: noon UTC.
///
/// A URL dated today is pulled back to `now` when noon has not come yet.
/// Any later calendar date keeps its real (future) noon so scoring can
/// treat it as implausible.
pub fn url_date_to_timestamp(date: NaiveDate, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let noon = date.and_hms_opt(12, 0, 0)?.and_utc();
    if date == now.date_naive() {
        Some(noon.min(now))
    } else {
        Some(noon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    #[test]
    fn test_dashed_date() {
        let date = extract_date_from_url("https://example.com/news/2025-01-15/test-article").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2025, 1, 15));
    }

    #[test]
    fn test_invalid_calendar_date_yields_nothing() {
        assert!(extract_date_from_url("https://example.com/news/2025-13-40/x").is_none());
        assert!(extract_date_from_url("https://example.com/2025/02/30/x").is_none());
    }

    #[test]
    fn test_slashed_date() {
        let date = extract_date_from_url("https://lite.cnn.com/2025/05/06/politics/story").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 5, 6).unwrap());

        let short = extract_date_from_url("https://example.com/2024/3/9/story").unwrap();
        assert_eq!(short, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
    }

    #[test]
    fn test_compact_date() {
        let date = extract_date_from_url("https://example.com/archive/20231105/item").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2023, 11, 5).unwrap());
    }

    #[test]
    fn test_first_valid_match_wins() {
        let date = extract_date_from_url("https://example.com/2025-13-01/2024-02-29/x").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_ignores_ids_and_implausible_years() {
        assert!(extract_date_from_url("https://example.com/story/123456789").is_none());
        assert!(extract_date_from_url("https://example.com/1066-10-14/hastings").is_none());
        assert!(extract_date_from_url("").is_none());
    }

    #[test]
    fn test_percent_encoded_url() {
        let date = extract_date_from_url("https://example.com/news%2F2025-01-15%2Fstory").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
    }

    #[test]
    fn test_timestamp_clamped_to_now() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let morning = Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap();
        assert_eq!(url_date_to_timestamp(date, morning), Some(morning));

        let later = Utc.with_ymd_and_hms(2025, 1, 16, 8, 0, 0).unwrap();
        assert_eq!(
            url_date_to_timestamp(date, later),
            Some(Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_future_date_is_not_clamped() {
        let date = NaiveDate::from_ymd_opt(2031, 1, 1).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(
            url_date_to_timestamp(date, now),
            Some(Utc.with_ymd_and_hms(2031, 1, 1, 12, 0, 0).unwrap())
        );

        let tomorrow = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert!(url_date_to_timestamp(tomorrow, now).unwrap() > now);
    }
}
