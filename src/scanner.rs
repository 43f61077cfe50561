//! Content-date scanning.
//!
//! The estimation engine treats content scanning as an external
//! collaborator behind [`ContentDateScanner`]; whatever it returns is
//! advisory and is always called under a timeout.
//!
//! [`TextDateScanner`] is the default implementation. It looks, in order, at:
//!
//! 1. HTML metadata (`article:published_time`, `datePublished`, `pubdate`,
//!    `<time datetime>`, JSON-LD) when the body is markup
//! 2. ISO dates (`2025-01-15`, `2025-01-15T08:30`)
//! 3. Written dates (`January 15, 2025`, `15 Jan 2025`)
//! 4. Relative phrases (`3 hours ago`, `yesterday`)
//!
//! The first plausible date found wins.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("content scan failed: {0}")]
    Failed(String),
}

/// Finds a candidate publish date in an article's title and body.
#[async_trait]
pub trait ContentDateScanner: Send + Sync {
    async fn scan_for_date(&self, title: &str, body: &str) -> Result<Option<DateTime<Utc>>, ScanError>;
}

static META_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(concat!(
        r#"meta[property="article:published_time"], "#,
        r#"meta[property="og:published_time"], "#,
        r#"meta[itemprop="datePublished"], "#,
        r#"meta[name="pubdate"], "#,
        r#"meta[name="publishdate"], "#,
        r#"meta[name="date"], "#,
        r#"meta[name="dc.date"], "#,
        r#"meta[name="DC.date.issued"]"#,
    ))
    .unwrap()
});
static TIME_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("time[datetime]").unwrap());
static JSON_LD_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""datePublished"\s*:\s*"([^"]+)""#).unwrap());
static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})(?:[T ](\d{2}):(\d{2})(?::(\d{2}))?)?").unwrap()
});

const MONTHS: &str =
    r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";
static MONTH_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b({MONTHS})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b")).unwrap()
});
static DAY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({MONTHS})\.?,?\s+(\d{{4}})\b")).unwrap()
});
static RELATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,3})\s+(minute|min|hour|hr|day|week)s?\s+ago\b").unwrap());
static YESTERDAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\byesterday\b").unwrap());

/// Earliest date the scanner will accept.
const MIN_YEAR: i32 = 1990;

/// Regex/markup based scanner.
///
/// `reference_time` pins "now" for relative phrases and plausibility
/// checks; when unset the wall clock is used.
#[derive(Debug, Clone, Default)]
pub struct TextDateScanner {
    pub reference_time: Option<DateTime<Utc>>,
}

impl TextDateScanner {
    pub fn at(reference_time: DateTime<Utc>) -> Self {
        Self {
            reference_time: Some(reference_time),
        }
    }
}

#[async_trait]
impl ContentDateScanner for TextDateScanner {
    #[instrument(level = "debug", skip_all, fields(body_bytes = body.len()))]
    async fn scan_for_date(&self, title: &str, body: &str) -> Result<Option<DateTime<Utc>>, ScanError> {
        let now = self.reference_time.unwrap_or_else(Utc::now);
        let found = scan_text(title, body, now);
        debug!(found = ?found, "Content scan finished");
        Ok(found)
    }
}

/// Synchronous core of [`TextDateScanner`].
pub fn scan_text(title: &str, body: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let plausible = |d: &DateTime<Utc>| {
        d.naive_utc().date() >= NaiveDate::from_ymd_opt(MIN_YEAR, 1, 1).unwrap_or_default()
            && *d <= now + Duration::days(1)
    };

    let text = if looks_like_html(body) {
        if let Some(found) = markup_dates(body).into_iter().find(|d| plausible(d)) {
            return Some(found);
        }
        html_text(body)
    } else {
        body.to_string()
    };

    [title, text.as_str()]
        .iter()
        .find_map(|chunk| text_dates(chunk, now).into_iter().find(|d| plausible(d)))
}

fn looks_like_html(body: &str) -> bool {
    let trimmed = body.trim_start();
    trimmed.starts_with('<') && body.contains("</")
}

fn html_text(body: &str) -> String {
    Html::parse_document(body)
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Dates declared in markup, in document order per source.
fn markup_dates(body: &str) -> Vec<DateTime<Utc>> {
    let document = Html::parse_document(body);
    let meta = document
        .select(&META_SELECTOR)
        .filter_map(|el| el.value().attr("content"));
    let times = document
        .select(&TIME_SELECTOR)
        .filter_map(|el| el.value().attr("datetime"));
    let json_ld = JSON_LD_DATE
        .captures_iter(body)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()));

    meta.chain(times)
        .chain(json_ld)
        .filter_map(parse_timestamp)
        .collect()
}

/// Dates written in free text, in priority order.
fn text_dates(text: &str, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut found = Vec::new();

    for caps in ISO_DATE.captures_iter(text) {
        let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
        let (Some(year), Some(month), Some(day)) = (number(1), number(2), number(3)) else {
            continue;
        };
        let Some(date) = NaiveDate::from_ymd_opt(year as i32, month, day) else {
            continue;
        };
        let (hour, minute, second) = (number(4).unwrap_or(12), number(5).unwrap_or(0), number(6).unwrap_or(0));
        if let Some(dt) = date.and_hms_opt(hour, minute, second) {
            found.push(dt.and_utc());
        }
    }

    for caps in MONTH_FIRST.captures_iter(text) {
        if let Some(dt) = written_date(caps.get(1), caps.get(2), caps.get(3)) {
            found.push(dt);
        }
    }
    for caps in DAY_FIRST.captures_iter(text) {
        if let Some(dt) = written_date(caps.get(2), caps.get(1), caps.get(3)) {
            found.push(dt);
        }
    }

    for caps in RELATIVE.captures_iter(text) {
        let Some(amount) = caps.get(1).and_then(|m| m.as_str().parse::<i64>().ok()) else {
            continue;
        };
        let unit = caps.get(2).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
        let offset = match unit.as_str() {
            "minute" | "min" => Duration::minutes(amount),
            "hour" | "hr" => Duration::hours(amount),
            "day" => Duration::days(amount),
            _ => Duration::weeks(amount),
        };
        found.push(now - offset);
    }
    if YESTERDAY.is_match(text) {
        found.push(now - Duration::days(1));
    }

    found
}

fn written_date(
    month: Option<regex::Match<'_>>,
    day: Option<regex::Match<'_>>,
    year: Option<regex::Match<'_>>,
) -> Option<DateTime<Utc>> {
    let month = month_number(month?.as_str())?;
    let day: u32 = day?.as_str().parse().ok()?;
    let year: i32 = year?.as_str().parse().ok()?;
    Some(NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(12, 0, 0)?.and_utc())
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.to_lowercase().chars().take(3).collect();
    let index = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ]
    .iter()
    .position(|m| *m == prefix)?;
    Some(index as u32 + 1)
}

/// Parse the timestamp formats commonly found in feeds and markup.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .map(|dt| dt.and_utc())
}
