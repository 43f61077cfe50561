//! Age-window strategies for sources with trustworthy feed timestamps.

use chrono::{DateTime, Duration, Utc};

use crate::models::Article;

/// Include articles whose feed timestamp is at most `max_age` old.
///
/// Articles without a timestamp get the benefit of the doubt.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStrategy {
    name: String,
    /// Source-name prefix; `None` accepts every source.
    prefix: Option<String>,
    max_age: Duration,
}

impl WindowStrategy {
    pub fn for_prefix(prefix: impl Into<String>, max_age: Duration) -> Self {
        let prefix = prefix.into();
        Self {
            name: prefix.clone(),
            prefix: Some(prefix),
            max_age,
        }
    }

    /// The catch-all window used when nothing more specific matches.
    pub fn catch_all(max_age: Duration) -> Self {
        Self {
            name: "default".to_string(),
            prefix: None,
            max_age,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn prefix_len(&self) -> usize {
        self.prefix.as_ref().map_or(0, String::len)
    }

    pub fn supports(&self, source_name: &str) -> bool {
        self.prefix
            .as_deref()
            .is_none_or(|prefix| source_name.starts_with(prefix))
    }

    pub fn should_include_at(&self, article: &Article, now: DateTime<Utc>) -> bool {
        within_window(article.published_at, self.max_age, now)
    }
}

/// `true` when `published_at` is absent or no older than `max_age`.
pub(crate) fn within_window(published_at: Option<DateTime<Utc>>, max_age: Duration, now: DateTime<Utc>) -> bool {
    published_at.is_none_or(|published| now - published <= max_age)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn article_aged(hours: i64) -> Article {
        Article {
            source: "investing_market".to_string(),
            url: "https://investing.example/a".to_string(),
            published_at: Some(now() - Duration::hours(hours)),
            ..Article::default()
        }
    }

    #[test]
    fn test_prefix_support() {
        let strategy = WindowStrategy::for_prefix("bbc", Duration::hours(48));
        assert!(strategy.supports("bbc_business"));
        assert!(strategy.supports("bbc"));
        assert!(!strategy.supports("cnbc"));
        assert!(WindowStrategy::catch_all(Duration::hours(24)).supports("anything"));
    }

    #[test]
    fn test_window_boundaries() {
        let strategy = WindowStrategy::for_prefix("investing_market", Duration::hours(6));
        assert!(strategy.should_include_at(&article_aged(5), now()));
        assert!(strategy.should_include_at(&article_aged(6), now()));
        assert!(!strategy.should_include_at(&article_aged(7), now()));
    }

    #[test]
    fn test_missing_timestamp_is_included() {
        let strategy = WindowStrategy::for_prefix("investing_market", Duration::hours(6));
        let article = Article {
            published_at: None,
            ..article_aged(0)
        };
        assert!(strategy.should_include_at(&article, now()));
    }
}
