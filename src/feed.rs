//! Article batch loading.
//!
//! Two input shapes are accepted:
//!
//! - a JSON batch: either an array of articles or `{"articles": [...]}`
//! - an RSS 2.0 or Atom feed document
//!
//! Feed items get their `position` and `total` from document order. JSON
//! articles that do not carry a `total` are numbered per source in the
//! order they appear. Duplicate URLs (after normalization) are collapsed,
//! keeping the first occurrence.

use feed_rs::model::Entry;
use feed_rs::parser::{self, ParseFeedError};
use itertools::Itertools;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::models::Article;
use crate::utils::normalize_url;

/// Errors raised while loading article input.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed article batch: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed feed document: {0}")]
    Feed(#[from] ParseFeedError),
    #[error("unrecognized input format (expected JSON or RSS/Atom)")]
    UnknownFormat,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonBatch {
    List(Vec<Article>),
    Wrapped { articles: Vec<Article> },
}

/// Load articles from `path`, sniffing JSON vs. XML from the first byte.
///
/// `source` names the feed for XML input and fills in JSON articles that
/// have no source of their own. Without it, XML items are attributed to the
/// file stem.
///
/// # Errors
///
/// Fails when the file cannot be read, is neither JSON nor a feed, or does
/// not parse as the format it looks like.
#[instrument(level = "info", skip(path), fields(path = %path.display()))]
pub async fn load_articles(path: &Path, source: Option<&str>) -> Result<Vec<Article>, FeedError> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| FeedError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let fallback_source = source.map(str::to_string).unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "feed".to_string())
    });

    let articles = match raw.trim_start().chars().next() {
        Some('[') | Some('{') => parse_json_batch(&raw, source)?,
        Some('<') => parse_feed(&raw, &fallback_source)?,
        _ => return Err(FeedError::UnknownFormat),
    };
    info!(count = articles.len(), "Loaded articles");
    Ok(articles)
}

/// Parse a JSON article batch.
///
/// Accepts a bare array or an object with an `articles` array.
pub fn parse_json_batch(raw: &str, default_source: Option<&str>) -> Result<Vec<Article>, FeedError> {
    let articles = match serde_json::from_str::<JsonBatch>(raw)? {
        JsonBatch::List(articles) | JsonBatch::Wrapped { articles } => articles,
    };
    let articles = articles
        .into_iter()
        .map(|mut article| {
            if article.source.trim().is_empty() {
                if let Some(source) = default_source {
                    article.source = source.to_string();
                }
            }
            article
        })
        .collect();
    Ok(number_by_source(dedupe(articles)))
}

/// Link of an entry: the first alternate (or untyped) link, then any link,
/// then an id that looks like a URL.
fn entry_link(entry: &Entry) -> String {
    let alternate = entry.links.iter().find(|l| {
        !l.href.trim().is_empty()
            && l
                .rel
                .as_deref()
                .is_none_or(|rel| rel.is_empty() || rel.eq_ignore_ascii_case("alternate"))
    });
    if let Some(link) = alternate.or_else(|| entry.links.iter().find(|l| !l.href.trim().is_empty())) {
        return link.href.trim().to_string();
    }
    let id = entry.id.trim();
    if id.starts_with("http://") || id.starts_with("https://") {
        id.to_string()
    } else {
        String::new()
    }
}

/// The longest of the entry's full content and its summary.
fn entry_body(entry: &Entry) -> Option<String> {
    let content = entry.content.as_ref().and_then(|c| c.body.as_deref());
    let summary = entry.summary.as_ref().map(|t| t.content.as_str());
    [content, summary]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|body| !body.is_empty())
        .max_by_key(|body| body.len())
        .map(str::to_string)
}

/// Parse an RSS 2.0 or Atom document into articles attributed to `source`.
///
/// # Errors
///
/// Returns [`FeedError::Feed`] when the document is not a feed `feed-rs`
/// understands.
pub fn parse_feed(raw: &str, source: &str) -> Result<Vec<Article>, FeedError> {
    let feed = parser::parse(raw.as_bytes())?;
    let articles: Vec<Article> = feed
        .entries
        .into_iter()
        .map(|entry| Article {
            source: source.to_string(),
            url: entry_link(&entry),
            title: entry
                .title
                .as_ref()
                .map(|t| t.content.trim().to_string())
                .unwrap_or_default(),
            published_at: entry.published.or(entry.updated),
            position: 0,
            total: 0,
            content: entry_body(&entry),
        })
        .collect();

    let articles = dedupe(articles);
    let total = articles.len();
    debug!(source, total, "Parsed feed document");
    Ok(articles
        .into_iter()
        .enumerate()
        .map(|(position, article)| Article {
            position,
            total,
            ..article
        })
        .collect())
}

/// Drop repeated URLs, keeping the first. Articles without a URL are kept.
fn dedupe(articles: Vec<Article>) -> Vec<Article> {
    let before = articles.len();
    let kept: Vec<Article> = articles
        .into_iter()
        .enumerate()
        .unique_by(|(i, a)| {
            if a.url.trim().is_empty() {
                format!("#{i}")
            } else {
                normalize_url(&a.url)
            }
        })
        .map(|(_, a)| a)
        .collect();
    if kept.len() < before {
        debug!(dropped = before - kept.len(), "Collapsed duplicate article URLs");
    }
    kept
}

/// Fill in `position`/`total` for articles that arrived without them.
fn number_by_source(articles: Vec<Article>) -> Vec<Article> {
    let totals = articles
        .iter()
        .filter(|a| a.total == 0)
        .counts_by(|a| a.source.clone());
    let mut seen: HashMap<String, usize> = HashMap::new();
    articles
        .into_iter()
        .map(|mut article| {
            if article.total == 0 {
                let next = seen.entry(article.source.clone()).or_default();
                article.position = *next;
                article.total = totals.get(&article.source).copied().unwrap_or(0);
                *next += 1;
            }
            article
        })
        .collect()
}
