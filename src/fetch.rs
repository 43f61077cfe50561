//! Article body fetching with exponential backoff.
//!
//! Used by `estimate --fetch-content` to give the content scanner something
//! to read when the feed carries no body. The body is kept as raw HTML so
//! the scanner can see `<meta>` and `<time>` markup.
//!
//! - [`FetchAsync`]: fetch the text behind a URL
//! - [`HttpFetcher`]: `reqwest` implementation
//! - [`RetryFetch`]: decorator adding retries to any [`FetchAsync`]
//!
//! Delay between attempts:
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use futures::stream::{self, StreamExt};
use rand::{rng, Rng};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

use crate::models::Article;
use crate::utils::truncate_for_log;

pub type FetchError = Box<dyn Error + Send + Sync>;

/// Parallel fetches in [`fill_missing_content`].
pub const FETCH_CONCURRENCY: usize = 12;

/// Trait for fetching the text behind a URL.
///
/// Implemented by the real HTTP client and by decorators such as
/// [`RetryFetch`], so retries can wrap any backend.
pub trait FetchAsync {
    /// Fetch the body at `url`.
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL of the page to fetch
    ///
    /// # Returns
    ///
    /// The response body as text, or an error if the request failed.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Wrapper that adds exponential backoff retry logic to any [`FetchAsync`] implementation.
///
/// The last error is returned once `max_retries` retries have failed.
pub struct RetryFetch<T> {
    /// The underlying fetcher to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Cap on the delay before jitter is added.
    max_delay: StdDuration,
}

impl<T> RetryFetch<T>
where
    T: FetchAsync,
{
    /// Create a retry wrapper around an existing [`FetchAsync`] implementation.
    ///
    /// # Arguments
    ///
    /// * `inner` - The underlying fetcher to wrap
    /// * `max_retries` - Retries after the first failed attempt (0 disables retrying)
    /// * `base_delay` - Initial delay between retries
    ///
    /// # Example
    ///
    /// ```ignore
    /// let http = HttpFetcher::new(Duration::from_secs(15))?;
    /// let fetcher = RetryFetch::new(http, 3, Duration::from_millis(500));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> FetchAsync for RetryFetch<T>
where
    T: FetchAsync,
{
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self
                        .base_delay
                        .saturating_mul(1 << (attempt - 1).min(16))
                        .min(self.max_delay);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Plain HTTP GET returning the response text.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a client with a per-request `timeout` and a crate user agent.
    ///
    /// # Errors
    ///
    /// Fails when the underlying `reqwest` client cannot be constructed,
    /// e.g. when no TLS backend is available.
    pub fn new(timeout: StdDuration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl FetchAsync for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!(bytes = body.len(), elapsed_ms = t0.elapsed().as_millis(), "Fetched page");
        Ok(body)
    }
}

/// Fill in `content` for articles that have a URL but no body.
///
/// Fetch failures are logged and leave the article unchanged.
///
/// # Arguments
///
/// * `articles` - The batch to fill, in feed order
/// * `fetcher` - Any [`FetchAsync`], usually a [`RetryFetch`] over [`HttpFetcher`]
///
/// # Returns
///
/// The same articles in the same order, with bodies filled where a fetch
/// succeeded. At most [`FETCH_CONCURRENCY`] fetches run at once.
#[instrument(level = "info", skip_all, fields(count = articles.len()))]
pub async fn fill_missing_content<F>(articles: Vec<Article>, fetcher: &F) -> Vec<Article>
where
    F: FetchAsync,
{
    let mut filled: Vec<(usize, Article)> = stream::iter(articles.into_iter().enumerate())
        .map(|(i, mut article)| async move {
            let wants_body = article.content.as_deref().is_none_or(|c| c.trim().is_empty())
                && !article.url.trim().is_empty();
            if wants_body {
                match fetcher.fetch(&article.url).await {
                    Ok(body) => {
                        debug!(url = %article.url, preview = %truncate_for_log(&body, 80), "Fetched article body");
                        article.content = Some(body);
                    }
                    Err(e) => warn!(url = %article.url, error = %e, "Body fetch failed; continuing without content"),
                }
            }
            (i, article)
        })
        .buffer_unordered(FETCH_CONCURRENCY)
        .collect()
        .await;
    filled.sort_by_key(|(i, _)| *i);

    let fetched = filled.iter().filter(|(_, a)| a.content.is_some()).count();
    info!(with_content = fetched, "Article bodies ready");
    filled.into_iter().map(|(_, a)| a).collect()
}
