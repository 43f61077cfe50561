//! Batch dating: resolve a strategy per article, estimate where the
//! strategy estimates, and apply the inclusion window.

use chrono::{DateTime, Local, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument};

use crate::models::{Article, DatedArticle, DatelineReport};
use crate::strategy::StrategyDispatcher;
use crate::utils::time_of_day;

/// Articles estimated concurrently.
pub const PARALLEL_BATCH_SIZE: usize = 12;

/// Date every article in `articles` as of `now`, preserving input order.
///
/// # Arguments
///
/// * `articles` - The batch, with `position`/`total` already assigned
/// * `dispatcher` - Resolves each article's source to a strategy
/// * `now` - Evaluation time shared by the whole batch
///
/// # Returns
///
/// One [`DatedArticle`] per input, excluded ones included, in input order.
#[instrument(level = "info", skip_all, fields(count = articles.len()))]
pub async fn date_articles(
    articles: &[Article],
    dispatcher: &StrategyDispatcher,
    now: DateTime<Utc>,
) -> Vec<DatedArticle> {
    let mut dated: Vec<(usize, DatedArticle)> = stream::iter(articles.iter().enumerate())
        .map(|(i, article)| async move { (i, date_article(article, dispatcher, now).await) })
        .buffer_unordered(PARALLEL_BATCH_SIZE)
        .collect()
        .await;
    dated.sort_by_key(|(i, _)| *i);

    let dated: Vec<DatedArticle> = dated.into_iter().map(|(_, d)| d).collect();
    info!(
        total = dated.len(),
        included = dated.iter().filter(|d| d.included).count(),
        "Dated article batch"
    );
    dated
}

async fn date_article(article: &Article, dispatcher: &StrategyDispatcher, now: DateTime<Utc>) -> DatedArticle {
    let source = article.source.as_str();
    let strategy = dispatcher.resolve(source);

    let estimation = strategy
        .estimate_at(article, article.position, article.total, source, now)
        .await;
    let effective_published_at = match &estimation {
        Some(estimate) => estimate.estimated_date(),
        None => article.published_at,
    };
    let included = strategy.should_include_at(&article.with_published_at(effective_published_at), source, now);
    debug!(url = %article.url, strategy = strategy.name(), included, "Dated article");

    DatedArticle {
        source: article.source.clone(),
        url: article.url.clone(),
        title: article.title.clone(),
        strategy: strategy.name().to_string(),
        effective_published_at,
        estimation,
        included,
    }
}

/// Wrap dated articles in a report stamped with the local date and edition.
pub fn build_report(articles: Vec<DatedArticle>) -> DatelineReport {
    let local = Local::now();
    DatelineReport {
        local_date: local.date_naive().to_string(),
        time_of_day: time_of_day(),
        local_time: local.time().format("%H:%M:%S").to_string(),
        articles,
    }
}
