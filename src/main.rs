//! # Awful Dateline
//!
//! Command-line front end for the dateline library.
//!
//! ## Usage
//!
//! ```sh
//! awful_dateline estimate -i feed.xml -s scraped_blog -j ./json
//! awful_dateline cache stats -s scraped_blog
//! ```
//!
//! ## Estimate pipeline
//! 1. **Loading**: read a JSON article batch or an RSS/Atom feed
//! 2. **Fetching** (optional): download bodies for articles without content
//! 3. **Dating**: resolve a strategy per source and estimate dates (parallel, 12 at a time)
//! 4. **Output**: write the JSON report and persist the learning cache

use awful_dateline::cache::{JsonFileCacheStore, LearningCache, MemoryCacheStore};
use awful_dateline::config::DatelineConfig;
use awful_dateline::feed::load_articles;
use awful_dateline::fetch::{fill_missing_content, HttpFetcher, RetryFetch};
use awful_dateline::outputs::json;
use awful_dateline::pipeline::{build_report, date_articles};
use awful_dateline::scanner::TextDateScanner;
use awful_dateline::strategy::StrategyDispatcher;
use awful_dateline::utils::{days_before, ensure_writable_dir};
use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;

use cli::{CacheAction, Cli, Command, EstimateArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = Arc::new(DatelineConfig::load(args.config.as_deref())?);

    match args.command {
        Command::Estimate(estimate) => {
            let store: Arc<dyn awful_dateline::cache::CacheStore> =
                match JsonFileCacheStore::open(&args.cache_file).await {
                    Ok(store) => {
                        debug!(path = %store.path().display(), "Using file-backed cache");
                        Arc::new(store)
                    }
                    Err(e) => {
                        warn!(
                            path = %args.cache_file.display(),
                            error = %e,
                            "Cache file unusable; continuing with an in-memory cache"
                        );
                        Arc::new(MemoryCacheStore::default())
                    }
                };
            run_estimate(estimate, config, LearningCache::new(store)).await?;
        }
        Command::Cache { action } => {
            let cache = LearningCache::new(Arc::new(JsonFileCacheStore::open(&args.cache_file).await?));
            run_cache_action(action, &config, &cache).await?;
        }
    }

    info!(elapsed_ms = start_time.elapsed().as_millis(), "Done");
    Ok(())
}

#[instrument(level = "info", skip_all, fields(input = %args.input.display()))]
async fn run_estimate(
    args: EstimateArgs,
    config: Arc<DatelineConfig>,
    cache: LearningCache,
) -> Result<(), Box<dyn Error>> {
    // Early check: ensure JSON output dir is writable
    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "JSON output directory is not writable");
            return Err(e);
        }
    }

    match days_before(Utc::now(), config.cache_retention_days) {
        Some(cutoff) => {
            if let Err(e) = cache.prune_older_than(cutoff).await {
                warn!(error = %e, "Cache pruning failed; continuing");
            }
        }
        None => warn!(
            days = config.cache_retention_days,
            "Retention period out of range; skipping cache pruning"
        ),
    }

    let mut articles = load_articles(&args.input, args.source.as_deref()).await?;

    if args.fetch_content {
        let fetcher = RetryFetch::new(
            HttpFetcher::new(StdDuration::from_secs(20)).map_err(|e| e as Box<dyn Error>)?,
            3,
            StdDuration::from_secs(1),
        );
        articles = fill_missing_content(articles, &fetcher).await;
    }

    let dispatcher = StrategyDispatcher::from_config(
        Arc::clone(&config),
        cache.clone(),
        Arc::new(TextDateScanner::default()),
    );
    let dated = date_articles(&articles, &dispatcher, Utc::now()).await;
    let report = build_report(dated);
    info!(
        total = report.articles.len(),
        included = report.included_count(),
        time_of_day = %report.time_of_day,
        "Batch dated"
    );

    match &args.json_output_dir {
        Some(dir) => {
            if let Err(e) = json::write_report(&report, dir).await {
                error!(error = %e, "Failed to write JSON report");
            }
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if let Err(e) = cache.flush().await {
        error!(error = %e, "Failed to persist learning cache");
    }
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_cache_action(
    action: CacheAction,
    config: &DatelineConfig,
    cache: &LearningCache,
) -> Result<(), Box<dyn Error>> {
    match action {
        CacheAction::Prune { days } => {
            let days = days.unwrap_or(config.cache_retention_days);
            let cutoff = days_before(Utc::now(), days)
                .ok_or_else(|| format!("--days {days} reaches outside the supported date range"))?;
            let removed = cache.prune_older_than(cutoff).await?;
            println!("pruned {removed} entries");
        }
        CacheAction::Invalidate { min_confidence } => {
            let floor = min_confidence.unwrap_or(config.invalidation_min_confidence);
            if !(0.0..=1.0).contains(&floor) {
                return Err(format!("--min-confidence must be within [0, 1], got {floor}").into());
            }
            let invalidated = cache.invalidate_low_confidence(floor).await?;
            println!("invalidated {invalidated} entries");
        }
        CacheAction::Stats { source, since_days } => {
            let since = days_before(Utc::now(), since_days)
                .ok_or_else(|| format!("--since-days {since_days} reaches outside the supported date range"))?;
            let stats = cache.stats_by_source(&source, since).await?;
            let hit_rate = cache.hit_rate(&source, since).await?;
            let summary = serde_json::json!({
                "source": source,
                "since": since,
                "methods": stats,
                "hit_rate": {
                    "total_entries": hit_rate.total_entries,
                    "repeat_hits": hit_rate.repeat_hits,
                    "ratio": hit_rate.ratio(),
                },
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    cache.flush().await?;
    Ok(())
}
