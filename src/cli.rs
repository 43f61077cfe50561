//! Command-line interface.
//!
//! Global options can also come from the environment
//! (`DATELINE_CONFIG`, `DATELINE_CACHE_FILE`).
//!
//! ```sh
//! # Date a feed batch and write a report
//! awful_dateline estimate --input feed.xml --source scraped_blog -j ./json
//!
//! # Cache maintenance
//! awful_dateline cache prune --days 30
//! awful_dateline cache invalidate --min-confidence 0.3
//! awful_dateline cache stats --source scraped_blog
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, env = "DATELINE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Learning cache file
    #[arg(long, env = "DATELINE_CACHE_FILE", default_value = "dateline_cache.json", global = true)]
    pub cache_file: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve publish dates for an article batch and apply age windows
    Estimate(EstimateArgs),
    /// Learning cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Args, Debug)]
pub struct EstimateArgs {
    /// JSON article batch or RSS/Atom feed
    #[arg(short, long)]
    pub input: PathBuf,

    /// Source name for feed items (and JSON articles without one)
    #[arg(short, long)]
    pub source: Option<String>,

    /// Output directory for the JSON report
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    /// Download article pages that arrive without a body
    #[arg(long)]
    pub fetch_content: bool,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Delete entries older than the retention period
    Prune {
        /// Retention in days (defaults to `cache_retention_days`)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Mark entries below a confidence floor invalid
    Invalidate {
        /// Floor (defaults to `invalidation_min_confidence`)
        #[arg(long)]
        min_confidence: Option<f32>,
    },
    /// Per-method extraction statistics for one source
    Stats {
        #[arg(short, long)]
        source: String,

        /// Only entries created in the last N days
        #[arg(long, default_value_t = 30)]
        since_days: u32,
    },
}
