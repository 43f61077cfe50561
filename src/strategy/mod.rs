//! Date strategies and their dispatch.
//!
//! Sources fall into two groups:
//!
//! - Sources with trustworthy feed timestamps use a [`WindowStrategy`]: the
//!   feed date is compared against a per-source maximum age.
//! - Sources with unreliable timestamps use the [`UniversalStrategy`], which
//!   estimates a date through the fallback chain before the window applies.
//!
//! [`StrategyDispatcher`] picks the strategy for a source name.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::trace;

use crate::models::{Article, DateEstimationResult};

pub mod dispatcher;
pub mod universal;
pub mod window;

pub use dispatcher::StrategyDispatcher;
pub use universal::UniversalStrategy;
pub use window::WindowStrategy;

/// One of the closed set of date strategies.
#[derive(Debug, Clone)]
pub enum Strategy {
    Window(WindowStrategy),
    Universal(Arc<UniversalStrategy>),
}

impl Strategy {
    /// Strategy name recorded on each dated article.
    pub fn name(&self) -> &str {
        match self {
            Strategy::Window(w) => w.name(),
            Strategy::Universal(_) => "universal",
        }
    }

    /// Whether this strategy claims `source_name`.
    pub fn supports(&self, source_name: &str) -> bool {
        match self {
            Strategy::Window(w) => w.supports(source_name),
            Strategy::Universal(u) => u.supports(source_name),
        }
    }

    /// Whether `article` falls inside this strategy's age window right now.
    pub fn should_include(&self, article: &Article, source_name: &str) -> bool {
        self.should_include_at(article, source_name, Utc::now())
    }

    /// [`Strategy::should_include`] with an explicit evaluation time.
    pub fn should_include_at(&self, article: &Article, source_name: &str, now: DateTime<Utc>) -> bool {
        let included = match self {
            Strategy::Window(w) => w.should_include_at(article, now),
            Strategy::Universal(u) => u.should_include_at(article, now),
        };
        trace!(strategy = self.name(), source = %source_name, included, "Inclusion decision");
        included
    }

    /// Estimate a publish date; only the universal strategy estimates.
    pub async fn estimate(
        &self,
        article: &Article,
        position: usize,
        total: usize,
        source_name: &str,
    ) -> Option<DateEstimationResult> {
        self.estimate_at(article, position, total, source_name, Utc::now()).await
    }

    /// [`Strategy::estimate`] with an explicit evaluation time.
    ///
    /// # Returns
    ///
    /// `None` for window strategies, which trust the feed timestamp.
    pub async fn estimate_at(
        &self,
        article: &Article,
        position: usize,
        total: usize,
        source_name: &str,
        now: DateTime<Utc>,
    ) -> Option<DateEstimationResult> {
        match self {
            Strategy::Window(_) => None,
            Strategy::Universal(u) => Some(u.estimate_at(article, position, total, source_name, now).await),
        }
    }
}
