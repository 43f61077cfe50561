//! Source-name to strategy resolution.

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::LearningCache;
use crate::config::DatelineConfig;
use crate::scanner::ContentDateScanner;

use super::{Strategy, UniversalStrategy, WindowStrategy};

/// Priority-ordered strategy registry.
///
/// Order: per-source window overrides (longest prefix first), then the
/// universal strategy for sources with unreliable timestamps, then the
/// catch-all window. Because the catch-all accepts every source,
/// [`StrategyDispatcher::resolve`] always returns a strategy.
#[derive(Debug, Clone)]
pub struct StrategyDispatcher {
    strategies: Vec<Strategy>,
    fallback: Strategy,
}

impl StrategyDispatcher {
    /// Register `strategies` in the given order ahead of `fallback`.
    ///
    /// # Arguments
    ///
    /// * `strategies` - Prefix-scoped strategies; catch-all windows here are dropped
    /// * `fallback` - The catch-all window, consulted last
    pub fn new(mut strategies: Vec<Strategy>, fallback: WindowStrategy) -> Self {
        strategies.retain(|s| !matches!(s, Strategy::Window(w) if w.prefix_len() == 0));
        Self {
            strategies,
            fallback: Strategy::Window(fallback),
        }
    }

    /// Build the registry described by `config`.
    pub fn from_config(
        config: Arc<DatelineConfig>,
        cache: LearningCache,
        scanner: Arc<dyn ContentDateScanner>,
    ) -> Self {
        let mut windows: Vec<WindowStrategy> = config
            .max_age_overrides
            .iter()
            .map(|(prefix, hours)| WindowStrategy::for_prefix(prefix.clone(), Duration::hours(i64::from(*hours))))
            .collect();
        windows.sort_by(|a, b| b.prefix_len().cmp(&a.prefix_len()).then_with(|| a.name().cmp(b.name())));

        let mut strategies: Vec<Strategy> = windows.into_iter().map(Strategy::Window).collect();
        if !config.estimated_sources.is_empty() {
            strategies.push(Strategy::Universal(Arc::new(UniversalStrategy::new(
                config.estimated_sources.clone(),
                cache,
                scanner,
                Arc::clone(&config),
            ))));
        }

        let dispatcher = Self::new(strategies, WindowStrategy::catch_all(config.default_max_age()));
        info!(
            strategies = ?dispatcher.strategies().into_iter().map(Strategy::name).collect::<Vec<_>>(),
            "Strategy registry ready"
        );
        dispatcher
    }

    /// Strategies in priority order, catch-all last.
    pub fn strategies(&self) -> Vec<&Strategy> {
        self.strategies.iter().chain(std::iter::once(&self.fallback)).collect()
    }

    /// The first strategy in priority order that supports `source_name`.
    pub fn resolve(&self, source_name: &str) -> &Strategy {
        let strategy = self
            .strategies
            .iter()
            .find(|s| s.supports(source_name))
            .unwrap_or(&self.fallback);
        debug!(source = %source_name, strategy = strategy.name(), "Resolved strategy");
        strategy
    }
}
