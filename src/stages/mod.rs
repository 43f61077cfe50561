//! Individual date-extraction stages.
//!
//! Each stage is usable on its own; the fallback chain in
//! [`crate::strategy::universal`] runs them in [`STAGE_ORDER`].
//!
//! | Stage | Module | Produces |
//! |-------|--------|----------|
//! | Cache lookup | [`cache_lookup`] | a full stored result |
//! | URL pattern | [`url_pattern`] | a calendar date from the URL |
//! | Content scan | [`content_scan`] | a date from the scanner collaborator |
//! | Feed position | [`feed_position`] | an age from the item's index |
//! | Publishing pattern | [`publishing_pattern`] | a fixed-cadence guess |

use crate::models::EstimationMethod;

pub mod cache_lookup;
pub mod content_scan;
pub mod feed_position;
pub mod publishing_pattern;
pub mod url_pattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Cache,
    UrlPattern,
    ContentScan,
    RssPosition,
    PublishingPattern,
}

/// Priority order of the fallback chain.
pub const STAGE_ORDER: [Stage; 5] = [
    Stage::Cache,
    Stage::UrlPattern,
    Stage::ContentScan,
    Stage::RssPosition,
    Stage::PublishingPattern,
];

impl Stage {
    pub fn method(&self) -> EstimationMethod {
        match self {
            Stage::Cache => EstimationMethod::Cache,
            Stage::UrlPattern => EstimationMethod::UrlPattern,
            Stage::ContentScan => EstimationMethod::ContentScan,
            Stage::RssPosition => EstimationMethod::RssPosition,
            Stage::PublishingPattern => EstimationMethod::PublishingPattern,
        }
    }
}
