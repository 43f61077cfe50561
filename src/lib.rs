//! # Awful Dateline
//!
//! Decides when news articles were actually published and whether they are
//! fresh enough to keep.
//!
//! Sources whose feeds carry trustworthy timestamps are filtered by a
//! per-source age window. For sources whose timestamps are missing or wrong,
//! a publish date is estimated through a confidence-scored fallback chain:
//!
//! 1. **Cache**: a date learned on an earlier sighting of the same URL
//! 2. **URL pattern**: a date embedded in the link (`/2025/01/15/`)
//! 3. **Content scan**: a date found in the title or body
//! 4. **RSS position**: interpolated from the item's place in the feed
//! 5. **Publishing pattern**: a fixed offset from now
//!
//! Confident results are written to the learning cache so later runs reuse
//! them.

pub mod cache;
pub mod config;
pub mod feed;
pub mod fetch;
pub mod models;
pub mod outputs;
pub mod pipeline;
pub mod scanner;
pub mod scoring;
pub mod stages;
pub mod strategy;
pub mod utils;
