//! Run reports.
//!
//! - [`json`]: writes a [`crate::models::DatelineReport`] per run
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── morning.json
//!     ├── afternoon.json
//!     └── evening.json
//! ```

pub mod json;
