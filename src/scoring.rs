//! Confidence scoring for candidate publish dates.
//!
//! [`score`] maps a candidate date, the method that produced it, and the
//! source it belongs to onto a calibrated confidence in `[0, 1]`:
//!
//! 1. Start from the method's base score (cache > URL pattern > content scan
//!    > feed position > publishing pattern).
//! 2. A candidate strictly in the future is capped at [`FUTURE_CEILING`].
//! 3. A candidate older than the source's plausible-age horizon `h` is scaled
//!    by `h / (h + excess)`, which is smooth and never increases with age.
//!
//! The function is pure: the evaluation time is an explicit argument.

use chrono::{DateTime, Utc};

use crate::config::ScoringConfig;
use crate::models::EstimationMethod;

/// Upper bound for any candidate dated after the evaluation time.
pub const FUTURE_CEILING: f32 = 0.25;

/// Score `candidate` as produced by `method` for `source`, evaluated at `now`.
///
/// # Arguments
///
/// * `candidate` - The date a stage proposed
/// * `method` - The stage that proposed it; selects the base score
/// * `source` - Source name; selects the plausible-age horizon by prefix
/// * `now` - Evaluation time
/// * `config` - Base scores and horizons
///
/// # Returns
///
/// A confidence in `[0, 1]`. Future candidates never exceed
/// [`FUTURE_CEILING`], and for a fixed `now` the score never rises as the
/// candidate gets older.
pub fn score(
    candidate: DateTime<Utc>,
    method: EstimationMethod,
    source: &str,
    now: DateTime<Utc>,
    config: &ScoringConfig,
) -> f32 {
    let base = config.base_score(method).clamp(0.0, 1.0);

    if candidate > now {
        return base.min(FUTURE_CEILING);
    }

    let age_hours = (now - candidate).num_seconds() as f64 / 3600.0;
    (base as f64 * age_factor(age_hours, config.plausible_age_for(source))) as f32
}

/// Multiplier in `(0, 1]` for a candidate `age_hours` old.
fn age_factor(age_hours: f64, horizon_hours: f64) -> f64 {
    let excess = age_hours - horizon_hours;
    if excess <= 0.0 {
        1.0
    } else {
        horizon_hours / (horizon_hours + excess)
    }
}
