//! Time-bounded delegation to the content scanner.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::scanner::ContentDateScanner;

/// Ask `scanner` for a date, giving up after `budget`.
///
/// The scan runs on its own task: a timeout aborts it, and errors or panics
/// inside the scanner are logged and reported as no candidate.
pub async fn scan_with_budget(
    scanner: Arc<dyn ContentDateScanner>,
    title: &str,
    body: &str,
    budget: Duration,
) -> Option<DateTime<Utc>> {
    let t0 = Instant::now();
    let title = title.to_string();
    let body = body.to_string();
    let mut handle = tokio::spawn(async move { scanner.scan_for_date(&title, &body).await });

    match timeout(budget, &mut handle).await {
        Ok(Ok(Ok(found))) => {
            debug!(elapsed_ms = t0.elapsed().as_millis() as u64, found = ?found, "Content scan returned");
            found
        }
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "Content scanner failed; no candidate");
            None
        }
        Ok(Err(join_error)) => {
            warn!(error = %join_error, "Content scanner task aborted; no candidate");
            None
        }
        Err(_) => {
            handle.abort();
            warn!(budget_ms = budget.as_millis() as u64, "Content scan timed out; no candidate");
            None
        }
    }
}
