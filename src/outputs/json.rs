//! JSON report writer.

use crate::models::DatelineReport;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write `report` to `{json_output_dir}/{local_date}/{time_of_day}.json`.
///
/// A second run in the same part of the day replaces the earlier file.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_report(report: &DatelineReport, json_output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;

    let dir = PathBuf::from(json_output_dir).join(&report.local_date);
    if let Err(e) = fs::create_dir_all(&dir).await {
        error!(dir = %dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = dir.join(format!("{}.json", report.time_of_day));
    fs::write(&path, json).await?;
    info!(
        path = %path.display(),
        articles = report.articles.len(),
        included = report.included_count(),
        "Wrote dateline report"
    );
    Ok(path)
}
