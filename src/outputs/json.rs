//! JSON output of work-item outcomes.
//!
//! After a run, every processed work item is listed with either its
//! completion details or its failure code:
//!
//! ```json
//! [
//!   { "search_phrase": "economy", "number_months": 2, "state": "done",
//!     "accepted": 12, "spreadsheet": "output/economy_22-05-2024 07_00.xlsx" },
//!   { "search_phrase": "climate", "number_months": 1, "state": "failed",
//!     "exception_type": "APPLICATION", "code": "MISSING_ELEMENT", "message": "..." }
//! ]
//! ```

use super::ExportError;
use crate::models::TaskReport;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

pub const RESULTS_FILE: &str = "work_item_results.json";

/// Write `reports` to `{output_dir}/work_item_results.json`, replacing any previous run.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), count = reports.len()))]
pub async fn write_results(reports: &[TaskReport], output_dir: &Path) -> Result<PathBuf, ExportError> {
    let json = serde_json::to_string_pretty(reports)?;
    fs::create_dir_all(output_dir).await?;
    let path = output_dir.join(RESULTS_FILE);
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote work item results");
    Ok(path)
}
