//! Output generation: the spreadsheet, the screenshot archive and the
//! work-item results file.
//!
//! # Submodules
//!
//! - [`spreadsheet`]: Writes the article register to an `.xlsx` workbook
//! - [`archive`]: Zips every captured screenshot
//! - [`json`]: Writes the per-work-item outcomes
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── pictures/
//! │   └── {phrase}/                 # emptied when the search's crawl starts
//! │       ├── screenshot-1.png
//! │       └── screenshot-2.png
//! ├── {phrase}_pictures.zip
//! ├── {phrase}_{DD-MM-YYYY HH_MM}.xlsx
//! ├── error_screenshot.png        # only after a driver failure
//! └── work_item_results.json
//! ```

pub mod archive;
pub mod json;
pub mod spreadsheet;

use crate::models::CrawlState;
use crate::register::ArticleRegister;
use crate::utils::{ensure_writable_dir, sanitize_file_stem};
use chrono::{DateTime, TimeZone};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument};

/// Archive file name for the search on `phrase`.
pub fn archive_name(phrase: &str) -> String {
    format!("{}_pictures.zip", sanitize_file_stem(phrase))
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("i/o error during export: {0}")]
    Io(#[from] std::io::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to serialize results: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub spreadsheet: PathBuf,
    pub archive: PathBuf,
    pub archived_files: usize,
}

/// Write the spreadsheet and rebuild the screenshot archive.
///
/// Nothing is written when the crawl accepted no article.
///
/// # Arguments
///
/// * `register` - Accepted articles, written in register order
/// * `state` - Crawl counters; decides whether anything was accepted
/// * `phrase` - Search phrase, embedded in both file names
/// * `output_dir` - Destination of the spreadsheet and the archive
/// * `pictures_dir` - This search's screenshot folder
/// * `now` - Timestamp embedded in the spreadsheet name
///
/// # Returns
///
/// * `Ok(None)` - Nothing accepted, nothing written
/// * `Ok(Some(ExportSummary))` - Paths written and the number of archived files
/// * `Err(ExportError)` - Filesystem, spreadsheet or zip failure
#[instrument(level = "info", skip_all, fields(%phrase, output_dir = %output_dir.display()))]
pub async fn export<Tz: TimeZone>(
    register: &ArticleRegister,
    state: &CrawlState,
    phrase: &str,
    output_dir: &Path,
    pictures_dir: &Path,
    now: DateTime<Tz>,
) -> Result<Option<ExportSummary>, ExportError>
where
    Tz::Offset: std::fmt::Display,
{
    if !state.anything_accepted() {
        info!("No article accepted; skipping export");
        return Ok(None);
    }

    ensure_writable_dir(output_dir).await?;

    let spreadsheet = output_dir.join(spreadsheet::file_name(phrase, &now));
    spreadsheet::write_register(register, &spreadsheet)?;

    let archive = output_dir.join(archive_name(phrase));
    let archived_files = archive::zip_directory(pictures_dir, &archive)?;

    info!(
        rows = register.size(),
        spreadsheet = %spreadsheet.display(),
        archived_files,
        "Export complete"
    );
    Ok(Some(ExportSummary {
        spreadsheet,
        archive,
        archived_files,
    }))
}
