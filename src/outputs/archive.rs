//! Screenshot archive.
//!
//! Every file under the pictures directory goes into one zip, stored under
//! its path relative to that directory. The archive is rebuilt from scratch
//! on each export.

use super::ExportError;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Zip `source_dir` into `archive_path`, returning the number of files stored.
#[instrument(level = "info", skip_all, fields(source_dir = %source_dir.display(), archive = %archive_path.display()))]
pub fn zip_directory(source_dir: &Path, archive_path: &Path) -> Result<usize, ExportError> {
    let mut zip = ZipWriter::new(BufWriter::new(File::create(archive_path)?));
    let options = SimpleFileOptions::default();
    let mut count = 0;

    if source_dir.is_dir() {
        for entry in WalkDir::new(source_dir).sort_by_file_name() {
            let entry = entry.map_err(|source| ExportError::Walk {
                path: source_dir.display().to_string(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(source_dir)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            zip.start_file(relative.as_str(), options)?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, &mut zip)?;
            debug!(file = %relative, "Archived");
            count += 1;
        }
    }

    zip.finish()?;
    info!(files = count, "Wrote screenshot archive");
    Ok(count)
}
