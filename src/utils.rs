//! Utility functions for file names, log output and output directories.

use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut at the nearest character boundary at or below
/// `max` bytes, with an ellipsis and the number of dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Make a search phrase safe to use as a file name stem.
///
/// Path separators and characters rejected by common filesystems become `_`.
pub fn sanitize_file_stem(phrase: &str) -> String {
    phrase
        .trim()
        .replace(
            |c: char| matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || c.is_control(),
            "_",
        )
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    fs::File::create(&probe_path).await?;
    let _ = fs::remove_file(&probe_path).await;
    info!("Output directory is writable");
    Ok(())
}

/// Remove everything inside `path`, creating it when missing.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn clear_dir(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::create_dir_all(path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_char_boundary() {
        let result = truncate_for_log("héllo", 2);
        assert_eq!(result, "h…(+5 bytes)");
    }

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("economy"), "economy");
        assert_eq!(sanitize_file_stem(" climate change "), "climate change");
        assert_eq!(sanitize_file_stem("AI/ML: what?"), "AI_ML_ what_");
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(std::fs::read_dir(&nested).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_clear_dir_removes_leftovers() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("pictures").join("economy");
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("screenshot-1.png"), b"old").unwrap();
        std::fs::write(dir.join("nested").join("screenshot-2.png"), b"old").unwrap();

        clear_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);

        let missing = tmp.path().join("fresh");
        clear_dir(&missing).await.unwrap();
        assert!(missing.is_dir());
    }
}
