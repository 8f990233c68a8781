// ABOUTME: Utility functions for path validation and display
// ABOUTME: Provides store path checks, reference-path defaults and duration formatting

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Validate a store path that must already exist
///
/// # Errors
///
/// Returns an error with a helpful message if the path is empty, does not
/// exist, or names a directory.
///
/// # Examples
///
/// ```
/// # use bucket_reconciler::utils::validate_store_path;
/// assert!(validate_store_path(std::path::Path::new("")).is_err());
/// assert!(validate_store_path(std::path::Path::new("/definitely/not/here.redb")).is_err());
/// ```
pub fn validate_store_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("Store path cannot be empty");
    }
    if !path.exists() {
        bail!(
            "Store not found: {}\n\
             Check the --chaindata / --chaindata.reference flags",
            path.display()
        );
    }
    if path.is_dir() {
        bail!(
            "Store path is a directory: {}\n\
             Expected the path of a redb database file",
            path.display()
        );
    }
    Ok(())
}

/// Reference store used when `--chaindata.reference` is not given: `<chaindata>-copy`
///
/// # Examples
///
/// ```
/// # use bucket_reconciler::utils::default_reference_path;
/// # use std::path::{Path, PathBuf};
/// assert_eq!(
///     default_reference_path(Path::new("/data/chain.redb")),
///     PathBuf::from("/data/chain.redb-copy")
/// );
/// ```
pub fn default_reference_path(chaindata: &Path) -> PathBuf {
    let mut name = OsString::from(chaindata.as_os_str());
    name.push("-copy");
    PathBuf::from(name)
}

/// Delete the store file at `path` if there is one
///
/// Returns whether a file was removed.
pub fn remove_existing_store(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    if path.is_dir() {
        bail!(
            "Refusing to remove directory {}: expected a redb database file",
            path.display()
        );
    }
    std::fs::remove_file(path)
        .with_context(|| format!("Failed to remove existing store {}", path.display()))?;
    Ok(true)
}

/// Format an elapsed time as `1h 2m 3s`, `2m 3s` or `3.2s`
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 3600 {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

/// Sanitize a table name for display in logs and reports
///
/// Removes control characters and limits the length to 100 characters.
///
/// # Examples
///
/// ```
/// # use bucket_reconciler::utils::sanitize_identifier;
/// assert_eq!(sanitize_identifier("PlainState"), "PlainState");
/// assert_eq!(sanitize_identifier("Plain\nState"), "PlainState");
///
/// // Length limit
/// let long_name = "a".repeat(200);
/// assert_eq!(sanitize_identifier(&long_name).len(), 100);
/// ```
pub fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !c.is_control())
        .take(100)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_validate_store_path() {
        let file = NamedTempFile::new().unwrap();
        assert!(validate_store_path(file.path()).is_ok());

        let dir = tempdir().unwrap();
        let err = validate_store_path(dir.path()).unwrap_err();
        assert!(err.to_string().contains("is a directory"));

        let err = validate_store_path(&dir.path().join("missing.redb")).unwrap_err();
        assert!(err.to_string().contains("Store not found"));

        assert!(validate_store_path(Path::new("")).is_err());
    }

    #[test]
    fn test_default_reference_path() {
        assert_eq!(
            default_reference_path(Path::new("chaindata")),
            PathBuf::from("chaindata-copy")
        );
    }

    #[test]
    fn test_remove_existing_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dst.redb");
        assert!(!remove_existing_store(&path).unwrap());

        std::fs::write(&path, b"old").unwrap();
        assert!(remove_existing_store(&path).unwrap());
        assert!(!path.exists());

        assert!(remove_existing_store(dir.path()).is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(3200)), "3.2s");
        assert_eq!(format_duration(Duration::from_secs(123)), "2m 3s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 2m 3s");
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("normal_table"), "normal_table");
        assert_eq!(sanitize_identifier("table\x00name"), "tablename");
        assert_eq!(sanitize_identifier("table\nname"), "tablename");

        let long_name = "a".repeat(200);
        assert_eq!(sanitize_identifier(&long_name).len(), 100);
    }
}
