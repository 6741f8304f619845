//! 临时文件清理与归档替换工具
//!
//! Best-effort removal of the temporary artifacts a backend leaves behind and
//! the single commit point that moves a freshly written archive over the
//! original.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::retry::{retry_file_operation, RetryPolicy};
use crate::error::{ArchiveError, Result};

#[cfg(target_os = "windows")]
use super::path::remove_readonly;

#[cfg(target_os = "windows")]
use walkdir::WalkDir;

/// 尝试清理临时目录
///
/// Retries a few times, then logs and gives up. Never fails the caller.
pub async fn remove_temp_dir_best_effort(path: &Path) {
    let target = path.to_path_buf();
    let outcome = tokio::task::spawn_blocking(move || remove_dir_with_retry(&target)).await;

    match outcome {
        Ok(Ok(())) => debug!(temp_dir = %path.display(), "Removed temporary directory"),
        Ok(Err(e)) => warn!(
            temp_dir = %path.display(),
            error = %e,
            "Failed to remove temporary directory"
        ),
        Err(e) => warn!(
            temp_dir = %path.display(),
            error = %e,
            "Temporary directory cleanup task failed"
        ),
    }
}

fn remove_dir_with_retry(path: &Path) -> io::Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let name = format!("cleanup_temp_dir({})", path.display());
    retry_file_operation(&RetryPolicy::TEMP_CLEANUP, &name, || {
        #[cfg(target_os = "windows")]
        {
            // Windows：递归移除只读属性
            for entry in WalkDir::new(path).into_iter().flatten() {
                let _ = remove_readonly(entry.path());
            }
        }
        fs::remove_dir_all(path)
    })
}

/// Remove a temporary file, ignoring a file that is already gone.
///
/// Synchronous so it can run from drop guards.
pub fn remove_temp_file_best_effort(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(temp_file = %path.display(), "Removed temporary file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            temp_file = %path.display(),
            error = %e,
            "Failed to remove temporary file"
        ),
    }
}

/// Replace `original` with `replacement`.
///
/// A plain rename is tried first. When that is impossible (different
/// filesystems, for instance) the bytes are copied into a sibling of
/// `original` which is then renamed over it, so readers never observe a
/// half-written archive. Failure leaves `original` untouched and reports both
/// paths.
pub async fn swap_archive_files(replacement: &Path, original: &Path) -> Result<()> {
    let from = replacement.to_path_buf();
    let to = original.to_path_buf();

    let result = tokio::task::spawn_blocking(move || swap_blocking(&from, &to))
        .await
        .map_err(|e| swap_error(replacement, original, e.to_string()))?;

    result.map_err(|e| swap_error(replacement, original, e.to_string()))?;
    debug!(
        archive = %original.display(),
        replacement = %replacement.display(),
        "Replaced archive file"
    );
    Ok(())
}

fn swap_blocking(replacement: &Path, original: &Path) -> io::Result<()> {
    let rename_error = match retry_file_operation(&RetryPolicy::ARCHIVE_SWAP, "swap_archive", || {
        fs::rename(replacement, original)
    }) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    debug!(
        archive = %original.display(),
        error = %rename_error,
        "Rename failed, falling back to copy and persist"
    );

    let parent = parent_dir(original);
    let mut staged = NamedTempFile::new_in(&parent)?;
    let mut source = fs::File::open(replacement)?;
    io::copy(&mut source, staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    staged.persist(original).map_err(|e| e.error)?;

    if let Err(e) = fs::remove_file(replacement) {
        warn!(
            replacement = %replacement.display(),
            error = %e,
            "Failed to remove replacement archive after copy"
        );
    }
    Ok(())
}

fn swap_error(replacement: &Path, original: &Path, message: String) -> ArchiveError {
    ArchiveError::Swap {
        original: original.to_path_buf(),
        replacement: replacement.to_path_buf(),
        message,
    }
}

/// Directory that holds `path`, `.` for a bare file name.
pub fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_swap_replaces_original() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("archive.zip");
        let replacement = dir.path().join("archive.zip.new");
        fs::write(&original, b"old").unwrap();
        fs::write(&replacement, b"new").unwrap();

        swap_archive_files(&replacement, &original).await.unwrap();

        assert_eq!(fs::read(&original).unwrap(), b"new");
        assert!(!replacement.exists());
    }

    #[tokio::test]
    async fn test_swap_failure_keeps_original() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("archive.zip");
        fs::write(&original, b"old").unwrap();
        let missing = dir.path().join("missing.zip");

        let error = swap_archive_files(&missing, &original).await.unwrap_err();

        assert!(matches!(error, ArchiveError::Swap { .. }));
        assert!(error.is_write_error());
        assert_eq!(fs::read(&original).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_remove_temp_dir_best_effort() {
        let dir = TempDir::new().unwrap();
        let temp = dir.path().join("work");
        fs::create_dir_all(temp.join("nested")).unwrap();
        fs::write(temp.join("nested/file.txt"), b"x").unwrap();

        remove_temp_dir_best_effort(&temp).await;
        assert!(!temp.exists());

        // Already gone: still fine.
        remove_temp_dir_best_effort(&temp).await;
        remove_temp_file_best_effort(&temp.join("none.json"));
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir(Path::new("archive.zip")), PathBuf::from("."));
        assert_eq!(parent_dir(Path::new("/p/archive.zip")), PathBuf::from("/p"));
    }
}
