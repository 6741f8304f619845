//! Recursive directory add
//!
//! Expands a filesystem directory into the archive entries that adding it
//! under a directory target produces.

use crate::error::{ArchiveError, Result};
use crate::utils::path::to_archive_path;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One entry an `add` operation will write into an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedEntry {
    /// Empty directory marker, path ends with `/`.
    Directory { path: String },
    /// File whose bytes are streamed from `source`.
    File { path: String, source: PathBuf },
}

impl PlannedEntry {
    pub fn path(&self) -> &str {
        match self {
            PlannedEntry::Directory { path } | PlannedEntry::File { path, .. } => path,
        }
    }
}

/// Walk `source_root` depth-first and map everything under it onto
/// `target` (a directory path ending with `/`).
///
/// Files become file entries, directories without children become directory
/// entries. An empty root yields the target directory itself. Symbolic links
/// are followed; anything that is neither a file nor a directory is rejected.
///
/// Blocking: call from a blocking task.
pub fn walk_source_directory(
    archive: &Path,
    target: &str,
    source_root: &Path,
) -> Result<Vec<PlannedEntry>> {
    let mut planned = Vec::new();

    let walker = WalkDir::new(source_root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            let failing = e.path().unwrap_or(source_root).to_path_buf();
            ArchiveError::source_path(
                archive,
                target,
                Some(failing),
                format!("failed to walk source directory: {}", e),
            )
        })?;

        let relative = entry.path().strip_prefix(source_root).map_err(|e| {
            ArchiveError::source_path(
                archive,
                target,
                Some(entry.path().to_path_buf()),
                e.to_string(),
            )
        })?;
        let entry_path = format!("{}{}", target, to_archive_path(relative));

        let file_type = entry.file_type();
        if file_type.is_file() {
            planned.push(PlannedEntry::File {
                path: entry_path,
                source: entry.path().to_path_buf(),
            });
        } else if file_type.is_dir() {
            if is_empty_dir(archive, &entry_path, entry.path())? {
                planned.push(PlannedEntry::Directory {
                    path: format!("{}/", entry_path),
                });
            }
        } else {
            return Err(ArchiveError::source_path(
                archive,
                entry_path,
                Some(entry.path().to_path_buf()),
                "source is neither a file nor a directory",
            ));
        }
    }

    if planned.is_empty() {
        planned.push(PlannedEntry::Directory {
            path: target.to_string(),
        });
    }
    Ok(planned)
}

fn is_empty_dir(archive: &Path, entry_path: &str, dir: &Path) -> Result<bool> {
    let mut children = fs::read_dir(dir).map_err(|e| {
        ArchiveError::source_path(
            archive,
            format!("{}/", entry_path),
            Some(dir.to_path_buf()),
            format!("failed to read source directory: {}", e),
        )
    })?;
    Ok(children.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths(planned: &[PlannedEntry]) -> Vec<&str> {
        planned.iter().map(PlannedEntry::path).collect()
    }

    #[test]
    fn test_walk_maps_relative_paths_onto_target() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::write(dir.path().join("sub/b.txt"), b"b").unwrap();

        let planned = walk_source_directory(Path::new("/p/app.zip"), "libs/", dir.path()).unwrap();

        assert_eq!(paths(&planned), vec!["libs/a.txt", "libs/sub/b.txt"]);
        assert_eq!(
            planned[1],
            PlannedEntry::File {
                path: "libs/sub/b.txt".to_string(),
                source: dir.path().join("sub").join("b.txt"),
            }
        );
    }

    #[test]
    fn test_walk_keeps_empty_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        fs::write(dir.path().join("z.txt"), b"z").unwrap();

        let planned = walk_source_directory(Path::new("/p/app.zip"), "d/", dir.path()).unwrap();

        assert_eq!(paths(&planned), vec!["d/empty/", "d/z.txt"]);
        assert!(matches!(planned[0], PlannedEntry::Directory { .. }));
    }

    #[test]
    fn test_walk_empty_root_yields_target() {
        let dir = TempDir::new().unwrap();
        let planned = walk_source_directory(Path::new("/p/app.zip"), "d/", dir.path()).unwrap();
        assert_eq!(
            planned,
            vec![PlannedEntry::Directory {
                path: "d/".to_string()
            }]
        );
    }

    #[test]
    fn test_unreadable_directory_is_source_error() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("gone");

        let error = is_empty_dir(Path::new("/p/app.zip"), "libs/gone", &gone).unwrap_err();

        assert!(matches!(
            error,
            ArchiveError::SourcePath { ref path, file_path: Some(ref source), .. }
                if path == "libs/gone/" && *source == gone
        ));
    }

    #[test]
    fn test_walk_missing_root_is_source_error() {
        let dir = TempDir::new().unwrap();
        let error =
            walk_source_directory(Path::new("/p/app.zip"), "d/", &dir.path().join("missing"))
                .unwrap_err();
        assert!(matches!(error, ArchiveError::SourcePath { .. }));
    }
}
