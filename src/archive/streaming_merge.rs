//! Streaming merge backend
//!
//! Never touches the original archive before the commit point:
//!
//! 1. list the existing entries and build an [`EntryTree`]
//! 2. merge the collapsed operations into a copy set and an add list
//! 3. stream a brand-new archive into a private temporary directory, raw
//!    copying kept entries and adding new ones from the filesystem
//! 4. swap the new file over the original
//! 5. remove the temporary directory, best effort

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::Builder;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::archive_backend::{
    is_actionable_remove, plan_addition, validate_operations, ArchiveBackend, BackendKind,
};
use super::path_tree::EntryTree;
use super::source_walker::PlannedEntry;
use super::zip_io::{
    entry_options, list_archive_entries, open_archive, read_entry_names, read_error,
    write_planned_entry,
};
use crate::error::{ArchiveError, Result};
use crate::models::{ArchiveEntry, Operation};
use crate::utils::{archive_stem, parent_dir, remove_temp_dir_best_effort, swap_archive_files};

/// Result of merging collapsed operations against the current listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// Existing entry names carried over unchanged.
    pub copy_set: HashSet<String>,
    /// `add` operations still in effect, in order.
    pub additions: Vec<Operation>,
}

/// Merge `operations` against the existing entry names.
///
/// Adds and removes are kept mutually exclusive: a remove drops earlier adds
/// at or under its path, and an add drops the existing entry it replaces.
/// A slash-less remove deletes the file of that name, or else the folder.
/// Explicit directory markers survive as long as nothing removed them.
pub fn merge_operations(archive: &Path, existing: &[String], operations: &[Operation]) -> MergePlan {
    let mut tree = EntryTree::build(existing);
    let mut additions: Vec<Operation> = Vec::new();

    for operation in operations {
        if operation.is_add() {
            tree.remove_exact(&operation.path);
            additions.retain(|added| added.path != operation.path);
            additions.push(operation.clone());
        } else if is_actionable_remove(archive, operation) {
            let removed = operation.path.as_str();
            if operation.is_directory_target() {
                tree.remove(removed);
                additions.retain(|added| !added.path.starts_with(removed));
            } else if additions.iter().any(|added| added.path == removed) {
                additions.retain(|added| added.path != removed);
            } else if !tree.remove_exact(removed) {
                // No file of that name: remove it as a folder.
                tree.remove(removed);
                let folder = format!("{}/", removed);
                additions.retain(|added| !added.path.starts_with(&folder));
            }
        }
    }

    let mut copy_set: HashSet<String> = tree
        .flatten_leaves()
        .into_iter()
        .map(|entry| entry.path)
        .collect();
    for name in existing {
        if name.ends_with('/') && tree.contains(name) {
            copy_set.insert(name.clone());
        }
    }

    MergePlan {
        copy_set,
        additions,
    }
}

/**
 * 流式合并后端
 *
 * `temp_dir` is the parent of the per-call working directory; the system
 * temporary directory when unset.
 */
#[derive(Debug, Clone, Default)]
pub struct StreamingMergeBackend {
    temp_dir: Option<PathBuf>,
    compression_level: Option<i64>,
}

impl StreamingMergeBackend {
    pub fn new(temp_dir: Option<PathBuf>, compression_level: Option<i64>) -> Self {
        Self {
            temp_dir,
            compression_level,
        }
    }

    fn temp_parent(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

#[async_trait]
impl ArchiveBackend for StreamingMergeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::StreamingMerge
    }

    async fn list_entries(&self, archive: &Path) -> Result<Vec<ArchiveEntry>> {
        list_archive_entries(archive).await
    }

    async fn apply_operations(&self, archive: &Path, operations: &[Operation]) -> Result<()> {
        validate_operations(archive, operations).await?;

        let listing_path = archive.to_path_buf();
        let existing = tokio::task::spawn_blocking(move || read_entry_names(&listing_path))
            .await
            .map_err(|e| ArchiveError::archive_read(archive, format!("listing task failed: {}", e)))??;

        let plan = merge_operations(archive, &existing, operations);
        debug!(
            archive = %archive.display(),
            existing = existing.len(),
            copied = plan.copy_set.len(),
            added = plan.additions.len(),
            "Merged operations against archive listing"
        );

        let temp_dir = Builder::new()
            .prefix(&format!("{}-", archive_stem(archive)))
            .tempdir_in(self.temp_parent())
            .map_err(|e| {
                ArchiveError::write(archive, format!("failed to create temporary directory: {}", e))
            })?;
        let temp_path = temp_dir.path().to_path_buf();
        debug!(temp_dir = %temp_path.display(), "Created temporary directory");

        let result = self.write_and_swap(archive, &temp_path, plan).await;

        remove_temp_dir_best_effort(&temp_path).await;
        drop(temp_dir);
        result
    }
}

impl StreamingMergeBackend {
    async fn write_and_swap(&self, archive: &Path, temp_path: &Path, plan: MergePlan) -> Result<()> {
        let file_name = archive
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "archive.zip".into());
        let new_archive = temp_path.join(file_name);

        let source = archive.to_path_buf();
        let target = new_archive.clone();
        let options = entry_options(self.compression_level);
        let written = tokio::task::spawn_blocking(move || write_merged_archive(&source, &target, &plan, options))
            .await
            .map_err(|e| ArchiveError::write(archive, format!("write task failed: {}", e)))??;
        debug!(
            archive = %archive.display(),
            new_archive = %new_archive.display(),
            entries = written,
            "Wrote new archive"
        );

        tokio::fs::create_dir_all(parent_dir(archive))
            .await
            .map_err(|e| ArchiveError::write(archive, e.to_string()))?;
        swap_archive_files(&new_archive, archive).await?;

        info!(archive = %archive.display(), entries = written, "Archive updated");
        Ok(())
    }
}

/// Build the new archive at `target`. Returns the number of entries written.
fn write_merged_archive(
    source: &Path,
    target: &Path,
    plan: &MergePlan,
    options: SimpleFileOptions,
) -> Result<usize> {
    let output = File::create(target).map_err(|e| ArchiveError::write(source, e.to_string()))?;

    let planned = plan_entries(source, &plan.additions)?;
    let planned_paths: HashSet<&str> = planned.iter().map(PlannedEntry::path).collect();
    let mut writer = ZipWriter::new(BufWriter::new(output));
    let mut written: HashSet<String> = HashSet::new();

    if let Some(mut original) = open_archive(source)? {
        for index in 0..original.len() {
            let entry = original
                .by_index_raw(index)
                .map_err(|e| read_error(source, index, e))?;
            let name = entry.name().to_string();
            if !plan.copy_set.contains(&name)
                || planned_paths.contains(name.as_str())
                || written.contains(&name)
            {
                continue;
            }
            writer
                .raw_copy_file(entry)
                .map_err(|e| ArchiveError::write(source, format!("failed to copy {}: {}", name, e)))?;
            written.insert(name);
        }
    }

    for entry in &planned {
        write_planned_entry(&mut writer, entry, options).map_err(|e| {
            ArchiveError::write(source, format!("failed to add {}: {}", entry.path(), e))
        })?;
        written.insert(entry.path().to_string());
    }

    // 先关闭 writer 刷新压缩状态，再关闭底层文件
    let sink = writer
        .finish()
        .map_err(|e| ArchiveError::write(source, e.to_string()))?;
    let file = sink
        .into_inner()
        .map_err(|e| ArchiveError::write(source, e.error().to_string()))?;
    file.sync_all()
        .map_err(|e| ArchiveError::write(source, e.to_string()))?;
    Ok(written.len())
}

/// Expand additions into entries; a later entry replaces an earlier one with
/// the same path.
fn plan_entries(archive: &Path, additions: &[Operation]) -> Result<Vec<PlannedEntry>> {
    let mut planned: Vec<PlannedEntry> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for operation in additions {
        for entry in plan_addition(archive, operation)? {
            match positions.get(entry.path()) {
                Some(&index) => planned[index] = entry,
                None => {
                    positions.insert(entry.path().to_string(), planned.len());
                    planned.push(entry);
                }
            }
        }
    }
    Ok(planned)
}
