use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::Builder;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use super::archive_backend::{
    is_actionable_remove, plan_addition, validate_operations, ArchiveBackend, BackendKind,
};
use super::source_walker::PlannedEntry;
use super::zip_io::{entry_options, list_archive_entries, read_error, write_planned_entry};
use crate::error::{ArchiveError, Result};
use crate::models::{ArchiveEntry, Operation};
use crate::utils::{archive_stem, parent_dir};

/**
 * 内存重写后端
 *
 * Loads the whole archive into memory, edits the entry list in place and
 * serialises the result. The new archive goes to a sibling temporary file that
 * is atomically persisted over the original, so a failed write never
 * truncates it.
 */
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    compression_level: Option<i64>,
}

impl InMemoryBackend {
    pub fn new(compression_level: Option<i64>) -> Self {
        Self { compression_level }
    }
}

/// Where the bytes of an in-memory entry come from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    /// Index into the loaded archive; copied raw.
    Existing(usize),
    Planned(PlannedEntry),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MemoryEntry {
    name: String,
    slot: Slot,
}

/// Ordered entry list with the add/remove semantics of a loaded zip object.
///
/// `index` maps each name to its position in `entries`.
#[derive(Debug, Default)]
struct MemoryArchive {
    entries: Vec<MemoryEntry>,
    index: HashMap<String, usize>,
}

impl MemoryArchive {
    fn put(&mut self, name: String, slot: Slot) {
        match self.index.get(&name) {
            Some(&position) => self.entries[position].slot = slot,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push(MemoryEntry { name, slot });
            }
        }
    }

    /// Exact file match deletes that file. Otherwise the path is treated as a
    /// folder and every entry under it goes, the folder marker included.
    fn remove(&mut self, path: &str) -> usize {
        let before = self.entries.len();

        if !path.ends_with('/') {
            if let Some(position) = self.index.remove(path) {
                self.entries.remove(position);
                self.reindex_from(position);
                return 1;
            }
        }

        let mut prefix = path.to_string();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        if self.entries.iter().any(|entry| entry.name.starts_with(&prefix)) {
            self.entries.retain(|entry| !entry.name.starts_with(&prefix));
            self.index.retain(|name, _| !name.starts_with(&prefix));
            self.reindex_from(0);
        }
        before - self.entries.len()
    }

    fn reindex_from(&mut self, start: usize) {
        for (position, entry) in self.entries.iter().enumerate().skip(start) {
            if let Some(slot) = self.index.get_mut(&entry.name) {
                *slot = position;
            }
        }
    }
}

#[async_trait]
impl ArchiveBackend for InMemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::InMemory
    }

    async fn list_entries(&self, archive: &Path) -> Result<Vec<ArchiveEntry>> {
        list_archive_entries(archive).await
    }

    async fn apply_operations(&self, archive: &Path, operations: &[Operation]) -> Result<()> {
        validate_operations(archive, operations).await?;

        if tokio::fs::metadata(archive).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(ArchiveError::archive_read(
                archive,
                "path is a directory, not an archive file",
            ));
        }

        // 将整个归档读入内存
        let bytes = match tokio::fs::read(archive).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(ArchiveError::archive_read(archive, e.to_string())),
        };

        let archive_path = archive.to_path_buf();
        let operations = operations.to_vec();
        let options = entry_options(self.compression_level);

        tokio::task::spawn_blocking(move || rewrite_archive(&archive_path, bytes, &operations, options))
            .await
            .map_err(|e| ArchiveError::write(archive, format!("rewrite task failed: {}", e)))??;

        info!(archive = %archive.display(), "Archive rewritten in memory");
        Ok(())
    }
}

fn rewrite_archive(
    archive: &Path,
    bytes: Option<Vec<u8>>,
    operations: &[Operation],
    options: SimpleFileOptions,
) -> Result<()> {
    let mut loaded = match bytes {
        Some(bytes) => Some(
            ZipArchive::new(Cursor::new(bytes))
                .map_err(|e| ArchiveError::archive_read(archive, format!("not a valid zip file: {}", e)))?,
        ),
        None => None,
    };

    let mut memory = MemoryArchive::default();
    if let Some(zip) = loaded.as_mut() {
        for index in 0..zip.len() {
            let name = zip
                .by_index_raw(index)
                .map_err(|e| read_error(archive, index, e))?
                .name()
                .to_string();
            memory.put(name, Slot::Existing(index));
        }
    }

    let parent = parent_dir(archive);
    std::fs::create_dir_all(&parent).map_err(|e| ArchiveError::write(archive, e.to_string()))?;
    let mut staged = Builder::new()
        .prefix(&format!(".{}-", archive_stem(archive)))
        .suffix(".zip.tmp")
        .tempfile_in(&parent)
        .map_err(|e| ArchiveError::write(archive, format!("failed to create temporary file: {}", e)))?;

    for operation in operations {
        if operation.is_add() {
            for planned in plan_addition(archive, operation)? {
                memory.put(planned.path().to_string(), Slot::Planned(planned));
            }
        } else if is_actionable_remove(archive, operation) {
            let removed = memory.remove(&operation.path);
            debug!(
                archive = %archive.display(),
                path = %operation.path,
                removed,
                "Applied remove operation"
            );
        }
    }

    {
        let mut writer = ZipWriter::new(staged.as_file_mut());
        for entry in &memory.entries {
            match (&entry.slot, loaded.as_mut()) {
                (Slot::Existing(index), Some(zip)) => {
                    let raw = zip
                        .by_index_raw(*index)
                        .map_err(|e| read_error(archive, *index, e))?;
                    writer
                        .raw_copy_file(raw)
                        .map_err(|e| ArchiveError::write(archive, e.to_string()))?;
                }
                (Slot::Existing(_), None) => {}
                (Slot::Planned(planned), _) => {
                    write_planned_entry(&mut writer, planned, options).map_err(|e| {
                        ArchiveError::write(archive, format!("failed to add {}: {}", planned.path(), e))
                    })?;
                }
            }
        }
        let sink = writer
            .finish()
            .map_err(|e| ArchiveError::write(archive, e.to_string()))?;
        sink.flush()
            .map_err(|e| ArchiveError::write(archive, e.to_string()))?;
    }

    staged
        .as_file()
        .sync_all()
        .map_err(|e| ArchiveError::write(archive, e.to_string()))?;
    staged
        .persist(archive)
        .map_err(|e| ArchiveError::write(archive, format!("failed to replace archive: {}", e.error)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(names: &[&str]) -> MemoryArchive {
        let mut memory = MemoryArchive::default();
        for (index, name) in names.iter().enumerate() {
            memory.put(name.to_string(), Slot::Existing(index));
        }
        memory
    }

    fn names(memory: &MemoryArchive) -> Vec<&str> {
        memory.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    #[test]
    fn test_put_overwrites_in_place() {
        let mut memory = memory(&["a.txt", "b.txt"]);
        memory.put(
            "a.txt".to_string(),
            Slot::Planned(PlannedEntry::Directory {
                path: "a.txt".to_string(),
            }),
        );
        assert_eq!(names(&memory), vec!["a.txt", "b.txt"]);
        assert!(matches!(memory.entries[0].slot, Slot::Planned(_)));
    }

    #[test]
    fn test_remove_file_and_folder() {
        let mut memory = memory(&["lib/", "lib/a.jar", "lib/sub/b.jar", "library.txt", "x.txt"]);

        assert_eq!(memory.remove("x.txt"), 1);
        assert_eq!(memory.remove("lib/"), 3);
        assert_eq!(names(&memory), vec!["library.txt"]);
    }

    #[test]
    fn test_remove_without_slash_falls_back_to_folder() {
        let mut memory = memory(&["lib/a.jar", "lib.txt"]);
        assert_eq!(memory.remove("lib"), 1);
        assert_eq!(names(&memory), vec!["lib.txt"]);
    }

    #[test]
    fn test_index_tracks_positions_after_removal() {
        let mut memory = memory(&["a.txt", "lib/x.jar", "b.txt", "c.txt"]);
        assert_eq!(memory.remove("a.txt"), 1);
        assert_eq!(memory.remove("lib"), 1);

        memory.put(
            "c.txt".to_string(),
            Slot::Planned(PlannedEntry::Directory {
                path: "c.txt".to_string(),
            }),
        );
        memory.put("d.txt".to_string(), Slot::Existing(9));

        assert_eq!(names(&memory), vec!["b.txt", "c.txt", "d.txt"]);
        assert!(matches!(memory.entries[1].slot, Slot::Planned(_)));
        for (position, entry) in memory.entries.iter().enumerate() {
            assert_eq!(memory.index[&entry.name], position);
        }
    }

    #[test]
    fn test_put_many_entries_then_overwrite() {
        let mut memory = MemoryArchive::default();
        for index in 0..50_000 {
            memory.put(format!("wlsdeploy/lib/{}.jar", index), Slot::Existing(index));
        }
        memory.put("wlsdeploy/lib/7.jar".to_string(), Slot::Existing(0));
        assert_eq!(memory.entries.len(), 50_000);
        assert_eq!(memory.entries[7].slot, Slot::Existing(0));
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut memory = memory(&["a.txt"]);
        assert_eq!(memory.remove("missing/"), 0);
        assert_eq!(memory.remove("missing.txt"), 0);
        assert_eq!(names(&memory), vec!["a.txt"]);
    }
}
