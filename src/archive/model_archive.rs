use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use super::archive_backend::{ArchiveBackend, BackendKind};
use super::collapse::collapse_operations;
use super::create_backend;
use super::path_tree::EntryTree;
use crate::error::{ArchiveError, Result};
use crate::infrastructure::config::EngineConfig;
use crate::models::Operation;
use crate::utils::resolve_archive_path;

/// Archive file name, as the caller supplied it, to its entry tree.
pub type ArchiveContents = BTreeMap<String, EntryTree>;

/**
 * 模型归档门面
 *
 * Resolves archive names against the project directory, collapses each
 * archive's operations and drives the configured backend. Archives are
 * processed one after another; the first failure rejects the whole call.
 */
pub struct ModelArchive {
    backend: Box<dyn ArchiveBackend>,
}

impl ModelArchive {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self::with_backend(create_backend(config)?))
    }

    pub fn with_backend(backend: Box<dyn ArchiveBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /**
     * 读取归档文件内容
     *
     * `None` when no archive names were given. Every named archive must exist
     * and be a zip file.
     */
    pub async fn get_contents_of_archive_files(
        &self,
        base_dir: &Path,
        archive_files: Option<&[String]>,
    ) -> Result<Option<ArchiveContents>> {
        let archive_files = match archive_files {
            Some(files) if !files.is_empty() => files,
            _ => return Ok(None),
        };

        let mut contents = ArchiveContents::new();
        for archive_file in archive_files {
            let archive = resolve_archive_path(base_dir, archive_file);
            let tree = self
                .read_archive(&archive)
                .await
                .map_err(|e| reject("read", &archive, e))?;
            contents.insert(archive_file.clone(), tree);
        }
        Ok(Some(contents))
    }

    async fn read_archive(&self, archive: &Path) -> Result<EntryTree> {
        match tokio::fs::metadata(archive).await {
            Ok(metadata) if metadata.is_dir() => Err(ArchiveError::archive_read(
                archive,
                "path is a directory, not an archive file",
            )),
            Ok(_) => self.backend.entry_tree(archive).await,
            Err(e) => Err(ArchiveError::archive_read(archive, e.to_string())),
        }
    }

    /**
     * 保存归档文件内容
     *
     * # 参数
     * * `base_dir` - 项目目录，相对归档路径以此解析
     * * `updates` - 归档文件名到用户操作列表的映射
     *
     * # 返回
     * * 每个至少有一个有效操作的归档的更新后条目树
     */
    pub async fn save_contents_of_archive_files(
        &self,
        base_dir: &Path,
        updates: &BTreeMap<String, Vec<Operation>>,
    ) -> Result<ArchiveContents> {
        let mut contents = ArchiveContents::new();

        for (archive_file, user_operations) in updates {
            let operations = collapse_operations(user_operations);
            if operations.is_empty() {
                debug!(archive_file = %archive_file, "No operations for archive, skipping");
                continue;
            }

            let archive: PathBuf = resolve_archive_path(base_dir, archive_file);
            debug!(
                archive = %archive.display(),
                requested = user_operations.len(),
                collapsed = operations.len(),
                backend = %self.backend.kind(),
                "Saving archive file"
            );

            let tree = self
                .backend
                .apply_and_describe(&archive, &operations)
                .await
                .map_err(|e| reject("save", &archive, e))?;

            info!(
                archive = %archive.display(),
                operations = operations.len(),
                "Saved archive file"
            );
            contents.insert(archive_file.clone(), tree);
        }
        Ok(contents)
    }
}

fn reject(action: &str, archive: &Path, error: ArchiveError) -> ArchiveError {
    error!(archive = %archive.display(), error = %error, "Failed to {} archive file", action);
    error.with_context(format!("Failed to {} archive file {}", action, archive.display()))
}
