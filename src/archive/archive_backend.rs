use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::warn;

use super::path_tree::EntryTree;
use super::source_walker::{walk_source_directory, PlannedEntry};
use crate::error::{ArchiveError, Result};
use crate::models::{ArchiveEntry, Operation, OperationKind};

/**
 * 归档后端类型
 *
 * Selected once at construction time from configuration.
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    #[serde(alias = "in-memory")]
    InMemory,
    #[serde(alias = "streaming-merge")]
    StreamingMerge,
    Helper,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::InMemory => "in_memory",
            BackendKind::StreamingMerge => "streaming_merge",
            BackendKind::Helper => "helper",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = ArchiveError;

    fn from_str(value: &str) -> Result<Self> {
        match value.replace('-', "_").as_str() {
            "in_memory" => Ok(BackendKind::InMemory),
            "streaming_merge" => Ok(BackendKind::StreamingMerge),
            "helper" => Ok(BackendKind::Helper),
            other => Err(ArchiveError::config(format!("unknown backend '{}'", other))),
        }
    }
}

/**
 * 归档后端 trait
 *
 * 定义统一的归档读写接口。所有实现都必须保证 `apply_operations`
 * 要么完整生效，要么原归档文件保持不变。
 */
#[async_trait]
pub trait ArchiveBackend: Send + Sync {
    /**
     * 后端类型
     */
    fn kind(&self) -> BackendKind;

    /**
     * 列出归档中的全部条目
     *
     * A missing archive lists as empty. An archive that is a directory or not a
     * valid zip fails with `ArchiveRead`.
     */
    async fn list_entries(&self, archive: &Path) -> Result<Vec<ArchiveEntry>>;

    /**
     * 应用已折叠的操作序列
     *
     * # 参数
     * * `archive` - 归档文件绝对路径，可以不存在
     * * `operations` - `collapse_operations` 的输出
     */
    async fn apply_operations(&self, archive: &Path, operations: &[Operation]) -> Result<()>;

    /**
     * 获取归档条目树
     */
    async fn entry_tree(&self, archive: &Path) -> Result<EntryTree> {
        let entries = self.list_entries(archive).await?;
        Ok(EntryTree::from_entries(&entries))
    }

    /**
     * 应用操作并返回更新后的条目树
     */
    async fn apply_and_describe(
        &self,
        archive: &Path,
        operations: &[Operation],
    ) -> Result<EntryTree> {
        self.apply_operations(archive, operations).await?;
        self.entry_tree(archive).await
    }
}

/// Reject a batch before anything is written: unknown `op` names, `add`
/// sources that do not exist or whose kind disagrees with the target path.
pub async fn validate_operations(archive: &Path, operations: &[Operation]) -> Result<()> {
    for operation in operations {
        match &operation.op {
            OperationKind::Add => validate_add_source(archive, operation).await?,
            OperationKind::Remove => {}
            OperationKind::Other(name) => {
                return Err(ArchiveError::UnknownOperation {
                    archive: archive.to_path_buf(),
                    op: name.clone(),
                    path: operation.path.clone(),
                });
            }
        }
    }
    Ok(())
}

async fn validate_add_source(archive: &Path, operation: &Operation) -> Result<()> {
    let wants_directory = operation.is_directory_target();

    let Some(file_path) = &operation.file_path else {
        if wants_directory {
            return Ok(());
        }
        return Err(ArchiveError::source_path(
            archive,
            &operation.path,
            None,
            "a file target requires a filePath",
        ));
    };

    let metadata = tokio::fs::metadata(file_path).await.map_err(|e| {
        ArchiveError::source_path(
            archive,
            &operation.path,
            Some(file_path.clone()),
            format!("source does not exist or is not readable: {}", e),
        )
    })?;

    if metadata.is_dir() != wants_directory {
        let reason = if wants_directory {
            "directory target requires a directory source"
        } else {
            "file target requires a file source"
        };
        return Err(ArchiveError::source_path(
            archive,
            &operation.path,
            Some(file_path.clone()),
            reason,
        ));
    }
    Ok(())
}

/// Expand one validated `add` into the entries it writes.
///
/// Blocking for directory sources: call from a blocking task.
pub fn plan_addition(archive: &Path, operation: &Operation) -> Result<Vec<PlannedEntry>> {
    match &operation.file_path {
        None => Ok(vec![PlannedEntry::Directory {
            path: operation.path.clone(),
        }]),
        Some(source) if source.is_dir() => walk_source_directory(archive, &operation.path, source),
        Some(source) => Ok(vec![PlannedEntry::File {
            path: operation.path.clone(),
            source: source.clone(),
        }]),
    }
}

/// Whether a remove should be applied at all.
pub fn is_actionable_remove(archive: &Path, operation: &Operation) -> bool {
    if operation.path.is_empty() {
        warn!(
            archive = %archive.display(),
            "Ignoring remove operation with an empty path"
        );
        return false;
    }
    true
}
