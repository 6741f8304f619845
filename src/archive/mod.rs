/**
 * 归档变更引擎
 *
 * 折叠用户操作、选择后端并将结果写回 zip 归档文件。
 */
pub mod archive_backend;
pub mod collapse;
pub mod helper_backend;
pub mod in_memory;
pub mod model_archive;
pub mod path_tree;
pub mod source_walker;
pub mod streaming_merge;
pub mod zip_io;


pub use archive_backend::{ArchiveBackend, BackendKind};
pub use collapse::collapse_operations;
pub use helper_backend::HelperBackend;
pub use in_memory::InMemoryBackend;
pub use model_archive::{ArchiveContents, ModelArchive};
pub use path_tree::{EntryTree, TreeNode};
pub use source_walker::PlannedEntry;
pub use streaming_merge::{merge_operations, MergePlan, StreamingMergeBackend};

use crate::error::Result;
use crate::infrastructure::config::EngineConfig;

/**
 * 根据配置创建归档后端
 */
pub fn create_backend(config: &EngineConfig) -> Result<Box<dyn ArchiveBackend>> {
    config.ensure_valid()?;

    let backend: Box<dyn ArchiveBackend> = match config.backend {
        BackendKind::InMemory => Box::new(InMemoryBackend::new(config.compression_level)),
        BackendKind::StreamingMerge => Box::new(StreamingMergeBackend::new(
            config.temp_dir.clone(),
            config.compression_level,
        )),
        BackendKind::Helper => Box::new(HelperBackend::new(
            config.helper_config()?.clone(),
            config.temp_dir.clone(),
        )),
    };
    Ok(backend)
}
