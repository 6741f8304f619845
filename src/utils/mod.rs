//! 通用工具函数模块
//!
//! 提供路径处理、重试机制、日志初始化和清理功能等通用工具。

pub mod cleanup;
pub mod logging;
pub mod path;
pub mod retry;

pub use cleanup::{
    parent_dir, remove_temp_dir_best_effort, remove_temp_file_best_effort, swap_archive_files,
};
pub use logging::init_logging;
pub use path::{archive_stem, resolve_archive_path, to_archive_path};
pub use retry::{retry_file_operation, RetryPolicy};
