use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/**
 * 归档错误类型 - 使用 miette 提供用户友好的错误诊断
 *
 * Every failure the engine can surface while reading or mutating a model
 * archive. Backend errors are wrapped with archive and operation context via
 * [`ArchiveError::with_context`] before they reach the facade.
 */
#[derive(Error, Debug, Diagnostic)]
pub enum ArchiveError {
    #[error("Failed to read archive file {}: {message}", .archive.display())]
    #[diagnostic(
        code(model_archive::archive_read),
        help("Ensure the archive file is a valid zip file and not a directory")
    )]
    ArchiveRead { archive: PathBuf, message: String },

    #[error("Invalid source for path {path} in archive file {}: {reason}", .archive.display())]
    #[diagnostic(
        code(model_archive::source_path),
        help("Directory targets must end with '/' and point at a directory, file targets at a file")
    )]
    SourcePath {
        archive: PathBuf,
        path: String,
        file_path: Option<PathBuf>,
        reason: String,
    },

    #[error("Unknown operation '{op}' for path {path} in archive file {}", .archive.display())]
    #[diagnostic(
        code(model_archive::unknown_operation),
        help("Supported operations are 'add' and 'remove'")
    )]
    UnknownOperation {
        archive: PathBuf,
        op: String,
        path: String,
    },

    #[error("Failed to write archive file {}: {message}", .archive.display())]
    #[diagnostic(code(model_archive::write))]
    Write { archive: PathBuf, message: String },

    #[error(
        "Failed to replace archive file {} with updated archive file {}: {message}",
        .original.display(),
        .replacement.display()
    )]
    #[diagnostic(
        code(model_archive::swap),
        help("The original archive was not modified; the updated archive may still exist at the replacement path")
    )]
    Swap {
        original: PathBuf,
        replacement: PathBuf,
        message: String,
    },

    #[error("Archive helper failed: {message}")]
    #[diagnostic(code(model_archive::external_process))]
    ExternalProcess {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(model_archive::config_error))]
    Config(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(model_archive::io_error))]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    #[diagnostic(code(model_archive::json_error))]
    Json(#[from] serde_json::Error),

    #[error("{context}")]
    #[diagnostic(code(model_archive::context))]
    Context {
        context: String,
        #[source]
        source: Box<ArchiveError>,
    },
}

impl ArchiveError {
    /**
     * 为错误添加上下文信息
     */
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ArchiveError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context wrappers.
    pub fn root(&self) -> &ArchiveError {
        let mut current = self;
        while let ArchiveError::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// True for failures while producing or committing the new archive file.
    pub fn is_write_error(&self) -> bool {
        matches!(
            self.root(),
            ArchiveError::Write { .. } | ArchiveError::Swap { .. }
        )
    }

    pub fn archive_read(archive: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ArchiveError::ArchiveRead {
            archive: archive.into(),
            message: message.into(),
        }
    }

    pub fn write(archive: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ArchiveError::Write {
            archive: archive.into(),
            message: message.into(),
        }
    }

    pub fn source_path(
        archive: impl Into<PathBuf>,
        path: impl Into<String>,
        file_path: Option<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        ArchiveError::SourcePath {
            archive: archive.into(),
            path: path.into(),
            file_path,
            reason: reason.into(),
        }
    }

    pub fn external_process(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        ArchiveError::ExternalProcess {
            message: message.into(),
            exit_code,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        ArchiveError::Config(message.into())
    }
}

/**
 * 统一结果类型
 */
pub type Result<T> = std::result::Result<T, ArchiveError>;
