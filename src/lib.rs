//! 模型归档变更引擎
//!
//! Applies batches of add/remove operations to zip model archives and
//! reports the resulting entry trees. Three interchangeable backends are
//! available: an in-memory rewrite, a streaming merge that never touches the
//! original before an atomic swap, and an external helper process.
//!
//! ```no_run
//! use model_archive::{EngineConfig, ModelArchive, Operation};
//! use std::collections::BTreeMap;
//! use std::path::Path;
//!
//! # async fn run() -> model_archive::Result<()> {
//! let facade = ModelArchive::new(&EngineConfig::default())?;
//! let mut updates = BTreeMap::new();
//! updates.insert(
//!     "archive.zip".to_string(),
//!     vec![Operation::add_directory("wlsdeploy/stores/mystore/")],
//! );
//! let trees = facade
//!     .save_contents_of_archive_files(Path::new("/projects/demo"), &updates)
//!     .await?;
//! println!("{}", serde_json::to_string_pretty(&trees)?);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod utils;

pub use archive::{
    collapse_operations, create_backend, ArchiveBackend, ArchiveContents, BackendKind, EntryTree,
    ModelArchive,
};
pub use error::{ArchiveError, Result};
pub use infrastructure::{EngineConfig, HelperConfig};
pub use models::{ArchiveEntry, Operation, OperationKind, OperationsDocument};
