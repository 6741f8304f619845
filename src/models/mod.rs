//! 数据模型模块
//!
//! Plain data exchanged between the facade, the collapser and the backends.

pub mod entry;
pub mod operation;

pub use entry::ArchiveEntry;
pub use operation::{Operation, OperationKind, OperationsDocument};
