//! Archive operation wire format
//!
//! The same JSON shape is used by callers of the facade and as the input file
//! handed to the external archive helper:
//!
//! ```json
//! { "operations": [
//!   { "op": "add", "path": "wlsdeploy/applications/foo.war", "filePath": "/abs/foo.war" },
//!   { "op": "add", "path": "wlsdeploy/stores/mystore/" },
//!   { "op": "remove", "path": "wlsdeploy/libraries/" }
//! ]}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The `op` field of an operation.
///
/// Unrecognised names are kept as [`OperationKind::Other`] so that a batch can
/// be rejected with a precise error instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationKind {
    Add,
    Remove,
    Other(String),
}

impl OperationKind {
    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::Add => "add",
            OperationKind::Remove => "remove",
            OperationKind::Other(name) => name,
        }
    }
}

impl From<String> for OperationKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "add" => OperationKind::Add,
            "remove" => OperationKind::Remove,
            _ => OperationKind::Other(value),
        }
    }
}

impl From<OperationKind> for String {
    fn from(value: OperationKind) -> Self {
        match value {
            OperationKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single user-requested mutation of an archive.
///
/// `path` always uses forward slashes; a trailing `/` marks a directory
/// target. `file_path` is the filesystem source of an `add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub op: OperationKind,
    pub path: String,
    #[serde(
        rename = "filePath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub file_path: Option<PathBuf>,
}

impl Operation {
    /// Add (or replace) `path` with the file or directory at `file_path`.
    pub fn add(path: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            op: OperationKind::Add,
            path: path.into(),
            file_path: Some(file_path.into()),
        }
    }

    /// Add an empty directory entry. `path` should end with `/`.
    pub fn add_directory(path: impl Into<String>) -> Self {
        Self {
            op: OperationKind::Add,
            path: path.into(),
            file_path: None,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: OperationKind::Remove,
            path: path.into(),
            file_path: None,
        }
    }

    pub fn is_directory_target(&self) -> bool {
        self.path.ends_with('/')
    }

    pub fn is_add(&self) -> bool {
        self.op == OperationKind::Add
    }

    pub fn is_remove(&self) -> bool {
        self.op == OperationKind::Remove
    }
}

/// `{ "operations": [...] }` document exchanged with the archive helper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationsDocument {
    pub operations: Vec<Operation>,
}

impl OperationsDocument {
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_round_trip() {
        let json = r#"{ "operations": [
            { "op": "add", "path": "wlsdeploy/applications/foo.war", "filePath": "/abs/foo.war" },
            { "op": "add", "path": "wlsdeploy/stores/mystore/" },
            { "op": "remove", "path": "wlsdeploy/libraries/" }
        ]}"#;

        let document: OperationsDocument = serde_json::from_str(json).unwrap();
        assert_eq!(
            document.operations,
            vec![
                Operation::add("wlsdeploy/applications/foo.war", "/abs/foo.war"),
                Operation::add_directory("wlsdeploy/stores/mystore/"),
                Operation::remove("wlsdeploy/libraries/"),
            ]
        );

        let value = serde_json::to_value(&document).unwrap();
        let removed = &value["operations"][2];
        assert_eq!(removed["op"], "remove");
        assert!(removed.get("filePath").is_none());
        assert_eq!(value["operations"][0]["filePath"], "/abs/foo.war");
    }

    #[test]
    fn test_unknown_operation_is_preserved() {
        let operation: Operation =
            serde_json::from_str(r#"{ "op": "rename", "path": "a.txt" }"#).unwrap();
        assert_eq!(operation.op, OperationKind::Other("rename".to_string()));
        assert_eq!(operation.op.to_string(), "rename");
        assert!(!operation.is_add());
        assert!(!operation.is_remove());
    }

    #[test]
    fn test_directory_target() {
        assert!(Operation::add_directory("lib/").is_directory_target());
        assert!(!Operation::remove("lib/a.jar").is_directory_target());
    }
}
