//! Archive entry descriptor

use serde::{Deserialize, Serialize};

/// An item inside an archive, identified by its forward-slash path.
///
/// Directory entries end with `/` and carry no content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub path: String,
    pub is_directory: bool,
}

impl ArchiveEntry {
    /// Build an entry from a raw zip name, inferring directory-ness from the
    /// trailing slash.
    pub fn from_name(name: impl Into<String>) -> Self {
        let path = name.into();
        let is_directory = path.ends_with('/');
        Self { path, is_directory }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self {
            path,
            is_directory: true,
        }
    }
}
