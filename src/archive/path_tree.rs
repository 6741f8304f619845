//! Path tree builder
//!
//! Converts the flat, slash-delimited entry names of a zip file into a tree
//! keyed by path segment, and back. The same tree is used to report archive
//! contents to callers and to perform removals in the streaming merge backend.

use crate::models::ArchiveEntry;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

/// A node of an [`EntryTree`].
///
/// A `Leaf` is a real archive entry. A `Branch` only exists to hold children;
/// a branch left without children after a removal is not an entry and is
/// skipped when flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Leaf { is_directory: bool },
    Branch { children: BTreeMap<String, TreeNode> },
}

impl TreeNode {
    fn branch() -> Self {
        TreeNode::Branch {
            children: BTreeMap::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }
}

/// Hierarchical view of an archive's entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryTree {
    root: BTreeMap<String, TreeNode>,
}

/// Split an entry path into its segments and directory flag.
///
/// `"a/b/"` becomes `(["a", "b"], true)`, `"/"` becomes `([""], true)`.
fn split_path(path: &str) -> (Vec<&str>, bool) {
    let is_directory = path.ends_with('/');
    let trimmed = if is_directory {
        &path[..path.len() - 1]
    } else {
        path
    };
    (trimmed.split('/').collect(), is_directory)
}

impl EntryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from raw entry names.
    ///
    /// A lone `/` entry for the archive root is dropped when anything else is
    /// present. Entries with a leading slash stay under the `""` segment.
    pub fn build<I, S>(entry_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        for path in entry_paths {
            tree.insert(path.as_ref());
        }
        if tree.root.len() > 1 && tree.has_root_marker() {
            tree.root.remove("");
        }
        tree
    }

    /// The `/` entry itself, as opposed to a subtree of leading-slash paths.
    fn has_root_marker(&self) -> bool {
        matches!(self.root.get(""), Some(TreeNode::Leaf { is_directory: true }))
    }

    pub fn from_entries(entries: &[ArchiveEntry]) -> Self {
        Self::build(entries.iter().map(|entry| entry.path.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn children(&self) -> &BTreeMap<String, TreeNode> {
        &self.root
    }

    /// Insert a single entry path.
    pub fn insert(&mut self, path: &str) {
        if path.is_empty() {
            return;
        }
        let (segments, is_directory) = split_path(path);
        let Some((last, parents)) = segments.split_last() else {
            return;
        };

        let mut children = &mut self.root;
        for segment in parents {
            let node = children
                .entry((*segment).to_string())
                .or_insert_with(TreeNode::branch);
            // A leaf that gains children is implied by them.
            if node.is_leaf() {
                *node = TreeNode::branch();
            }
            children = match node {
                TreeNode::Branch { children } => children,
                TreeNode::Leaf { .. } => unreachable!("leaf replaced by branch above"),
            };
        }

        match children.get(*last) {
            Some(TreeNode::Branch { children: existing }) if !existing.is_empty() => {}
            _ => {
                children.insert((*last).to_string(), TreeNode::Leaf { is_directory });
            }
        }
    }

    /// Remove `path` and, for a directory path, everything beneath it.
    ///
    /// A path with a trailing slash only matches a directory. A path without
    /// one matches whatever node sits there, so `lib` also removes the `lib/`
    /// folder. Returns whether anything was removed; a missing path is not an
    /// error.
    pub fn remove(&mut self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        let (segments, is_directory) = split_path(path);
        let Some((last, parents)) = segments.split_last() else {
            return false;
        };

        let mut children = &mut self.root;
        for segment in parents {
            children = match children.get_mut(*segment) {
                Some(TreeNode::Branch { children }) => children,
                _ => return false,
            };
        }

        let matches_kind = match children.get(*last) {
            Some(TreeNode::Leaf { is_directory: leaf_dir }) => *leaf_dir || !is_directory,
            Some(TreeNode::Branch { .. }) => true,
            None => false,
        };
        if matches_kind {
            children.remove(*last);
        }
        matches_kind
    }

    /// Remove only an entry of exactly the kind `path` names: a file for a
    /// slash-less path, a directory for one ending in `/`.
    pub fn remove_exact(&mut self, path: &str) -> bool {
        self.contains(path) && self.remove(path)
    }

    /// Whether a node of the matching kind still exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        let (segments, is_directory) = split_path(path);
        let Some((last, parents)) = segments.split_last() else {
            return false;
        };
        let mut children = &self.root;
        for segment in parents {
            children = match children.get(*segment) {
                Some(TreeNode::Branch { children }) => children,
                _ => return false,
            };
        }
        match children.get(*last) {
            Some(TreeNode::Leaf { is_directory: leaf_dir }) => *leaf_dir == is_directory,
            Some(TreeNode::Branch { .. }) => is_directory,
            None => false,
        }
    }

    /// Walk the tree depth-first and return every real entry with its full
    /// path restored.
    pub fn flatten_leaves(&self) -> Vec<ArchiveEntry> {
        let mut leaves = Vec::new();
        collect_leaves(&self.root, None, &mut leaves);
        leaves
    }
}

/// `prefix` is `None` only at the root, so a `""` segment restores the
/// leading slash.
fn collect_leaves(
    children: &BTreeMap<String, TreeNode>,
    prefix: Option<&str>,
    out: &mut Vec<ArchiveEntry>,
) {
    for (name, node) in children {
        let path = match prefix {
            None => name.clone(),
            Some(prefix) => format!("{}/{}", prefix, name),
        };
        match node {
            TreeNode::Leaf { is_directory: true } => out.push(ArchiveEntry::directory(path)),
            TreeNode::Leaf { is_directory: false } => out.push(ArchiveEntry::file(path)),
            TreeNode::Branch { children } => collect_leaves(children, Some(&path), out),
        }
    }
}

/// Serialises to the caller-facing shape: directories are nested objects and
/// files are empty strings.
impl Serialize for EntryTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let visible = self
            .root
            .iter()
            .filter(|(name, node)| !(name.is_empty() && node.is_leaf()));
        let mut map = serializer.serialize_map(None)?;
        for (name, node) in visible {
            map.serialize_entry(name, node)?;
        }
        map.end()
    }
}

impl Serialize for TreeNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TreeNode::Leaf { is_directory: false } => serializer.serialize_str(""),
            TreeNode::Leaf { is_directory: true } => serializer.serialize_map(Some(0))?.end(),
            TreeNode::Branch { children } => {
                let mut map = serializer.serialize_map(Some(children.len()))?;
                for (name, node) in children {
                    map.serialize_entry(name, node)?;
                }
                map.end()
            }
        }
    }
}
