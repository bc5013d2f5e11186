use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single file inside a shared directory. Only `filename` and `size` are
/// interpreted here; whatever else the peer reports (bit rate, duration,
/// sample rate, ...) rides along untouched in `attributes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// A shared directory as reported by the remote peer: a full path plus the
/// files directly inside it. `locked` is tagged on during the merge of the
/// restricted listing, it is not sent by the peer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub locked: bool,
}

/// A node in the browsable forest. `children` holds every reported
/// directory exactly one path segment deeper whose name extends this
/// node's own name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub name: String,
    pub locked: bool,
    pub files: Vec<FileRecord>,
    pub children: Vec<DirectoryNode>,
}

impl DirectoryNode {
    /// Copy of this node with its subtree dropped. The detail view only
    /// needs the node's own files, not its descendants.
    pub fn without_children(&self) -> Self {
        Self {
            children: Vec::new(),
            ..self.clone()
        }
    }
}

/// Pick the path separator used by a share listing: the first directory
/// whose name contains a backslash or slash decides, backslash winning
/// when a name contains both. Only the unrestricted listing is scanned,
/// so locked directories never influence the choice.
pub fn infer_separator(directories: &[DirectoryRecord]) -> Option<char> {
    directories.iter().find_map(|directory| {
        if directory.name.contains('\\') {
            Some('\\')
        } else if directory.name.contains('/') {
            Some('/')
        } else {
            None
        }
    })
}

/// Number of path segments in `name`. Purely lexical; with no separator
/// every name is a single segment.
fn depth_of(name: &str, separator: Option<char>) -> usize {
    match separator {
        Some(separator) => name.split(separator).count(),
        None => 1,
    }
}

/// Arrange a flat share listing into a forest of directory nodes.
///
/// Records are bucketed by lexical depth in a single pass, preserving the
/// order the peer sent within each bucket. The shallowest bucket forms the
/// forest roots, and each node adopts the records one bucket deeper whose
/// names start with its own. An empty listing, or a listing whose first
/// record carries no name, yields an empty forest.
pub fn build_forest(
    directories: &[DirectoryRecord],
    separator: Option<char>,
) -> Vec<DirectoryNode> {
    if directories
        .first()
        .is_none_or(|directory| directory.name.is_empty())
    {
        return Vec::new();
    }

    let mut depths: BTreeMap<usize, Vec<&DirectoryRecord>> = BTreeMap::new();
    for directory in directories {
        depths
            .entry(depth_of(&directory.name, separator))
            .or_default()
            .push(directory);
    }

    let Some((&min_depth, roots)) = depths.first_key_value() else {
        return Vec::new();
    };

    roots
        .iter()
        .map(|directory| expand(&depths, directory, min_depth + 1))
        .collect()
}

fn expand(
    depths: &BTreeMap<usize, Vec<&DirectoryRecord>>,
    directory: &DirectoryRecord,
    child_depth: usize,
) -> DirectoryNode {
    let children = depths.get(&child_depth).map_or_else(Vec::new, |bucket| {
        bucket
            .iter()
            .filter(|candidate| candidate.name.starts_with(&directory.name))
            .map(|candidate| expand(depths, candidate, child_depth + 1))
            .collect()
    });

    DirectoryNode {
        name: directory.name.clone(),
        locked: directory.locked,
        files: directory.files.clone(),
        children,
    }
}
