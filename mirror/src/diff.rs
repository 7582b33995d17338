//! Tree diffing: classifies every entity of a source/target snapshot
//! pair as orphaned, missing or existing, and prunes redundant nested
//! results.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::compilable::ExtensionSet;
use crate::node::{DirNode, FileNode, NodeGroup};
use crate::paths::{keep_highest, keep_lowest};
use crate::snapshot::Snapshot;

/// Disjoint classification of both snapshots' entities. Every entity
/// of source ∪ target lands in exactly one group.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// In the target but not the source. Target-rooted nodes.
    pub orphaned: NodeGroup,
    /// In the source but not the target. Source-rooted nodes.
    pub missing: NodeGroup,
    /// Present in both, represented by their source-rooted nodes
    /// (directories by the target-rooted node, which is all the
    /// refresh pass needs).
    pub existing: NodeGroup,
}

/// Matching key for a file: the extension-stripped relative path for
/// compilable files (the compiled target carries a different
/// extension), the plain relative path otherwise.
fn file_key(file: &FileNode, compilable: &ExtensionSet) -> PathBuf {
    if compilable.is_compilable(file) {
        file.relative_stem()
    } else {
        file.relative().to_path_buf()
    }
}

/// Computes the orphaned/missing/existing classification of `target`
/// against `source`.
pub fn diff(source: &Snapshot, target: &Snapshot, compilable: &ExtensionSet) -> Classification {
    let source_file_keys: HashSet<PathBuf> = source
        .files()
        .iter()
        .map(|f| file_key(f, compilable))
        .collect();
    let target_file_keys: HashSet<PathBuf> = target
        .files()
        .iter()
        .map(|f| file_key(f, compilable))
        .collect();
    let source_dir_keys: HashSet<&std::path::Path> =
        source.directories().iter().map(DirNode::relative).collect();
    let target_dir_keys: HashSet<&std::path::Path> =
        target.directories().iter().map(DirNode::relative).collect();

    let orphaned = NodeGroup {
        files: target
            .files()
            .iter()
            .filter(|f| !source_file_keys.contains(&file_key(f, compilable)))
            .cloned()
            .collect(),
        directories: target
            .directories()
            .iter()
            .filter(|d| !source_dir_keys.contains(d.relative()))
            .cloned()
            .collect(),
    };

    let missing = NodeGroup {
        files: source
            .files()
            .iter()
            .filter(|f| !target_file_keys.contains(&file_key(f, compilable)))
            .cloned()
            .collect(),
        directories: source
            .directories()
            .iter()
            .filter(|d| !target_dir_keys.contains(d.relative()))
            .cloned()
            .collect(),
    };

    let existing = NodeGroup {
        files: source
            .files()
            .iter()
            .filter(|f| target_file_keys.contains(&file_key(f, compilable)))
            .cloned()
            .collect(),
        directories: target
            .directories()
            .iter()
            .filter(|d| source_dir_keys.contains(d.relative()))
            .cloned()
            .collect(),
    };

    Classification {
        orphaned,
        missing,
        existing,
    }
}

/// Removes redundant nested orphans before deletion: only the highest
/// orphan directories survive (removing an ancestor already removes
/// everything beneath it), and files under a surviving orphan
/// directory are dropped since the directory removal covers them.
pub fn prune_orphans(orphaned: NodeGroup) -> NodeGroup {
    let dir_rels: Vec<PathBuf> = orphaned
        .directories
        .iter()
        .map(|d| d.relative().to_path_buf())
        .collect();
    let highest = keep_highest(&dir_rels);

    let directories: Vec<DirNode> = orphaned
        .directories
        .into_iter()
        .filter(|d| highest.iter().any(|h| h == d.relative()))
        .collect();

    let files = orphaned
        .files
        .into_iter()
        .filter(|f| {
            !directories
                .iter()
                .any(|d| f.relative().starts_with(d.relative()))
        })
        .collect();

    NodeGroup { files, directories }
}

/// The deepest missing directories. Creating each of them with a
/// create-all-ancestors primitive makes explicit creation of the
/// intermediate ancestors redundant.
pub fn lowest_missing_dirs(missing: &NodeGroup) -> Vec<DirNode> {
    let dir_rels: Vec<PathBuf> = missing
        .directories
        .iter()
        .map(|d| d.relative().to_path_buf())
        .collect();
    let lowest = keep_lowest(&dir_rels);
    missing
        .directories
        .iter()
        .filter(|d| lowest.iter().any(|l| l == d.relative()))
        .cloned()
        .collect()
}
