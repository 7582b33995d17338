//! Directory snapshots: one recursive enumeration pass over a root,
//! partitioned into files and directories.
//!
//! A snapshot is produced fresh on each scan and consumed by the pass
//! that requested it; there is no incremental patching of snapshot
//! state.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

use crate::compilable::ExtensionSet;
use crate::error::{MirrorError, Result};
use crate::node::{DirNode, FileNode, NodeGroup};

/// How a scan treats entries that vanish between enumeration and the
/// stat call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Propagate every failure. Used for the initial full sync, where
    /// an inconsistent view is unsafe to reconcile from.
    Strict,
    /// Skip entries that disappeared mid-scan. Used on the live path,
    /// where the next settle produces a fresh view anyway.
    BestEffort,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    root: PathBuf,
    files: Vec<FileNode>,
    directories: Vec<DirNode>,
}

impl Snapshot {
    /// Recursively enumerates `root`. When `filter` is given, only
    /// files matching one of its extensions are collected;
    /// directories are structural and never filtered out.
    pub async fn scan(
        root: &Path,
        filter: Option<&ExtensionSet>,
        mode: ScanMode,
    ) -> Result<Self> {
        let mut files = Vec::new();
        let mut directories = Vec::new();

        for entry in WalkDir::new(root).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if mode == ScanMode::BestEffort => {
                    debug!(root = %root.display(), error = %err, "entry vanished mid-scan, skipping");
                    continue;
                }
                Err(err) => return Err(MirrorError::scan_error(root, err.to_string())),
            };

            let path = entry.path();
            let metadata = match fs::metadata(path).await {
                Ok(metadata) => metadata,
                Err(err) if mode == ScanMode::BestEffort => {
                    debug!(path = %path.display(), error = %err, "stat failed mid-scan, skipping");
                    continue;
                }
                Err(err) => return Err(MirrorError::scan_error(path, err.to_string())),
            };

            if metadata.is_dir() {
                directories.push(DirNode::new(path, root)?);
            } else if filter.map_or(true, |set| set.contains_path(path)) {
                files.push(FileNode::new(path, root)?);
            }
        }

        Ok(Self {
            root: root.to_path_buf(),
            files,
            directories,
        })
    }

    /// Partitions an arbitrary set of absolute paths the way a scan
    /// would, statting each one. Used for coalesced add and change
    /// batches, whose paths are expected to exist.
    pub async fn partition(
        root: &Path,
        paths: &[PathBuf],
        mode: ScanMode,
    ) -> Result<NodeGroup> {
        let mut group = NodeGroup::default();
        for path in paths {
            let metadata = match fs::metadata(path).await {
                Ok(metadata) => metadata,
                Err(err) if mode == ScanMode::BestEffort => {
                    debug!(path = %path.display(), error = %err, "path vanished before stat, skipping");
                    continue;
                }
                Err(err) => return Err(MirrorError::scan_error(path, err.to_string())),
            };
            if metadata.is_dir() {
                group.directories.push(DirNode::new(path, root)?);
            } else {
                group.files.push(FileNode::new(path, root)?);
            }
        }
        Ok(group)
    }

    /// Partitions paths against this previously scanned snapshot
    /// instead of the filesystem. Used for unlink batches, whose
    /// paths no longer exist on disk.
    pub fn partition_known(&self, paths: &[PathBuf]) -> NodeGroup {
        let mut group = NodeGroup::default();
        for path in paths {
            if let Some(file) = self.files.iter().find(|f| f.absolute() == path) {
                group.files.push(file.clone());
            } else if let Some(dir) = self.directories.iter().find(|d| d.absolute() == path) {
                group.directories.push(dir.clone());
            } else {
                debug!(path = %path.display(), "unlinked path absent from last snapshot, skipping");
            }
        }
        group
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        root: impl Into<PathBuf>,
        files: Vec<FileNode>,
        directories: Vec<DirNode>,
    ) -> Self {
        Self {
            root: root.into(),
            files,
            directories,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[FileNode] {
        &self.files
    }

    pub fn directories(&self) -> &[DirNode] {
        &self.directories
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub/nested")).await.unwrap();
        fs::write(root.join("top.yaml"), "a: 1\n").await.unwrap();
        fs::write(root.join("sub/inner.txt"), "text").await.unwrap();
        fs::write(root.join("sub/nested/deep.yaml"), "b: 2\n")
            .await
            .unwrap();
        dir
    }

    #[tokio::test]
    async fn scan_partitions_files_and_directories() {
        let dir = fixture().await;
        let snapshot = Snapshot::scan(dir.path(), None, ScanMode::Strict)
            .await
            .unwrap();

        assert_eq!(snapshot.files().len(), 3);
        assert_eq!(snapshot.directories().len(), 2);
        assert!(snapshot
            .directories()
            .iter()
            .any(|d| d.relative() == Path::new("sub/nested")));
    }

    #[tokio::test]
    async fn extension_filter_applies_to_files_only() {
        let dir = fixture().await;
        let filter = ExtensionSet::new(["yaml"]);
        let snapshot = Snapshot::scan(dir.path(), Some(&filter), ScanMode::Strict)
            .await
            .unwrap();

        assert_eq!(snapshot.files().len(), 2);
        // Directories survive filtering; they are needed for pruning.
        assert_eq!(snapshot.directories().len(), 2);
    }

    #[tokio::test]
    async fn strict_scan_of_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let result = Snapshot::scan(&missing, None, ScanMode::Strict).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn best_effort_partition_skips_vanished_paths() {
        let dir = fixture().await;
        let root = dir.path();
        let paths = vec![root.join("top.yaml"), root.join("gone.yaml")];
        let group = Snapshot::partition(root, &paths, ScanMode::BestEffort)
            .await
            .unwrap();
        assert_eq!(group.files.len(), 1);
        assert!(group.directories.is_empty());
    }

    #[tokio::test]
    async fn partition_known_resolves_against_the_old_tree() {
        let dir = fixture().await;
        let root = dir.path();
        let snapshot = Snapshot::scan(root, None, ScanMode::Strict).await.unwrap();

        // As if `sub` had just been unlinked: the paths are gone from
        // disk but present in the last snapshot.
        let paths = vec![root.join("sub"), root.join("sub/inner.txt")];
        let group = snapshot.partition_known(&paths);
        assert_eq!(group.directories.len(), 1);
        assert_eq!(group.files.len(), 1);
    }
}
