//! Value objects pairing an absolute path with the root it was
//! scanned from. Equality and hashing are based on the root-relative
//! path, so the same logical node under two different roots compares
//! equal.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::error::{MirrorError, Result};

/// A regular file under a scanned root.
#[derive(Debug, Clone)]
pub struct FileNode {
    absolute: PathBuf,
    relative: PathBuf,
}

impl FileNode {
    /// `absolute` must live under `root`.
    pub fn new(absolute: impl Into<PathBuf>, root: &Path) -> Result<Self> {
        let absolute = absolute.into();
        let relative = relative_to(&absolute, root)?;
        Ok(Self { absolute, relative })
    }

    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Extension with a leading dot (`".yaml"`), or `None`.
    pub fn extension(&self) -> Option<String> {
        self.relative
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
    }

    /// File name without its final extension.
    pub fn stem(&self) -> Option<String> {
        self.relative
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
    }

    /// Relative path with its final extension removed.
    pub fn relative_stem(&self) -> PathBuf {
        self.relative.with_extension("")
    }

    /// The node's path re-rooted under another root.
    pub fn absolute_from(&self, root: &Path) -> PathBuf {
        root.join(&self.relative)
    }
}

impl PartialEq for FileNode {
    fn eq(&self, other: &Self) -> bool {
        self.relative == other.relative
    }
}

impl Eq for FileNode {}

impl Hash for FileNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.relative.hash(state);
    }
}

/// A directory under a scanned root.
#[derive(Debug, Clone)]
pub struct DirNode {
    absolute: PathBuf,
    relative: PathBuf,
}

impl DirNode {
    /// `absolute` must live under `root`.
    pub fn new(absolute: impl Into<PathBuf>, root: &Path) -> Result<Self> {
        let absolute = absolute.into();
        let relative = relative_to(&absolute, root)?;
        Ok(Self { absolute, relative })
    }

    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// The node's path re-rooted under another root.
    pub fn absolute_from(&self, root: &Path) -> PathBuf {
        root.join(&self.relative)
    }
}

impl PartialEq for DirNode {
    fn eq(&self, other: &Self) -> bool {
        self.relative == other.relative
    }
}

impl Eq for DirNode {}

impl Hash for DirNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.relative.hash(state);
    }
}

/// Files and directories travelling together through the diff and the
/// coalescer.
#[derive(Debug, Clone, Default)]
pub struct NodeGroup {
    pub files: Vec<FileNode>,
    pub directories: Vec<DirNode>,
}

impl NodeGroup {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.directories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.directories.len()
    }
}

fn relative_to(absolute: &Path, root: &Path) -> Result<PathBuf> {
    absolute
        .strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|_| {
            MirrorError::path_error(
                absolute,
                format!("not under root '{}'", root.display()),
            )
        })
}
