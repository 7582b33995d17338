//! Error types for the mirroring engine

use std::path::PathBuf;

use crate::rename::RenameRejection;

/// Result type alias for mirroring operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Error type covering every operation of the engine
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source root missing or not a directory. Fatal to the pair.
    #[error("source root '{path}' does not exist or is not a directory")]
    SourceNotFound { path: PathBuf },

    /// Target equals the source root or a protected root. Fatal to
    /// the pair, raised before any write.
    #[error("forbidden target '{path}': {reason}")]
    ForbiddenTarget { path: PathBuf, reason: String },

    /// Path-related errors
    #[error("path error at '{path}': {message}")]
    Path { path: PathBuf, message: String },

    /// Directory scanning errors
    #[error("scan error at '{path}': {message}")]
    Scan { path: PathBuf, message: String },

    /// A declarative source file could not be decoded. Per-file.
    #[error("failed to decode '{path}': {message}")]
    Decode { path: PathBuf, message: String },

    /// A target file could not be written. Per-file.
    #[error("failed to write '{path}': {message}")]
    Write { path: PathBuf, message: String },

    /// An equal-count unlink/add batch did not pass rename
    /// classification. The batch is dropped, never partially applied.
    #[error("ambiguous rename batch: {0}")]
    AmbiguousRename(RenameRejection),

    /// A settled event batch matched none of the classification rules.
    #[error("unrecognized event batch ({added} added, {removed} removed, {changed} changed)")]
    UnrecognizedBatch {
        added: usize,
        removed: usize,
        changed: usize,
    },

    /// Filesystem watcher errors
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// JSON encoding errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic errors with context
    #[error(transparent)]
    Generic(#[from] anyhow::Error),
}

impl MirrorError {
    /// Create a new path error
    pub fn path_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new scan error
    pub fn scan_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Scan {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new decode error
    pub fn decode_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new write error
    pub fn write_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Write {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new forbidden-target error
    pub fn forbidden_target(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ForbiddenTarget {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error ends the whole source/target pair rather
    /// than a single file or batch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound { .. } | Self::ForbiddenTarget { .. }
        )
    }
}
