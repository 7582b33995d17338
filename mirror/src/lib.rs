//! Directory mirroring engine
//!
//! Keeps a target directory tree a structural and content mirror of a
//! source tree, compiling a configurable set of declarative files
//! (YAML by default) into JSON as they are copied, and reacting
//! incrementally to live filesystem changes:
//! - snapshot scanning and tree diffing (orphaned / missing / existing)
//! - path-set reductions for pruning redundant nested operations
//! - debounced event coalescing with heuristic rename detection
//! - one-shot and live-watch orchestration

pub mod compilable;
pub mod convert;
pub mod diff;
pub mod engine;
pub mod error;
pub mod node;
pub mod paths;
pub mod rename;
pub mod snapshot;
pub mod watch;

// Re-export main types and functions
pub use compilable::ExtensionSet;
pub use convert::{yaml_to_json, OutputStyle};
pub use diff::{diff, lowest_missing_dirs, prune_orphans, Classification};
pub use engine::{MirrorEngine, MirrorOptions, SyncReport};
pub use error::{MirrorError, Result};
pub use node::{DirNode, FileNode, NodeGroup};
pub use rename::{classify_rename, RenameOutcome, RenameRejection};
pub use snapshot::{ScanMode, Snapshot};
pub use watch::{classify_batch, Batch, RawEvent, RawEventKind, WatchCoalescer};

/// Runs one full reconciliation pass between `source` and `target`.
pub async fn mirror_once(
    source: impl Into<std::path::PathBuf>,
    target: impl Into<std::path::PathBuf>,
    options: MirrorOptions,
) -> Result<SyncReport> {
    let mut engine = MirrorEngine::new(source, target, options);
    engine.full_sync().await
}

// Test modules
#[cfg(test)]
mod diff_tests;
