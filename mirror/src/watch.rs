//! Live-watch event coalescing: buffers raw per-path filesystem
//! notifications, debounces them (trailing edge, restart on every
//! event), and classifies each settled batch.
//!
//! One coalescer is owned per watched source root; there is no
//! process-wide registry. Batches are handed out one at a time, so a
//! new buffer cannot be classified while the previous batch is still
//! being applied.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::{MirrorError, Result};
use crate::rename::{classify_rename, RenameOutcome};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// A raw per-path notification, prior to coalescing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: RawEventKind,
    pub path: PathBuf,
}

impl RawEvent {
    pub fn new(kind: RawEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    Added,
    Removed,
    Changed,
}

/// A classified, debounced batch of filesystem activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Batch {
    /// New paths appeared under the source root. Sorted.
    Add(Vec<PathBuf>),
    /// Paths disappeared from the source root. Sorted.
    Unlink(Vec<PathBuf>),
    /// Existing files were modified in place. Sorted.
    Change(Vec<PathBuf>),
    /// A single directory (or file) rename explains the whole batch.
    Rename { old: PathBuf, new: PathBuf },
    /// Changes arrived interleaved with adds or removes inside one
    /// debounce window. No targeted application is safe; the caller
    /// falls back to a full reconciliation pass.
    Mixed,
}

/// Splits a drained buffer into sorted added/removed/changed lists
/// and classifies it. `AmbiguousRename` and `UnrecognizedBatch`
/// errors mean the batch must be dropped without any partial apply.
pub fn classify_batch(events: &[RawEvent]) -> Result<Batch> {
    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut changed = Vec::new();
    for event in events {
        match event.kind {
            RawEventKind::Added => added.push(event.path.clone()),
            RawEventKind::Removed => removed.push(event.path.clone()),
            RawEventKind::Changed => changed.push(event.path.clone()),
        }
    }
    added.sort();
    removed.sort();
    changed.sort();

    if !changed.is_empty() {
        if !added.is_empty() || !removed.is_empty() {
            // The buffer mixes in-place changes with structural
            // events; dropping either half would lose updates, so the
            // whole window is escalated to a full resync.
            return Ok(Batch::Mixed);
        }
        return Ok(Batch::Change(changed));
    }
    if !removed.is_empty() && added.is_empty() {
        return Ok(Batch::Unlink(removed));
    }
    if removed.is_empty() && !added.is_empty() {
        return Ok(Batch::Add(added));
    }
    if !removed.is_empty() && removed.len() == added.len() {
        return match classify_rename(&removed, &added) {
            RenameOutcome::Detected { old, new } => Ok(Batch::Rename { old, new }),
            RenameOutcome::Rejected(rejection) => Err(MirrorError::AmbiguousRename(rejection)),
        };
    }
    Err(MirrorError::UnrecognizedBatch {
        added: added.len(),
        removed: removed.len(),
        changed: changed.len(),
    })
}

/// Subscribes to a source root's filesystem notifications and yields
/// settled event buffers.
pub struct WatchCoalescer {
    raw_rx: mpsc::Receiver<RawEvent>,
    debounce: Duration,
    // Dropped with the coalescer, which unsubscribes the watch.
    _watcher: Option<RecommendedWatcher>,
}

impl WatchCoalescer {
    /// Starts watching `root` recursively.
    pub fn subscribe(root: &Path, debounce: Duration) -> Result<Self> {
        let (raw_tx, raw_rx) = mpsc::channel(1024);

        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    for raw in raw_events(&event) {
                        if raw_tx.try_send(raw).is_err() {
                            warn!("event buffer full, dropping filesystem event");
                        }
                    }
                }
                Err(err) => error!(error = %err, "filesystem watcher error"),
            })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        debug!(root = %root.display(), "watching for filesystem changes");

        Ok(Self {
            raw_rx,
            debounce,
            _watcher: Some(watcher),
        })
    }

    #[cfg(test)]
    fn from_receiver(raw_rx: mpsc::Receiver<RawEvent>, debounce: Duration) -> Self {
        Self {
            raw_rx,
            debounce,
            _watcher: None,
        }
    }

    /// Waits for the next settled buffer: the first raw event opens a
    /// window, every further event restarts the debounce timer, and
    /// the buffer is drained atomically once the timer fires. Returns
    /// `None` on cancellation or when the event source closes.
    pub async fn next_batch(&mut self, cancel: &CancellationToken) -> Option<Vec<RawEvent>> {
        let mut buffer: Vec<RawEvent> = Vec::new();
        loop {
            if buffer.is_empty() {
                tokio::select! {
                    _ = cancel.cancelled() => return None,
                    event = self.raw_rx.recv() => match event {
                        Some(event) => buffer.push(event),
                        None => return None,
                    },
                }
            } else {
                tokio::select! {
                    _ = cancel.cancelled() => return None,
                    event = self.raw_rx.recv() => match event {
                        Some(event) => buffer.push(event),
                        None => return Some(buffer),
                    },
                    _ = tokio::time::sleep(self.debounce) => return Some(buffer),
                }
            }
        }
    }
}

/// Flattens a notify event into the engine's raw event model. Rename
/// notifications become paired remove/add events so the rename
/// classifier sees the same shape as an unlink/add storm.
fn raw_events(event: &Event) -> Vec<RawEvent> {
    match &event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .map(|p| RawEvent::new(RawEventKind::Added, p))
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .map(|p| RawEvent::new(RawEventKind::Removed, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .iter()
            .map(|p| RawEvent::new(RawEventKind::Removed, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .iter()
            .map(|p| RawEvent::new(RawEventKind::Added, p))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            vec![
                RawEvent::new(RawEventKind::Removed, &event.paths[0]),
                RawEvent::new(RawEventKind::Added, &event.paths[1]),
            ]
        }
        // A rename with unknown direction cannot be split into
        // remove/add; reporting it as changed escalates the window to
        // a full resync.
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| RawEvent::new(RawEventKind::Changed, p))
            .collect(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .map(|p| RawEvent::new(RawEventKind::Changed, p))
            .collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}
