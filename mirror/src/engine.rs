//! The sync orchestrator: drives full reconciliation passes and
//! targeted incremental passes per coalesced batch.
//!
//! Only the engine writes to the target tree. The watch coalescer
//! classifies batches but never touches disk.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::compilable::ExtensionSet;
use crate::convert::{yaml_to_json, OutputStyle};
use crate::diff::{diff, lowest_missing_dirs, prune_orphans, Classification};
use crate::error::{MirrorError, Result};
use crate::node::FileNode;
use crate::paths::keep_lowest;
use crate::snapshot::{ScanMode, Snapshot};
use crate::watch::{classify_batch, Batch, RawEvent, WatchCoalescer, DEFAULT_DEBOUNCE};

/// Options for one source/target pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorOptions {
    /// JSON formatting of compiled files.
    #[serde(flatten)]
    pub style: OutputStyle,
    /// Settle time for the live-watch coalescer.
    #[serde(default = "default_debounce", with = "humantime_serde")]
    pub debounce: Duration,
    /// A root the target must never equal (typically the directory
    /// the configuration file lives in).
    #[serde(default)]
    pub protected_root: Option<PathBuf>,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            style: OutputStyle::default(),
            debounce: default_debounce(),
            protected_root: None,
        }
    }
}

fn default_debounce() -> Duration {
    DEFAULT_DEBOUNCE
}

/// Write operations performed by one pass. A second full sync over an
/// unchanged source reports all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Orphaned files and directories removed from the target.
    pub removed: usize,
    /// Missing directories created.
    pub created_dirs: usize,
    /// Files byte-copied into the target.
    pub copied: usize,
    /// Files decoded and re-encoded into the target.
    pub compiled: usize,
    /// Existing files re-materialized because the source was newer.
    pub refreshed: usize,
    /// Per-file failures that were logged and skipped.
    pub failures: usize,
}

impl SyncReport {
    pub fn writes(&self) -> usize {
        self.removed + self.created_dirs + self.copied + self.compiled + self.refreshed
    }
}

/// Keeps one target root mirroring one source root.
pub struct MirrorEngine {
    source_root: PathBuf,
    target_root: PathBuf,
    compilable: ExtensionSet,
    options: MirrorOptions,
    /// Last scanned source view; unlink batches are resolved against
    /// it because their paths no longer exist on disk.
    source_snapshot: Option<Snapshot>,
}

impl MirrorEngine {
    pub fn new(
        source_root: impl Into<PathBuf>,
        target_root: impl Into<PathBuf>,
        options: MirrorOptions,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            target_root: target_root.into(),
            compilable: ExtensionSet::default(),
            options,
            source_snapshot: None,
        }
    }

    pub fn with_compilable(mut self, compilable: ExtensionSet) -> Self {
        self.compilable = compilable;
        self
    }

    pub fn compilable_mut(&mut self) -> &mut ExtensionSet {
        &mut self.compilable
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    /// Checks the pair before any write: the source must exist and be
    /// a directory, the target must not equal the source or the
    /// protected root.
    pub async fn verify(&self) -> Result<()> {
        let metadata = fs::metadata(&self.source_root).await.map_err(|_| {
            MirrorError::SourceNotFound {
                path: self.source_root.clone(),
            }
        })?;
        if !metadata.is_dir() {
            return Err(MirrorError::SourceNotFound {
                path: self.source_root.clone(),
            });
        }
        if self.target_root == self.source_root {
            return Err(MirrorError::forbidden_target(
                &self.target_root,
                "target equals the source root",
            ));
        }
        if let Some(protected) = &self.options.protected_root {
            if &self.target_root == protected {
                return Err(MirrorError::forbidden_target(
                    &self.target_root,
                    "target equals the protected application root",
                ));
            }
        }
        Ok(())
    }

    /// One full reconciliation pass: snapshot both roots, diff,
    /// prune, then remove orphans, create missing directories,
    /// materialize missing files and refresh stale existing ones.
    pub async fn full_sync(&mut self) -> Result<SyncReport> {
        self.verify().await?;

        // The very first scan must be consistent; later ones tolerate
        // entries vanishing underneath them.
        let mode = if self.source_snapshot.is_some() {
            ScanMode::BestEffort
        } else {
            ScanMode::Strict
        };
        let source = Snapshot::scan(&self.source_root, None, mode).await?;

        // Target absence is not an error.
        fs::create_dir_all(&self.target_root).await?;
        let target = Snapshot::scan(&self.target_root, None, mode).await?;

        let classification = diff(&source, &target, &self.compilable);
        let report = self.apply_classification(classification).await?;

        self.source_snapshot = Some(source);
        debug!(
            source = %self.source_root.display(),
            target = %self.target_root.display(),
            writes = report.writes(),
            "full sync pass complete"
        );
        Ok(report)
    }

    async fn apply_classification(&self, classification: Classification) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        let orphaned = prune_orphans(classification.orphaned);
        for dir in &orphaned.directories {
            self.remove_dir(dir.absolute(), &mut report).await;
        }
        for file in &orphaned.files {
            self.remove_file(file.absolute(), &mut report).await;
        }

        for dir in lowest_missing_dirs(&classification.missing) {
            self.create_dir(&dir.absolute_from(&self.target_root), &mut report)
                .await;
        }
        for file in &classification.missing.files {
            self.materialize(file, &mut report, false).await;
        }

        for file in &classification.existing.files {
            self.refresh_if_stale(file, &mut report).await;
        }

        Ok(report)
    }

    /// Applies one coalesced event batch with targeted operations,
    /// then refreshes the remembered source view so the next batch is
    /// resolved against current state.
    pub async fn apply_batch(&mut self, events: Vec<RawEvent>) -> Result<SyncReport> {
        let batch = match classify_batch(&events) {
            Ok(batch) => batch,
            Err(err @ MirrorError::AmbiguousRename(_))
            | Err(err @ MirrorError::UnrecognizedBatch { .. }) => {
                warn!(error = %err, "dropping event batch, no partial apply");
                self.refresh_source().await?;
                return Ok(SyncReport::default());
            }
            Err(err) => return Err(err),
        };

        let report = match batch {
            Batch::Mixed => return self.full_sync().await,
            Batch::Change(paths) => self.handle_change(&paths).await?,
            Batch::Add(paths) => self.handle_add(&paths).await?,
            Batch::Unlink(paths) => self.handle_unlink(&paths).await?,
            Batch::Rename { old, new } => match self.handle_rename(&old, &new).await {
                Ok(report) => report,
                Err(err) => {
                    // A rename that cannot be replayed on the target
                    // (e.g. the old target path never existed) is
                    // reconciled with a full pass instead.
                    warn!(error = %err, "targeted rename failed, falling back to full sync");
                    return self.full_sync().await;
                }
            },
        };

        self.refresh_source().await?;
        Ok(report)
    }

    async fn handle_change(&self, paths: &[PathBuf]) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let group = Snapshot::partition(&self.source_root, paths, ScanMode::BestEffort).await?;
        for file in &group.files {
            self.refresh_if_stale(file, &mut report).await;
        }
        Ok(report)
    }

    async fn handle_add(&self, paths: &[PathBuf]) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let group = Snapshot::partition(&self.source_root, paths, ScanMode::BestEffort).await?;

        let dir_rels: Vec<PathBuf> = group
            .directories
            .iter()
            .map(|d| d.relative().to_path_buf())
            .collect();
        for rel in keep_lowest(&dir_rels) {
            self.create_dir(&self.target_root.join(rel), &mut report).await;
        }
        for file in &group.files {
            self.materialize(file, &mut report, false).await;
        }
        Ok(report)
    }

    async fn handle_unlink(&self, paths: &[PathBuf]) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let Some(snapshot) = &self.source_snapshot else {
            // No remembered view to resolve unlinked paths against.
            return Ok(report);
        };
        let group = prune_orphans(snapshot.partition_known(paths));
        for dir in &group.directories {
            self.remove_dir(&dir.absolute_from(&self.target_root), &mut report)
                .await;
        }
        for file in &group.files {
            self.remove_file(&self.target_path_of(file), &mut report)
                .await;
        }
        Ok(report)
    }

    async fn handle_rename(&self, old: &Path, new: &Path) -> Result<SyncReport> {
        let old_target = self.map_source_path(old)?;
        let new_target = self.map_source_path(new)?;
        fs::rename(&old_target, &new_target).await.map_err(|e| {
            MirrorError::write_error(&old_target, format!("rename failed: {e}"))
        })?;
        info!(
            old = %old_target.display(),
            new = %new_target.display(),
            "replayed rename on target"
        );
        Ok(SyncReport {
            refreshed: 1,
            ..SyncReport::default()
        })
    }

    /// Full sync then live updates until cancellation. Batches are
    /// processed strictly one at a time.
    pub async fn watch(&mut self, cancel: CancellationToken) -> Result<()> {
        let mut coalescer = WatchCoalescer::subscribe(&self.source_root, self.options.debounce)?;
        self.full_sync().await?;
        info!(source = %self.source_root.display(), "initial sync done, watching");

        while let Some(events) = coalescer.next_batch(&cancel).await {
            debug!(count = events.len(), "event batch settled");
            match self.apply_batch(events).await {
                Ok(report) if report.writes() > 0 => {
                    info!(
                        removed = report.removed,
                        copied = report.copied,
                        compiled = report.compiled,
                        refreshed = report.refreshed,
                        "applied live update"
                    );
                }
                Ok(_) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => warn!(error = %err, "live update failed, watch continues"),
            }
        }
        Ok(())
    }

    /// Absolute target path a source file materializes to.
    fn target_path_of(&self, file: &FileNode) -> PathBuf {
        self.target_root.join(self.compilable.target_relative(file))
    }

    /// Maps an absolute source path to its target counterpart,
    /// applying the compiled naming rule to compilable files.
    fn map_source_path(&self, source: &Path) -> Result<PathBuf> {
        let relative = source.strip_prefix(&self.source_root).map_err(|_| {
            MirrorError::path_error(
                source,
                format!("not under source root '{}'", self.source_root.display()),
            )
        })?;
        if self.compilable.contains_path(relative) {
            Ok(self.target_root.join(relative.with_extension("json")))
        } else {
            Ok(self.target_root.join(relative))
        }
    }

    /// Copies or compiles one source file into the target. Per-file
    /// failures are logged and counted, never propagated; the rest of
    /// the pass still runs.
    async fn materialize(&self, file: &FileNode, report: &mut SyncReport, refresh: bool) {
        let target = self.target_path_of(file);
        if let Some(parent) = target.parent() {
            if let Err(err) = fs::create_dir_all(parent).await {
                warn!(path = %parent.display(), error = %err, "cannot create parent, skipping file");
                report.failures += 1;
                return;
            }
        }
        let result = if self.compilable.is_compilable(file) {
            yaml_to_json(file.absolute(), &target, self.options.style).await
        } else {
            self.copy_file(file.absolute(), &target).await
        };
        match result {
            Ok(()) => {
                if refresh {
                    report.refreshed += 1;
                } else if self.compilable.is_compilable(file) {
                    report.compiled += 1;
                } else {
                    report.copied += 1;
                }
            }
            Err(err) => {
                warn!(path = %file.absolute().display(), error = %err, "skipping file");
                report.failures += 1;
            }
        }
    }

    /// Re-materializes an existing file only when the source's mtime
    /// is strictly greater than the target's; equal or older
    /// timestamps leave the target untouched.
    async fn refresh_if_stale(&self, file: &FileNode, report: &mut SyncReport) {
        let target = self.target_path_of(file);
        let source_mtime = match mtime(file.absolute()).await {
            Ok(mtime) => mtime,
            Err(err) => {
                debug!(path = %file.absolute().display(), error = %err, "source vanished, skipping refresh");
                return;
            }
        };
        let target_mtime = match mtime(&target).await {
            Ok(mtime) => mtime,
            Err(_) => {
                // Target counterpart is gone; materialize it fresh.
                self.materialize(file, report, false).await;
                return;
            }
        };
        if source_mtime > target_mtime {
            self.materialize(file, report, true).await;
        }
    }

    async fn copy_file(&self, source: &Path, target: &Path) -> Result<()> {
        fs::copy(source, target)
            .await
            .map_err(|e| MirrorError::write_error(target, e.to_string()))?;
        Ok(())
    }

    async fn create_dir(&self, path: &Path, report: &mut SyncReport) {
        match fs::create_dir_all(path).await {
            Ok(()) => report.created_dirs += 1,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "directory creation failed");
                report.failures += 1;
            }
        }
    }

    async fn remove_dir(&self, path: &Path, report: &mut SyncReport) {
        match fs::remove_dir_all(path).await {
            Ok(()) => report.removed += 1,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "directory removal failed");
                report.failures += 1;
            }
        }
    }

    async fn remove_file(&self, path: &Path, report: &mut SyncReport) {
        match fs::remove_file(path).await {
            Ok(()) => report.removed += 1,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "file removal failed");
                report.failures += 1;
            }
        }
    }

    async fn refresh_source(&mut self) -> Result<()> {
        self.source_snapshot =
            Some(Snapshot::scan(&self.source_root, None, ScanMode::BestEffort).await?);
        Ok(())
    }
}

async fn mtime(path: &Path) -> Result<SystemTime> {
    let metadata = fs::metadata(path).await?;
    Ok(metadata.modified()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn engine_for(dir: &TempDir) -> MirrorEngine {
        MirrorEngine::new(
            dir.path().join("src"),
            dir.path().join("out"),
            MirrorOptions::default(),
        )
    }

    #[tokio::test]
    async fn verify_rejects_missing_source() {
        let dir = TempDir::new().unwrap();
        let engine = engine_for(&dir);
        assert!(matches!(
            engine.verify().await,
            Err(MirrorError::SourceNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn verify_rejects_target_equal_to_source() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).await.unwrap();
        let engine = MirrorEngine::new(
            dir.path().join("src"),
            dir.path().join("src"),
            MirrorOptions::default(),
        );
        assert!(matches!(
            engine.verify().await,
            Err(MirrorError::ForbiddenTarget { .. })
        ));
    }

    #[tokio::test]
    async fn verify_rejects_protected_target() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).await.unwrap();
        let options = MirrorOptions {
            protected_root: Some(dir.path().to_path_buf()),
            ..MirrorOptions::default()
        };
        let engine = MirrorEngine::new(dir.path().join("src"), dir.path(), options);
        assert!(matches!(
            engine.verify().await,
            Err(MirrorError::ForbiddenTarget { .. })
        ));
    }

    #[tokio::test]
    async fn full_sync_compiles_and_copies() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("sub")).await.unwrap();
        fs::write(src.join("config.yaml"), "a: 1\n").await.unwrap();
        fs::write(src.join("sub/notes.txt"), "plain").await.unwrap();

        let mut engine = engine_for(&dir);
        let report = engine.full_sync().await.unwrap();

        assert_eq!(report.compiled, 1);
        assert_eq!(report.copied, 1);
        assert_eq!(report.created_dirs, 1);

        let out = dir.path().join("out");
        let json = fs::read_to_string(out.join("config.json")).await.unwrap();
        assert_eq!(json, r#"{"a":1}"#);
        assert_eq!(
            fs::read_to_string(out.join("sub/notes.txt")).await.unwrap(),
            "plain"
        );
    }

    #[tokio::test]
    async fn second_full_sync_performs_zero_writes() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).await.unwrap();
        fs::write(src.join("config.yaml"), "a: 1\n").await.unwrap();

        let mut engine = engine_for(&dir);
        engine.full_sync().await.unwrap();
        let second = engine.full_sync().await.unwrap();
        assert_eq!(second.writes(), 0, "{second:?}");
    }

    #[tokio::test]
    async fn full_sync_removes_orphans() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("out");
        fs::create_dir_all(&src).await.unwrap();
        fs::create_dir_all(out.join("stale/nested")).await.unwrap();
        fs::write(out.join("stale/nested/old.json"), "{}").await.unwrap();
        fs::write(out.join("dangling.txt"), "x").await.unwrap();

        let mut engine = engine_for(&dir);
        let report = engine.full_sync().await.unwrap();

        // One pruned directory removal plus one file removal; the
        // nested orphans are covered by the ancestor.
        assert_eq!(report.removed, 2);
        assert!(!out.join("stale").exists());
        assert!(!out.join("dangling.txt").exists());
    }

    #[tokio::test]
    async fn decode_failure_skips_the_file_but_not_the_pass() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).await.unwrap();
        fs::write(src.join("broken.yaml"), "a: [unclosed\nb: }{").await.unwrap();
        fs::write(src.join("good.yaml"), "ok: true\n").await.unwrap();

        let mut engine = engine_for(&dir);
        let report = engine.full_sync().await.unwrap();

        assert_eq!(report.failures, 1);
        assert_eq!(report.compiled, 1);
        assert!(dir.path().join("out/good.json").exists());
        assert!(!dir.path().join("out/broken.json").exists());
    }
}
