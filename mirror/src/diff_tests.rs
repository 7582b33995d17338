//! Tests for the tree differ and its pruning helpers

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::compilable::ExtensionSet;
use crate::diff::{diff, lowest_missing_dirs, prune_orphans};
use crate::node::{DirNode, FileNode, NodeGroup};
use crate::snapshot::Snapshot;

fn snapshot(root: &str, files: &[&str], dirs: &[&str]) -> Snapshot {
    let root_path = Path::new(root);
    let files = files
        .iter()
        .map(|f| FileNode::new(root_path.join(f), root_path).unwrap())
        .collect();
    let dirs = dirs
        .iter()
        .map(|d| DirNode::new(root_path.join(d), root_path).unwrap())
        .collect();
    Snapshot::from_parts(root, files, dirs)
}

fn relatives(files: &[FileNode]) -> HashSet<PathBuf> {
    files.iter().map(|f| f.relative().to_path_buf()).collect()
}

#[test]
fn identical_snapshots_classify_everything_as_existing() {
    let compilable = ExtensionSet::default();
    let source = snapshot("/src", &["a/x.txt", "b.txt"], &["a"]);
    let target = snapshot("/out", &["a/x.txt", "b.txt"], &["a"]);

    let classification = diff(&source, &target, &compilable);

    assert!(classification.orphaned.is_empty());
    assert!(classification.missing.is_empty());
    assert_eq!(classification.existing.files.len(), 2);
    assert_eq!(classification.existing.directories.len(), 1);
}

#[test]
fn every_entity_lands_in_exactly_one_group() {
    let compilable = ExtensionSet::default();
    let source = snapshot("/src", &["common.txt", "only_src.txt"], &["shared", "src_dir"]);
    let target = snapshot("/out", &["common.txt", "only_out.txt"], &["shared", "out_dir"]);

    let c = diff(&source, &target, &compilable);

    // Files: the source side contributes missing ∪ existing, the
    // target side contributes orphaned ∪ existing; the groups are
    // disjoint by key.
    let orphaned = relatives(&c.orphaned.files);
    let missing = relatives(&c.missing.files);
    let existing = relatives(&c.existing.files);
    assert!(orphaned.is_disjoint(&missing));
    assert!(orphaned.is_disjoint(&existing));
    assert!(missing.is_disjoint(&existing));
    assert_eq!(orphaned, HashSet::from([PathBuf::from("only_out.txt")]));
    assert_eq!(missing, HashSet::from([PathBuf::from("only_src.txt")]));
    assert_eq!(existing, HashSet::from([PathBuf::from("common.txt")]));

    assert_eq!(c.orphaned.directories.len(), 1);
    assert_eq!(c.missing.directories.len(), 1);
    assert_eq!(c.existing.directories.len(), 1);
}

#[test]
fn compilable_files_match_across_extensions() {
    // The compiled target carries .json where the source has .yaml;
    // matching is keyed on the extension-stripped relative path.
    let compilable = ExtensionSet::default();
    let source = snapshot("/src", &["cfg.yaml"], &[]);
    let target = snapshot("/out", &["cfg.json"], &[]);

    let classification = diff(&source, &target, &compilable);

    assert!(classification.orphaned.is_empty());
    assert!(classification.missing.is_empty());
    assert_eq!(classification.existing.files.len(), 1);
}

#[test]
fn non_compilable_files_match_on_the_full_relative_path() {
    let compilable = ExtensionSet::none();
    let source = snapshot("/src", &["cfg.yaml"], &[]);
    let target = snapshot("/out", &["cfg.json"], &[]);

    let classification = diff(&source, &target, &compilable);

    assert_eq!(classification.orphaned.files.len(), 1);
    assert_eq!(classification.missing.files.len(), 1);
    assert!(classification.existing.is_empty());
}

#[test]
fn stem_collisions_between_sibling_compilables_still_match() {
    let compilable = ExtensionSet::default();
    let source = snapshot("/src", &["nested/app.yaml"], &["nested"]);
    let target = snapshot("/out", &["nested/app.json"], &["nested"]);

    let classification = diff(&source, &target, &compilable);
    assert!(classification.missing.is_empty());
    assert!(classification.orphaned.is_empty());
}

#[test]
fn prune_keeps_only_the_highest_orphan_directories() {
    let root = Path::new("/out");
    let group = NodeGroup {
        files: vec![
            FileNode::new(root.join("gone/deep/file.json"), root).unwrap(),
            FileNode::new(root.join("standalone.json"), root).unwrap(),
        ],
        directories: vec![
            DirNode::new(root.join("gone"), root).unwrap(),
            DirNode::new(root.join("gone/deep"), root).unwrap(),
            DirNode::new(root.join("other"), root).unwrap(),
        ],
    };

    let pruned = prune_orphans(group);

    let dirs: HashSet<PathBuf> = pruned
        .directories
        .iter()
        .map(|d| d.relative().to_path_buf())
        .collect();
    assert_eq!(
        dirs,
        HashSet::from([PathBuf::from("gone"), PathBuf::from("other")])
    );
    // The nested file is covered by removing `gone`; the standalone
    // file still needs its own removal.
    assert_eq!(relatives(&pruned.files), HashSet::from([PathBuf::from("standalone.json")]));
}

#[test]
fn lowest_missing_dirs_collapses_ancestor_chains() {
    let root = Path::new("/src");
    let group = NodeGroup {
        files: vec![],
        directories: vec![
            DirNode::new(root.join("a"), root).unwrap(),
            DirNode::new(root.join("a/b"), root).unwrap(),
            DirNode::new(root.join("a/b/c"), root).unwrap(),
            DirNode::new(root.join("z"), root).unwrap(),
        ],
    };

    let lowest = lowest_missing_dirs(&group);
    let dirs: HashSet<PathBuf> = lowest.iter().map(|d| d.relative().to_path_buf()).collect();
    assert_eq!(dirs, HashSet::from([PathBuf::from("a/b/c"), PathBuf::from("z")]));
}

#[test]
fn diff_of_empty_snapshots_is_empty() {
    let compilable = ExtensionSet::default();
    let source = snapshot("/src", &[], &[]);
    let target = snapshot("/out", &[], &[]);
    let classification = diff(&source, &target, &compilable);
    assert!(classification.orphaned.is_empty());
    assert!(classification.missing.is_empty());
    assert!(classification.existing.is_empty());
}
