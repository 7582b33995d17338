//! Heuristic directory-rename detection from paired unlink/add path
//! sets.
//!
//! The pairing relies on both lists being sorted and zipped by index,
//! which lines up corresponding paths for a single rename but is not
//! a guaranteed correct pairing when unrelated renames coincide in
//! one debounce window. Every precondition failure is reported as a
//! tagged rejection rather than a silent mismatch.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::paths::keep_highest;

/// Outcome of classifying an equal-count unlink/add batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The whole batch is explained by one rename of one path
    /// segment: `old` became `new`.
    Detected { old: PathBuf, new: PathBuf },
    Rejected(RenameRejection),
}

/// Why a batch was not accepted as a rename.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenameRejection {
    #[error("empty path set")]
    Empty,
    #[error("removed and added counts differ ({removed} vs {added})")]
    CountMismatch { removed: usize, added: usize },
    #[error("paired paths have differing segment counts")]
    SegmentCountMismatch,
    #[error("a renamed path needs at least two segments")]
    TooShallow,
    #[error("a pair differs in zero or more than one segment")]
    NotSingleSegment,
    #[error("the differing segment index varies across pairs")]
    IndexMismatch,
    #[error("the renamed segment value varies across pairs")]
    ValueMismatch,
    #[error("more than one renamed root survives collapsing")]
    MultipleRoots,
}

/// Decides whether `removed` and `added` together describe a single
/// coherent rename. Both lists are sorted lexicographically here and
/// paired by index.
pub fn classify_rename(removed: &[PathBuf], added: &[PathBuf]) -> RenameOutcome {
    if removed.is_empty() || added.is_empty() {
        return RenameOutcome::Rejected(RenameRejection::Empty);
    }
    if removed.len() != added.len() {
        return RenameOutcome::Rejected(RenameRejection::CountMismatch {
            removed: removed.len(),
            added: added.len(),
        });
    }

    let mut removed = removed.to_vec();
    let mut added = added.to_vec();
    removed.sort();
    added.sort();

    let mut diff_index: Option<usize> = None;
    let mut old_value: Option<OsString> = None;
    let mut new_value: Option<OsString> = None;

    for (old, new) in removed.iter().zip(added.iter()) {
        let old_segments = segments(old);
        let new_segments = segments(new);

        if old_segments.len() != new_segments.len() {
            return RenameOutcome::Rejected(RenameRejection::SegmentCountMismatch);
        }
        if old_segments.len() < 2 {
            return RenameOutcome::Rejected(RenameRejection::TooShallow);
        }

        let differing: Vec<usize> = (0..old_segments.len())
            .filter(|&i| old_segments[i] != new_segments[i])
            .collect();
        if differing.len() != 1 {
            return RenameOutcome::Rejected(RenameRejection::NotSingleSegment);
        }
        let index = differing[0];

        match diff_index {
            None => diff_index = Some(index),
            Some(seen) if seen != index => {
                return RenameOutcome::Rejected(RenameRejection::IndexMismatch)
            }
            Some(_) => {}
        }

        let pair_old = old_segments[index].clone();
        let pair_new = new_segments[index].clone();
        match (&old_value, &new_value) {
            (None, None) => {
                old_value = Some(pair_old);
                new_value = Some(pair_new);
            }
            (Some(o), Some(n)) if *o != pair_old || *n != pair_new => {
                return RenameOutcome::Rejected(RenameRejection::ValueMismatch)
            }
            _ => {}
        }
    }

    let index = match diff_index {
        Some(index) => index,
        None => return RenameOutcome::Rejected(RenameRejection::Empty),
    };

    // Each pair implies a renamed root: the path truncated just past
    // the differing segment. The batch is one rename only if both
    // sides collapse to a single root.
    let old_roots = keep_highest(&truncate_all(&removed, index));
    let new_roots = keep_highest(&truncate_all(&added, index));
    match (single(old_roots), single(new_roots)) {
        (Some(old), Some(new)) => RenameOutcome::Detected { old, new },
        _ => RenameOutcome::Rejected(RenameRejection::MultipleRoots),
    }
}

fn segments(path: &Path) -> Vec<OsString> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_os_string()),
            _ => None,
        })
        .collect()
}

/// The path truncated to its first `index + 1` named segments,
/// keeping any root prefix.
fn truncate(path: &Path, index: usize) -> PathBuf {
    let mut out = PathBuf::new();
    let mut named = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => {
                out.push(component);
                named += 1;
                if named > index {
                    break;
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn truncate_all(paths: &[PathBuf], index: usize) -> Vec<PathBuf> {
    paths.iter().map(|p| truncate(p, index)).collect()
}

fn single(mut paths: Vec<PathBuf>) -> Option<PathBuf> {
    if paths.len() == 1 {
        paths.pop()
    } else {
        None
    }
}
