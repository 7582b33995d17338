//! Pure path-set algebra: depth counting, depth ordering and the two
//! chain-collapsing reductions the differ and the coalescer rely on.
//!
//! Everything here is deterministic and does no IO. The reductions are
//! O(n²) in the number of paths, which is fine because per-call path
//! counts are bounded by directory fanout, not tree size.

use std::path::{Component, Path, PathBuf};

/// Number of named components in a path. A trailing separator is
/// ignored, so `/a/b/` and `/a/b` have equal depth; the filesystem
/// root itself has depth 0.
pub fn depth(path: &Path) -> usize {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count()
}

/// Stable sort by [`depth`]. Descending (deepest first) unless
/// `ascending` is set.
pub fn sort_by_depth(paths: &mut [PathBuf], ascending: bool) {
    if ascending {
        paths.sort_by_key(|p| depth(p));
    } else {
        paths.sort_by(|a, b| depth(b).cmp(&depth(a)));
    }
}

/// Collapses every ancestor-descendant chain in `paths` down to its
/// member closest to the filesystem root. Paths with no ancestor in
/// the input pass through unchanged; duplicates are removed.
///
/// ```
/// use std::path::PathBuf;
/// use mirror::paths::keep_highest;
///
/// let paths = vec![
///     PathBuf::from("/a/path/to/some/directory"),
///     PathBuf::from("/another/directory"),
///     PathBuf::from("/a/path"),
///     PathBuf::from("/another/directory/that/contains/stuff"),
/// ];
/// let highest = keep_highest(&paths);
/// assert_eq!(highest.len(), 2);
/// assert!(highest.contains(&PathBuf::from("/a/path")));
/// assert!(highest.contains(&PathBuf::from("/another/directory")));
/// ```
pub fn keep_highest(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut sorted = dedup(paths);
    sort_by_depth(&mut sorted, true);
    let mut kept: Vec<PathBuf> = Vec::new();
    for candidate in sorted {
        // Ancestors are shallower, so any ancestor present in the
        // input has already been kept by the time we see a descendant.
        if !kept.iter().any(|k| candidate.starts_with(k)) {
            kept.push(candidate);
        }
    }
    kept
}

/// Dual of [`keep_highest`]: collapses every ancestor-descendant chain
/// to its deepest member.
pub fn keep_lowest(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut sorted = dedup(paths);
    sort_by_depth(&mut sorted, false);
    let mut kept: Vec<PathBuf> = Vec::new();
    for candidate in sorted {
        if !kept.iter().any(|k| k.starts_with(&candidate)) {
            kept.push(candidate);
        }
    }
    kept
}

fn dedup(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut sorted = paths.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(raw: &[&str]) -> Vec<PathBuf> {
        raw.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn depth_ignores_trailing_separator() {
        assert_eq!(depth(Path::new("/a/b/c")), 3);
        assert_eq!(depth(Path::new("/a/b/c/")), 3);
    }

    #[test]
    fn depth_of_root_is_zero() {
        assert_eq!(depth(Path::new("/")), 0);
    }

    #[test]
    fn depth_of_relative_path() {
        assert_eq!(depth(Path::new("some/other/path")), 3);
    }

    #[test]
    fn sort_by_depth_deepest_first_by_default() {
        let mut input = paths(&["/a", "/a/b/c", "/a/b"]);
        sort_by_depth(&mut input, false);
        assert_eq!(input, paths(&["/a/b/c", "/a/b", "/a"]));
    }

    #[test]
    fn sort_by_depth_is_stable() {
        let mut input = paths(&["/x/y", "/a/b", "/q"]);
        sort_by_depth(&mut input, true);
        assert_eq!(input, paths(&["/q", "/x/y", "/a/b"]));
    }

    #[test]
    fn keep_highest_collapses_chains() {
        let input = paths(&[
            "/a/path/to/some/directory",
            "/another/directory",
            "/a/path",
            "/another/directory/that/contains/stuff",
            "/some/other/path",
        ]);
        let mut result = keep_highest(&input);
        result.sort();
        assert_eq!(
            result,
            paths(&["/a/path", "/another/directory", "/some/other/path"])
        );
    }

    #[test]
    fn keep_lowest_collapses_chains() {
        let input = paths(&[
            "/a/path/to/some/directory",
            "/another/directory",
            "/a/path",
            "/another/directory/that/contains/stuff",
            "/some/other/path",
        ]);
        let mut result = keep_lowest(&input);
        result.sort();
        assert_eq!(
            result,
            paths(&[
                "/a/path/to/some/directory",
                "/another/directory/that/contains/stuff",
                "/some/other/path",
            ])
        );
    }

    #[test]
    fn reductions_on_empty_input() {
        assert!(keep_highest(&[]).is_empty());
        assert!(keep_lowest(&[]).is_empty());
    }

    #[test]
    fn reductions_on_singleton_input() {
        let input = paths(&["/only/one"]);
        assert_eq!(keep_highest(&input), input);
        assert_eq!(keep_lowest(&input), input);
    }

    #[test]
    fn disjoint_inputs_pass_through() {
        let input = paths(&["/a/b", "/c/d", "/e"]);
        assert_eq!(keep_highest(&input).len(), 3);
        assert_eq!(keep_lowest(&input).len(), 3);
    }

    #[test]
    fn duplicates_are_removed() {
        let input = paths(&["/a/b", "/a/b", "/a/b/c"]);
        assert_eq!(keep_highest(&input), paths(&["/a/b"]));
        assert_eq!(keep_lowest(&input), paths(&["/a/b/c"]));
    }

    #[test]
    fn sibling_name_prefixes_are_not_ancestors() {
        // `/a/ab` is not under `/a/abc` even though it is a string
        // prefix of it.
        let input = paths(&["/a/ab", "/a/abc"]);
        assert_eq!(keep_highest(&input).len(), 2);
        assert_eq!(keep_lowest(&input).len(), 2);
    }
}
