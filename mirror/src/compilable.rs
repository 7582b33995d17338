//! The set of file extensions eligible for decode/re-encode
//! compilation, and the target naming rule derived from it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::node::FileNode;

/// Extensions compiled by default.
const DEFAULT_EXTENSIONS: &[&str] = &[".yaml", ".json"];

/// Case-sensitive set of compilable extensions. Entries are
/// normalized to carry a leading dot, so `add("yml")` and
/// `add(".yml")` are equivalent.
#[derive(Debug, Clone)]
pub struct ExtensionSet {
    extensions: HashSet<String>,
}

impl Default for ExtensionSet {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS.iter().copied())
    }
}

impl ExtensionSet {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| normalize(e.as_ref()))
                .collect(),
        }
    }

    /// Empty set: nothing is compiled, every file is byte-copied.
    pub fn none() -> Self {
        Self {
            extensions: HashSet::new(),
        }
    }

    pub fn add(&mut self, extension: &str) -> &mut Self {
        self.extensions.insert(normalize(extension));
        self
    }

    pub fn remove(&mut self, extension: &str) -> &mut Self {
        self.extensions.remove(&normalize(extension));
        self
    }

    pub fn contains(&self, extension: &str) -> bool {
        self.extensions.contains(&normalize(extension))
    }

    /// Whether the path's final extension is in the set.
    pub fn contains_path(&self, path: &Path) -> bool {
        match path.extension() {
            Some(ext) => self
                .extensions
                .contains(&format!(".{}", ext.to_string_lossy())),
            None => false,
        }
    }

    pub fn is_compilable(&self, file: &FileNode) -> bool {
        self.contains_path(file.relative())
    }

    /// Relative path a source file materializes to under the target
    /// root: `stem + ".json"` for compilable files, the unchanged
    /// relative path otherwise.
    pub fn target_relative(&self, file: &FileNode) -> PathBuf {
        if self.is_compilable(file) {
            file.relative().with_extension("json")
        } else {
            file.relative().to_path_buf()
        }
    }
}

fn normalize(extension: &str) -> String {
    if extension.starts_with('.') {
        extension.to_string()
    } else {
        format!(".{extension}")
    }
}
