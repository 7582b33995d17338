use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// File name the `run` command searches for, walking up from the
/// working directory.
pub const CONFIG_FILE_NAME: &str = "mirror.yaml";

/// How many parent directories the walk-up search visits.
const SEARCH_LEVELS: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MirrorConfig {
    pub files: Vec<PairConfig>,
    #[serde(default = "default_pretty")]
    pub pretty: bool,
    #[serde(default = "default_indent")]
    pub indent: usize,
    #[serde(default)]
    pub watch: bool,
    #[serde(default = "default_debounce", with = "humantime_serde")]
    pub debounce: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PairConfig {
    pub source: PathBuf,
    pub target: PathBuf,
}

fn default_pretty() -> bool {
    true
}

fn default_indent() -> usize {
    2
}

fn default_debounce() -> Duration {
    Duration::from_millis(250)
}

impl MirrorConfig {
    /// Looks for `mirror.yaml` starting at `start` and walking up a
    /// bounded number of parent directories.
    pub fn find(start: &Path) -> Option<PathBuf> {
        let mut dir = start;
        for _ in 0..=SEARCH_LEVELS {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            dir = dir.parent()?;
        }
        None
    }

    /// Parses the file at `path`. Relative pair paths are resolved
    /// against the directory the file lives in.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config: MirrorConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        if config.files.is_empty() {
            bail!("{} declares no file pairs", path.display());
        }
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for pair in &mut config.files {
            if pair.source.is_relative() {
                pair.source = base.join(&pair.source);
            }
            if pair.target.is_relative() {
                pair.target = base.join(&pair.target);
            }
        }
        Ok(config)
    }
}
