//! Decode/re-encode materialization of declarative sources into JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use tokio::fs;

use crate::error::{MirrorError, Result};

/// Formatting knobs for compiled JSON output. Pass-through
/// configuration with no effect on the sync algorithm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OutputStyle {
    #[serde(default)]
    pub pretty: bool,
    #[serde(default = "default_indent")]
    pub indent: usize,
}

impl Default for OutputStyle {
    fn default() -> Self {
        Self {
            pretty: false,
            indent: default_indent(),
        }
    }
}

fn default_indent() -> usize {
    2
}

/// Decodes `source` as YAML (JSON is a YAML subset, so `.json`
/// sources decode the same way) and writes it to `target` as JSON
/// text.
pub async fn yaml_to_json(source: &Path, target: &Path, style: OutputStyle) -> Result<()> {
    let text = fs::read_to_string(source)
        .await
        .map_err(|e| MirrorError::decode_error(source, e.to_string()))?;
    let value: serde_json::Value = serde_yaml::from_str(&text)
        .map_err(|e| MirrorError::decode_error(source, e.to_string()))?;
    let encoded = encode(&value, style)?;
    fs::write(target, encoded)
        .await
        .map_err(|e| MirrorError::write_error(target, e.to_string()))?;
    Ok(())
}

fn encode(value: &serde_json::Value, style: OutputStyle) -> Result<Vec<u8>> {
    if !style.pretty {
        return Ok(serde_json::to_vec(value)?);
    }
    let indent = " ".repeat(style.indent);
    let formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}
