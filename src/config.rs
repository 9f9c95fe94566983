use crate::error::{InfotextError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Minimum number of `key: value` pairs the last line needs to count as a
/// parameter line.
pub const DEFAULT_PARAM_LINE_THRESHOLD: usize = 3;

/// Tunables for the parsing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Pair count at which the last line is treated as the parameter line.
    pub param_line_threshold: usize,
    /// Also accept a last line starting with `Steps: <number>`, whatever its
    /// pair count. The canonical serializer always writes `Steps` first.
    pub steps_anchor: bool,
    /// Fill in WebUI defaults for options missing from the source.
    pub inject_defaults: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            param_line_threshold: DEFAULT_PARAM_LINE_THRESHOLD,
            steps_anchor: true,
            inject_defaults: true,
        }
    }
}

impl ParseOptions {
    /// Options that report only what the source contains.
    pub fn raw() -> Self {
        Self {
            inject_defaults: false,
            ..Self::default()
        }
    }

    /// Loads options from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|error| {
            InfotextError::Config(format!("Failed to read {}: {}", path.display(), error))
        })?;
        let options: Self = serde_json::from_str(&content).map_err(|error| {
            InfotextError::Config(format!("Failed to parse {}: {}", path.display(), error))
        })?;

        if options.param_line_threshold == 0 {
            return Err(InfotextError::Config(format!(
                "param_line_threshold must be at least 1 in {}",
                path.display()
            )));
        }
        Ok(options)
    }
}
