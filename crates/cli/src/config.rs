use anyhow::{Context, Result};
use paydown_engine::{LimitKind, SelectionLimit, SelectionOptions};
use serde::Deserialize;
use std::path::Path;

/// Looked up in the project root when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "paydown.toml";

const DEFAULT_LIMIT_COUNT: i64 = 10;

/// Contents of `paydown.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaydownConfig {
    pub limit: LimitConfig,
    pub selection: SelectionOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitConfig {
    pub kind: LimitKind,

    /// Validated when the limit is built, so `0` and negatives are reported
    pub count: i64,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            kind: LimitKind::File,
            count: DEFAULT_LIMIT_COUNT,
        }
    }
}

impl PaydownConfig {
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Invalid paydown config")
    }

    /// Read `explicit`, or `<root>/paydown.toml` if it exists, or fall back to defaults.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = root.join(DEFAULT_CONFIG_FILE);
                if !candidate.is_file() {
                    log::debug!("No {DEFAULT_CONFIG_FILE} in {}, using defaults", root.display());
                    return Ok(Self::default());
                }
                candidate
            }
        };

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_toml(&raw).with_context(|| format!("In {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn selection_limit(&self) -> Result<SelectionLimit> {
        Ok(SelectionLimit::new(self.limit.kind, self.limit.count)?)
    }
}
