use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Direction(s) followed when computing reachability from entry points
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    /// Files the entry points import, plus files importing the entry points
    #[default]
    Connected,

    /// Files the entry points (transitively) import
    Dependencies,

    /// Files that (transitively) import the entry points
    Dependents,
}

impl ScopeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeMode::Connected => "connected",
            ScopeMode::Dependencies => "dependencies",
            ScopeMode::Dependents => "dependents",
        }
    }
}

impl std::str::FromStr for ScopeMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "connected" => Ok(ScopeMode::Connected),
            "dependencies" => Ok(ScopeMode::Dependencies),
            "dependents" => Ok(ScopeMode::Dependents),
            other => Err(format!(
                "unknown dependency mode '{other}' (expected connected|dependencies|dependents)"
            )),
        }
    }
}

/// One analyzed source file in the dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyNode {
    /// Canonical absolute path
    pub path: PathBuf,

    /// Files this module imports
    pub dependencies: Vec<PathBuf>,

    /// Files importing this module (derived from `dependencies`)
    pub dependents: Vec<PathBuf>,

    pub is_entry_point: bool,

    /// Distance from the nearest entry point; `None` when unreached
    pub depth: Option<usize>,
}

impl DependencyNode {
    pub(crate) fn new(path: PathBuf, is_entry_point: bool) -> Self {
        Self {
            path,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            is_entry_point,
            depth: if is_entry_point { Some(0) } else { None },
        }
    }
}

/// File-level import graph keyed by canonical path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: BTreeMap<PathBuf, DependencyNode>,

    pub entry_points: Vec<PathBuf>,

    /// Import specifiers that resolved outside the analyzed set
    #[serde(default)]
    pub excluded: Vec<String>,

    /// Build time (unix ms)
    pub built_at: u64,
}

impl DependencyGraph {
    pub fn new(entry_points: Vec<PathBuf>) -> Self {
        Self {
            nodes: BTreeMap::new(),
            entry_points,
            excluded: Vec::new(),
            built_at: unix_ms_now(),
        }
    }

    pub fn node(&self, path: &Path) -> Option<&DependencyNode> {
        self.nodes.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.dependencies.len()).sum()
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.nodes.keys()
    }
}

/// How an import specifier resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportTarget {
    /// Resolved to a file inside the analyzed root
    Internal(PathBuf),

    /// Third-party package, builtin, or unresolvable specifier
    External(String),
}

/// Analyzer output for one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    pub path: PathBuf,
    pub imports: Vec<ImportTarget>,
}

impl ModuleRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            imports: Vec::new(),
        }
    }

    pub fn internal(mut self, target: impl Into<PathBuf>) -> Self {
        self.imports.push(ImportTarget::Internal(target.into()));
        self
    }

    pub fn external(mut self, specifier: impl Into<String>) -> Self {
        self.imports.push(ImportTarget::External(specifier.into()));
        self
    }
}

pub(crate) fn unix_ms_now() -> u64 {
    to_unix_ms(SystemTime::now())
}

pub(crate) fn to_unix_ms(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
