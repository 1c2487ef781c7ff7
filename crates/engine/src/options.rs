use crate::error::{Result, SelectionError};
use paydown_graph::ScopeMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

/// What a selection limit counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitKind {
    #[serde(alias = "files")]
    File,

    #[serde(alias = "violations")]
    Violation,
}

impl LimitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LimitKind::File => "file",
            LimitKind::Violation => "violation",
        }
    }
}

impl FromStr for LimitKind {
    type Err = SelectionError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "file" | "files" => Ok(LimitKind::File),
            "violation" | "violations" => Ok(LimitKind::Violation),
            _ => Err(SelectionError::UnknownLimitKind(raw.to_string())),
        }
    }
}

/// Upper bound on how much one selection may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionLimit {
    kind: LimitKind,
    count: usize,
}

impl SelectionLimit {
    /// Fails for `count <= 0`; a zero limit is a configuration mistake, not a no-op.
    pub fn new(kind: LimitKind, count: i64) -> Result<Self> {
        match usize::try_from(count) {
            Ok(count) if count > 0 => Ok(Self { kind, count }),
            _ => Err(SelectionError::InvalidLimit(count)),
        }
    }

    pub fn files(count: i64) -> Result<Self> {
        Self::new(LimitKind::File, count)
    }

    pub fn violations(count: i64) -> Result<Self> {
        Self::new(LimitKind::Violation, count)
    }

    pub fn kind(&self) -> LimitKind {
        self.kind
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Restrict eligible files to those connected to entry points via imports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyScope {
    /// Relative to the project root, or absolute
    pub entry_points: Vec<PathBuf>,

    pub mode: ScopeMode,

    pub max_depth: Option<usize>,

    /// Globs left out of dependency analysis
    pub exclude_patterns: Vec<String>,
}

impl DependencyScope {
    pub fn new(entry_points: Vec<PathBuf>, mode: ScopeMode) -> Self {
        Self {
            entry_points,
            mode,
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// An empty entry-point list disables scoping instead of matching nothing.
    pub fn is_active(&self) -> bool {
        !self.entry_points.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionOptions {
    pub only_auto_fixable: bool,
    pub allow_partial_selection: bool,
    pub exclude_rules: BTreeSet<String>,
    pub include_rules: BTreeSet<String>,
    pub exclude_file_globs: Vec<String>,
    pub include_file_globs: Vec<String>,
    pub dependency_scope: Option<DependencyScope>,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            only_auto_fixable: true,
            allow_partial_selection: false,
            exclude_rules: BTreeSet::new(),
            include_rules: BTreeSet::new(),
            exclude_file_globs: Vec::new(),
            include_file_globs: Vec::new(),
            dependency_scope: None,
        }
    }
}

impl SelectionOptions {
    /// The configured scope, if it has entry points.
    pub fn active_scope(&self) -> Option<&DependencyScope> {
        self.dependency_scope.as_ref().filter(|scope| scope.is_active())
    }
}
