use crate::error::{Result, SelectionError};
use crate::ledger::normalize_ledger_path;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Compiled include/exclude file globs for one selection run.
///
/// `*` stays within a path segment, `**` crosses segments, and character
/// classes and `{a,b}` groups are supported. A pattern equal to a path always
/// matches it, even when the path contains glob metacharacters.
#[derive(Debug, Clone)]
pub struct FileGlobs {
    root: Option<PathBuf>,
    exclude: PatternSet,
    include: PatternSet,
}

impl FileGlobs {
    pub fn compile(exclude: &[String], include: &[String]) -> Result<Self> {
        Ok(Self {
            root: None,
            exclude: PatternSet::compile(exclude)?,
            include: PatternSet::compile(include)?,
        })
    }

    /// Absolute ledger paths under `root` are matched relative to it.
    pub fn relative_to(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude.matches(&self.match_path(path))
    }

    /// Without include patterns every path is included.
    pub fn is_included(&self, path: &str) -> bool {
        self.include.is_empty() || self.include.matches(&self.match_path(path))
    }

    pub fn allows(&self, path: &str) -> bool {
        !self.is_excluded(path) && self.is_included(path)
    }

    fn match_path(&self, path: &str) -> String {
        let normalized = normalize_ledger_path(path);
        if let Some(root) = &self.root {
            if let Ok(relative) = Path::new(&normalized).strip_prefix(root) {
                return relative.to_string_lossy().replace('\\', "/");
            }
        }
        normalized
    }
}

#[derive(Debug, Clone)]
struct PatternSet {
    literals: HashSet<String>,
    globs: GlobSet,
}

impl PatternSet {
    fn compile(patterns: &[String]) -> Result<Self> {
        let mut literals = HashSet::new();
        let mut builder = GlobSetBuilder::new();
        for raw in patterns {
            let pattern = normalize_pattern(raw);
            if pattern.is_empty() {
                continue;
            }
            let glob = GlobBuilder::new(&pattern)
                .literal_separator(true)
                .backslash_escape(true)
                .build()
                .map_err(|e| SelectionError::InvalidGlob {
                    pattern: raw.clone(),
                    reason: e.to_string(),
                })?;
            builder.add(glob);
            literals.insert(pattern);
        }
        let globs = builder.build().map_err(|e| SelectionError::InvalidGlob {
            pattern: patterns.join(", "),
            reason: e.to_string(),
        })?;
        Ok(Self { literals, globs })
    }

    fn is_empty(&self) -> bool {
        self.literals.is_empty()
    }

    fn matches(&self, path: &str) -> bool {
        self.literals.contains(path) || self.globs.is_match(path)
    }
}

// Backslashes are escapes in patterns, so only `./` prefixes are stripped.
fn normalize_pattern(raw: &str) -> String {
    let mut value = raw.trim();
    while let Some(stripped) = value.strip_prefix("./") {
        value = stripped;
    }
    value.to_string()
}

/// Escape glob metacharacters so `path` only matches itself.
pub fn escape_glob_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '*' | '?' | '[' | ']' | '{' | '}' => {
                escaped.push('[');
                escaped.push(c);
                escaped.push(']');
            }
            _ => escaped.push(c),
        }
    }
    escaped
}
