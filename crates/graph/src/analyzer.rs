use crate::error::{GraphError, Result};
use crate::paths::{normalize_lexically, relative_slash_path};
use crate::types::{ImportTarget, ModuleRecord};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use tree_sitter::{Node, Parser};

/// Inputs handed to a module analyzer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// Canonical project root
    pub root: PathBuf,

    /// Canonical entry point paths (informational; analyzers may ignore)
    pub entry_points: Vec<PathBuf>,

    /// Globs (relative to `root`) whose files are left out of the analysis
    pub exclude_patterns: Vec<String>,
}

/// Static-analysis collaborator that lists modules and their resolved imports.
///
/// An `Err` means no module list could be produced; the builder never turns
/// that into an empty graph.
#[async_trait]
pub trait ModuleAnalyzer: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Vec<ModuleRecord>>;
}

/// Tree-sitter based import extractor for JavaScript and TypeScript sources
#[derive(Debug, Clone, Default)]
pub struct SourceImportAnalyzer;

impl SourceImportAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ModuleAnalyzer for SourceImportAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Vec<ModuleRecord>> {
        let request = request.clone();
        tokio::task::spawn_blocking(move || analyze_sources(&request))
            .await
            .map_err(|e| GraphError::AnalysisFailed(format!("analyzer task panicked: {e}")))?
    }
}

const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// Skipped at any depth.
const IGNORED_SCOPES: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".paydown",
    "node_modules",
    "bower_components",
];

/// Build output and tool caches, skipped only directly under the root.
const IGNORED_ROOT_SCOPES: &[&str] = &[
    ".cache",
    ".next",
    ".turbo",
    ".nuxt",
    ".svelte-kit",
    "coverage",
    "dist",
    "build",
    "out",
    "target",
];

fn analyze_sources(request: &AnalysisRequest) -> Result<Vec<ModuleRecord>> {
    let root = &request.root;
    if !root.is_dir() {
        return Err(GraphError::InvalidRoot(root.display().to_string()));
    }

    let excludes = compile_excludes(&request.exclude_patterns)?;
    let files = discover_sources(root, &excludes);
    log::debug!(
        "Import analysis discovered {} source files under {}",
        files.len(),
        root.display()
    );

    let mut extractor = ImportExtractor::new()?;
    let mut modules = Vec::with_capacity(files.len());
    for file in &files {
        let source = match std::fs::read_to_string(file) {
            Ok(source) => source,
            Err(err) => {
                log::warn!("Failed to read {}: {err}", file.display());
                modules.push(ModuleRecord::new(file.clone()));
                continue;
            }
        };

        let base_dir = file.parent().unwrap_or(root.as_path());
        let imports = extractor
            .extract(file, &source)
            .into_iter()
            .map(|specifier| resolve_specifier(base_dir, &specifier, &files))
            .collect();
        modules.push(ModuleRecord {
            path: file.clone(),
            imports,
        });
    }

    Ok(modules)
}

fn compile_excludes(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            continue;
        }
        let glob = Glob::new(trimmed).map_err(|e| GraphError::InvalidPattern {
            pattern: trimmed.to_string(),
            reason: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| GraphError::InvalidPattern {
        pattern: patterns.join(","),
        reason: e.to_string(),
    })
}

fn discover_sources(root: &Path, excludes: &GlobSet) -> BTreeSet<PathBuf> {
    let mut files = BTreeSet::new();

    let scope_root = root.to_path_buf();
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .require_git(false);
    builder.filter_entry(move |entry| !is_ignored_scope(entry.path(), &scope_root));

    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Failed to read entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = normalize_lexically(entry.path());
        if !is_source_file(&path) {
            continue;
        }
        if let Some(rel) = relative_slash_path(root, &path) {
            if excludes.is_match(&rel) {
                log::debug!("Excluded from analysis: {rel}");
                continue;
            }
        }
        files.insert(path);
    }

    files
}

fn is_ignored_scope(path: &Path, root: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    relative
        .components()
        .enumerate()
        .any(|(depth, component)| match component {
            Component::Normal(name) => {
                let name = name.to_string_lossy();
                IGNORED_SCOPES.contains(&name.as_ref())
                    || (depth == 0 && IGNORED_ROOT_SCOPES.contains(&name.as_ref()))
            }
            _ => false,
        })
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Resolve an import specifier the way a bundler would for relative paths.
fn resolve_specifier(base_dir: &Path, specifier: &str, files: &BTreeSet<PathBuf>) -> ImportTarget {
    let is_relative = specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || specifier.starts_with('/');
    if !is_relative {
        return ImportTarget::External(specifier.to_string());
    }

    let target = normalize_lexically(&base_dir.join(specifier));
    match resolution_candidates(&target)
        .into_iter()
        .find(|candidate| files.contains(candidate))
    {
        Some(found) => ImportTarget::Internal(found),
        None => ImportTarget::External(specifier.to_string()),
    }
}

fn resolution_candidates(target: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![target.to_path_buf()];

    for ext in SOURCE_EXTENSIONS {
        candidates.push(with_appended_extension(target, ext));
    }

    // TypeScript sources commonly import their compiled `.js` name.
    if let Some(ext) = target.extension().and_then(|e| e.to_str()) {
        let swaps: &[&str] = match ext {
            "js" => &["ts", "tsx"],
            "jsx" => &["tsx"],
            "mjs" => &["mts"],
            "cjs" => &["cts"],
            _ => &[],
        };
        for swap in swaps {
            candidates.push(target.with_extension(swap));
        }
    }

    for ext in SOURCE_EXTENSIONS {
        candidates.push(target.join(format!("index.{ext}")));
    }

    candidates
}

fn with_appended_extension(path: &Path, ext: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_owned();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceDialect {
    JavaScript,
    TypeScript,
    Tsx,
}

impl SourceDialect {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ts" | "mts" | "cts") => SourceDialect::TypeScript,
            Some("tsx") => SourceDialect::Tsx,
            _ => SourceDialect::JavaScript,
        }
    }
}

struct ImportExtractor {
    javascript: Parser,
    typescript: Parser,
    tsx: Parser,
}

impl ImportExtractor {
    fn new() -> Result<Self> {
        Ok(Self {
            javascript: parser_for(tree_sitter_javascript::LANGUAGE.into())?,
            typescript: parser_for(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())?,
            tsx: parser_for(tree_sitter_typescript::LANGUAGE_TSX.into())?,
        })
    }

    fn extract(&mut self, path: &Path, source: &str) -> Vec<String> {
        let parser = match SourceDialect::for_path(path) {
            SourceDialect::JavaScript => &mut self.javascript,
            SourceDialect::TypeScript => &mut self.typescript,
            SourceDialect::Tsx => &mut self.tsx,
        };

        let Some(tree) = parser.parse(source, None) else {
            log::warn!("Failed to parse {}", path.display());
            return Vec::new();
        };

        let mut specifiers = Vec::new();
        collect_specifiers(tree.root_node(), source.as_bytes(), &mut specifiers);
        specifiers
    }
}

fn parser_for(language: tree_sitter::Language) -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| GraphError::AnalysisFailed(format!("Failed to set language: {e}")))?;
    Ok(parser)
}

fn collect_specifiers(node: Node, source: &[u8], out: &mut Vec<String>) {
    match node.kind() {
        "import_statement" | "export_statement" => {
            if let Some(literal) = node.child_by_field_name("source") {
                push_string_literal(literal, source, out);
            }
        }
        "call_expression" => {
            if let Some(function) = node.child_by_field_name("function") {
                let is_require = function.kind() == "identifier"
                    && function.utf8_text(source).is_ok_and(|name| name == "require");
                let is_dynamic_import = function.kind() == "import";
                if is_require || is_dynamic_import {
                    if let Some(first) = node
                        .child_by_field_name("arguments")
                        .and_then(|args| args.named_child(0))
                    {
                        push_string_literal(first, source, out);
                    }
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_specifiers(child, source, out);
    }
}

fn push_string_literal(node: Node, source: &[u8], out: &mut Vec<String>) {
    if node.kind() != "string" {
        return;
    }
    if let Ok(text) = node.utf8_text(source) {
        let value = text.trim_matches(|c| c == '"' || c == '\'');
        if !value.is_empty() {
            out.push(value.to_string());
        }
    }
}
