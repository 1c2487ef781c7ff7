use crate::aggregate::{aggregate, RuleCandidate};
use crate::eligibility::ReachableFiles;
use crate::error::{Result, SelectionError};
use crate::globs::FileGlobs;
use crate::ledger::{RuleMetadata, ViolationLedger};
use crate::options::{DependencyScope, LimitKind, SelectionLimit, SelectionOptions};
use crate::select::{select, SelectionResult};
use paydown_graph::{
    CacheKey, CacheStore, DependencyGraph, DependencyGraphCache, FsCacheStore, GraphBuilder,
    GraphError, ModuleAnalyzer, SourceImportAnalyzer,
};
use std::path::{Path, PathBuf};

/// Runs selections for one project root.
///
/// The graph cache is owned by the engine and passed in at construction; there
/// is no process-wide cache.
pub struct SelectionEngine<S, A> {
    root: PathBuf,
    builder: GraphBuilder<A>,
    cache: DependencyGraphCache<S>,
}

impl SelectionEngine<FsCacheStore, SourceImportAnalyzer> {
    /// Tree-sitter analysis with the on-disk cache under `<root>/.paydown/cache`.
    pub fn for_project(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let cache = DependencyGraphCache::new(FsCacheStore::for_project_root(&root));
        Self::new(root, SourceImportAnalyzer::new(), cache)
    }
}

impl<S: CacheStore, A: ModuleAnalyzer> SelectionEngine<S, A> {
    pub fn new(root: impl Into<PathBuf>, analyzer: A, cache: DependencyGraphCache<S>) -> Self {
        Self {
            root: root.into(),
            builder: GraphBuilder::new(analyzer),
            cache,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &DependencyGraphCache<S> {
        &self.cache
    }

    /// Pick the next rule to pay down.
    pub async fn select(
        &self,
        ledger: &ViolationLedger,
        metadata: &RuleMetadata,
        options: &SelectionOptions,
        limit: &SelectionLimit,
    ) -> Result<SelectionResult> {
        let candidates = self
            .candidates(ledger, metadata, options, limit.kind())
            .await?;
        let result = select(&candidates, limit, options);

        match &result {
            SelectionResult::Success(selection) => log::info!(
                "Selected rule {} ({:?}) from {} candidates under a {} limit of {}",
                selection.rule_id,
                selection.mode,
                candidates.len(),
                limit.kind().as_str(),
                limit.count()
            ),
            SelectionResult::Failure => log::info!(
                "No rule fits a {} limit of {} ({} candidates)",
                limit.kind().as_str(),
                limit.count(),
                candidates.len()
            ),
        }
        Ok(result)
    }

    /// Eligible candidates for `ledger`, resolving the dependency scope first
    /// when one is active.
    pub async fn candidates(
        &self,
        ledger: &ViolationLedger,
        metadata: &RuleMetadata,
        options: &SelectionOptions,
        limit_kind: LimitKind,
    ) -> Result<Vec<RuleCandidate>> {
        // Reject bad globs before paying for dependency analysis
        FileGlobs::compile(&options.exclude_file_globs, &options.include_file_globs)?;

        let reachable = match options.active_scope() {
            Some(scope) => Some(self.resolve_scope(scope).await?),
            None => None,
        };
        let root = self
            .root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone());
        aggregate(ledger, metadata, options, limit_kind, Some(&root), reachable.as_ref())
    }

    /// Files connected to the scope's entry points.
    pub async fn resolve_scope(&self, scope: &DependencyScope) -> Result<ReachableFiles> {
        let graph = self.dependency_graph(scope).await?;
        if graph.entry_points.is_empty() {
            log::warn!("None of the configured entry points exist; no file is in scope");
        }
        let files = graph.reachable(&graph.entry_points, scope.mode, scope.max_depth);
        log::debug!(
            "Dependency scope ({}) covers {} of {} files",
            scope.mode.as_str(),
            files.len(),
            graph.node_count()
        );
        Ok(ReachableFiles::new(self.canonical_root()?, files))
    }

    /// The scope's graph, from the cache when a valid entry exists.
    pub async fn dependency_graph(&self, scope: &DependencyScope) -> Result<DependencyGraph> {
        let root = self.canonical_root()?;
        let key = CacheKey::new(
            &root,
            &scope.entry_points,
            scope.mode,
            scope.max_depth,
            &scope.exclude_patterns,
        );

        if let Some(graph) = self.cache.get(&key).await {
            log::debug!("Using cached dependency graph ({} nodes)", graph.node_count());
            return Ok(graph);
        }

        let graph = self
            .builder
            .build(
                &scope.entry_points,
                &root,
                &scope.exclude_patterns,
                scope.max_depth,
            )
            .await?;
        if let Err(err) = self.cache.store_graph(&key, &graph).await {
            log::warn!("Failed to write dependency graph cache: {err}");
        }
        Ok(graph)
    }

    pub async fn clear_cache(&self) -> Result<()> {
        self.cache.clear().await?;
        Ok(())
    }

    fn canonical_root(&self) -> Result<PathBuf> {
        self.root.canonicalize().map_err(|e| {
            SelectionError::from(GraphError::InvalidRoot(format!(
                "{}: {e}",
                self.root.display()
            )))
        })
    }
}
