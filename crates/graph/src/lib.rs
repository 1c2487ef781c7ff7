//! # Paydown Graph
//!
//! File-level import graphs used to scope lint paydown to the code reachable
//! from a set of entry points.
//!
//! ## Pipeline
//!
//! ```text
//! Project root + entry points
//!     │
//!     ├──> Module Analyzer (tree-sitter, .gitignore aware)
//!     │      └─> modules + resolved imports (internal / external)
//!     │
//!     ├──> Graph Builder
//!     │      ├─ Pass 1: one node per module
//!     │      ├─ Pass 2: dependency edges, derived dependents
//!     │      └─ Pass 3: BFS depth from entry points
//!     │
//!     ├──> Dependency Graph Cache (config hash + sampled mtimes)
//!     │
//!     └──> Reachability (dependencies / dependents / connected)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use paydown_graph::{
//!     CacheKey, DependencyGraphCache, FsCacheStore, GraphBuilder, ScopeMode, SourceImportAnalyzer,
//! };
//! use std::path::{Path, PathBuf};
//!
//! #[tokio::main]
//! async fn main() -> paydown_graph::Result<()> {
//!     let root = Path::new("/path/to/project");
//!     let entries = vec![PathBuf::from("src/index.ts")];
//!     let cache = DependencyGraphCache::new(FsCacheStore::for_project_root(root));
//!     let key = CacheKey::new(root, &entries, ScopeMode::Connected, None, &[]);
//!
//!     let graph = match cache.get(&key).await {
//!         Some(graph) => graph,
//!         None => {
//!             let graph = GraphBuilder::new(SourceImportAnalyzer::new())
//!                 .build(&entries, root, &[], None)
//!                 .await?;
//!             cache.store_graph(&key, &graph).await?;
//!             graph
//!         }
//!     };
//!
//!     let reachable = graph.reachable(&graph.entry_points, ScopeMode::Connected, None);
//!     println!("{} files in scope", reachable.len());
//!     Ok(())
//! }
//! ```

mod analyzer;
mod builder;
mod cache;
mod error;
mod paths;
mod reachability;
mod types;

pub use analyzer::{AnalysisRequest, ModuleAnalyzer, SourceImportAnalyzer};
pub use builder::{assemble_graph, GraphBuilder};
pub use cache::{
    sample_tracked_files, AnalysisCache, CacheKey, CacheStore, DependencyGraphCache,
    FsCacheStore, MemoryCacheStore, CACHE_FORMAT_VERSION, DEFAULT_MTIME_SAMPLE,
    PROJECT_CACHE_DIR,
};
pub use error::{GraphError, Result};
pub use paths::{normalize_lexically, relative_slash_path, resolve_under};
pub use types::{DependencyGraph, DependencyNode, ImportTarget, ModuleRecord, ScopeMode};
