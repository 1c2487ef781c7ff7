use crate::analyzer::{AnalysisRequest, ModuleAnalyzer};
use crate::error::{GraphError, Result};
use crate::paths::resolve_under;
use crate::types::{DependencyGraph, DependencyNode, ImportTarget, ModuleRecord};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

/// Build file-level dependency graphs from analyzer output
pub struct GraphBuilder<A> {
    analyzer: A,
}

impl<A: ModuleAnalyzer> GraphBuilder<A> {
    pub fn new(analyzer: A) -> Self {
        Self { analyzer }
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    /// Analyze `root_dir` and build the graph seen from `entry_points`.
    ///
    /// Entry points may be absolute or relative to `root_dir`; ones that do not
    /// exist are skipped with a warning. Fails when the analyzer cannot produce
    /// a module list.
    pub async fn build(
        &self,
        entry_points: &[PathBuf],
        root_dir: &Path,
        exclude_patterns: &[String],
        max_depth: Option<usize>,
    ) -> Result<DependencyGraph> {
        let root = root_dir.canonicalize().map_err(|e| {
            GraphError::InvalidRoot(format!("{}: {e}", root_dir.display()))
        })?;
        let entries = canonical_entry_points(&root, entry_points);

        let request = AnalysisRequest {
            root: root.clone(),
            entry_points: entries.clone(),
            exclude_patterns: exclude_patterns.to_vec(),
        };
        let modules = self.analyzer.analyze(&request).await?;
        if modules.is_empty() {
            return Err(GraphError::NoModules(root.display().to_string()));
        }

        let graph = assemble_graph(modules, &entries, max_depth);
        log::info!(
            "Built dependency graph: {} nodes, {} edges, {} entry points ({} external imports)",
            graph.node_count(),
            graph.edge_count(),
            graph.entry_points.len(),
            graph.excluded.len()
        );
        Ok(graph)
    }
}

fn canonical_entry_points(root: &Path, entry_points: &[PathBuf]) -> Vec<PathBuf> {
    let mut resolved = BTreeSet::new();
    for raw in entry_points {
        let candidate = resolve_under(root, raw);
        match candidate.canonicalize() {
            Ok(path) => {
                resolved.insert(path);
            }
            Err(err) => log::warn!("Ignoring entry point {}: {err}", candidate.display()),
        }
    }
    resolved.into_iter().collect()
}

/// Assemble a graph from analyzer records in three passes: nodes, edges, depths.
pub fn assemble_graph(
    modules: Vec<ModuleRecord>,
    entry_points: &[PathBuf],
    max_depth: Option<usize>,
) -> DependencyGraph {
    let entry_set: BTreeSet<&PathBuf> = entry_points.iter().collect();

    // Pass 1: one node per module, no edges yet
    let mut nodes: BTreeMap<PathBuf, DependencyNode> = BTreeMap::new();
    for module in &modules {
        let is_entry = entry_set.contains(&module.path);
        nodes
            .entry(module.path.clone())
            .or_insert_with(|| DependencyNode::new(module.path.clone(), is_entry));
    }

    // Pass 2: resolve imports against existing nodes only
    let mut dependencies: BTreeMap<&PathBuf, BTreeSet<PathBuf>> = BTreeMap::new();
    let mut excluded: BTreeSet<String> = BTreeSet::new();
    for module in &modules {
        let targets = dependencies.entry(&module.path).or_default();
        for import in &module.imports {
            match import {
                ImportTarget::Internal(target) if nodes.contains_key(target) => {
                    targets.insert(target.clone());
                }
                ImportTarget::Internal(target) => {
                    excluded.insert(target.display().to_string());
                }
                ImportTarget::External(specifier) => {
                    excluded.insert(specifier.clone());
                }
            }
        }
    }

    let mut dependents: BTreeMap<PathBuf, BTreeSet<PathBuf>> = BTreeMap::new();
    for (source, targets) in &dependencies {
        for target in targets {
            dependents
                .entry(target.clone())
                .or_default()
                .insert((*source).clone());
        }
    }

    let dependencies: BTreeMap<PathBuf, Vec<PathBuf>> = dependencies
        .into_iter()
        .map(|(source, targets)| (source.clone(), targets.into_iter().collect()))
        .collect();
    for (path, node) in nodes.iter_mut() {
        if let Some(targets) = dependencies.get(path) {
            node.dependencies = targets.clone();
        }
        if let Some(sources) = dependents.remove(path) {
            node.dependents = sources.into_iter().collect();
        }
    }

    let present_entries: Vec<PathBuf> = entry_points
        .iter()
        .filter(|path| {
            let present = nodes.contains_key(*path);
            if !present {
                log::warn!("Entry point {} is not an analyzed module", path.display());
            }
            present
        })
        .cloned()
        .collect();

    let mut graph = DependencyGraph::new(present_entries);
    graph.nodes = nodes;
    graph.excluded = excluded.into_iter().collect();

    // Pass 3: distances from the nearest entry point
    assign_depths(&mut graph, max_depth);
    graph
}

fn assign_depths(graph: &mut DependencyGraph, max_depth: Option<usize>) {
    for node in graph.nodes.values_mut() {
        node.depth = if node.is_entry_point { Some(0) } else { None };
    }

    let mut queue: VecDeque<(PathBuf, usize)> = graph
        .entry_points
        .iter()
        .map(|path| (path.clone(), 0))
        .collect();

    while let Some((path, depth)) = queue.pop_front() {
        if max_depth.is_some_and(|max| depth >= max) {
            continue;
        }
        let next: Vec<PathBuf> = graph
            .nodes
            .get(&path)
            .map(|node| node.dependencies.clone())
            .unwrap_or_default();
        for target in next {
            if let Some(node) = graph.nodes.get_mut(&target) {
                if node.depth.is_none() {
                    node.depth = Some(depth + 1);
                    queue.push_back((target, depth + 1));
                }
            }
        }
    }
}
