use crate::types::{DependencyGraph, ScopeMode};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Dependencies,
    Dependents,
}

impl DependencyGraph {
    /// Files connected to `entry_points` in the requested direction(s).
    ///
    /// Entry points missing from the graph are ignored. With `max_depth`, each
    /// hop from an entry point consumes one unit and farther files are left out.
    pub fn reachable(
        &self,
        entry_points: &[PathBuf],
        mode: ScopeMode,
        max_depth: Option<usize>,
    ) -> BTreeSet<PathBuf> {
        let seeds: Vec<&Path> = entry_points
            .iter()
            .map(PathBuf::as_path)
            .filter(|path| self.contains(path))
            .collect();

        let mut result: BTreeSet<PathBuf> = seeds.iter().map(|p| p.to_path_buf()).collect();
        match mode {
            ScopeMode::Dependencies => {
                result.extend(self.traverse(&seeds, Direction::Dependencies, max_depth));
            }
            ScopeMode::Dependents => {
                result.extend(self.traverse(&seeds, Direction::Dependents, max_depth));
            }
            ScopeMode::Connected => {
                result.extend(self.traverse(&seeds, Direction::Dependencies, max_depth));
                result.extend(self.traverse(&seeds, Direction::Dependents, max_depth));
            }
        }
        result
    }

    fn traverse(
        &self,
        seeds: &[&Path],
        direction: Direction,
        max_depth: Option<usize>,
    ) -> HashSet<PathBuf> {
        let mut visited: HashSet<PathBuf> = seeds.iter().map(|p| p.to_path_buf()).collect();
        let mut queue: VecDeque<(&Path, usize)> = seeds.iter().map(|p| (*p, 0)).collect();

        while let Some((current, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            let Some(node) = self.node(current) else {
                continue;
            };
            let neighbors = match direction {
                Direction::Dependencies => &node.dependencies,
                Direction::Dependents => &node.dependents,
            };
            for next in neighbors {
                if visited.insert(next.clone()) {
                    queue.push_back((next.as_path(), depth + 1));
                }
            }
        }

        visited
    }
}
