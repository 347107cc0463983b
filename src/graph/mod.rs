//! Component graph construction, validation, and level-ordered scheduling.
//!
//! Builds the DAG of component specs from their declared dependency edges,
//! rejecting unresolved ids, duplicate edges, self-references, and cycles.
//! Cycle errors report the full cycle path, not just the first repeated node.
//!
//! Specs are interned into an index-addressed arena first; all graph
//! algorithms then operate on indices, with string ids resolved exactly once.

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use thiserror::Error;

use crate::manifest::ComponentSpec;

/// Structural errors detected before any generation starts.
///
/// All of these are fatal to the whole build invocation.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("component '{component}' depends on unknown component '{dependency}'")]
    UnresolvedDependency { component: String, dependency: String },

    #[error("component '{component}' lists dependency '{dependency}' more than once")]
    DuplicateDependency { component: String, dependency: String },

    #[error("component '{component}' depends on itself")]
    SelfDependency { component: String },

    #[error("circular dependency detected: {chain}")]
    Cycle { chain: String },
}

/// Color states for depth-first cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not yet visited.
    White,
    /// On the current recursion stack.
    Gray,
    /// Fully explored.
    Black,
}

/// A validated component DAG with a level-partitioned topological ordering.
///
/// Level `k` contains exactly the components whose dependencies all sit in
/// levels `< k`; everything within one level can build concurrently.
#[derive(Debug)]
pub struct ComponentGraph {
    specs: Vec<ComponentSpec>,
    index: HashMap<String, usize>,
    graph: DiGraph<usize, ()>,
    node_of: Vec<NodeIndex>,
    levels: Vec<Vec<usize>>,
}

impl ComponentGraph {
    /// Validate `specs` and produce the DAG, or fail with the first
    /// structural error found.
    pub fn build(specs: Vec<ComponentSpec>) -> Result<Self, GraphError> {
        let mut index = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            index.insert(spec.id.clone(), i);
        }

        // Resolve string ids to indices once; everything after this point
        // works on indices.
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let node_of: Vec<NodeIndex> = (0..specs.len()).map(|i| graph.add_node(i)).collect();

        for (i, spec) in specs.iter().enumerate() {
            let mut seen = HashMap::with_capacity(spec.dependencies.len());
            for dep in &spec.dependencies {
                let &dep_idx =
                    index.get(dep).ok_or_else(|| GraphError::UnresolvedDependency {
                        component: spec.id.clone(),
                        dependency: dep.clone(),
                    })?;
                if dep_idx == i {
                    return Err(GraphError::SelfDependency { component: spec.id.clone() });
                }
                if seen.insert(dep_idx, ()).is_some() {
                    return Err(GraphError::DuplicateDependency {
                        component: spec.id.clone(),
                        dependency: dep.clone(),
                    });
                }
                // Edge points from dependent to dependency.
                graph.add_edge(node_of[i], node_of[dep_idx], ());
            }
        }

        let mut built = Self {
            specs,
            index,
            graph,
            node_of,
            levels: Vec::new(),
        };
        built.detect_cycles()?;
        built.levels = built.compute_levels();
        Ok(built)
    }

    /// Depth-first cycle detection reporting the full cycle path.
    fn detect_cycles(&self) -> Result<(), GraphError> {
        let mut colors = vec![Color::White; self.specs.len()];
        let mut path: Vec<usize> = Vec::new();

        for start in 0..self.specs.len() {
            if colors[start] == Color::White
                && let Some(cycle) = self.dfs_visit(start, &mut colors, &mut path)
            {
                let chain = cycle
                    .iter()
                    .map(|&i| self.specs[i].id.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(GraphError::Cycle { chain });
            }
        }
        Ok(())
    }

    fn dfs_visit(
        &self,
        node: usize,
        colors: &mut [Color],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        colors[node] = Color::Gray;
        path.push(node);

        for neighbor in self.graph.neighbors(self.node_of[node]) {
            let n = self.graph[neighbor];
            match colors[n] {
                Color::Gray => {
                    // Close the cycle at its first occurrence on the path.
                    let start = path.iter().position(|&p| p == n).unwrap_or(0);
                    let mut cycle = path[start..].to_vec();
                    cycle.push(n);
                    return Some(cycle);
                }
                Color::White => {
                    if let Some(cycle) = self.dfs_visit(n, colors, path) {
                        return Some(cycle);
                    }
                }
                Color::Black => {}
            }
        }

        path.pop();
        colors[node] = Color::Black;
        None
    }

    /// Partition nodes into topological levels.
    ///
    /// `level[i] = 1 + max(level of dependencies)`, leaves at level 0. The
    /// result is deterministic for identical input because nodes keep their
    /// interning order within each level.
    fn compute_levels(&self) -> Vec<Vec<usize>> {
        let mut level = vec![usize::MAX; self.specs.len()];

        // Longest-path layering over the already-acyclic graph; iterate until
        // fixed point (bounded by graph depth).
        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..self.specs.len() {
                let deps_level = self
                    .graph
                    .neighbors(self.node_of[i])
                    .map(|n| level[self.graph[n]])
                    .max();
                let want = match deps_level {
                    None => 0,
                    Some(usize::MAX) => continue,
                    Some(l) => l + 1,
                };
                if level[i] != want {
                    level[i] = want;
                    changed = true;
                }
            }
        }

        let depth = level.iter().copied().max().map_or(0, |d| d + 1);
        let mut levels = vec![Vec::new(); depth];
        for (i, &l) in level.iter().enumerate() {
            levels[l].push(i);
        }
        levels
    }

    /// Components partitioned into parallelizable levels, dependencies first.
    pub fn levels(&self) -> impl Iterator<Item = Vec<&ComponentSpec>> {
        self.levels.iter().map(|lvl| lvl.iter().map(|&i| &self.specs[i]).collect())
    }

    /// Flat topological ordering, every dependency before its dependents.
    pub fn topological_order(&self) -> Vec<&ComponentSpec> {
        self.levels.iter().flatten().map(|&i| &self.specs[i]).collect()
    }

    pub fn get(&self, id: &str) -> Option<&ComponentSpec> {
        self.index.get(id).map(|&i| &self.specs[i])
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}
