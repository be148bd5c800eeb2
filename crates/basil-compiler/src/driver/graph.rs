//! Module dependency graph
//!
//! Tracks which IR modules depend on which and provides:
//! - Cycle detection
//! - Topological ordering for compilation (dependencies first)

use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors related to module graph operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Circular dependency detected
    #[error("circular dependency detected: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),

    /// Module not found in graph
    #[error("module not found in graph: {0}")]
    ModuleNotFound(String),

    #[error("module '{0}' appears more than once")]
    DuplicateModule(String),

    /// A module names a dependency that is not part of the compilation
    #[error("module '{module}' depends on unknown module '{dependency}'")]
    UnknownDependency { module: String, dependency: String },
}

/// A node in the module graph
#[derive(Debug, Clone, Default)]
pub struct ModuleNode {
    /// Modules this module depends on
    pub imports: BTreeSet<String>,
    /// Modules that depend on this module
    pub imported_by: BTreeSet<String>,
}

/// Module dependency graph keyed by module name
#[derive(Debug, Default, Clone)]
pub struct ModuleGraph {
    nodes: BTreeMap<String, ModuleNode>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module to the graph; adding it again is a no-op
    pub fn add_module(&mut self, name: impl Into<String>) {
        self.nodes.entry(name.into()).or_default();
    }

    /// Record that `from` depends on `to`, adding both modules if needed
    pub fn add_dependency(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let from = from.into();
        let to = to.into();
        self.nodes
            .entry(from.clone())
            .or_default()
            .imports
            .insert(to.clone());
        self.nodes.entry(to).or_default().imported_by.insert(from);
    }

    pub fn get(&self, name: &str) -> Option<&ModuleNode> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Module names in sorted order
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Modules nothing else depends on
    pub fn entry_points(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.imported_by.is_empty())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Detect cycles in the graph
    ///
    /// The error carries the cycle path, closed by repeating its first module.
    pub fn detect_cycles(&self) -> Result<(), GraphError> {
        let mut visited = BTreeSet::new();
        let mut on_stack = BTreeSet::new();
        let mut path = Vec::new();

        for start in self.nodes.keys() {
            if visited.contains(start.as_str()) {
                continue;
            }
            if let Some(cycle) = self.find_cycle(start, &mut visited, &mut on_stack, &mut path) {
                return Err(GraphError::CircularDependency(cycle));
            }
        }
        Ok(())
    }

    fn find_cycle<'g>(
        &'g self,
        name: &'g str,
        visited: &mut BTreeSet<&'g str>,
        on_stack: &mut BTreeSet<&'g str>,
        path: &mut Vec<&'g str>,
    ) -> Option<Vec<String>> {
        visited.insert(name);
        on_stack.insert(name);
        path.push(name);

        if let Some(node) = self.nodes.get(name) {
            for dep in &node.imports {
                if on_stack.contains(dep.as_str()) {
                    let start = path.iter().position(|p| *p == dep.as_str()).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..].iter().map(|p| p.to_string()).collect();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
                if !visited.contains(dep.as_str()) {
                    if let Some(cycle) = self.find_cycle(dep, visited, on_stack, path) {
                        return Some(cycle);
                    }
                }
            }
        }

        path.pop();
        on_stack.remove(name);
        None
    }

    /// Order modules so each comes after all of its dependencies
    ///
    /// Kahn's algorithm over the remaining-import counts. Ties are broken by
    /// name, so the order is deterministic.
    pub fn topological_order(&self) -> Result<Vec<String>, GraphError> {
        let mut remaining: BTreeMap<&str, usize> = self
            .nodes
            .iter()
            .map(|(name, node)| (name.as_str(), node.imports.len()))
            .collect();
        let mut ready: BTreeSet<&str> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(name) = ready.pop_first() {
            order.push(name.to_string());
            let Some(node) = self.nodes.get(name) else {
                continue;
            };
            for dependent in &node.imported_by {
                if let Some(count) = remaining.get_mut(dependent.as_str()) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dependent.as_str());
                    }
                }
            }
        }

        if order.len() < self.nodes.len() {
            self.detect_cycles()?;
        }
        Ok(order)
    }

    /// All modules `name` depends on, directly or transitively, sorted
    pub fn transitive_dependencies(&self, name: &str) -> Result<Vec<String>, GraphError> {
        let node = self
            .nodes
            .get(name)
            .ok_or_else(|| GraphError::ModuleNotFound(name.to_string()))?;

        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = node.imports.iter().map(String::as_str).collect();
        while let Some(dep) = stack.pop() {
            if !seen.insert(dep) {
                continue;
            }
            if let Some(node) = self.nodes.get(dep) {
                stack.extend(node.imports.iter().map(String::as_str));
            }
        }
        Ok(seen.into_iter().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_graph() {
        let mut graph = ModuleGraph::new();
        graph.add_dependency("main", "utils");

        assert_eq!(graph.len(), 2);
        assert!(graph.contains("main"));
        assert!(graph.contains("utils"));
        assert_eq!(graph.entry_points(), vec!["main"]);
    }

    #[test]
    fn test_topological_order_dependencies_first() {
        // app -> ui -> core, app -> net -> core
        let mut graph = ModuleGraph::new();
        graph.add_dependency("app", "ui");
        graph.add_dependency("app", "net");
        graph.add_dependency("ui", "core");
        graph.add_dependency("net", "core");
        graph.add_module("standalone");

        let order = graph.topological_order().unwrap();
        assert_eq!(order, vec!["core", "net", "standalone", "ui", "app"]);
    }

    #[test]
    fn test_cycle_detection() {
        let mut graph = ModuleGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "c");
        graph.add_dependency("c", "a");
        graph.add_dependency("d", "a");

        let err = graph.detect_cycles().unwrap_err();
        assert_eq!(
            err,
            GraphError::CircularDependency(vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string(),
                "a".to_string()
            ])
        );
        assert!(matches!(
            graph.topological_order(),
            Err(GraphError::CircularDependency(_))
        ));
        assert_eq!(err.to_string(), "circular dependency detected: a -> b -> c -> a");
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let mut graph = ModuleGraph::new();
        graph.add_dependency("a", "a");
        assert!(graph.detect_cycles().is_err());
    }

    #[test]
    fn test_transitive_dependencies() {
        let mut graph = ModuleGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "c");
        graph.add_dependency("b", "d");

        assert_eq!(graph.transitive_dependencies("a").unwrap(), vec!["b", "c", "d"]);
        assert!(graph.transitive_dependencies("d").unwrap().is_empty());
        assert!(matches!(
            graph.transitive_dependencies("zzz"),
            Err(GraphError::ModuleNotFound(_))
        ));
    }
}
