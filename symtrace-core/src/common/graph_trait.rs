//! Shared graph traversal abstraction.
//!
//! Implemented by the call graph (in both directions) and by the same-file
//! view used for extraction scoring, so every "what is reachable from here"
//! question goes through the same BFS/DFS code.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

/// Trait for graph traversal operations.
///
/// Implementors should return neighbors in a deterministic order; the
/// visitation-order methods inherit that order.
pub trait GraphTraversal {
    /// The type used to identify nodes in the graph.
    type Node: Clone + Eq + Hash;

    /// Returns all neighbors (outgoing edges) of a node.
    fn neighbors(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Checks if the graph contains a node.
    fn contains_node(&self, node: &Self::Node) -> bool;

    /// Multi-source BFS: every node reachable from any root (roots included).
    ///
    /// Complexity: O(|V| + |E|) regardless of number of roots.
    fn reachable_from<I>(&self, roots: I) -> HashSet<Self::Node>
    where
        I: IntoIterator<Item = Self::Node>,
    {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        for root in roots {
            if self.contains_node(&root) && visited.insert(root.clone()) {
                queue.push_back(root);
            }
        }

        while let Some(node) = queue.pop_front() {
            for neighbor in self.neighbors(&node) {
                if visited.insert(neighbor.clone()) {
                    queue.push_back(neighbor);
                }
            }
        }

        visited
    }

    /// Single-root convenience wrapper around `reachable_from`.
    fn reachable_from_single(&self, root: Self::Node) -> HashSet<Self::Node> {
        self.reachable_from(std::iter::once(root))
    }

    /// Breadth-first visitation order starting at `start` (included first).
    fn bfs_order(&self, start: &Self::Node) -> Vec<Self::Node> {
        if !self.contains_node(start) {
            return Vec::new();
        }

        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(start.clone());
        queue.push_back(start.clone());

        while let Some(node) = queue.pop_front() {
            for neighbor in self.neighbors(&node) {
                if visited.insert(neighbor.clone()) {
                    queue.push_back(neighbor);
                }
            }
            order.push(node);
        }

        order
    }

    /// Depth-first (pre-order) visitation order starting at `start`.
    fn dfs_order(&self, start: &Self::Node) -> Vec<Self::Node> {
        if !self.contains_node(start) {
            return Vec::new();
        }

        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![start.clone()];

        while let Some(node) = stack.pop() {
            if !visited.insert(node.clone()) {
                continue;
            }
            // Reverse so the first neighbor is explored first.
            for neighbor in self.neighbors(&node).into_iter().rev() {
                if !visited.contains(&neighbor) {
                    stack.push(neighbor);
                }
            }
            order.push(node);
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    struct TestGraph {
        nodes: BTreeSet<String>,
        edges: BTreeMap<String, Vec<String>>,
    }

    impl TestGraph {
        fn new() -> Self {
            Self {
                nodes: BTreeSet::new(),
                edges: BTreeMap::new(),
            }
        }

        fn add_node(&mut self, node: &str) {
            self.nodes.insert(node.to_string());
        }

        fn add_edge(&mut self, from: &str, to: &str) {
            self.add_node(from);
            self.add_node(to);
            self.edges
                .entry(from.to_string())
                .or_default()
                .push(to.to_string());
        }
    }

    impl GraphTraversal for TestGraph {
        type Node = String;

        fn neighbors(&self, node: &String) -> Vec<String> {
            self.edges.get(node).cloned().unwrap_or_default()
        }

        fn contains_node(&self, node: &String) -> bool {
            self.nodes.contains(node)
        }
    }

    #[test]
    fn test_empty_graph() {
        let graph = TestGraph::new();
        assert!(graph.reachable_from(Vec::<String>::new()).is_empty());
        assert!(graph.bfs_order(&"a".to_string()).is_empty());
    }

    #[test]
    fn test_multi_source() {
        let mut graph = TestGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("c", "d");
        graph.add_node("unreachable");

        let reachable = graph.reachable_from(["a".to_string(), "c".to_string()]);
        assert_eq!(reachable.len(), 4);
        assert!(!reachable.contains("unreachable"));
    }

    #[test]
    fn test_cycle_terminates() {
        let mut graph = TestGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "c");
        graph.add_edge("c", "a");

        assert_eq!(graph.reachable_from_single("a".to_string()).len(), 3);
        assert_eq!(graph.dfs_order(&"b".to_string()), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_bfs_vs_dfs_order() {
        //   a -> b -> d
        //   a -> c
        let mut graph = TestGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("a", "c");
        graph.add_edge("b", "d");

        assert_eq!(graph.bfs_order(&"a".to_string()), vec!["a", "b", "c", "d"]);
        assert_eq!(graph.dfs_order(&"a".to_string()), vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn test_missing_root_ignored() {
        let mut graph = TestGraph::new();
        graph.add_node("a");

        let reachable = graph.reachable_from(["a".to_string(), "missing".to_string()]);
        assert_eq!(reachable.len(), 1);
    }
}
