//! Circular import detection.
//!
//! Depth-first search over the file import graph with an explicit on-stack
//! set and the running path. Reaching a node that is still on the stack
//! closes a cycle: the path from that node's position to the top. A cycle is
//! reported once per member set, whatever rotation it was found in.

use petgraph::graphmap::DiGraphMap;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Builds the import graph as a `DiGraphMap` over borrowed file paths.
pub fn build_import_graph(import_graph: &BTreeMap<String, BTreeSet<String>>) -> DiGraphMap<&str, ()> {
    let mut g = DiGraphMap::new();
    for (file, targets) in import_graph {
        g.add_node(file.as_str());
        for target in targets {
            g.add_edge(file.as_str(), target.as_str(), ());
        }
    }
    g
}

struct CycleFinder<'a> {
    graph: &'a DiGraphMap<&'a str, ()>,
    visited: HashSet<&'a str>,
    on_stack: HashSet<&'a str>,
    path: Vec<&'a str>,
    seen: HashSet<Vec<&'a str>>,
    cycles: Vec<Vec<String>>,
}

impl<'a> CycleFinder<'a> {
    fn visit(&mut self, node: &'a str) {
        self.visited.insert(node);
        self.on_stack.insert(node);
        self.path.push(node);

        let mut next: Vec<&'a str> = self.graph.neighbors(node).collect();
        next.sort_unstable();
        for n in next {
            if self.on_stack.contains(n) {
                if let Some(pos) = self.path.iter().position(|p| *p == n) {
                    let cycle = &self.path[pos..];
                    let mut members = cycle.to_vec();
                    members.sort_unstable();
                    if self.seen.insert(members) {
                        self.cycles.push(cycle.iter().map(|s| s.to_string()).collect());
                    }
                }
            } else if !self.visited.contains(n) {
                self.visit(n);
            }
        }

        self.path.pop();
        self.on_stack.remove(node);
    }
}

/// Every distinct import cycle, sorted for deterministic output.
pub fn find_cycles(import_graph: &BTreeMap<String, BTreeSet<String>>) -> Vec<Vec<String>> {
    let graph = build_import_graph(import_graph);
    let mut finder = CycleFinder {
        graph: &graph,
        visited: HashSet::new(),
        on_stack: HashSet::new(),
        path: Vec::new(),
        seen: HashSet::new(),
        cycles: Vec::new(),
    };

    let mut roots: Vec<&str> = graph.nodes().collect();
    roots.sort_unstable();
    for root in roots {
        if !finder.visited.contains(root) {
            finder.visit(root);
        }
    }

    let mut cycles = finder.cycles;
    cycles.sort();
    cycles
}
