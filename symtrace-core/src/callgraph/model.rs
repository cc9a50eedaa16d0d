//! Function-level graph types.
//!
//! Nodes are keyed by `file:name` (the same key shape as symbol traces).
//! Edges are kept sorted and unique, with forward and reverse adjacency
//! rebuilt whenever a graph is assembled or loaded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use crate::common::GraphTraversal;
use crate::model::symbol_key;

/// Schema version of a serialized function graph.
pub const GRAPH_VERSION: u32 = 1;

/// Static judgement of whether a function has observable side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Purity {
    Pure,
    Impure,
    #[default]
    Unknown,
}

impl fmt::Display for Purity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pure => "pure",
            Self::Impure => "impure",
            Self::Unknown => "unknown",
        })
    }
}

/// One function, method or nested function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionNode {
    /// `file:name`
    pub id: String,
    /// Local name: `helper`, `Parser.parse`, `outer.inner`.
    pub name: String,
    pub file_path: String,
    pub line: usize,
    pub end_line: usize,
    pub is_exported: bool,
    /// Class/impl member; cannot be moved on its own.
    pub is_method: bool,
    /// Declared inside another function; cannot be moved on its own.
    pub is_nested: bool,
    pub purity: Purity,
    #[serde(default)]
    pub impurity_reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl FunctionNode {
    pub fn new(file_path: &str, name: &str, line: usize, end_line: usize) -> Self {
        Self {
            id: symbol_key(file_path, name),
            name: name.to_string(),
            file_path: file_path.to_string(),
            line,
            end_line,
            is_exported: false,
            is_method: false,
            is_nested: false,
            purity: Purity::Unknown,
            impurity_reasons: Vec::new(),
            signature: None,
        }
    }

    /// Free, top-level function that could be moved to another file.
    pub fn is_relocatable(&self) -> bool {
        !self.is_method && !self.is_nested
    }

    /// Last `.`-separated component of the name (`Parser.parse` -> `parse`).
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn mark_impure(&mut self, reason: impl Into<String>) {
        self.purity = Purity::Impure;
        let reason = reason.into();
        if !self.impurity_reasons.contains(&reason) {
            self.impurity_reasons.push(reason);
        }
    }
}

/// Directed call from one function to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallEdge {
    pub from: String,
    pub to: String,
}

impl CallEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Aggregate counts over a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub total_functions: usize,
    pub pure_functions: usize,
    pub impure_functions: usize,
    pub unknown_functions: usize,
    pub exported_functions: usize,
    pub total_edges: usize,
}

impl GraphStats {
    pub fn compute(nodes: &BTreeMap<String, FunctionNode>, edges: &[CallEdge]) -> Self {
        let mut stats = Self {
            total_functions: nodes.len(),
            total_edges: edges.len(),
            ..Self::default()
        };
        for node in nodes.values() {
            match node.purity {
                Purity::Pure => stats.pure_functions += 1,
                Purity::Impure => stats.impure_functions += 1,
                Purity::Unknown => stats.unknown_functions += 1,
            }
            if node.is_exported {
                stats.exported_functions += 1;
            }
        }
        stats
    }
}

/// Whole-project call graph.
///
/// Serializes with nodes as an array sorted by id; loading keys them by id
/// again and rebuilds the adjacency indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "GraphSnapshot", from = "GraphSnapshot")]
pub struct FunctionGraph {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub root_dir: PathBuf,
    pub nodes: BTreeMap<String, FunctionNode>,
    pub edges: Vec<CallEdge>,
    pub files: Vec<String>,
    pub stats: GraphStats,
    callees: BTreeMap<String, Vec<String>>,
    callers: BTreeMap<String, Vec<String>>,
}

impl FunctionGraph {
    /// Assemble a graph, dropping edges whose endpoints are unknown and
    /// recomputing stats.
    pub fn assemble(
        root_dir: PathBuf,
        nodes: BTreeMap<String, FunctionNode>,
        edges: impl IntoIterator<Item = CallEdge>,
        files: impl IntoIterator<Item = String>,
    ) -> Self {
        let edges: BTreeSet<CallEdge> = edges
            .into_iter()
            .filter(|e| e.from != e.to && nodes.contains_key(&e.from) && nodes.contains_key(&e.to))
            .collect();
        let edges: Vec<CallEdge> = edges.into_iter().collect();
        let files: BTreeSet<String> = files.into_iter().collect();
        let stats = GraphStats::compute(&nodes, &edges);

        let mut graph = Self {
            version: GRAPH_VERSION,
            generated_at: Utc::now(),
            root_dir,
            nodes,
            edges,
            files: files.into_iter().collect(),
            stats,
            callees: BTreeMap::new(),
            callers: BTreeMap::new(),
        };
        graph.reindex();
        graph
    }

    fn reindex(&mut self) {
        self.callees.clear();
        self.callers.clear();
        for edge in &self.edges {
            self.callees
                .entry(edge.from.clone())
                .or_default()
                .push(edge.to.clone());
            self.callers
                .entry(edge.to.clone())
                .or_default()
                .push(edge.from.clone());
        }
    }

    /// Direct callees of `id`, in edge order.
    pub fn callees_of(&self, id: &str) -> &[String] {
        self.callees.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct callers of `id`, in edge order.
    pub fn callers_of(&self, id: &str) -> &[String] {
        self.callers.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes declared in one file, ordered by id.
    pub fn functions_in<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a FunctionNode> + 'a {
        self.nodes.values().filter(move |n| n.file_path == file)
    }

    pub fn node(&self, id: &str) -> Option<&FunctionNode> {
        self.nodes.get(id)
    }

    pub fn function_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Graph as a JSON value (same shape as the persisted form).
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Export to Graphviz DOT. Impure functions are filled salmon, exported
    /// ones get a bold border.
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph CallGraph {\n");
        dot.push_str("    rankdir=LR;\n");
        dot.push_str("    node [shape=box, fontname=\"monospace\"];\n\n");

        for (id, func) in &self.nodes {
            let color = match func.purity {
                Purity::Impure => "salmon",
                Purity::Pure => "palegreen",
                Purity::Unknown => "white",
            };
            // Safe truncation that respects UTF-8 character boundaries
            let label = if func.name.chars().count() > 24 {
                let truncated: String = func.name.chars().take(21).collect();
                format!("{}...", truncated)
            } else {
                func.name.clone()
            };
            let style = if func.is_exported { "\"filled,bold\"" } else { "filled" };
            dot.push_str(&format!(
                "    \"{}\" [label=\"{}\" style={} fillcolor={}];\n",
                dot_escape(id),
                dot_escape(&label),
                style,
                color
            ));
        }

        dot.push('\n');

        for edge in &self.edges {
            dot.push_str(&format!(
                "    \"{}\" -> \"{}\";\n",
                dot_escape(&edge.from),
                dot_escape(&edge.to)
            ));
        }

        dot.push_str("}\n");
        dot
    }
}

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Follows call edges forward (callee direction).
impl GraphTraversal for FunctionGraph {
    type Node = String;

    fn neighbors(&self, node: &String) -> Vec<String> {
        self.callees_of(node).to_vec()
    }

    fn contains_node(&self, node: &String) -> bool {
        self.nodes.contains_key(node)
    }
}

/// View of a graph that follows call edges backwards.
pub struct CallerView<'a>(pub &'a FunctionGraph);

impl GraphTraversal for CallerView<'_> {
    type Node = String;

    fn neighbors(&self, node: &String) -> Vec<String> {
        self.0.callers_of(node).to_vec()
    }

    fn contains_node(&self, node: &String) -> bool {
        self.0.nodes.contains_key(node)
    }
}

/// Persisted shape of a [`FunctionGraph`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub root_dir: PathBuf,
    pub nodes: Vec<FunctionNode>,
    pub edges: Vec<CallEdge>,
    pub files: Vec<String>,
    pub stats: GraphStats,
}

impl From<FunctionGraph> for GraphSnapshot {
    fn from(g: FunctionGraph) -> Self {
        Self {
            version: g.version,
            generated_at: g.generated_at,
            root_dir: g.root_dir,
            nodes: g.nodes.into_values().collect(),
            edges: g.edges,
            files: g.files,
            stats: g.stats,
        }
    }
}

impl From<GraphSnapshot> for FunctionGraph {
    fn from(s: GraphSnapshot) -> Self {
        let mut graph = Self {
            version: s.version,
            generated_at: s.generated_at,
            root_dir: s.root_dir,
            nodes: s.nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            edges: s.edges,
            files: s.files,
            stats: s.stats,
            callees: BTreeMap::new(),
            callers: BTreeMap::new(),
        };
        graph.edges.sort();
        graph.edges.dedup();
        graph.reindex();
        graph
    }
}
