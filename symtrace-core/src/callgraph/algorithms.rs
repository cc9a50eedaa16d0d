//! Read-only algorithms over a built [`FunctionGraph`].
//!
//! Traversals go through [`GraphTraversal`] (callee direction on the graph
//! itself, caller direction through [`CallerView`], same-file reach for
//! extraction scoring through a restricted view). Clustering uses an
//! undirected `petgraph` view of the edges.

use petgraph::graphmap::UnGraphMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use super::model::{CallerView, FunctionGraph};
use crate::common::GraphTraversal;
use crate::config::ExtractionThresholds;

/// Which way edges are followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// `from -> to`
    Callees,
    /// `to -> from`
    Callers,
}

/// Breadth-first visitation order from `start` (included first).
pub fn bfs_from(graph: &FunctionGraph, start: &str, direction: Direction) -> Vec<String> {
    let start = start.to_string();
    match direction {
        Direction::Callees => graph.bfs_order(&start),
        Direction::Callers => CallerView(graph).bfs_order(&start),
    }
}

/// Depth-first (pre-order) visitation order from `start`.
pub fn dfs_from(graph: &FunctionGraph, start: &str, direction: Direction) -> Vec<String> {
    let start = start.to_string();
    match direction {
        Direction::Callees => graph.dfs_order(&start),
        Direction::Callers => CallerView(graph).dfs_order(&start),
    }
}

/// Shortest call chain from `from` to `to`, both included.
///
/// BFS carrying the path so far; the graph is unweighted, so the first time
/// `to` is discovered the path is a shortest one.
pub fn shortest_path(graph: &FunctionGraph, from: &str, to: &str) -> Option<Vec<String>> {
    if !graph.nodes.contains_key(from) || !graph.nodes.contains_key(to) {
        return None;
    }
    if from == to {
        return Some(vec![from.to_string()]);
    }

    let mut visited: HashSet<&str> = HashSet::from([from]);
    let mut queue: VecDeque<Vec<&str>> = VecDeque::from([vec![from]]);

    while let Some(path) = queue.pop_front() {
        let Some(&last) = path.last() else { continue };
        for next in graph.callees_of(last) {
            if next == to {
                let mut found: Vec<String> = path.iter().map(|s| s.to_string()).collect();
                found.push(next.clone());
                return Some(found);
            }
            if visited.insert(next.as_str()) {
                let mut extended = path.clone();
                extended.push(next.as_str());
                queue.push_back(extended);
            }
        }
    }
    None
}

/// Degree centrality: in-edges plus out-edges for every node (0 if isolated).
pub fn calculate_centrality(graph: &FunctionGraph) -> HashMap<String, usize> {
    let mut degree: HashMap<String, usize> = graph.nodes.keys().map(|id| (id.clone(), 0)).collect();
    for edge in &graph.edges {
        *degree.entry(edge.from.clone()).or_insert(0) += 1;
        *degree.entry(edge.to.clone()).or_insert(0) += 1;
    }
    degree
}

/// A function with unusually high connectivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hub {
    pub id: String,
    pub degree: usize,
}

/// Nodes whose degree is above `threshold`, most connected first.
pub fn find_hubs(graph: &FunctionGraph, threshold: usize) -> Vec<Hub> {
    let mut hubs: Vec<Hub> = calculate_centrality(graph)
        .into_iter()
        .filter(|(_, degree)| *degree > threshold)
        .map(|(id, degree)| Hub { id, degree })
        .collect();
    hubs.sort_by(|a, b| b.degree.cmp(&a.degree).then_with(|| a.id.cmp(&b.id)));
    hubs
}

/// Functions connected by calls in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Sorted node ids.
    pub members: Vec<String>,
    /// Sorted files the members live in.
    pub files: Vec<String>,
}

/// Connected components of the undirected call graph, singletons dropped.
///
/// Ordered by size (largest first), then by first member.
pub fn find_clusters(graph: &FunctionGraph) -> Vec<Cluster> {
    let mut undirected: UnGraphMap<&str, ()> = UnGraphMap::new();
    for id in graph.nodes.keys() {
        undirected.add_node(id.as_str());
    }
    for edge in &graph.edges {
        undirected.add_edge(edge.from.as_str(), edge.to.as_str(), ());
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut clusters = Vec::new();

    for id in graph.nodes.keys() {
        if !seen.insert(id.as_str()) {
            continue;
        }
        let mut component: BTreeSet<&str> = BTreeSet::from([id.as_str()]);
        let mut queue = VecDeque::from([id.as_str()]);
        while let Some(node) = queue.pop_front() {
            for next in undirected.neighbors(node) {
                if seen.insert(next) {
                    component.insert(next);
                    queue.push_back(next);
                }
            }
        }
        if component.len() < 2 {
            continue;
        }
        let files: BTreeSet<&str> = component
            .iter()
            .filter_map(|m| graph.node(m).map(|n| n.file_path.as_str()))
            .collect();
        clusters.push(Cluster {
            members: component.into_iter().map(String::from).collect(),
            files: files.into_iter().map(String::from).collect(),
        });
    }

    clusters.sort_by(|a, b| b.members.len().cmp(&a.members.len()).then_with(|| a.members.cmp(&b.members)));
    clusters
}

/// A cohesive same-file group of functions that could move to a new file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionCandidate {
    pub file: String,
    /// Sorted node ids.
    pub functions: Vec<String>,
    /// Calls between members of the group.
    pub internal_edges: usize,
    /// Other functions of the same file the group calls or is called by.
    pub external_dependencies: usize,
    /// `internal_edges / (external_dependencies + 1)`
    pub score: f64,
}

/// Score extraction candidates per file and keep the best ones overall.
///
/// For each relocatable function, its callee-reachable set within the file
/// (relocatable functions only) is a candidate when it has at least
/// `min_group_size` members and covers less than `max_file_fraction` of the
/// file's functions. Identical sets are scored once.
pub fn find_extractable_groups(graph: &FunctionGraph, thresholds: &ExtractionThresholds) -> Vec<ExtractionCandidate> {
    let mut by_file: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for node in graph.nodes.values() {
        by_file.entry(node.file_path.as_str()).or_default().push(node.id.as_str());
    }

    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut candidates = Vec::new();

    for (file, ids) in &by_file {
        let total = ids.len();
        let limit = thresholds.max_file_fraction * total as f64;
        let movable: HashSet<&str> = ids
            .iter()
            .copied()
            .filter(|id| graph.node(id).is_some_and(|n| n.is_relocatable()))
            .collect();
        let view = SameFileView { graph, allowed: &movable };

        for start in ids.iter().filter(|id| movable.contains(*id)) {
            let group: BTreeSet<String> = view.reachable_from_single(start.to_string()).into_iter().collect();
            if group.len() < thresholds.min_group_size || group.len() as f64 >= limit {
                continue;
            }
            let functions: Vec<String> = group.iter().cloned().collect();
            if !seen.insert(functions.clone()) {
                continue;
            }

            let mut internal_edges = 0;
            let mut outside: BTreeSet<&str> = BTreeSet::new();
            for edge in &graph.edges {
                let from_in = group.contains(edge.from.as_str());
                let to_in = group.contains(edge.to.as_str());
                match (from_in, to_in) {
                    (true, true) => internal_edges += 1,
                    (true, false) if in_file(graph, &edge.to, file) => {
                        outside.insert(edge.to.as_str());
                    }
                    (false, true) if in_file(graph, &edge.from, file) => {
                        outside.insert(edge.from.as_str());
                    }
                    _ => {}
                }
            }
            let external_dependencies = outside.len();
            candidates.push(ExtractionCandidate {
                file: file.to_string(),
                functions,
                internal_edges,
                external_dependencies,
                score: internal_edges as f64 / (external_dependencies + 1) as f64,
            });
        }
    }

    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.functions.len().cmp(&a.functions.len()))
            .then_with(|| a.file.cmp(&b.file))
            .then_with(|| a.functions.cmp(&b.functions))
    });
    candidates.truncate(thresholds.max_candidates);
    candidates
}

fn in_file(graph: &FunctionGraph, id: &str, file: &str) -> bool {
    graph.node(id).is_some_and(|n| n.file_path == file)
}

/// Callee direction restricted to the relocatable functions of one file.
struct SameFileView<'g, 's> {
    graph: &'g FunctionGraph,
    allowed: &'s HashSet<&'g str>,
}

impl GraphTraversal for SameFileView<'_, '_> {
    type Node = String;

    fn neighbors(&self, node: &String) -> Vec<String> {
        self.graph
            .callees_of(node)
            .iter()
            .filter(|next| self.allowed.contains(next.as_str()))
            .cloned()
            .collect()
    }

    fn contains_node(&self, node: &String) -> bool {
        self.allowed.contains(node.as_str())
    }
}

/// Which way calls flow between two files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CouplingDirection {
    #[serde(rename = "file1->file2")]
    Forward,
    #[serde(rename = "file2->file1")]
    Backward,
    #[serde(rename = "bidirectional")]
    Bidirectional,
}

impl fmt::Display for CouplingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Forward => "file1->file2",
            Self::Backward => "file2->file1",
            Self::Bidirectional => "bidirectional",
        })
    }
}

/// Cross-file call counts for one unordered file pair (`file1 < file2`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCoupling {
    pub file1: String,
    pub file2: String,
    pub calls_1_to_2: usize,
    pub calls_2_to_1: usize,
    pub direction: CouplingDirection,
}

impl FileCoupling {
    pub fn total_calls(&self) -> usize {
        self.calls_1_to_2 + self.calls_2_to_1
    }
}

/// Bucket every cross-file edge by file pair, most coupled pairs first.
pub fn analyze_file_coupling(graph: &FunctionGraph) -> Vec<FileCoupling> {
    let mut pairs: BTreeMap<(&str, &str), (usize, usize)> = BTreeMap::new();
    for edge in &graph.edges {
        let (Some(from), Some(to)) = (graph.node(&edge.from), graph.node(&edge.to)) else {
            continue;
        };
        let (a, b) = (from.file_path.as_str(), to.file_path.as_str());
        if a == b {
            continue;
        }
        if a < b {
            pairs.entry((a, b)).or_default().0 += 1;
        } else {
            pairs.entry((b, a)).or_default().1 += 1;
        }
    }

    let mut out: Vec<FileCoupling> = pairs
        .into_iter()
        .map(|((file1, file2), (forward, backward))| FileCoupling {
            file1: file1.to_string(),
            file2: file2.to_string(),
            calls_1_to_2: forward,
            calls_2_to_1: backward,
            direction: match (forward > 0, backward > 0) {
                (true, true) => CouplingDirection::Bidirectional,
                (true, false) => CouplingDirection::Forward,
                _ => CouplingDirection::Backward,
            },
        })
        .collect();
    out.sort_by(|a, b| b.total_calls().cmp(&a.total_calls()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::{CallEdge, FunctionNode};
    use std::path::PathBuf;

    fn graph(nodes: &[(&str, &str)], edges: &[(&str, &str)]) -> FunctionGraph {
        let nodes = nodes
            .iter()
            .map(|(file, name)| {
                let n = FunctionNode::new(file, name, 1, 1);
                (n.id.clone(), n)
            })
            .collect();
        FunctionGraph::assemble(
            PathBuf::from("/proj"),
            nodes,
            edges.iter().map(|(a, b)| CallEdge::new(*a, *b)),
            Vec::new(),
        )
    }

    fn chain() -> FunctionGraph {
        graph(
            &[("a.ts", "a"), ("a.ts", "b"), ("a.ts", "c"), ("b.ts", "d"), ("b.ts", "lonely")],
            &[("a.ts:a", "a.ts:b"), ("a.ts:b", "a.ts:c"), ("a.ts:a", "b.ts:d"), ("b.ts:d", "a.ts:c")],
        )
    }

    #[test]
    fn test_traversal_directions() {
        let g = chain();
        assert_eq!(bfs_from(&g, "a.ts:a", Direction::Callees), vec!["a.ts:a", "a.ts:b", "b.ts:d", "a.ts:c"]);
        assert_eq!(dfs_from(&g, "a.ts:a", Direction::Callees), vec!["a.ts:a", "a.ts:b", "a.ts:c", "b.ts:d"]);
        assert_eq!(bfs_from(&g, "a.ts:c", Direction::Callers), vec!["a.ts:c", "a.ts:b", "b.ts:d", "a.ts:a"]);
        assert!(bfs_from(&g, "nope", Direction::Callees).is_empty());
    }

    #[test]
    fn test_shortest_path() {
        let g = chain();
        assert_eq!(
            shortest_path(&g, "a.ts:a", "a.ts:c"),
            Some(vec!["a.ts:a".to_string(), "a.ts:b".to_string(), "a.ts:c".to_string()])
        );
        assert_eq!(shortest_path(&g, "a.ts:c", "a.ts:a"), None);
        assert_eq!(shortest_path(&g, "a.ts:b", "a.ts:b"), Some(vec!["a.ts:b".to_string()]));
    }

    #[test]
    fn test_centrality_and_hubs() {
        let g = chain();
        let c = calculate_centrality(&g);
        assert_eq!(c["a.ts:a"], 2);
        assert_eq!(c["a.ts:c"], 2);
        assert_eq!(c["b.ts:lonely"], 0);
        let hubs = find_hubs(&g, 1);
        assert_eq!(hubs.len(), 4);
        assert_eq!(hubs[0], Hub { id: "a.ts:a".into(), degree: 2 });
        assert!(find_hubs(&g, 2).is_empty());
    }

    #[test]
    fn test_clusters_drop_singletons() {
        let g = graph(
            &[("x.ts", "a"), ("x.ts", "b"), ("y.ts", "c"), ("y.ts", "d"), ("y.ts", "alone")],
            &[("x.ts:a", "x.ts:b"), ("y.ts:d", "y.ts:c")],
        );
        let clusters = find_clusters(&g);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].members, vec!["x.ts:a", "x.ts:b"]);
        assert_eq!(clusters[1].files, vec!["y.ts"]);
    }

    #[test]
    fn test_extractable_group_is_one_set() {
        let g = graph(
            &[("m.ts", "f"), ("m.ts", "g"), ("m.ts", "h"), ("m.ts", "i"), ("m.ts", "j")],
            &[("m.ts:f", "m.ts:g")],
        );
        let groups = find_extractable_groups(&g, &ExtractionThresholds::default());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].functions, vec!["m.ts:f", "m.ts:g"]);
        assert_eq!(groups[0].internal_edges, 1);
        assert_eq!(groups[0].external_dependencies, 0);
        assert!((groups[0].score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_extraction_rejects_most_of_file() {
        // {f, g} would be the whole file.
        let g = graph(&[("m.ts", "f"), ("m.ts", "g")], &[("m.ts:f", "m.ts:g")]);
        assert!(find_extractable_groups(&g, &ExtractionThresholds::default()).is_empty());
    }

    #[test]
    fn test_file_coupling_direction() {
        let g = chain();
        let coupling = analyze_file_coupling(&g);
        assert_eq!(coupling.len(), 1);
        assert_eq!(coupling[0].file1, "a.ts");
        assert_eq!(coupling[0].calls_1_to_2, 1);
        assert_eq!(coupling[0].calls_2_to_1, 1);
        assert_eq!(coupling[0].direction, CouplingDirection::Bidirectional);
        assert_eq!(coupling[0].direction.to_string(), "bidirectional");
    }
}
