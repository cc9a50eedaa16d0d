//! Refactor-recommendation summary over one graph.

use serde::{Deserialize, Serialize};

use super::algorithms::{
    analyze_file_coupling, find_clusters, find_extractable_groups, find_hubs, Cluster, CouplingDirection,
    ExtractionCandidate, FileCoupling, Hub,
};
use super::model::FunctionGraph;
use crate::config::ExtractionThresholds;

/// Impure share above which the summary recommends isolating side effects.
const HIGH_IMPURE_RATIO: f64 = 0.5;

/// Aggregated algorithm results plus human-readable recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphInsights {
    pub hubs: Vec<Hub>,
    pub clusters: Vec<Cluster>,
    pub extraction_candidates: Vec<ExtractionCandidate>,
    pub coupling: Vec<FileCoupling>,
    /// Impure functions / all functions (0 for an empty graph).
    pub impure_ratio: f64,
    pub recommendations: Vec<String>,
}

pub fn get_graph_insights(graph: &FunctionGraph, hub_threshold: usize, thresholds: &ExtractionThresholds) -> GraphInsights {
    let hubs = find_hubs(graph, hub_threshold);
    let clusters = find_clusters(graph);
    let extraction_candidates = find_extractable_groups(graph, thresholds);
    let coupling = analyze_file_coupling(graph);
    let impure_ratio = if graph.stats.total_functions == 0 {
        0.0
    } else {
        graph.stats.impure_functions as f64 / graph.stats.total_functions as f64
    };

    let mut recommendations = Vec::new();
    for hub in hubs.iter().take(3) {
        recommendations.push(format!(
            "{} has {} connections; consider splitting it or narrowing its callers",
            hub.id, hub.degree
        ));
    }
    for candidate in extraction_candidates.iter().take(3) {
        recommendations.push(format!(
            "Extract {} functions from {} into a new file (score {:.2})",
            candidate.functions.len(),
            candidate.file,
            candidate.score
        ));
    }
    for pair in coupling
        .iter()
        .filter(|c| c.direction == CouplingDirection::Bidirectional)
    {
        recommendations.push(format!(
            "{} and {} call each other ({} calls); consider merging them or extracting the shared part",
            pair.file1,
            pair.file2,
            pair.total_calls()
        ));
    }
    if impure_ratio > HIGH_IMPURE_RATIO {
        recommendations.push(format!(
            "{:.0}% of functions are impure; consider moving side effects to the edges",
            impure_ratio * 100.0
        ));
    }

    GraphInsights {
        hubs,
        clusters,
        extraction_candidates,
        coupling,
        impure_ratio,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::{CallEdge, FunctionNode, Purity};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[test]
    fn test_insights_collects_everything() {
        let mut nodes = BTreeMap::new();
        for (file, name) in [("a.ts", "x"), ("a.ts", "y"), ("b.ts", "z")] {
            let mut n = FunctionNode::new(file, name, 1, 1);
            n.purity = Purity::Impure;
            nodes.insert(n.id.clone(), n);
        }
        let graph = FunctionGraph::assemble(
            PathBuf::from("/p"),
            nodes,
            vec![
                CallEdge::new("a.ts:x", "b.ts:z"),
                CallEdge::new("b.ts:z", "a.ts:y"),
                CallEdge::new("a.ts:x", "a.ts:y"),
            ],
            Vec::new(),
        );

        let insights = get_graph_insights(&graph, 1, &ExtractionThresholds::default());
        assert_eq!(insights.hubs.len(), 3);
        assert_eq!(insights.clusters.len(), 1);
        assert_eq!(insights.coupling[0].direction, CouplingDirection::Bidirectional);
        assert!((insights.impure_ratio - 1.0).abs() < f64::EPSILON);
        assert!(insights.recommendations.iter().any(|r| r.contains("call each other")));
        assert!(insights.recommendations.iter().any(|r| r.contains("100% of functions are impure")));
    }

    #[test]
    fn test_empty_graph() {
        let graph = FunctionGraph::assemble(PathBuf::from("/p"), BTreeMap::new(), Vec::new(), Vec::new());
        let insights = get_graph_insights(&graph, 5, &ExtractionThresholds::default());
        assert_eq!(insights.impure_ratio, 0.0);
        assert!(insights.recommendations.is_empty());
    }
}
