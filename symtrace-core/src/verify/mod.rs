//! Structural verification against a Gold Standard.
//!
//! A Gold Standard is a serialized [`FunctionGraph`] saved as the baseline of
//! a refactor. Verification rebuilds a graph (the live project, or the
//! baseline with one file hypothetically replaced) and diffs it against the
//! baseline: removed functions and changed signatures break equivalence,
//! added functions are reported but do not.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::cache::write_atomic;
use crate::callgraph::{CallEdge, CallGraphEngine, FunctionGraph, GraphSnapshot, GRAPH_VERSION};
use crate::common::paths::{normalize_path_string, relative_to};
use crate::config::AnalyzerConfig;
use crate::error::{SymtraceError, SymtraceResult};

pub const GOLD_STANDARD_FILE: &str = "gold-standard.json";

/// Serialize a graph to its persisted JSON form (nodes as an array sorted by id).
pub fn serialize_graph(graph: &FunctionGraph) -> SymtraceResult<String> {
    Ok(serde_json::to_string_pretty(graph)?)
}

/// Load a persisted graph; corrupted or schema-mismatched text yields `None`.
pub fn deserialize_graph(text: &str) -> Option<FunctionGraph> {
    let snapshot: GraphSnapshot = match serde_json::from_str(text) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "gold standard corrupted, ignoring");
            return None;
        }
    };
    if snapshot.version != GRAPH_VERSION {
        warn!(
            stored = snapshot.version,
            current = GRAPH_VERSION,
            "gold standard schema mismatch, ignoring"
        );
        return None;
    }
    Some(FunctionGraph::from(snapshot))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureChange {
    pub id: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

/// Structural difference between a baseline and a candidate graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphDiff {
    pub removed_functions: Vec<String>,
    pub signature_changes: Vec<SignatureChange>,
    /// Informational only.
    pub added_functions: Vec<String>,
    pub summary: String,
    pub is_equivalent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub valid: bool,
    pub diff: GraphDiff,
}

impl From<GraphDiff> for VerificationResult {
    fn from(diff: GraphDiff) -> Self {
        Self {
            valid: diff.is_equivalent,
            diff,
        }
    }
}

/// Diff `candidate` against `baseline` by function id.
pub fn compare_graphs(baseline: &FunctionGraph, candidate: &FunctionGraph) -> GraphDiff {
    let mut removed_functions = Vec::new();
    let mut signature_changes = Vec::new();

    for (id, before) in &baseline.nodes {
        match candidate.nodes.get(id) {
            None => removed_functions.push(id.clone()),
            Some(after) if after.signature != before.signature => signature_changes.push(SignatureChange {
                id: id.clone(),
                before: before.signature.clone(),
                after: after.signature.clone(),
            }),
            Some(_) => {}
        }
    }
    let added_functions: Vec<String> = candidate
        .nodes
        .keys()
        .filter(|id| !baseline.nodes.contains_key(*id))
        .cloned()
        .collect();

    let is_equivalent = removed_functions.is_empty() && signature_changes.is_empty();
    let summary = if is_equivalent && added_functions.is_empty() {
        "No structural changes".to_string()
    } else {
        let mut parts = Vec::new();
        if !removed_functions.is_empty() {
            parts.push(format!("{} function(s) removed", removed_functions.len()));
        }
        if !signature_changes.is_empty() {
            parts.push(format!("{} signature change(s)", signature_changes.len()));
        }
        if !added_functions.is_empty() {
            parts.push(format!("{} function(s) added", added_functions.len()));
        }
        parts.join(", ")
    };

    GraphDiff {
        removed_functions,
        signature_changes,
        added_functions,
        summary,
        is_equivalent,
    }
}

/// Saves, loads and checks against the project's Gold Standard.
#[derive(Debug, Clone)]
pub struct StructuralVerifier {
    engine: CallGraphEngine,
}

impl StructuralVerifier {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            engine: CallGraphEngine::new(config),
        }
    }

    pub fn engine(&self) -> &CallGraphEngine {
        &self.engine
    }

    pub fn gold_standard_path(&self) -> PathBuf {
        self.engine.config().state_dir().join(GOLD_STANDARD_FILE)
    }

    /// Persist `graph` atomically, replacing any previous baseline.
    pub fn save_gold_standard(&self, graph: &FunctionGraph) -> SymtraceResult<PathBuf> {
        let json = serialize_graph(graph)?;
        let path = write_atomic(&self.engine.config().state_dir(), GOLD_STANDARD_FILE, &json)?;
        info!(path = %path.display(), functions = graph.function_count(), "gold standard saved");
        Ok(path)
    }

    /// Build the live graph and save it as the baseline.
    pub fn capture_gold_standard(&self) -> SymtraceResult<FunctionGraph> {
        let graph = self.engine.build_graph()?;
        self.save_gold_standard(&graph)?;
        Ok(graph)
    }

    /// The stored baseline, or `None` when absent, unreadable or incompatible.
    pub fn load_gold_standard(&self) -> Option<FunctionGraph> {
        let path = self.gold_standard_path();
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "gold standard unreadable, ignoring");
                return None;
            }
        };
        deserialize_graph(&text)
    }

    fn require_gold_standard(&self) -> SymtraceResult<FunctionGraph> {
        self.load_gold_standard()
            .ok_or_else(|| SymtraceError::gold_standard_missing(self.gold_standard_path()))
    }

    /// Rebuild the live graph and diff it against the baseline.
    pub fn verify(&self) -> SymtraceResult<VerificationResult> {
        let baseline = self.require_gold_standard()?;
        let live = self.engine.build_graph()?;
        let diff = compare_graphs(&baseline, &live);
        debug!(summary = %diff.summary, "verify");
        Ok(diff.into())
    }

    /// Diff the baseline against itself with `path` replaced by `new_content`.
    ///
    /// Only the proposed file is re-extracted; nothing is written to disk.
    pub fn verify_file_change(&self, path: &str, new_content: &str) -> SymtraceResult<VerificationResult> {
        let baseline = self.require_gold_standard()?;
        let file = self.project_relative(path);

        let mut nodes = baseline.nodes.clone();
        nodes.retain(|_, n| n.file_path != file);
        let kept: Vec<CallEdge> = baseline
            .edges
            .iter()
            .filter(|e| baseline.node(&e.from).is_some_and(|n| n.file_path != file))
            .cloned()
            .collect();

        for node in self.engine.extract_file_nodes(&file, new_content) {
            nodes.entry(node.id.clone()).or_insert(node);
        }

        let mut sources = self.engine.read_sources()?;
        sources.insert(file.clone(), new_content.to_string());
        let table = self.engine.node_table(&nodes, &sources);
        let new_edges = self.engine.extract_file_edges(&file, new_content, &table);

        let files: BTreeSet<String> = baseline
            .files
            .iter()
            .cloned()
            .chain(std::iter::once(file.clone()))
            .collect();
        let candidate = FunctionGraph::assemble(baseline.root_dir.clone(), nodes, kept.into_iter().chain(new_edges), files);

        let diff = compare_graphs(&baseline, &candidate);
        debug!(file = %file, summary = %diff.summary, "verify file change");
        Ok(diff.into())
    }

    /// Accept absolute paths under the root as well as project-relative ones.
    fn project_relative(&self, path: &str) -> String {
        let p = Path::new(path);
        if p.is_absolute() {
            relative_to(&self.engine.config().root_dir, p)
        } else {
            normalize_path_string(path).trim_start_matches("./").to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::{FunctionNode, Purity};
    use std::collections::BTreeMap;

    fn graph_with(sigs: &[(&str, Option<&str>)]) -> FunctionGraph {
        let mut nodes = BTreeMap::new();
        for (name, sig) in sigs {
            let mut n = FunctionNode::new("a.ts", name, 1, 2);
            n.signature = sig.map(str::to_string);
            n.purity = Purity::Pure;
            nodes.insert(n.id.clone(), n);
        }
        FunctionGraph::assemble(PathBuf::from("/p"), nodes, Vec::new(), vec!["a.ts".to_string()])
    }

    #[test]
    fn test_round_trip() {
        let mut g = graph_with(&[("f", Some("(a)")), ("g", None)]);
        g = FunctionGraph::assemble(
            g.root_dir.clone(),
            g.nodes.clone(),
            vec![CallEdge::new("a.ts:f", "a.ts:g")],
            g.files.clone(),
        );
        let back = deserialize_graph(&serialize_graph(&g).unwrap()).unwrap();
        assert_eq!(back.nodes, g.nodes);
        assert_eq!(back.edges, g.edges);
        assert_eq!(back.stats, g.stats);
        assert_eq!(back.callees_of("a.ts:f"), g.callees_of("a.ts:f"));
    }

    #[test]
    fn test_corrupted_or_mismatched_loads_as_none() {
        assert!(deserialize_graph("{ not json").is_none());
        let g = graph_with(&[("f", None)]);
        let text = serialize_graph(&g)
            .unwrap()
            .replace(&format!("\"version\": {}", GRAPH_VERSION), "\"version\": 999");
        assert!(deserialize_graph(&text).is_none());
    }

    #[test]
    fn test_compare_graphs() {
        let base = graph_with(&[("f", Some("(a)")), ("g", None), ("h", None)]);
        let cand = graph_with(&[("f", Some("(a, b)")), ("g", None), ("k", None)]);
        let diff = compare_graphs(&base, &cand);
        assert_eq!(diff.removed_functions, vec!["a.ts:h"]);
        assert_eq!(diff.signature_changes[0].id, "a.ts:f");
        assert_eq!(diff.added_functions, vec!["a.ts:k"]);
        assert!(!diff.is_equivalent);

        let only_added = compare_graphs(&base, &graph_with(&[("f", Some("(a)")), ("g", None), ("h", None), ("z", None)]));
        assert!(only_added.is_equivalent);
        assert_eq!(only_added.summary, "1 function(s) added");
    }

    #[test]
    fn test_verify_without_gold_standard_fails() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = StructuralVerifier::new(AnalyzerConfig::new(dir.path()));
        assert!(matches!(verifier.verify(), Err(SymtraceError::GoldStandardMissing { .. })));
        assert!(matches!(
            verifier.verify_file_change("a.ts", ""),
            Err(SymtraceError::GoldStandardMissing { .. })
        ));
    }

    #[test]
    fn test_verify_detects_removed_function() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "export function f() {}\nexport function g() {}\n").unwrap();
        let verifier = StructuralVerifier::new(AnalyzerConfig::new(dir.path()));
        verifier.capture_gold_standard().unwrap();
        assert!(verifier.verify().unwrap().valid);

        fs::write(dir.path().join("a.ts"), "export function f() {}\n").unwrap();
        let result = verifier.verify().unwrap();
        assert!(!result.valid);
        assert_eq!(result.diff.removed_functions, vec!["a.ts:g"]);
    }
}
