//! Call-graph build.
//!
//! Four strictly ordered passes over one file set:
//!
//! 1. function nodes per file (front-end extractors, in parallel)
//! 2. purity inference ([`super::purity`]): direct patterns on function text,
//!    then infection over the call sites the front-ends resolve against the
//!    complete node table
//! 3. call edges, the same call sites assembled into the graph
//! 4. stats, computed by [`FunctionGraph::assemble`]

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use tracing::{debug, info, warn};

use super::model::{CallEdge, FunctionGraph, FunctionNode};
use super::purity::infer_purity;
use super::table::NodeTable;
use crate::config::AnalyzerConfig;
use crate::error::SymtraceResult;
use crate::lang::{FunctionExtractor, ImpurityPattern, LanguageParser, ParserRegistry, ResolverConfig};
use crate::scan::gather_source_files;

/// Builds [`FunctionGraph`]s for one project.
#[derive(Debug, Clone)]
pub struct CallGraphEngine {
    config: AnalyzerConfig,
    registry: ParserRegistry,
}

impl CallGraphEngine {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            registry: ParserRegistry::new(),
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    /// Discover and read the project's sources.
    ///
    /// Unreadable files are kept with empty content so they still appear in
    /// the graph's file list.
    pub fn read_sources(&self) -> SymtraceResult<BTreeMap<String, String>> {
        let root = &self.config.root_dir;
        let files = gather_source_files(root, &self.registry.extensions(), &self.config.ignore_globs)?;
        Ok(files
            .par_iter()
            .map(|rel| {
                let content = fs::read_to_string(root.join(rel)).unwrap_or_else(|e| {
                    warn!(file = %rel, error = %e, "read error, file degraded");
                    String::new()
                });
                (rel.clone(), content)
            })
            .collect())
    }

    /// Build the live graph from disk.
    pub fn build_graph(&self) -> SymtraceResult<FunctionGraph> {
        let sources = self.read_sources()?;
        Ok(self.build_graph_from_sources(&sources))
    }

    /// Build a graph from in-memory sources (`project-relative path -> text`).
    pub fn build_graph_from_sources(&self, sources: &BTreeMap<String, String>) -> FunctionGraph {
        // Pass 1: nodes
        let mut nodes = self.extract_nodes(sources);
        debug!(functions = nodes.len(), files = sources.len(), "pass 1: function nodes");

        let table = self.node_table(&nodes, sources);
        let calls = self.extract_edges(sources, &table);

        // Pass 2: purity, from function text and the resolved call sites
        infer_purity(&mut nodes, sources, &calls, |file| self.patterns_for(file));

        // Pass 3: edges
        debug!(edges = calls.len(), "pass 3: call edges");

        // Pass 4: stats
        let graph = FunctionGraph::assemble(
            self.config.root_dir.clone(),
            nodes,
            calls,
            sources.keys().cloned(),
        );
        info!(
            functions = graph.stats.total_functions,
            edges = graph.stats.total_edges,
            impure = graph.stats.impure_functions,
            "call graph built"
        );
        graph
    }

    fn patterns_for(&self, file: &str) -> &'static [ImpurityPattern] {
        self.registry
            .for_path(file)
            .map(|f| f.impurity_patterns())
            .unwrap_or(&[])
    }

    /// Functions of every file; the first node wins on an id collision.
    pub(crate) fn extract_nodes(&self, sources: &BTreeMap<String, String>) -> BTreeMap<String, FunctionNode> {
        let per_file: Vec<Vec<FunctionNode>> = sources
            .par_iter()
            .map(|(path, content)| self.extract_file_nodes(path, content))
            .collect();

        let mut nodes = BTreeMap::new();
        for node in per_file.into_iter().flatten() {
            nodes.entry(node.id.clone()).or_insert(node);
        }
        nodes
    }

    pub(crate) fn extract_file_nodes(&self, path: &str, content: &str) -> Vec<FunctionNode> {
        let Some(frontend) = self.registry.for_path(path) else {
            return Vec::new();
        };
        frontend.extract_functions(path, content).unwrap_or_else(|e| {
            warn!(file = path, error = %e, "function extraction failed, file degraded");
            Vec::new()
        })
    }

    /// Node table with every file's resolved import bindings, re-exports and export aliases.
    pub(crate) fn node_table(&self, nodes: &BTreeMap<String, FunctionNode>, sources: &BTreeMap<String, String>) -> NodeTable {
        let resolver = ResolverConfig::from_config(&self.config, sources.keys().cloned());
        let mut table = NodeTable::new(nodes.values()).with_files(sources.keys().cloned());

        for (path, content) in sources {
            let Some(frontend) = self.registry.for_path(path) else { continue };
            let mut facts = match frontend.parse_file(path, content) {
                Ok(f) => f,
                Err(e) => {
                    debug!(file = %path, error = %e, "no bindings for unparsable file");
                    continue;
                }
            };
            frontend.resolve_facts(&mut facts, &resolver);

            for export in &facts.exports {
                if export.is_re_export {
                    let source = export
                        .original_source
                        .as_deref()
                        .and_then(|spec| frontend.resolve_import(spec, path, &resolver));
                    if let Some(source) = source {
                        table.add_forward(path, &export.name, &source, export.source_name());
                    }
                } else if export.source_name() != export.name {
                    table.add_forward(path, &export.name, path, export.source_name());
                }
            }
            table.set_bindings(path, facts.local_symbols);
        }
        table
    }

    pub(crate) fn extract_edges(&self, sources: &BTreeMap<String, String>, table: &NodeTable) -> Vec<CallEdge> {
        sources
            .par_iter()
            .flat_map_iter(|(path, content)| self.extract_file_edges(path, content, table))
            .collect()
    }

    pub(crate) fn extract_file_edges(&self, path: &str, content: &str, table: &NodeTable) -> Vec<CallEdge> {
        let Some(frontend) = self.registry.for_path(path) else {
            return Vec::new();
        };
        frontend.extract_calls(path, content, table).unwrap_or_else(|e| {
            warn!(file = path, error = %e, "call extraction failed, file degraded");
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callgraph::Purity;

    fn sources(files: &[(&str, &str)]) -> BTreeMap<String, String> {
        files
            .iter()
            .map(|(p, s)| (p.to_string(), s.to_string()))
            .collect()
    }

    fn engine() -> CallGraphEngine {
        CallGraphEngine::new(AnalyzerConfig::new("/proj"))
    }

    #[test]
    fn test_cross_file_edges_and_purity() {
        let src = sources(&[
            ("src/log.ts", "export function write(msg: string) {\n  console.log(msg);\n}\n"),
            (
                "src/app.ts",
                "import { write } from './log';\nimport * as log from './log';\n\nexport function run() {\n  step();\n}\n\nfunction step() {\n  log.write('x');\n}\n\nexport function add(a: number, b: number) {\n  return a + b;\n}\n",
            ),
        ]);
        let graph = engine().build_graph_from_sources(&src);

        assert_eq!(graph.function_count(), 4);
        assert_eq!(graph.callees_of("src/app.ts:run"), &["src/app.ts:step".to_string()]);
        assert_eq!(graph.callees_of("src/app.ts:step"), &["src/log.ts:write".to_string()]);

        assert_eq!(graph.nodes["src/log.ts:write"].purity, Purity::Impure);
        assert_eq!(graph.nodes["src/app.ts:step"].purity, Purity::Impure);
        assert_eq!(graph.nodes["src/app.ts:run"].purity, Purity::Impure);
        assert_eq!(graph.nodes["src/app.ts:add"].purity, Purity::Pure);
        assert_eq!(graph.stats.exported_functions, 3);
        assert_eq!(graph.files, vec!["src/app.ts", "src/log.ts"]);
    }

    #[test]
    fn test_default_import_targets_function() {
        let src = sources(&[
            ("src/greet.ts", "export default function greet() {\n  return 'hi';\n}\n"),
            ("src/main.ts", "import hello from './greet';\nexport function main() {\n  return hello();\n}\n"),
        ]);
        let graph = engine().build_graph_from_sources(&src);
        assert_eq!(graph.callees_of("src/main.ts:main"), &["src/greet.ts:greet".to_string()]);
    }

    #[test]
    fn test_bad_file_degrades() {
        let src = sources(&[
            ("src/ok.rs", "pub fn ok() {}\n"),
            ("src/bad.rs", "fn broken(\n"),
        ]);
        let graph = engine().build_graph_from_sources(&src);
        assert_eq!(graph.function_count(), 1);
        assert_eq!(graph.files.len(), 2);
    }
}
