//! symtrace-core: symbol graph, call graph and structural verification for
//! TypeScript/JavaScript and Rust projects.
//!
//! # Features
//!
//! - **Project analysis**: exports, imports, re-export chains, scope-aware
//!   usages, transitive dependents, circular imports, unused exports
//! - **Call graph**: functions, methods and nested functions with call edges
//!   and inferred purity; traversal, hubs, clusters, extraction candidates
//!   and file coupling
//! - **Structural verification**: save a Gold Standard graph and check the
//!   live project, or a single proposed file edit, against it
//! - **Incremental caching**: per-file facts keyed by SHA-256 content hash
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use symtrace_core::prelude::*;
//!
//! let config = AnalyzerConfig::load("/path/to/project")?;
//! let analyzer = ProjectAnalyzer::new(config.clone())?;
//! let analysis = analyzer.analyze()?;
//! for dead in analyzer.find_unused_exports(&analysis, UnusedOptions::default()) {
//!     println!("{} ({})", dead.export.key(), dead.reason);
//! }
//!
//! let graph = CallGraphEngine::new(config).build_graph()?;
//! println!("{}", graph.to_dot());
//! ```
//!
//! # Module Organization
//!
//! - [`project`]: five-pass project analyzer
//! - [`callgraph`]: call-graph engine, purity inference and graph algorithms
//! - [`verify`]: Gold Standard persistence and diffing
//! - [`lang`]: TypeScript (tree-sitter) and Rust (syn) front-ends
//! - [`cache`]: incremental parsing cache with SHA-256 change detection
//! - [`scan`]: parallel file discovery
//! - [`config`]: `symtrace.toml` and engine configuration
//! - [`error`]: typed error handling

pub mod cache;
pub mod callgraph;
pub mod common;
pub mod config;
pub mod error;
pub mod lang;
pub mod logging;
pub mod model;
pub mod prelude;
pub mod project;
pub mod report;
pub mod scan;
pub mod verify;

// Common trait re-exports
pub use common::GraphTraversal;

// ============================================================================
// Explicit Re-exports (avoiding glob imports for clear API surface)
// ============================================================================

// Error types
pub use error::{IoResultExt, SymtraceError, SymtraceResult};

// Cache types
pub use cache::{hash_bytes, incremental_parse, load_cache, save_cache, AnalysisCache, CachedFile, LoadedFile};

// Configuration
pub use config::{load_config, AnalyzerConfig, ExtractionThresholds, SymtraceConfig};

// Logging
pub use logging::{init_pretty_logging, init_structured_logging, log_error, log_event, log_info, log_warn};

// Symbol model
pub use model::{
    symbol_key, AnalysisSummary, Export, ExportKind, FileAnalysis, Import, ImporterRef, LocalSymbolBinding,
    LocalSymbols, ParsedFile, ProjectAnalysis, SymbolTrace, Usage, UsageType,
};

// Language front-ends
pub use lang::{FunctionExtractor, Frontend, LanguageParser, ParserRegistry, ResolverConfig};

// Project analysis
pub use project::{
    compare_analyses, compare_exports, find_cycles, find_unused_exports, get_impact, BreakingChange,
    BreakingChangeKind, EntryPoints, ProjectAnalyzer, UnusedExport, UnusedKind, UnusedOptions,
};

// Call graph
pub use callgraph::{
    analyze_file_coupling, bfs_from, calculate_centrality, dfs_from, find_clusters, find_extractable_groups,
    find_hubs, get_graph_insights, shortest_path, CallEdge, CallGraphEngine, Cluster, CouplingDirection, Direction,
    ExtractionCandidate, FileCoupling, FunctionGraph, FunctionNode, GraphInsights, GraphStats, Hub, Purity,
};

// Verification
pub use verify::{
    compare_graphs, deserialize_graph, serialize_graph, GraphDiff, SignatureChange, StructuralVerifier,
    VerificationResult,
};

// Scanning
pub use scan::gather_source_files;

#[cfg(test)]
mod tests;
