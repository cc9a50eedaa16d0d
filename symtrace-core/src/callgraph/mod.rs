//! Function call graph analysis.
//!
//! - Extract every function, method and nested function of the project
//! - Infer purity from function text and propagate impurity to callers
//! - Resolve call edges once all node ids are known
//! - Query the graph: traversal, shortest path, hubs, clusters, extraction
//!   candidates, file coupling
//! - Export to DOT (Graphviz) and JSON
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐     ┌─────────────────────┐
//! │  lang extractors    │     │      table.rs       │
//! │  ─────────────────  │     │  ─────────────────  │
//! │  nodes + raw calls  │────▶│  id + binding index │
//! └──────────┬──────────┘     └──────────┬──────────┘
//!            │                           │
//!            └───────────┬───────────────┘
//!                        ▼
//!            ┌─────────────────────┐     ┌─────────────────────┐
//!            │      engine.rs      │────▶│     purity.rs       │
//!            │  four ordered passes│     │  worklist infection │
//!            └──────────┬──────────┘     └─────────────────────┘
//!                       ▼
//!            ┌─────────────────────┐     ┌─────────────────────┐
//!            │      model.rs       │────▶│ algorithms.rs       │
//!            │  FunctionGraph      │     │ insights.rs         │
//!            └─────────────────────┘     └─────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use symtrace_core::callgraph::{CallGraphEngine, get_graph_insights};
//!
//! let engine = CallGraphEngine::new(config);
//! let graph = engine.build_graph()?;
//! let insights = get_graph_insights(&graph, 5, &Default::default());
//! println!("{}", graph.to_dot());
//! ```

pub mod algorithms;
pub mod engine;
pub mod insights;
pub mod model;
pub mod purity;
pub mod table;

pub use algorithms::{
    analyze_file_coupling, bfs_from, calculate_centrality, dfs_from, find_clusters, find_extractable_groups,
    find_hubs, shortest_path, Cluster, CouplingDirection, Direction, ExtractionCandidate, FileCoupling, Hub,
};
pub use engine::CallGraphEngine;
pub use insights::{get_graph_insights, GraphInsights};
pub use model::{CallEdge, CallerView, FunctionGraph, FunctionNode, GraphSnapshot, GraphStats, Purity, GRAPH_VERSION};
pub use table::NodeTable;
