//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use symtrace_core::prelude::*;
//! ```

// Errors and configuration
pub use crate::config::{AnalyzerConfig, ExtractionThresholds};
pub use crate::error::{SymtraceError, SymtraceResult};

// Project analysis
pub use crate::model::{Export, ExportKind, Import, ProjectAnalysis, SymbolTrace};
pub use crate::project::{get_impact, ProjectAnalyzer, UnusedExport, UnusedKind, UnusedOptions};

// Call graph
pub use crate::callgraph::{get_graph_insights, CallGraphEngine, Direction, FunctionGraph, FunctionNode, Purity};

// Verification
pub use crate::verify::{GraphDiff, StructuralVerifier, VerificationResult};
