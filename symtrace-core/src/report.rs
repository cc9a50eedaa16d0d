//! Output formatting - plaintext and JSON.

use serde::Serialize;
use std::fmt::Write as _;

use crate::callgraph::{FunctionGraph, GraphInsights};
use crate::model::AnalysisSummary;
use crate::project::UnusedExport;
use crate::verify::VerificationResult;

pub fn render_summary(summary: &AnalysisSummary) -> String {
    format!(
        "{} files, {} exports, {} imports, {} cycles ({} cached)\n",
        summary.files, summary.exports, summary.imports, summary.cycles, summary.cache_hits
    )
}

pub fn render_unused(unused: &[UnusedExport]) -> String {
    if unused.is_empty() {
        return "No unused exports found.\n".to_string();
    }
    let mut out = format!("UNUSED EXPORTS ({}):\n", unused.len());
    for u in unused {
        let _ = writeln!(
            out,
            "- {}:{} {} {} ({})",
            u.export.file_path, u.export.line, u.export.kind, u.export.name, u.reason
        );
    }
    out
}

pub fn render_cycles(cycles: &[Vec<String>]) -> String {
    if cycles.is_empty() {
        return "No circular dependencies found.\n".to_string();
    }
    let mut out = format!("CIRCULAR DEPENDENCIES ({}):\n", cycles.len());
    for cycle in cycles {
        let mut chain = cycle.join(" -> ");
        if let Some(first) = cycle.first() {
            let _ = write!(chain, " -> {}", first);
        }
        let _ = writeln!(out, "- {}", chain);
    }
    out
}

pub fn render_impact(file: &str, dependents: &[String]) -> String {
    if dependents.is_empty() {
        return format!("No files depend on {}.\n", file);
    }
    let mut out = format!("FILES AFFECTED BY {} ({}):\n", file, dependents.len());
    for d in dependents {
        let _ = writeln!(out, "- {}", d);
    }
    out
}

pub fn render_graph_stats(graph: &FunctionGraph) -> String {
    let s = &graph.stats;
    format!(
        "{} functions ({} pure, {} impure, {} unknown, {} exported), {} call edges\n",
        s.total_functions, s.pure_functions, s.impure_functions, s.unknown_functions, s.exported_functions, s.total_edges
    )
}

pub fn render_insights(insights: &GraphInsights) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "HUBS ({}):", insights.hubs.len());
    for hub in &insights.hubs {
        let _ = writeln!(out, "- {} (degree {})", hub.id, hub.degree);
    }
    let _ = writeln!(out, "CLUSTERS: {}", insights.clusters.len());
    let _ = writeln!(out, "EXTRACTION CANDIDATES ({}):", insights.extraction_candidates.len());
    for c in &insights.extraction_candidates {
        let _ = writeln!(out, "- {} [{}] score {:.2}", c.file, c.functions.join(", "), c.score);
    }
    let _ = writeln!(out, "FILE COUPLING ({}):", insights.coupling.len());
    for c in &insights.coupling {
        let _ = writeln!(out, "- {} / {}: {} ({} calls)", c.file1, c.file2, c.direction, c.total_calls());
    }
    if !insights.recommendations.is_empty() {
        let _ = writeln!(out, "RECOMMENDATIONS:");
        for r in &insights.recommendations {
            let _ = writeln!(out, "- {}", r);
        }
    }
    out
}

pub fn render_verification(result: &VerificationResult) -> String {
    let diff = &result.diff;
    let mut out = format!(
        "{}: {}\n",
        if result.valid { "EQUIVALENT" } else { "CHANGED" },
        diff.summary
    );
    for id in &diff.removed_functions {
        let _ = writeln!(out, "- removed {}", id);
    }
    for c in &diff.signature_changes {
        let _ = writeln!(
            out,
            "- signature {}: {} -> {}",
            c.id,
            c.before.as_deref().unwrap_or("?"),
            c.after.as_deref().unwrap_or("?")
        );
    }
    for id in &diff.added_functions {
        let _ = writeln!(out, "+ added {}", id);
    }
    out
}

/// Prints any report value as pretty JSON.
///
/// Falls back to a minimal error object if serialization fails.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("[WARN] JSON serialization failed: {}", e);
            println!("{{\"error\": {:?}}}", e.to_string());
        }
    }
}
