//! symtrace CLI - symbol graph, call graph and structural verification.
//!
//! Thin front-end over `symtrace-core`:
//! - unused exports, import cycles and change impact
//! - function call graph (JSON or Graphviz DOT) and refactor insights
//! - Gold Standard capture and verification (whole project or one proposed file)

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

use symtrace_core::report::{
    print_json, render_cycles, render_graph_stats, render_impact, render_insights, render_summary, render_unused,
    render_verification,
};
use symtrace_core::{
    get_graph_insights, get_impact, init_pretty_logging, init_structured_logging, log_error, log_event, log_info,
    log_warn, AnalyzerConfig, CallGraphEngine, ProjectAnalyzer, StructuralVerifier, UnusedOptions,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Symbol graph, call graph and structural verification for TS/JS and Rust")]
pub struct Cli {
    /// Path to the root of the project
    #[arg(default_value = ".")]
    path: String,

    /// Output results in JSON format
    #[arg(long)]
    json: bool,

    /// Also report exports of entry points
    #[arg(long)]
    strict: bool,

    /// Ignore and do not write the analysis cache
    #[arg(long)]
    no_cache: bool,

    /// Report unused exports (default when no other mode is given)
    #[arg(long)]
    unused: bool,

    /// Report circular imports
    #[arg(long)]
    cycles: bool,

    /// Report every file that transitively depends on FILE
    #[arg(long, value_name = "FILE")]
    impact: Option<String>,

    /// Print the function call graph as JSON
    #[arg(long)]
    callgraph: bool,

    /// Print the function call graph in DOT format (for Graphviz)
    #[arg(long)]
    callgraph_dot: bool,

    /// Hubs, clusters, extraction candidates and file coupling
    #[arg(long)]
    insights: bool,

    /// Save the current call graph as the Gold Standard
    #[arg(long)]
    save_gold: bool,

    /// Compare the current call graph against the Gold Standard
    #[arg(long)]
    verify: bool,

    /// Check a proposed edit of FILE against the Gold Standard without writing it
    #[arg(long, value_name = "FILE", requires = "proposed")]
    verify_file: Option<String>,

    /// File holding the proposed content for --verify-file
    #[arg(long, value_name = "FILE", requires = "verify_file")]
    proposed: Option<String>,

    /// Human-readable log lines on stderr instead of JSON
    #[arg(long)]
    pretty_logs: bool,
}

impl Cli {
    /// Whether only the default report was asked for.
    fn no_mode_selected(&self) -> bool {
        !(self.unused
            || self.cycles
            || self.impact.is_some()
            || self.callgraph
            || self.callgraph_dot
            || self.insights
            || self.save_gold
            || self.verify
            || self.verify_file.is_some())
    }

    fn needs_project_analysis(&self) -> bool {
        self.no_mode_selected() || self.unused || self.cycles || self.impact.is_some()
    }

    fn needs_call_graph(&self) -> bool {
        self.callgraph || self.callgraph_dot || self.insights
    }

    fn init_logging(&self) {
        if self.pretty_logs {
            init_pretty_logging();
        } else {
            init_structured_logging();
        }
    }
}

/// Log level name for a verification outcome.
fn verification_event(valid: bool) -> &'static str {
    if valid {
        "INFO"
    } else {
        "WARN"
    }
}

/// `symtrace.toml` under the project root, overridden by command-line flags.
fn build_config(cli: &Cli) -> Result<AnalyzerConfig> {
    let root = Path::new(&cli.path);
    if !root.is_dir() {
        anyhow::bail!("not a directory: {}", cli.path);
    }
    let mut config = AnalyzerConfig::load(root).with_context(|| format!("Failed to load configuration from: {}", cli.path))?;
    if cli.no_cache {
        config.cache_enabled = false;
    }
    if cli.strict {
        config.strict = true;
    }
    Ok(config)
}

/// Run every requested mode; returns the process exit code.
fn run(cli: &Cli) -> Result<i32> {
    let config = build_config(cli)?;
    let mut exit_code = 0;
    let mut json_out = Map::new();

    // 1. Project analysis
    if cli.needs_project_analysis() {
        let analyzer = ProjectAnalyzer::new(config.clone())?;
        let analysis = analyzer.analyze()?;
        let summary = analysis.summary();

        if cli.json {
            json_out.insert("summary".into(), serde_json::to_value(summary)?);
        } else {
            print!("{}", render_summary(&summary));
        }

        if cli.unused || cli.no_mode_selected() {
            let unused = analyzer.find_unused_exports(&analysis, UnusedOptions { strict: config.strict });
            if !unused.is_empty() {
                log_warn(&format!("{} unused exports", unused.len()));
                exit_code = 1;
            }
            if cli.json {
                json_out.insert("unused".into(), serde_json::to_value(&unused)?);
            } else {
                print!("{}", render_unused(&unused));
            }
        }

        if cli.cycles {
            if cli.json {
                json_out.insert("cycles".into(), json!(analysis.circular_dependencies));
            } else {
                print!("{}", render_cycles(&analysis.circular_dependencies));
            }
        }

        if let Some(file) = &cli.impact {
            let dependents = get_impact(&analysis, file);
            if cli.json {
                json_out.insert("impact".into(), json!({ "file": file, "dependents": dependents }));
            } else {
                print!("{}", render_impact(file, &dependents));
            }
        }
    }

    // 2. Call graph
    if cli.needs_call_graph() {
        let graph = CallGraphEngine::new(config.clone()).build_graph()?;

        if cli.callgraph_dot {
            print!("{}", graph.to_dot());
        }
        if cli.callgraph {
            if cli.json {
                json_out.insert("callgraph".into(), graph.to_json());
            } else {
                print!("{}", render_graph_stats(&graph));
                println!("{}", serde_json::to_string_pretty(&graph)?);
            }
        }
        if cli.insights {
            let insights = get_graph_insights(&graph, config.hub_threshold, &config.extraction);
            if cli.json {
                json_out.insert("insights".into(), serde_json::to_value(&insights)?);
            } else {
                print!("{}", render_graph_stats(&graph));
                print!("{}", render_insights(&insights));
            }
        }
    }

    // 3. Structural verification
    let verifier = StructuralVerifier::new(config);
    if cli.save_gold {
        let graph = verifier.capture_gold_standard()?;
        let path = verifier.gold_standard_path();
        log_info(&format!("gold standard saved to {}", path.display()));
        if cli.json {
            json_out.insert(
                "goldStandard".into(),
                json!({ "path": path.display().to_string(), "functions": graph.function_count() }),
            );
        } else {
            println!("Gold standard saved to {} ({} functions)", path.display(), graph.function_count());
        }
    }
    if cli.verify {
        let result = verifier.verify()?;
        log_event(verification_event(result.valid), &format!("verify: valid={}", result.valid));
        if !result.valid {
            exit_code = 1;
        }
        if cli.json {
            json_out.insert("verify".into(), serde_json::to_value(&result)?);
        } else {
            print!("{}", render_verification(&result));
        }
    }
    if let (Some(file), Some(proposed)) = (&cli.verify_file, &cli.proposed) {
        let content = fs::read_to_string(proposed).with_context(|| format!("Failed to read proposed file: {}", proposed))?;
        let result = verifier.verify_file_change(file, &content)?;
        log_event(verification_event(result.valid), &format!("verify {}: valid={}", file, result.valid));
        if !result.valid {
            exit_code = 1;
        }
        if cli.json {
            json_out.insert("verifyFile".into(), serde_json::to_value(&result)?);
        } else {
            print!("{}", render_verification(&result));
        }
    }

    if cli.json && !json_out.is_empty() {
        print_json(&Value::Object(json_out));
    }
    Ok(exit_code)
}

fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] symtrace internal error: {}", info);
        eprintln!("[PANIC] The process will exit with code 2.");
    }));

    let cli = Cli::parse();
    // JSON to stderr unless --pretty-logs; both respect RUST_LOG
    cli.init_logging();

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            log_error(&format!("{:#}", e));
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("symtrace").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_to_unused_report() {
        let cli = parse(&[]);
        assert_eq!(cli.path, ".");
        assert!(cli.no_mode_selected());
        assert!(cli.needs_project_analysis());
        assert!(!cli.needs_call_graph());
    }

    #[test]
    fn test_modes() {
        let cli = parse(&["proj", "--insights", "--cycles", "--json"]);
        assert_eq!(cli.path, "proj");
        assert!(!cli.no_mode_selected());
        assert!(cli.needs_call_graph());
        assert!(cli.needs_project_analysis());

        let cli = parse(&["--save-gold"]);
        assert!(!cli.needs_project_analysis());
        assert!(!cli.needs_call_graph());
    }

    #[test]
    fn test_verify_file_requires_proposed() {
        let args = ["symtrace", "--verify-file", "src/a.ts"];
        assert!(Cli::try_parse_from(args).is_err());
        let cli = parse(&["--verify-file", "src/a.ts", "--proposed", "/tmp/a.ts"]);
        assert_eq!(cli.verify_file.as_deref(), Some("src/a.ts"));
    }

    #[test]
    fn test_pretty_logs_flag() {
        assert!(!parse(&[]).pretty_logs);
        assert!(parse(&["--pretty-logs", "--verify"]).pretty_logs);
        assert_eq!(verification_event(true), "INFO");
        assert_eq!(verification_event(false), "WARN");
    }

    #[test]
    fn test_build_config_rejects_missing_dir() {
        let cli = parse(&["/definitely/not/here"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_build_config_flags_override() {
        let cli = parse(&[env!("CARGO_MANIFEST_DIR"), "--no-cache", "--strict"]);
        let config = build_config(&cli).unwrap();
        assert!(!config.cache_enabled);
        assert!(config.strict);
    }
}
