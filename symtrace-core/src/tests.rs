//! End-to-end scenarios for symtrace-core.

use crate::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_file(file: &Path, content: &str) {
    fs::create_dir_all(file.parent().unwrap()).unwrap();
    fs::write(file, content).unwrap();
}

fn setup_project(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (rel, content) in files {
        write_file(&dir.path().join(rel), content);
    }
    dir
}

fn config(root: &Path) -> AnalyzerConfig {
    AnalyzerConfig::new(root).with_cache(false)
}

fn analyze(root: &Path) -> (ProjectAnalyzer, ProjectAnalysis) {
    let analyzer = ProjectAnalyzer::new(config(root)).unwrap();
    let analysis = analyzer.analyze().unwrap();
    (analyzer, analysis)
}

// Scenario 1: a three-file import cycle is reported exactly once
#[test]
fn test_cycle_reported_once() {
    let dir = setup_project(&[
        ("src/a.ts", "import { b } from './b';\nexport const a = () => b();\n"),
        ("src/b.ts", "import { c } from './c';\nexport const b = () => c();\n"),
        ("src/c.ts", "import { a } from './a';\nexport const c = () => a();\n"),
    ]);
    let (_, analysis) = analyze(dir.path());

    assert_eq!(analysis.circular_dependencies.len(), 1);
    let mut members = analysis.circular_dependencies[0].clone();
    members.sort();
    assert_eq!(members, vec!["src/a.ts", "src/b.ts", "src/c.ts"]);
}

// Scenario 2: importing through `export *` keeps the original export alive
#[test]
fn test_re_export_transparency() {
    let dir = setup_project(&[
        ("src/a.ts", "export function foo() {\n  return 1;\n}\n"),
        ("src/b.ts", "export * from './a';\n"),
        ("src/app.ts", "import { foo } from './b';\nexport const value = foo();\n"),
    ]);
    let (analyzer, analysis) = analyze(dir.path());

    let unused = analyzer.find_unused_exports(&analysis, UnusedOptions::default());
    assert!(
        !unused.iter().any(|u| u.export.key() == "src/a.ts:foo"),
        "{:?}",
        unused
    );
}

// Scenario 3: a parameter shadowing an import is not a usage of the import
#[test]
fn test_parameter_shadowing_import() {
    let dir = setup_project(&[
        ("src/a.ts", "export const x = 1;\n"),
        (
            "src/b.ts",
            "import { x } from './a';\n\nexport function f(x: number) {\n  return x + 1;\n}\n",
        ),
    ]);
    let (analyzer, analysis) = analyze(dir.path());

    let trace = analysis.trace("src/a.ts", "x").unwrap();
    assert!(trace.is_imported());
    assert!(trace.usages.is_empty());

    let unused = analyzer.find_unused_exports(&analysis, UnusedOptions::default());
    let x = unused.iter().find(|u| u.export.name == "x").unwrap();
    assert_eq!(x.kind, UnusedKind::ImportedNotUsed);
}

// Scenario 4: impurity flows from C through B to A
#[test]
fn test_purity_infection_is_transitive() {
    let dir = setup_project(&[
        ("src/io.ts", "export function c() {\n  console.log('side effect');\n}\n"),
        (
            "src/chain.ts",
            "import { c } from './io';\n\nexport function a() {\n  return b();\n}\n\nfunction b() {\n  c();\n}\n\nexport function d(n: number) {\n  return n * 2;\n}\n",
        ),
    ]);
    let graph = CallGraphEngine::new(config(dir.path())).build_graph().unwrap();

    for id in ["src/io.ts:c", "src/chain.ts:b", "src/chain.ts:a"] {
        assert_eq!(graph.nodes[id].purity, Purity::Impure, "{}", id);
    }
    assert_eq!(graph.nodes["src/chain.ts:d"].purity, Purity::Pure);
    assert!(graph.nodes["src/chain.ts:b"]
        .impurity_reasons
        .iter()
        .any(|r| r == "calls impure function src/io.ts:c"));
}

// Scenario 5: Gold Standard survives a save/load round trip
#[test]
fn test_gold_standard_round_trip() {
    let dir = setup_project(&[
        ("src/lib.rs", "pub mod util;\n\npub fn run() -> u32 {\n    util::double(2)\n}\n"),
        ("src/util.rs", "pub fn double(n: u32) -> u32 {\n    n * 2\n}\n"),
    ]);
    let verifier = StructuralVerifier::new(config(dir.path()));
    let graph = verifier.capture_gold_standard().unwrap();
    let loaded = verifier.load_gold_standard().unwrap();

    assert_eq!(loaded.nodes, graph.nodes);
    assert_eq!(loaded.edges, graph.edges);
    assert_eq!(loaded.stats, graph.stats);
    assert_eq!(loaded.callees_of("src/lib.rs:run"), &["src/util.rs:double".to_string()]);
}

// Scenario 6: verify_file_change leaves the disk and the baseline untouched
#[test]
fn test_verify_file_change_is_non_destructive() {
    let original = "export function keep(a: number) {\n  return a;\n}\n\nexport function drop() {\n  return 0;\n}\n";
    let dir = setup_project(&[("src/a.ts", original)]);
    let verifier = StructuralVerifier::new(config(dir.path()));
    verifier.capture_gold_standard().unwrap();
    let gold_before = fs::read_to_string(verifier.gold_standard_path()).unwrap();

    let proposed = "export function keep(a: number, b: number) {\n  return a + b;\n}\n";
    let result = verifier.verify_file_change("src/a.ts", proposed).unwrap();

    assert!(!result.valid);
    assert_eq!(result.diff.removed_functions, vec!["src/a.ts:drop"]);
    assert_eq!(result.diff.signature_changes.len(), 1);
    assert_eq!(result.diff.signature_changes[0].id, "src/a.ts:keep");

    assert_eq!(fs::read_to_string(dir.path().join("src/a.ts")).unwrap(), original);
    assert_eq!(fs::read_to_string(verifier.gold_standard_path()).unwrap(), gold_before);

    let same = verifier.verify_file_change("src/a.ts", original).unwrap();
    assert!(same.valid);
}

// Scenario 7: an export nobody touches is "Never imported or used"
#[test]
fn test_unused_helper() {
    let dir = setup_project(&[
        ("src/a.ts", "export function helper() {\n  return 1;\n}\n"),
        ("src/index.ts", "console.log('start');\n"),
    ]);
    let (analyzer, analysis) = analyze(dir.path());

    let unused = analyzer.find_unused_exports(&analysis, UnusedOptions::default());
    assert_eq!(unused.len(), 1);
    assert_eq!(unused[0].export.name, "helper");
    assert_eq!(unused[0].reason, "Never imported or used");
}

// Scenario 8: entry-point exports only show up in strict mode
#[test]
fn test_entry_point_export_strict_only() {
    let dir = setup_project(&[("src/index.ts", "export function main() {\n  return 0;\n}\n")]);
    let (analyzer, analysis) = analyze(dir.path());

    assert!(analyzer
        .find_unused_exports(&analysis, UnusedOptions::default())
        .is_empty());

    let strict = analyzer.find_unused_exports(&analysis, UnusedOptions { strict: true });
    assert_eq!(strict.len(), 1);
    assert_eq!(strict[0].export.name, "main");
    assert!(strict[0].reason.contains("Entry point"));
}

// Scenario 9: f calls g, both file-local: one candidate holding both
#[test]
fn test_extractable_pair() {
    let dir = setup_project(&[(
        "src/big.ts",
        "function f() {\n  return g();\n}\n\nfunction g() {\n  return 1;\n}\n\nexport function h() {\n  return 2;\n}\n\nexport function i() {\n  return 3;\n}\n",
    )]);
    let graph = CallGraphEngine::new(config(dir.path())).build_graph().unwrap();
    let groups = find_extractable_groups(&graph, &ExtractionThresholds::default());

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].functions, vec!["src/big.ts:f", "src/big.ts:g"]);
}

#[test]
fn test_impact_and_summary() {
    let dir = setup_project(&[
        ("src/core.ts", "export const base = 1;\n"),
        ("src/mid.ts", "import { base } from './core';\nexport const mid = base + 1;\n"),
        ("src/top.ts", "import { mid } from './mid';\nexport const top = mid + 1;\n"),
        ("src/other.ts", "export const other = 0;\n"),
    ]);
    let (_, analysis) = analyze(dir.path());

    assert_eq!(get_impact(&analysis, "src/core.ts"), vec!["src/mid.ts", "src/top.ts"]);
    assert!(get_impact(&analysis, "src/other.ts").is_empty());

    let summary = analysis.summary();
    assert_eq!(summary.files, 4);
    assert_eq!(summary.exports, 4);
    assert_eq!(summary.cycles, 0);
}

#[test]
fn test_path_alias_resolution() {
    let dir = setup_project(&[
        ("src/lib/format.ts", "export function format(s: string) {\n  return s.trim();\n}\n"),
        ("src/app.ts", "import { format } from '@/lib/format';\nexport const out = format(' x ');\n"),
    ]);
    let analyzer = ProjectAnalyzer::new(config(dir.path()).with_alias("@/*", ["src/*"])).unwrap();
    let analysis = analyzer.analyze().unwrap();

    let trace = analysis.trace("src/lib/format.ts", "format").unwrap();
    assert!(trace.is_imported() && trace.is_used());
}

#[test]
fn test_unparsable_file_degrades() {
    let dir = setup_project(&[
        ("src/good.rs", "pub fn good() {}\n"),
        ("src/bad.rs", "pub fn bad( {\n"),
    ]);
    let (_, analysis) = analyze(dir.path());

    assert!(analysis.files["src/bad.rs"].error.is_some());
    assert!(analysis.files["src/bad.rs"].exports.is_empty());
    assert!(analysis.trace("src/good.rs", "good").is_some());
}

#[test]
fn test_breaking_changes_between_runs() {
    let dir = setup_project(&[("src/api.ts", "export function get(id: string) {\n  return id;\n}\nexport const LIMIT = 5;\n")]);
    let (_, before) = analyze(dir.path());

    write_file(
        &dir.path().join("src/api.ts"),
        "export function get(id: string, full: boolean) {\n  return id;\n}\n",
    );
    let (_, after) = analyze(dir.path());

    let changes = compare_analyses(&before, &after);
    let kinds: Vec<BreakingChangeKind> = changes.iter().map(|c| c.kind).collect();
    assert!(kinds.contains(&BreakingChangeKind::Removed));
    assert!(kinds.contains(&BreakingChangeKind::SignatureChanged));
}

// A cycle entered through an acyclic importer is still reported once
#[test]
fn test_cycle_entered_mid_rotation() {
    let dir = setup_project(&[
        ("src/0.ts", "import { c } from './c';\nexport const zero = () => c();\n"),
        ("src/a.ts", "import { b } from './b';\nexport const a = () => b();\n"),
        ("src/b.ts", "import { c } from './c';\nexport const b = () => c();\n"),
        ("src/c.ts", "import { a } from './a';\nexport const c = () => a();\n"),
    ]);
    let (_, analysis) = analyze(dir.path());

    assert_eq!(analysis.circular_dependencies.len(), 1, "{:?}", analysis.circular_dependencies);
    let mut members = analysis.circular_dependencies[0].clone();
    members.sort();
    assert_eq!(members, vec!["src/a.ts", "src/b.ts", "src/c.ts"]);
}

#[test]
fn test_call_edge_through_barrel() {
    let dir = setup_project(&[
        ("src/c.ts", "export function write() {\n  console.log('x');\n}\n"),
        ("src/barrel.ts", "export * from './c';\n"),
        ("src/a.ts", "import { write } from './barrel';\nexport function run() {\n  write();\n}\n"),
    ]);
    let graph = CallGraphEngine::new(config(dir.path())).build_graph().unwrap();

    assert_eq!(graph.callees_of("src/a.ts:run"), &["src/c.ts:write".to_string()]);
    assert_eq!(graph.nodes["src/a.ts:run"].purity, Purity::Impure);
}

#[test]
fn test_parameter_named_like_impure_export_stays_pure() {
    let dir = setup_project(&[
        ("src/io.ts", "export function save(n: number) {\n  console.log(n);\n}\n"),
        ("src/calc.ts", "export function apply(save, n: number) {\n  return save(n);\n}\n"),
    ]);
    let graph = CallGraphEngine::new(config(dir.path())).build_graph().unwrap();

    assert_eq!(graph.nodes["src/io.ts:save"].purity, Purity::Impure);
    assert_eq!(graph.nodes["src/calc.ts:apply"].purity, Purity::Pure);
    assert!(graph.callees_of("src/calc.ts:apply").is_empty());
}

#[test]
fn test_rust_local_closure_shadows_import() {
    let dir = setup_project(&[
        ("src/lib.rs", "pub mod api;\npub mod db;\n"),
        ("src/db.rs", "pub fn query() -> u32 {\n    println!(\"q\");\n    1\n}\n"),
        (
            "src/api.rs",
            "use crate::db::query;\n\npub fn handler() -> u32 {\n    let query = || 2;\n    query()\n}\n\npub fn direct() -> u32 {\n    query()\n}\n",
        ),
    ]);
    let graph = CallGraphEngine::new(config(dir.path())).build_graph().unwrap();

    assert!(graph.callees_of("src/api.rs:handler").is_empty());
    assert_eq!(graph.nodes["src/api.rs:handler"].purity, Purity::Pure);
    assert_eq!(graph.callees_of("src/api.rs:direct"), &["src/db.rs:query".to_string()]);
    assert_eq!(graph.nodes["src/api.rs:direct"].purity, Purity::Impure);
}

#[test]
fn test_typescript_local_binding_shadows_import() {
    let dir = setup_project(&[
        ("src/io.ts", "export function write(s: string) {\n  console.log(s);\n}\n"),
        (
            "src/view.ts",
            "import { write } from './io';\nexport function render() {\n  const write = (s: string) => s.length;\n  return write('x');\n}\n",
        ),
    ]);
    let graph = CallGraphEngine::new(config(dir.path())).build_graph().unwrap();

    assert_eq!(graph.callees_of("src/view.ts:render"), &["src/view.ts:render.write".to_string()]);
    assert_eq!(graph.nodes["src/view.ts:render"].purity, Purity::Pure);
}
