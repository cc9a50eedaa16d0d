//! Unused-export classification.
//!
//! An export is dead when nothing imports it, nothing uses it, and no
//! export re-exporting it (directly or through a chain) is imported or used.
//! Entry-point exports are reported under their own kind and only surface in
//! strict mode.

use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};

use super::entry::EntryPoints;
use crate::model::{Export, ProjectAnalysis};

pub const REASON_NEVER_USED: &str = "Never imported or used";
pub const REASON_IMPORTED_NOT_USED: &str = "Imported but never actually used";
pub const REASON_ENTRY_POINT: &str = "Entry point - may be used externally";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnusedKind {
    NeverUsed,
    ImportedNotUsed,
    EntryPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnusedExport {
    pub export: Export,
    pub reason: String,
    pub kind: UnusedKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnusedOptions {
    /// Also report exports of entry points.
    pub strict: bool,
}

/// Whether any export in the re-export chain above `key` is imported or used.
fn chain_is_live(analysis: &ProjectAnalysis, key: &str) -> bool {
    let mut seen: BTreeSet<&str> = BTreeSet::from([key]);
    let mut queue: VecDeque<&str> = VecDeque::from([key]);

    while let Some(current) = queue.pop_front() {
        let Some(re_exporters) = analysis.re_export_links.get(current) else {
            continue;
        };
        for next in re_exporters {
            if !seen.insert(next.as_str()) {
                continue;
            }
            if analysis
                .symbol_traces
                .get(next)
                .is_some_and(|t| t.is_imported() || t.is_used())
            {
                return true;
            }
            queue.push_back(next);
        }
    }
    false
}

fn classify(analysis: &ProjectAnalysis, export: &Export) -> Option<UnusedKind> {
    let key = export.key();
    let (imported, used) = analysis
        .symbol_traces
        .get(&key)
        .map(|t| (t.is_imported(), t.is_used()))
        .unwrap_or((false, false));

    if used || chain_is_live(analysis, &key) {
        return None;
    }
    if !imported {
        return Some(UnusedKind::NeverUsed);
    }
    if export.kind.has_runtime_usage() {
        return Some(UnusedKind::ImportedNotUsed);
    }
    None
}

/// Every dead export of `analysis`, sorted by file, line and name.
pub fn find_unused_exports(analysis: &ProjectAnalysis, entry_points: &EntryPoints, options: UnusedOptions) -> Vec<UnusedExport> {
    let mut unused = Vec::new();

    for (path, file) in &analysis.files {
        let is_entry = entry_points.is_entry_point(path);
        for export in file.exports.iter().filter(|e| !e.is_star()) {
            let Some(kind) = classify(analysis, export) else {
                continue;
            };
            let (kind, reason) = if is_entry {
                if !options.strict {
                    continue;
                }
                (UnusedKind::EntryPoint, REASON_ENTRY_POINT)
            } else if kind == UnusedKind::NeverUsed {
                (kind, REASON_NEVER_USED)
            } else {
                (kind, REASON_IMPORTED_NOT_USED)
            };
            unused.push(UnusedExport {
                export: export.clone(),
                reason: reason.to_string(),
                kind,
            });
        }
    }

    unused.sort_by(|a, b| {
        a.export
            .file_path
            .cmp(&b.export.file_path)
            .then(a.export.line.cmp(&b.export.line))
            .then_with(|| a.export.name.cmp(&b.export.name))
    });
    unused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExportKind, FileAnalysis, ImporterRef, SymbolTrace, Usage, UsageType};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn analysis(exports: Vec<Export>) -> ProjectAnalysis {
        let mut files: BTreeMap<String, FileAnalysis> = BTreeMap::new();
        let mut traces = BTreeMap::new();
        for e in exports {
            traces.insert(e.key(), SymbolTrace::new(&e.file_path, &e.name));
            files
                .entry(e.file_path.clone())
                .or_insert_with(|| FileAnalysis {
                    path: e.file_path.clone(),
                    content_hash: String::new(),
                    exports: Vec::new(),
                    imports: Vec::new(),
                    local_symbols: Default::default(),
                    from_cache: false,
                    error: None,
                })
                .exports
                .push(e);
        }
        ProjectAnalysis {
            root_dir: PathBuf::from("/p"),
            files,
            exports: BTreeMap::new(),
            import_graph: BTreeMap::new(),
            reverse_graph: BTreeMap::new(),
            symbol_traces: traces,
            re_export_links: BTreeMap::new(),
            circular_dependencies: Vec::new(),
        }
    }

    fn import(a: &mut ProjectAnalysis, key: &str, from: &str) {
        a.symbol_traces.get_mut(key).unwrap().add_importer(ImporterRef {
            file: from.to_string(),
            alias: None,
            line: 1,
        });
    }

    fn use_it(a: &mut ProjectAnalysis, key: &str, from: &str) {
        a.symbol_traces.get_mut(key).unwrap().usages.push(Usage {
            file_path: from.to_string(),
            line: 2,
            context: String::new(),
            usage_type: UsageType::Call,
        });
    }

    fn no_entries() -> EntryPoints {
        EntryPoints::new(std::path::Path::new("/nonexistent"), &[]).unwrap()
    }

    #[test]
    fn test_reasons() {
        let mut a = analysis(vec![
            Export::new("dead", ExportKind::Function, "src/a.ts", 1),
            Export::new("idle", ExportKind::Function, "src/a.ts", 2),
            Export::new("Shape", ExportKind::Interface, "src/a.ts", 3),
            Export::new("live", ExportKind::Function, "src/a.ts", 4),
        ]);
        import(&mut a, "src/a.ts:idle", "src/b.ts");
        import(&mut a, "src/a.ts:Shape", "src/b.ts");
        import(&mut a, "src/a.ts:live", "src/b.ts");
        use_it(&mut a, "src/a.ts:live", "src/b.ts");

        let unused = find_unused_exports(&a, &no_entries(), UnusedOptions::default());
        let got: Vec<(&str, &str)> = unused
            .iter()
            .map(|u| (u.export.name.as_str(), u.reason.as_str()))
            .collect();
        assert_eq!(got, vec![("dead", REASON_NEVER_USED), ("idle", REASON_IMPORTED_NOT_USED)]);
    }

    #[test]
    fn test_re_export_chain_keeps_source_alive() {
        let mut a = analysis(vec![
            Export::new("foo", ExportKind::Function, "src/a.ts", 1),
            Export::new("foo", ExportKind::Function, "src/b.ts", 1),
            Export::new("foo", ExportKind::Function, "src/c.ts", 1),
        ]);
        a.re_export_links
            .entry("src/a.ts:foo".into())
            .or_default()
            .insert("src/b.ts:foo".into());
        a.re_export_links
            .entry("src/b.ts:foo".into())
            .or_default()
            .insert("src/c.ts:foo".into());
        import(&mut a, "src/c.ts:foo", "src/d.ts");
        use_it(&mut a, "src/c.ts:foo", "src/d.ts");

        let unused = find_unused_exports(&a, &no_entries(), UnusedOptions::default());
        assert!(unused.is_empty());
    }

    #[test]
    fn test_entry_points_only_in_strict_mode() {
        let a = analysis(vec![Export::new("main", ExportKind::Function, "src/index.ts", 1)]);

        assert!(find_unused_exports(&a, &no_entries(), UnusedOptions::default()).is_empty());

        let strict = find_unused_exports(&a, &no_entries(), UnusedOptions { strict: true });
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].kind, UnusedKind::EntryPoint);
        assert!(strict[0].reason.contains("Entry point"));
    }
}
