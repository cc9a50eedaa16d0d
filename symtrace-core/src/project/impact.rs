//! Change impact: transitive dependents and breaking export changes.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::model::{Export, ProjectAnalysis};

/// Every file that transitively imports `file`, sorted, excluding `file` itself.
pub fn get_impact(analysis: &ProjectAnalysis, file: &str) -> Vec<String> {
    transitive_dependents(&analysis.reverse_graph, analysis.importers_of(file), file)
}

/// BFS over `reverse_graph` from `start`, skipping `exclude`.
pub(crate) fn transitive_dependents<'a>(
    reverse_graph: &'a BTreeMap<String, BTreeSet<String>>,
    start: impl IntoIterator<Item = &'a str>,
    exclude: &str,
) -> Vec<String> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut queue: VecDeque<&str> = start.into_iter().collect();

    while let Some(current) = queue.pop_front() {
        if current == exclude || !seen.insert(current) {
            continue;
        }
        if let Some(importers) = reverse_graph.get(current) {
            queue.extend(importers.iter().map(String::as_str));
        }
    }

    seen.into_iter().map(str::to_string).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakingChangeKind {
    Removed,
    KindChanged,
    SignatureChanged,
}

/// A change to an export that can break its importers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakingChange {
    pub kind: BreakingChangeKind,
    pub file: String,
    pub name: String,
    pub before: Option<String>,
    pub after: Option<String>,
    pub message: String,
}

/// Compare two export lists by `file:name`.
///
/// Additions are not breaking. A kind change hides a signature change of the
/// same export.
pub fn compare_exports(old: &[Export], new: &[Export]) -> Vec<BreakingChange> {
    let new_by_key: BTreeMap<String, &Export> = new
        .iter()
        .filter(|e| !e.is_star())
        .map(|e| (e.key(), e))
        .collect();

    let mut changes = Vec::new();
    for before in old.iter().filter(|e| !e.is_star()) {
        let file = before.file_path.clone();
        let name = before.name.clone();

        let Some(after) = new_by_key.get(&before.key()) else {
            changes.push(BreakingChange {
                kind: BreakingChangeKind::Removed,
                message: format!("Export '{}' was removed from {}", name, file),
                before: Some(before.kind.to_string()),
                after: None,
                file,
                name,
            });
            continue;
        };

        if before.kind != after.kind {
            changes.push(BreakingChange {
                kind: BreakingChangeKind::KindChanged,
                message: format!(
                    "Export '{}' in {} changed from {} to {}",
                    name, file, before.kind, after.kind
                ),
                before: Some(before.kind.to_string()),
                after: Some(after.kind.to_string()),
                file,
                name,
            });
        } else if let (Some(old_sig), Some(new_sig)) = (&before.signature, &after.signature) {
            if old_sig != new_sig {
                changes.push(BreakingChange {
                    kind: BreakingChangeKind::SignatureChanged,
                    message: format!("Signature of '{}' in {} changed", name, file),
                    before: Some(old_sig.clone()),
                    after: Some(new_sig.clone()),
                    file,
                    name,
                });
            }
        }
    }
    changes
}

/// [`compare_exports`] over every file of two analyses of the same project.
pub fn compare_analyses(old: &ProjectAnalysis, new: &ProjectAnalysis) -> Vec<BreakingChange> {
    let flatten = |a: &ProjectAnalysis| -> Vec<Export> {
        a.files
            .values()
            .flat_map(|f| f.exports.iter().cloned())
            .collect()
    };
    compare_exports(&flatten(old), &flatten(new))
}
