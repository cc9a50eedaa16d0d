//! Purity inference.
//!
//! Runs before the graph is assembled:
//!
//! 1. Direct pass: each function's own body (nested functions blanked out)
//!    is matched against the language's impurity patterns. Reasons already
//!    attached by the extractor (outer-state mutation) also count.
//! 2. Infection: the call sites resolved by the front-ends form a caller
//!    index. A worklist seeded with the directly impure ids marks every
//!    transitive caller impure.
//! 3. Whatever is still `Unknown` is finalized `Pure`.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

use super::model::{CallEdge, FunctionNode, Purity};
use crate::lang::ImpurityPattern;

/// Body text of `node`: its own lines, with the lines of functions declared
/// inside it replaced by empty lines.
pub fn own_body(node: &FunctionNode, lines: &[&str], same_file: &[&FunctionNode]) -> String {
    let first = node.line.max(1);
    let last = node.end_line.min(lines.len());
    if first > last {
        return String::new();
    }

    let inner: Vec<(usize, usize)> = same_file
        .iter()
        .filter(|other| other.id != node.id && other.line > node.line && other.end_line <= node.end_line)
        .map(|other| (other.line, other.end_line))
        .collect();

    let mut body = String::new();
    for line_no in first..=last {
        if !inner.iter().any(|(a, b)| (*a..=*b).contains(&line_no)) {
            body.push_str(lines[line_no - 1]);
        }
        body.push('\n');
    }
    body
}

/// Run all three purity steps over `nodes` in place.
///
/// `patterns_for` returns the impurity patterns of the front-end owning a file.
/// `calls` are the resolved call sites of every file.
pub fn infer_purity<'p, F>(
    nodes: &mut BTreeMap<String, FunctionNode>,
    sources: &BTreeMap<String, String>,
    calls: &[CallEdge],
    patterns_for: F,
) where
    F: Fn(&str) -> &'p [ImpurityPattern],
{
    let mut by_file: BTreeMap<&str, Vec<&FunctionNode>> = BTreeMap::new();
    for node in nodes.values() {
        by_file.entry(node.file_path.as_str()).or_default().push(node);
    }

    let mut direct: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut callers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for (file, file_nodes) in &by_file {
        let Some(content) = sources.get(*file) else { continue };
        let lines: Vec<&str> = content.lines().collect();
        let patterns = patterns_for(*file);

        for node in file_nodes {
            let body = own_body(node, &lines, file_nodes);

            let mut reasons = node.impurity_reasons.clone();
            for pattern in patterns {
                if pattern.regex.is_match(&body) && !reasons.iter().any(|r| r == pattern.reason) {
                    reasons.push(pattern.reason.to_string());
                }
            }
            if !reasons.is_empty() {
                direct.insert(node.id.clone(), reasons);
            }
        }
    }

    for call in calls.iter().filter(|c| c.from != c.to) {
        callers.entry(call.to.clone()).or_default().insert(call.from.clone());
    }

    let mut queue: VecDeque<String> = VecDeque::new();
    for (id, reasons) in direct {
        if let Some(node) = nodes.get_mut(&id) {
            for reason in reasons {
                node.mark_impure(reason);
            }
            queue.push_back(id);
        }
    }
    let seeded = queue.len();

    while let Some(impure) = queue.pop_front() {
        let Some(ids) = callers.get(&impure) else { continue };
        for caller in ids {
            if let Some(node) = nodes.get_mut(caller) {
                if node.purity != Purity::Impure {
                    node.mark_impure(format!("calls impure function {}", impure));
                    queue.push_back(caller.clone());
                }
            }
        }
    }

    let mut pure = 0;
    for node in nodes.values_mut() {
        if node.purity == Purity::Unknown {
            node.purity = Purity::Pure;
            pure += 1;
        }
    }

    debug!(direct = seeded, pure, total = nodes.len(), "purity inference complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::compile_patterns;

    fn node(file: &str, name: &str, line: usize, end_line: usize) -> FunctionNode {
        FunctionNode::new(file, name, line, end_line)
    }

    #[test]
    fn test_own_body_blanks_nested_functions() {
        let src = "function outer() {\n  function inner() { console.log(1); }\n  return inner();\n}\n";
        let lines: Vec<&str> = src.lines().collect();
        let outer = node("a.ts", "outer", 1, 4);
        let inner = node("a.ts", "outer.inner", 2, 2);
        let body = own_body(&outer, &lines, &[&outer, &inner]);
        assert!(!body.contains("console"));
        assert!(body.contains("return inner();"));
        assert_eq!(body.lines().count(), 4);
    }

    #[test]
    fn test_infection_is_transitive() {
        let src = "function c() { console.log('x'); }\nfunction b() { return c(); }\nfunction a() { return b(); }\nfunction d() { return 1; }\n";
        let mut nodes: BTreeMap<String, FunctionNode> = [
            node("m.ts", "c", 1, 1),
            node("m.ts", "b", 2, 2),
            node("m.ts", "a", 3, 3),
            node("m.ts", "d", 4, 4),
        ]
        .into_iter()
        .map(|n| (n.id.clone(), n))
        .collect();
        let sources = BTreeMap::from([("m.ts".to_string(), src.to_string())]);
        let calls = [CallEdge::new("m.ts:b", "m.ts:c"), CallEdge::new("m.ts:a", "m.ts:b")];
        let patterns = compile_patterns(&[(r"\bconsole\.", "console output")]);

        infer_purity(&mut nodes, &sources, &calls, |_| patterns.as_slice());

        assert_eq!(nodes["m.ts:c"].purity, Purity::Impure);
        assert_eq!(nodes["m.ts:c"].impurity_reasons, vec!["console output"]);
        assert_eq!(nodes["m.ts:b"].purity, Purity::Impure);
        assert_eq!(nodes["m.ts:b"].impurity_reasons, vec!["calls impure function m.ts:c"]);
        assert_eq!(nodes["m.ts:a"].purity, Purity::Impure);
        assert_eq!(nodes["m.ts:d"].purity, Purity::Pure);
    }

    #[test]
    fn test_preset_reasons_seed_the_worklist() {
        let src = "function bump() { count++; }\nfunction run() { bump(); }\n";
        let mut bump = node("s.ts", "bump", 1, 1);
        bump.impurity_reasons.push("mutates outer variable count".into());
        let mut nodes: BTreeMap<String, FunctionNode> = [bump, node("s.ts", "run", 2, 2)]
            .into_iter()
            .map(|n| (n.id.clone(), n))
            .collect();
        let sources = BTreeMap::from([("s.ts".to_string(), src.to_string())]);
        let calls = [CallEdge::new("s.ts:run", "s.ts:bump")];

        let none: &[ImpurityPattern] = &[];
        infer_purity(&mut nodes, &sources, &calls, |_| none);

        assert_eq!(nodes["s.ts:bump"].purity, Purity::Impure);
        assert_eq!(nodes["s.ts:run"].purity, Purity::Impure);
    }

    #[test]
    fn test_unlinked_call_text_does_not_infect() {
        // `save` is a parameter here, so no call site links it to `io.ts:save`.
        let mut nodes: BTreeMap<String, FunctionNode> = [
            node("io.ts", "save", 1, 1),
            node("calc.ts", "apply", 1, 1),
        ]
        .into_iter()
        .map(|n| (n.id.clone(), n))
        .collect();
        let sources = BTreeMap::from([
            ("io.ts".to_string(), "export function save(n) { console.log(n); }\n".to_string()),
            ("calc.ts".to_string(), "export function apply(save, n) { return save(n); }\n".to_string()),
        ]);
        let patterns = compile_patterns(&[(r"\bconsole\.", "console output")]);

        infer_purity(&mut nodes, &sources, &[], |_| patterns.as_slice());

        assert_eq!(nodes["io.ts:save"].purity, Purity::Impure);
        assert_eq!(nodes["calc.ts:apply"].purity, Purity::Pure);
    }
}
