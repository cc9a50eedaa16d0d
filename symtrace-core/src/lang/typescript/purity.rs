//! Side-effect signals for TypeScript and JavaScript functions.

use std::collections::BTreeSet;
use tree_sitter::Node;

use super::{parameter_names, pattern_names, text, FUNCTION_VALUE_KINDS};

/// `(regex, reason)` pairs matched against function text.
pub(crate) const RAW_PATTERNS: &[(&str, &str)] = &[
    (r"\bconsole\.", "console output"),
    (r"\bfs\.", "file system access"),
    (r"\bfetch\s*\(", "network request"),
    (r"\bXMLHttpRequest\b", "network request"),
    (r"\bprocess\.", "process access"),
    (r"\bdocument\.", "DOM access"),
    (r"\bwindow\.", "global window access"),
    (r"\b(?:localStorage|sessionStorage)\b", "web storage access"),
    (r"\bMath\.random\s*\(", "random number generation"),
    (r"\bDate\.now\s*\(", "reads the clock"),
    (r"\bnew\s+Date\s*\(", "reads the clock"),
    (r"\bawait\b", "awaits asynchronous work"),
    (r"\bthrow\b", "throws"),
    (r"\b(?:setTimeout|setInterval|setImmediate)\s*\(", "schedules a timer"),
];

/// Array and collection methods that change their receiver.
const MUTATING_METHODS: &[&str] = &[
    "push", "pop", "shift", "unshift", "splice", "sort", "reverse", "fill", "copyWithin", "set", "delete",
    "clear", "add",
];

/// Kinds whose bodies belong to a separate function node.
const SEPARATE_NODE_KINDS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "method_definition",
    "class_declaration",
    "class",
];

enum Target {
    Name(String),
    This(String),
}

/// Outer-state mutations inside `func`, as impurity reasons.
///
/// Names declared anywhere in the function (parameters, locals, callback
/// parameters) are local; assigning to anything else, or calling a mutating
/// method on it, mutates outer state. Writes through `this` always count.
pub(crate) fn outer_mutations(func: Node, src: &str) -> Vec<String> {
    let mut declared: BTreeSet<String> = parameter_names(func, src).into_iter().collect();
    let mut targets = Vec::new();
    if let Some(body) = func.child_by_field_name("body") {
        scan(body, src, &mut declared, &mut targets);
    }

    let mut reasons = Vec::new();
    for target in targets {
        let reason = match target {
            Target::Name(name) if !declared.contains(&name) => format!("mutates outer variable {}", name),
            Target::This(prop) => format!("mutates this.{}", prop),
            Target::Name(_) => continue,
        };
        if !reasons.contains(&reason) {
            reasons.push(reason);
        }
    }
    reasons
}

/// Root of an assignment target: `a`, `a.b.c`, `a[i]` -> `a`; `this.x.y` -> `this.x`.
fn target_root(node: Node, src: &str) -> Option<Target> {
    match node.kind() {
        "identifier" => Some(Target::Name(text(node, src).to_string())),
        "member_expression" | "subscript_expression" => {
            let object = node.child_by_field_name("object")?;
            if object.kind() == "this" {
                let prop = node
                    .child_by_field_name("property")
                    .map(|p| text(p, src).to_string())
                    .unwrap_or_default();
                return Some(Target::This(prop));
            }
            target_root(object, src)
        }
        "parenthesized_expression" | "non_null_expression" => target_root(node.named_child(0)?, src),
        _ => None,
    }
}

fn scan(node: Node, src: &str, declared: &mut BTreeSet<String>, targets: &mut Vec<Target>) {
    match node.kind() {
        k if SEPARATE_NODE_KINDS.contains(&k) => {
            if let Some(n) = node.child_by_field_name("name") {
                declared.insert(text(n, src).to_string());
            }
            return;
        }
        k if FUNCTION_VALUE_KINDS.contains(&k) => {
            declared.extend(parameter_names(node, src));
        }
        "variable_declarator" => {
            if let Some(n) = node.child_by_field_name("name") {
                let mut names = Vec::new();
                pattern_names(n, src, &mut names);
                declared.extend(names);
            }
        }
        "catch_clause" => {
            if let Some(p) = node.child_by_field_name("parameter") {
                let mut names = Vec::new();
                pattern_names(p, src, &mut names);
                declared.extend(names);
            }
        }
        "for_in_statement" if node.child_by_field_name("kind").is_some() => {
            if let Some(l) = node.child_by_field_name("left") {
                let mut names = Vec::new();
                pattern_names(l, src, &mut names);
                declared.extend(names);
            }
        }
        "assignment_expression" | "augmented_assignment_expression" => {
            if let Some(t) = node.child_by_field_name("left").and_then(|l| target_root(l, src)) {
                targets.push(t);
            }
        }
        "update_expression" => {
            if let Some(t) = node.child_by_field_name("argument").and_then(|a| target_root(a, src)) {
                targets.push(t);
            }
        }
        "call_expression" => {
            let mutated = node
                .child_by_field_name("function")
                .filter(|f| f.kind() == "member_expression")
                .and_then(|f| {
                    let prop = f.child_by_field_name("property")?;
                    if MUTATING_METHODS.contains(&text(prop, src)) {
                        target_root(f.child_by_field_name("object")?, src)
                    } else {
                        None
                    }
                });
            if let Some(t) = mutated {
                targets.push(t);
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        scan(child, src, declared, targets);
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse_tree;
    use super::*;

    fn first_function_reasons(src: &str) -> Vec<String> {
        let tree = parse_tree("a.ts", src).unwrap();
        let root = tree.root_node();
        let func = root.named_child(root.named_child_count() - 1).unwrap();
        outer_mutations(func, src)
    }

    #[test]
    fn test_local_mutation_is_pure() {
        let reasons = first_function_reasons(
            "function f(xs: number[]) { const out = []; let n = 0; for (const x of xs) { out.push(x); n += x; } return out; }",
        );
        assert!(reasons.is_empty(), "{:?}", reasons);
    }

    #[test]
    fn test_outer_mutation_detected() {
        let reasons = first_function_reasons(
            "let total = 0;\nconst seen = [];\nfunction f(x: number) { total += x; seen.push(x); total++; }",
        );
        assert_eq!(reasons, vec!["mutates outer variable total", "mutates outer variable seen"]);
    }

    #[test]
    fn test_this_mutation_detected() {
        let reasons = first_function_reasons("function f() { this.count = 1; }");
        assert_eq!(reasons, vec!["mutates this.count"]);
    }

    #[test]
    fn test_callback_parameters_are_local() {
        let reasons = first_function_reasons("function f(xs) { return xs.map((acc) => { acc = acc + 1; return acc; }); }");
        assert!(reasons.is_empty());
    }
}
