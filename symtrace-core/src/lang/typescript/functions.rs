//! Function nodes and call edges for TypeScript and JavaScript.
//!
//! Naming inside one file:
//!
//! - top-level `function f` / `const f = () => ..` -> `f`
//! - class members -> `Class.method`
//! - functions declared inside another function -> `outer.inner`
//! - members of a TS `namespace N { .. }` -> `N::f`
//! - an anonymous `export default` function -> `default`

use std::collections::{BTreeMap, BTreeSet};
use tree_sitter::{Node, Tree};

use super::purity::outer_mutations;
use super::usage::{local_binding, LocalBinding};
use super::{line_of, text, FUNCTION_VALUE_KINDS};
use crate::callgraph::{CallEdge, FunctionNode, NodeTable};
use crate::common::ModulePathBuilder;
use crate::lang::normalize_signature;
use crate::model::DEFAULT_EXPORT;

enum Owner {
    Class { name: String, exported: bool },
    Function(String),
}

struct FunctionWalker<'a> {
    path: &'a str,
    src: &'a str,
    exported: BTreeSet<String>,
    owners: Vec<Owner>,
    current_mod: Vec<String>,
    nodes: Vec<FunctionNode>,
    seen: BTreeSet<String>,
    /// Tree node id -> function id, for call attribution.
    spans: BTreeMap<usize, String>,
}

pub(crate) fn extract_functions(path: &str, src: &str, tree: &Tree) -> Vec<FunctionNode> {
    walk_file(path, src, tree).nodes
}

fn walk_file<'a>(path: &'a str, src: &'a str, tree: &Tree) -> FunctionWalker<'a> {
    let root = tree.root_node();
    let mut walker = FunctionWalker {
        path,
        src,
        exported: exported_names(root, src),
        owners: Vec::new(),
        current_mod: Vec::new(),
        nodes: Vec::new(),
        seen: BTreeSet::new(),
        spans: BTreeMap::new(),
    };
    walker.walk_children(root);
    walker
}

/// Local names made visible by `export` statements.
fn exported_names(root: Node, src: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut cursor = root.walk();
    for stmt in root.children(&mut cursor) {
        if stmt.kind() != "export_statement" || stmt.child_by_field_name("source").is_some() {
            continue;
        }
        if let Some(decl) = stmt.child_by_field_name("declaration") {
            if let Some(n) = decl.child_by_field_name("name") {
                names.insert(text(n, src).to_string());
            }
            let mut c = decl.walk();
            for declarator in decl.named_children(&mut c) {
                if declarator.kind() == "variable_declarator" {
                    if let Some(n) = declarator.child_by_field_name("name") {
                        names.insert(text(n, src).to_string());
                    }
                }
            }
        }
        if let Some(value) = stmt.child_by_field_name("value") {
            if value.kind() == "identifier" {
                names.insert(text(value, src).to_string());
            } else if let Some(n) = value.child_by_field_name("name") {
                names.insert(text(n, src).to_string());
            }
        }
        let mut c = stmt.walk();
        for clause in stmt.children(&mut c) {
            if clause.kind() != "export_clause" {
                continue;
            }
            let mut inner = clause.walk();
            for spec in clause.named_children(&mut inner) {
                if let Some(n) = spec.child_by_field_name("name") {
                    names.insert(text(n, src).to_string());
                }
            }
        }
    }
    names.insert(DEFAULT_EXPORT.to_string());
    names
}

fn signature_of(func: Node, src: &str) -> Option<String> {
    let params = func
        .child_by_field_name("parameters")
        .map(|p| text(p, src).to_string())
        .or_else(|| func.child_by_field_name("parameter").map(|p| format!("({})", text(p, src))))?;
    let ret = func
        .child_by_field_name("return_type")
        .map(|r| text(r, src))
        .unwrap_or("");
    Some(normalize_signature(&format!("{}{}", params, ret)))
}

impl ModulePathBuilder for FunctionWalker<'_> {
    fn current_mod(&self) -> &[String] {
        &self.current_mod
    }
}

impl<'a> FunctionWalker<'a> {
    fn walk_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            self.walk(child);
        }
    }

    fn walk(&mut self, node: Node) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                match node.child_by_field_name("name") {
                    Some(n) => {
                        let name = text(n, self.src).to_string();
                        self.add_function(node, node, &name);
                    }
                    None => self.walk_children(node),
                }
            }
            "variable_declarator" => {
                let name = node.child_by_field_name("name").filter(|n| n.kind() == "identifier");
                match (name, node.child_by_field_name("value")) {
                    (Some(n), Some(v)) if FUNCTION_VALUE_KINDS.contains(&v.kind()) => {
                        let name = text(n, self.src).to_string();
                        self.add_function(node, v, &name);
                    }
                    _ => self.walk_children(node),
                }
            }
            "class_declaration" | "abstract_class_declaration" | "class" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| text(n, self.src).to_string())
                    .or_else(|| self.declarator_name(node))
                    .unwrap_or_else(|| DEFAULT_EXPORT.to_string());
                let exported = self.owners.is_empty() && self.exported.contains(&name);
                let name = match self.current_function() {
                    Some(function) => format!("{}.{}", function, name),
                    None => self.build_node_name(None, &name),
                };
                self.owners.push(Owner::Class { name, exported });
                if let Some(body) = node.child_by_field_name("body") {
                    self.walk_children(body);
                }
                self.owners.pop();
            }
            "method_definition" => match node.child_by_field_name("name") {
                Some(n) => {
                    let name = text(n, self.src).to_string();
                    self.add_function(node, node, &name);
                }
                None => self.walk_children(node),
            },
            "public_field_definition" => {
                let name = node.child_by_field_name("name");
                match (name, node.child_by_field_name("value")) {
                    (Some(n), Some(v)) if FUNCTION_VALUE_KINDS.contains(&v.kind()) => {
                        let name = text(n, self.src).to_string();
                        self.add_function(node, v, &name);
                    }
                    _ => self.walk_children(node),
                }
            }
            "export_statement" => match node.child_by_field_name("value") {
                Some(v) if FUNCTION_VALUE_KINDS.contains(&v.kind()) && self.owners.is_empty() => {
                    let name = v
                        .child_by_field_name("name")
                        .map(|n| text(n, self.src).to_string())
                        .unwrap_or_else(|| DEFAULT_EXPORT.to_string());
                    self.add_function(node, v, &name);
                }
                _ => self.walk_children(node),
            },
            "internal_module" | "module" => {
                let name = node.child_by_field_name("name").map(|n| text(n, self.src).to_string());
                match (name, node.child_by_field_name("body")) {
                    (Some(name), Some(body)) => {
                        self.current_mod.push(name);
                        self.walk_children(body);
                        self.current_mod.pop();
                    }
                    _ => self.walk_children(node),
                }
            }
            _ => self.walk_children(node),
        }
    }

    fn declarator_name(&self, class: Node) -> Option<String> {
        let parent = class.parent().filter(|p| p.kind() == "variable_declarator")?;
        parent
            .child_by_field_name("name")
            .map(|n| text(n, self.src).to_string())
    }

    fn current_function(&self) -> Option<&str> {
        self.owners.iter().rev().find_map(|o| match o {
            Owner::Function(id) => Some(id.as_str()),
            Owner::Class { .. } => None,
        })
    }

    /// `decl` spans the whole declaration for line numbers; `func` carries params and body.
    fn add_function(&mut self, decl: Node, func: Node, name: &str) {
        let (full_name, is_method, is_nested, is_exported) = match self.owners.last() {
            Some(Owner::Class { name: class, exported }) => (format!("{}.{}", class, name), true, false, *exported),
            Some(Owner::Function(parent)) => (format!("{}.{}", parent, name), false, true, false),
            None => (
                self.build_node_name(None, name),
                false,
                false,
                self.current_mod.is_empty() && self.exported.contains(name),
            ),
        };

        let mut node = FunctionNode::new(self.path, &full_name, line_of(decl), decl.end_position().row + 1);
        node.is_method = is_method;
        node.is_nested = is_nested;
        node.is_exported = is_exported;
        node.signature = signature_of(func, self.src);
        node.impurity_reasons = outer_mutations(func, self.src);

        if self.seen.insert(node.id.clone()) {
            self.spans.insert(func.id(), node.id.clone());
            self.nodes.push(node);
        }

        self.owners.push(Owner::Function(full_name));
        if let Some(body) = func.child_by_field_name("body") {
            self.walk_children(body);
        }
        self.owners.pop();
    }
}

/// Call edges of one file, attributed to the innermost enclosing function node.
pub(crate) fn extract_calls(path: &str, src: &str, tree: &Tree, table: &NodeTable) -> Vec<CallEdge> {
    let walker = walk_file(path, src, tree);
    let mut edges = Vec::new();
    collect_calls(tree.root_node(), path, src, table, &walker.spans, None, &mut edges);
    edges.sort();
    edges.dedup();
    edges
}

fn collect_calls(
    node: Node,
    path: &str,
    src: &str,
    table: &NodeTable,
    spans: &BTreeMap<usize, String>,
    current: Option<&str>,
    edges: &mut Vec<CallEdge>,
) {
    let current = match spans.get(&node.id()) {
        Some(id) => Some(id.as_str()),
        None => current,
    };

    if let Some(from) = current {
        let target = match node.kind() {
            "call_expression" => node
                .child_by_field_name("function")
                .and_then(|f| resolve_callee(f, from, path, src, table)),
            "new_expression" => node
                .child_by_field_name("constructor")
                .filter(|c| c.kind() == "identifier")
                .filter(|c| local_binding(*c, text(*c, src), src).is_none())
                .and_then(|c| resolve_constructor(text(c, src), path, table)),
            _ => None,
        };
        if let Some(to) = target {
            if to != from {
                edges.push(CallEdge::new(from, to));
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls(child, path, src, table, spans, current, edges);
    }
}

/// Names bound in an enclosing scope shadow imports and module-level functions.
fn resolve_callee(callee: Node, from: &str, path: &str, src: &str, table: &NodeTable) -> Option<String> {
    match callee.kind() {
        "identifier" => {
            let name = text(callee, src);
            match local_binding(callee, name, src) {
                Some(LocalBinding::Value) => None,
                Some(LocalBinding::Function) => nested_in_owner(from, path, name, table),
                None => table
                    .resolve_imported(path, name)
                    .or_else(|| table.resolve_local(path, name))
                    .or_else(|| table.resolve_member(path, name)),
            }
        }
        "member_expression" => {
            let object = callee.child_by_field_name("object")?;
            let method = text(callee.child_by_field_name("property")?, src);
            match object.kind() {
                "this" => table.resolve_method(path, method),
                "identifier" if local_binding(object, text(object, src), src).is_none() => {
                    let qualifier = text(object, src);
                    table
                        .resolve_namespace_member(path, qualifier, method)
                        .or_else(|| table.id_in(path, &format!("{}.{}", qualifier, method)))
                        .or_else(|| table.resolve_method(path, method))
                }
                _ => table.resolve_method(path, method),
            }
        }
        _ => None,
    }
}

/// A function declared inside `from` or one of its enclosing functions.
fn nested_in_owner(from: &str, path: &str, name: &str, table: &NodeTable) -> Option<String> {
    let mut owner = from.strip_prefix(path)?.strip_prefix(':')?;
    loop {
        if let Some(id) = table.id_in(path, &format!("{}.{}", owner, name)) {
            return Some(id);
        }
        owner = &owner[..owner.rfind('.')?];
    }
}

fn resolve_constructor(class: &str, path: &str, table: &NodeTable) -> Option<String> {
    if let Some(binding) = table.binding(path, class) {
        let source = binding.source.as_deref()?;
        return table.id_in(source, &format!("{}.constructor", binding.original_name));
    }
    table.id_in(path, &format!("{}.constructor", class))
}

#[cfg(test)]
mod tests {
    use super::super::{parse_tree, parser::extract_facts};
    use super::*;
    use crate::model::LocalSymbols;

    fn functions(path: &str, src: &str) -> Vec<FunctionNode> {
        let tree = parse_tree(path, src).unwrap();
        extract_functions(path, src, &tree)
    }

    fn names(nodes: &[FunctionNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn test_function_forms() {
        let src = r#"export function main() {
  function inner() {}
  inner();
}
const arrow = (a: number): number => a;
export class Store {
  save(x) { this.items.push(x); }
  handler = () => 1;
}
export default function () {}
"#;
        let nodes = functions("src/a.ts", src);
        assert_eq!(names(&nodes), vec!["main", "main.inner", "arrow", "Store.save", "Store.handler", "default"]);

        let main = &nodes[0];
        assert!(main.is_exported && !main.is_nested);
        assert_eq!((main.line, main.end_line), (1, 4));

        assert!(nodes[1].is_nested);
        assert!(!nodes[2].is_exported);
        assert_eq!(nodes[2].signature.as_deref(), Some("(a: number): number"));
        assert!(nodes[3].is_method && nodes[3].is_exported);
        assert_eq!(nodes[3].impurity_reasons, vec!["mutates this.items"]);
        assert!(nodes[5].is_exported);
    }

    #[test]
    fn test_namespace_members() {
        let nodes = functions("src/a.ts", "namespace Geo { export function area() {} }\n");
        assert_eq!(names(&nodes), vec!["Geo::area"]);
    }

    #[test]
    fn test_calls_resolve_local_method_and_import() {
        let util = "export function fmt() {}\nexport function unused() {}\n";
        let main = r#"import { fmt as f } from './util';
import * as u from './util';
class Box {
  open() { this.close(); f(); }
  close() {}
}
export function run() {
  const b = new Box();
  b.open();
  u.unused();
  helper();
}
function helper() { run(); }
"#;
        let mut nodes = functions("src/util.ts", util);
        nodes.extend(functions("src/main.ts", main));
        nodes.push(FunctionNode::new("src/main.ts", "Box.constructor", 3, 3));
        let mut table =
            NodeTable::new(nodes.iter()).with_files(["src/util.ts".to_string(), "src/main.ts".to_string()]);

        let tree = parse_tree("src/main.ts", main).unwrap();
        let mut bindings: LocalSymbols = extract_facts("src/main.ts", main, &tree).local_symbols;
        for binding in bindings.values_mut() {
            binding.source = Some("src/util.ts".to_string());
        }
        table.set_bindings("src/main.ts", bindings);

        let edges = extract_calls("src/main.ts", main, &tree, &table);
        let pairs: Vec<(&str, &str)> = edges.iter().map(|e| (e.from.as_str(), e.to.as_str())).collect();
        assert!(pairs.contains(&("src/main.ts:Box.open", "src/main.ts:Box.close")));
        assert!(pairs.contains(&("src/main.ts:Box.open", "src/util.ts:fmt")));
        assert!(pairs.contains(&("src/main.ts:run", "src/main.ts:Box.constructor")));
        assert!(pairs.contains(&("src/main.ts:run", "src/main.ts:Box.open")));
        assert!(pairs.contains(&("src/main.ts:run", "src/util.ts:unused")));
        assert!(pairs.contains(&("src/main.ts:run", "src/main.ts:helper")));
        assert!(pairs.contains(&("src/main.ts:helper", "src/main.ts:run")));
        assert_eq!(pairs.len(), 7);
    }

    #[test]
    fn test_local_bindings_shadow_imported_calls() {
        let io = "export function save() {}\nexport function write() {}\n";
        let main = r#"import { save, write } from './io';
export function apply(save, n) { return save(n); }
export function wrap() {
  const write = (x) => x;
  return write(1);
}
export function real() {
  function write() { save(); }
  write();
}
"#;
        let mut nodes = functions("src/io.ts", io);
        nodes.extend(functions("src/main.ts", main));
        let mut table =
            NodeTable::new(nodes.iter()).with_files(["src/io.ts".to_string(), "src/main.ts".to_string()]);
        let tree = parse_tree("src/main.ts", main).unwrap();
        let mut bindings: LocalSymbols = extract_facts("src/main.ts", main, &tree).local_symbols;
        for binding in bindings.values_mut() {
            binding.source = Some("src/io.ts".to_string());
        }
        table.set_bindings("src/main.ts", bindings);

        let edges = extract_calls("src/main.ts", main, &tree, &table);
        let pairs: Vec<(&str, &str)> = edges.iter().map(|e| (e.from.as_str(), e.to.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                ("src/main.ts:real", "src/main.ts:real.write"),
                ("src/main.ts:real.write", "src/io.ts:save"),
                ("src/main.ts:wrap", "src/main.ts:wrap.write"),
            ]
        );
    }
}
