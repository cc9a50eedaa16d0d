//! Scope-aware reference walk.
//!
//! Collects every identifier that refers to an import binding or to a
//! top-level declaration of the same file. Function parameters, block
//! declarations, `catch` bindings and loop variables open scopes; a name bound
//! in any open scope shadows the import or declaration of the same name.

use std::collections::BTreeSet;
use tree_sitter::{Node, Tree};

use super::{line_of, parameter_names, pattern_names, text, FUNCTION_VALUE_KINDS};
use crate::lang::{line_context, ReferenceTarget, SymbolReference};
use crate::model::{LocalSymbols, UsageType};

pub(crate) fn collect_references(
    src: &str,
    tree: &Tree,
    locals: &LocalSymbols,
    same_file: &BTreeSet<String>,
) -> Vec<SymbolReference> {
    let mut walker = ReferenceWalker {
        src,
        locals,
        same_file,
        scopes: Vec::new(),
        out: Vec::new(),
    };
    walker.walk_children(tree.root_node());
    walker.out
}

struct ReferenceWalker<'a> {
    src: &'a str,
    locals: &'a LocalSymbols,
    same_file: &'a BTreeSet<String>,
    scopes: Vec<Vec<String>>,
    out: Vec<SymbolReference>,
}

/// Names declared directly in a statement block.
fn block_declarations(block: Node, src: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = block.walk();
    for stmt in block.named_children(&mut cursor) {
        match stmt.kind() {
            "function_declaration" | "generator_function_declaration" | "class_declaration"
            | "abstract_class_declaration" => {
                if let Some(n) = stmt.child_by_field_name("name") {
                    names.push(text(n, src).to_string());
                }
            }
            "lexical_declaration" | "variable_declaration" => declarator_names(stmt, src, &mut names),
            _ => {}
        }
    }
    names
}

fn declarator_names(decl: Node, src: &str, out: &mut Vec<String>) {
    let mut cursor = decl.walk();
    for declarator in decl.named_children(&mut cursor) {
        if let Some(n) = declarator.child_by_field_name("name") {
            pattern_names(n, src, out);
        }
    }
}

/// How a name is bound in a scope enclosing some expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LocalBinding {
    /// A block-level function declaration or a variable initialized with a function.
    Function,
    /// Anything else: parameters, plain variables, classes, `catch` and loop bindings.
    Value,
}

/// Innermost local binding of `name` visible at `node`.
///
/// Walks the ancestors of `node` with the same scope rules as the reference
/// walk. Module-level declarations and imports are not local bindings.
pub(crate) fn local_binding(node: Node, name: &str, src: &str) -> Option<LocalBinding> {
    let mut current = node.parent();
    while let Some(scope) = current {
        let mut names = Vec::new();
        match scope.kind() {
            "statement_block" | "class_static_block" => {
                if block_declarations(scope, src).iter().any(|n| n == name) {
                    return Some(if declares_function(scope, name, src) {
                        LocalBinding::Function
                    } else {
                        LocalBinding::Value
                    });
                }
            }
            "function_declaration" | "generator_function_declaration" | "function_expression" | "function"
            | "generator_function" | "arrow_function" | "method_definition" => {
                if parameter_names(scope, src).iter().any(|n| n == name) {
                    return Some(LocalBinding::Value);
                }
                let self_named = matches!(scope.kind(), "function_expression" | "function" | "generator_function")
                    && scope.child_by_field_name("name").is_some_and(|n| text(n, src) == name);
                if self_named {
                    return Some(LocalBinding::Function);
                }
            }
            "catch_clause" => {
                if let Some(p) = scope.child_by_field_name("parameter") {
                    pattern_names(p, src, &mut names);
                }
            }
            "for_statement" => {
                if let Some(init) = scope.child_by_field_name("initializer") {
                    if matches!(init.kind(), "lexical_declaration" | "variable_declaration") {
                        declarator_names(init, src, &mut names);
                    }
                }
            }
            "for_in_statement" => {
                if let (Some(l), Some(_)) = (scope.child_by_field_name("left"), scope.child_by_field_name("kind")) {
                    pattern_names(l, src, &mut names);
                }
            }
            _ => {}
        }
        if names.iter().any(|n| n == name) {
            return Some(LocalBinding::Value);
        }
        current = scope.parent();
    }
    None
}

/// Whether `block` binds `name` to a function.
fn declares_function(block: Node, name: &str, src: &str) -> bool {
    let mut cursor = block.walk();
    let found = block.named_children(&mut cursor).any(|stmt| match stmt.kind() {
        "function_declaration" | "generator_function_declaration" => {
            stmt.child_by_field_name("name").is_some_and(|n| text(n, src) == name)
        }
        "lexical_declaration" | "variable_declaration" => {
            let mut inner = stmt.walk();
            let found = stmt.named_children(&mut inner).any(|d| {
                let named = d
                    .child_by_field_name("name")
                    .is_some_and(|n| n.kind() == "identifier" && text(n, src) == name);
                named && d.child_by_field_name("value").is_some_and(|v| FUNCTION_VALUE_KINDS.contains(&v.kind()))
            });
            found
        }
        _ => false,
    });
    found
}

fn is_field(parent: Node, field: &str, node: Node) -> bool {
    parent.child_by_field_name(field).map(|f| f.id()) == Some(node.id())
}

impl<'a> ReferenceWalker<'a> {
    fn is_shadowed(&self, name: &str) -> bool {
        self.scopes.iter().any(|s| s.iter().any(|n| n == name))
    }

    fn walk_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            self.walk(child);
        }
    }

    fn walk_children_except(&mut self, node: Node, skip: Option<Node>) {
        let skip_id = skip.map(|s| s.id());
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            if Some(child.id()) != skip_id {
                self.walk(child);
            }
        }
    }

    fn with_scope(&mut self, names: Vec<String>, f: impl FnOnce(&mut Self)) {
        self.scopes.push(names);
        f(self);
        self.scopes.pop();
    }

    fn walk(&mut self, node: Node) {
        match node.kind() {
            "import_statement" | "jsx_closing_element" | "property_identifier"
            | "private_property_identifier" | "comment" => {}
            "export_statement" => self.walk_export(node),
            "function_declaration" | "generator_function_declaration" | "function_expression" | "function"
            | "generator_function" | "arrow_function" | "method_definition" => self.walk_function(node),
            "statement_block" | "class_static_block" => {
                let names = block_declarations(node, self.src);
                self.with_scope(names, |w| w.walk_children(node));
            }
            "catch_clause" => {
                let mut names = Vec::new();
                if let Some(p) = node.child_by_field_name("parameter") {
                    pattern_names(p, self.src, &mut names);
                }
                let param = node.child_by_field_name("parameter");
                self.with_scope(names, |w| w.walk_children_except(node, param));
            }
            "for_statement" => {
                let mut names = Vec::new();
                if let Some(init) = node.child_by_field_name("initializer") {
                    if matches!(init.kind(), "lexical_declaration" | "variable_declaration") {
                        declarator_names(init, self.src, &mut names);
                    }
                }
                self.with_scope(names, |w| w.walk_children(node));
            }
            "for_in_statement" => {
                let left = node.child_by_field_name("left");
                let declares = node.child_by_field_name("kind").is_some();
                let mut names = Vec::new();
                if let (Some(l), true) = (left, declares) {
                    pattern_names(l, self.src, &mut names);
                }
                let skip = if declares { left } else { None };
                self.with_scope(names, |w| w.walk_children_except(node, skip));
            }
            "variable_declarator" => {
                if let Some(t) = node.child_by_field_name("type") {
                    self.walk(t);
                }
                if let Some(v) = node.child_by_field_name("value") {
                    self.walk(v);
                }
            }
            "required_parameter" | "optional_parameter" => {
                let pattern = node.child_by_field_name("pattern");
                self.walk_children_except(node, pattern);
            }
            "class_declaration" | "abstract_class_declaration" | "class" | "interface_declaration"
            | "type_alias_declaration" | "enum_declaration" | "type_parameter" => {
                let name = node.child_by_field_name("name");
                self.walk_children_except(node, name);
            }
            "public_field_definition" => {
                let name = node.child_by_field_name("name");
                self.walk_children_except(node, name);
            }
            "member_expression" => self.walk_member(node),
            "nested_type_identifier" => self.walk_nested_type(node),
            "identifier" => {
                let usage = self.usage_type_for(node);
                self.reference(node, usage);
            }
            "shorthand_property_identifier" => self.reference(node, UsageType::Reference),
            "type_identifier" => self.reference(node, UsageType::Type),
            _ => self.walk_children(node),
        }
    }

    fn walk_export(&mut self, node: Node) {
        if node.child_by_field_name("source").is_some() {
            return;
        }
        let value = node.child_by_field_name("value");
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            if child.kind() == "export_clause" {
                continue;
            }
            // `export default name` re-exports rather than uses.
            if value.map(|v| v.id()) == Some(child.id()) && child.kind() == "identifier" {
                continue;
            }
            self.walk(child);
        }
    }

    fn walk_function(&mut self, node: Node) {
        let mut names = parameter_names(node, self.src);
        let name = node.child_by_field_name("name");
        if matches!(node.kind(), "function_expression" | "function" | "generator_function") {
            if let Some(n) = name {
                names.push(text(n, self.src).to_string());
            }
        }
        let single_param = node.child_by_field_name("parameter");
        let parameters = node.child_by_field_name("parameters");

        self.with_scope(names, |w| {
            let mut cursor = node.walk();
            let children: Vec<Node> = node.children(&mut cursor).collect();
            for child in children {
                let id = Some(child.id());
                if id == name.map(|n| n.id()) || id == single_param.map(|n| n.id()) {
                    continue;
                }
                if id == parameters.map(|n| n.id()) {
                    // Default values and type annotations still reference names.
                    w.walk_children(child);
                    continue;
                }
                w.walk(child);
            }
        });
    }

    fn walk_member(&mut self, node: Node) {
        let (Some(object), Some(property)) = (
            node.child_by_field_name("object"),
            node.child_by_field_name("property"),
        ) else {
            self.walk_children(node);
            return;
        };

        if object.kind() == "identifier" {
            let name = text(object, self.src);
            if !self.is_shadowed(name) && self.locals.get(name).is_some_and(|b| b.is_namespace) {
                let usage_type = match node.parent() {
                    Some(p) if p.kind() == "call_expression" && is_field(p, "function", node) => UsageType::Call,
                    _ => UsageType::Namespace,
                };
                self.push(
                    ReferenceTarget::Import {
                        local: name.to_string(),
                        member: Some(text(property, self.src).to_string()),
                    },
                    node,
                    usage_type,
                );
                return;
            }
        }
        self.walk(object);
    }

    fn walk_nested_type(&mut self, node: Node) {
        let mut cursor = node.walk();
        let parts: Vec<Node> = node.named_children(&mut cursor).collect();
        if let [module, .., last] = parts.as_slice() {
            if module.kind() == "identifier" {
                let name = text(*module, self.src);
                if !self.is_shadowed(name) && self.locals.get(name).is_some_and(|b| b.is_namespace) {
                    self.push(
                        ReferenceTarget::Import {
                            local: name.to_string(),
                            member: Some(text(*last, self.src).to_string()),
                        },
                        node,
                        UsageType::Type,
                    );
                    return;
                }
            }
            self.walk(*module);
        }
    }

    fn usage_type_for(&self, node: Node) -> UsageType {
        match node.parent() {
            Some(p) if p.kind() == "call_expression" && is_field(p, "function", node) => UsageType::Call,
            Some(p) if p.kind() == "new_expression" && is_field(p, "constructor", node) => UsageType::Call,
            Some(p) if matches!(p.kind(), "jsx_opening_element" | "jsx_self_closing_element") => UsageType::Jsx,
            _ => UsageType::Reference,
        }
    }

    fn reference(&mut self, node: Node, usage_type: UsageType) {
        let name = text(node, self.src);
        if self.is_shadowed(name) {
            return;
        }
        let target = if self.locals.contains_key(name) {
            ReferenceTarget::Import { local: name.to_string(), member: None }
        } else if self.same_file.contains(name) {
            ReferenceTarget::SameFile { name: name.to_string() }
        } else {
            return;
        };
        self.push(target, node, usage_type);
    }

    fn push(&mut self, target: ReferenceTarget, node: Node, usage_type: UsageType) {
        let line = line_of(node);
        self.out.push(SymbolReference {
            target,
            line,
            context: line_context(self.src, line),
            usage_type,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::super::{parse_tree, parser::extract_facts};
    use super::*;

    fn refs(path: &str, src: &str, same_file: &[&str]) -> Vec<SymbolReference> {
        let tree = parse_tree(path, src).unwrap();
        let facts = extract_facts(path, src, &tree);
        let names = same_file.iter().map(|s| s.to_string()).collect();
        collect_references(src, &tree, &facts.local_symbols, &names)
    }

    fn names(refs: &[SymbolReference]) -> Vec<&str> {
        refs.iter().map(|r| r.local_name()).collect()
    }

    #[test]
    fn test_call_and_reference_types() {
        let src = "import { fmt, Cfg } from './util';\nconst a = fmt(1);\nconst b: Cfg = { x: fmt };\n";
        let r = refs("src/a.ts", src, &[]);
        assert_eq!(names(&r), vec!["fmt", "Cfg", "fmt"]);
        assert_eq!(r[0].usage_type, UsageType::Call);
        assert_eq!(r[0].line, 2);
        assert_eq!(r[0].context, "const a = fmt(1);");
        assert_eq!(r[1].usage_type, UsageType::Type);
        assert_eq!(r[2].usage_type, UsageType::Reference);
    }

    #[test]
    fn test_parameter_shadowing() {
        let src = "import { fmt } from './util';\nfunction run(fmt: number) { return fmt + 1; }\nconst g = (fmt) => fmt;\nfmt();\n";
        let r = refs("src/a.ts", src, &[]);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].line, 4);
    }

    #[test]
    fn test_block_and_catch_shadowing() {
        let src = r#"import { e, item } from './x';
function f() {
  const e = 1;
  try { g(); } catch (item) { log(item); }
  for (const item of list) { use(item); }
  return e;
}
item;
"#;
        let r = refs("src/a.ts", src, &[]);
        assert_eq!(names(&r), vec!["item"]);
        assert_eq!(r[0].line, 8);
    }

    #[test]
    fn test_local_binding_kinds() {
        let src = r#"import { save, write } from './io';
function run(save) {
  const write = (x) => x;
  function flush() {}
  save(1);
  write(2);
  flush();
}
write(3);
"#;
        let tree = parse_tree("src/a.ts", src).unwrap();
        let mut calls = Vec::new();
        let mut stack = vec![tree.root_node()];
        while let Some(node) = stack.pop() {
            if node.kind() == "call_expression" {
                calls.push(node);
            }
            let mut cursor = node.walk();
            stack.extend(node.children(&mut cursor));
        }
        calls.sort_by_key(|n| n.start_byte());
        let kinds: Vec<Option<LocalBinding>> = calls
            .iter()
            .map(|c| {
                let callee = c.child_by_field_name("function").unwrap();
                local_binding(callee, text(callee, src), src)
            })
            .collect();
        assert_eq!(
            kinds,
            vec![Some(LocalBinding::Value), Some(LocalBinding::Function), Some(LocalBinding::Function), None]
        );
    }

    #[test]
    fn test_namespace_member_access() {
        let src = "import * as utils from './utils';\nutils.format(1);\nconst v = utils.VERSION;\n";
        let r = refs("src/a.ts", src, &[]);
        assert_eq!(r.len(), 2);
        assert_eq!(
            r[0].target,
            ReferenceTarget::Import { local: "utils".into(), member: Some("format".into()) }
        );
        assert_eq!(r[0].usage_type, UsageType::Call);
        assert_eq!(r[1].usage_type, UsageType::Namespace);
    }

    #[test]
    fn test_jsx_and_same_file_references() {
        let src = "import { Button } from './ui';\nexport function helper() {}\nexport const App = () => <Button onClick={helper} />;\n";
        let r = refs("src/App.tsx", src, &["helper", "App"]);
        assert_eq!(names(&r), vec!["Button", "helper"]);
        assert_eq!(r[0].usage_type, UsageType::Jsx);
        assert_eq!(r[1].target, ReferenceTarget::SameFile { name: "helper".into() });
    }

    #[test]
    fn test_export_clauses_are_not_usages() {
        let src = "import { a } from './a';\nfunction b() {}\nexport { a, b };\nexport default b;\n";
        let r = refs("src/index.ts", src, &["b"]);
        assert!(r.is_empty());
    }
}
