//! Export / import extraction for TypeScript and JavaScript.
//!
//! Imports are walked before exports so `import {x} from './a'; export {x}`
//! is recorded as a re-export of `./a`'s `x` rather than a local export.

use std::collections::BTreeMap;
use tree_sitter::{Node, Tree};

use super::{line_of, pattern_names, string_value, text, FUNCTION_VALUE_KINDS};
use crate::lang::normalize_signature;
use crate::model::{
    Export, ExportKind, Import, LocalSymbolBinding, ParsedFile, DEFAULT_EXPORT, STAR,
};

/// A top-level declaration seen in the pre-pass.
#[derive(Debug, Clone)]
struct Declaration {
    kind: ExportKind,
    signature: Option<String>,
}

pub(crate) fn extract_facts(path: &str, src: &str, tree: &Tree) -> ParsedFile {
    let root = tree.root_node();
    let mut facts = ParsedFile::default();

    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() == "import_statement" {
            collect_import(path, src, child, &mut facts);
        }
    }

    let declarations = collect_declarations(src, root);

    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() == "export_statement" {
            collect_export(path, src, child, &declarations, &mut facts);
        }
    }

    facts
}

fn collect_import(path: &str, src: &str, node: Node, facts: &mut ParsedFile) {
    let Some(specifier) = node
        .child_by_field_name("source")
        .map(|n| string_value(n, src))
    else {
        return;
    };
    let line = line_of(node);
    let before = facts.imports.len();

    let mut cursor = node.walk();
    for clause in node.children(&mut cursor) {
        if clause.kind() != "import_clause" {
            continue;
        }
        let mut inner = clause.walk();
        for part in clause.children(&mut inner) {
            match part.kind() {
                "identifier" => {
                    let local = text(part, src);
                    let mut import = Import::new(DEFAULT_EXPORT, &specifier, path, line);
                    import.alias = Some(local.to_string());
                    import.is_default = true;
                    push_import(facts, import, false);
                }
                "namespace_import" => {
                    let mut c = part.walk();
                    let local = part
                        .named_children(&mut c)
                        .find(|n| n.kind() == "identifier")
                        .map(|n| text(n, src).to_string());
                    if let Some(local) = local {
                        let mut import = Import::new(STAR, &specifier, path, line);
                        import.alias = Some(local);
                        import.is_namespace = true;
                        push_import(facts, import, true);
                    }
                }
                "named_imports" => {
                    let mut c = part.walk();
                    for spec in part.named_children(&mut c) {
                        if spec.kind() != "import_specifier" {
                            continue;
                        }
                        let Some(name) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        let name = string_value(name, src);
                        let mut import = Import::new(&name, &specifier, path, line);
                        import.alias = spec
                            .child_by_field_name("alias")
                            .map(|a| text(a, src).to_string());
                        import.is_default = name == DEFAULT_EXPORT;
                        push_import(facts, import, false);
                    }
                }
                _ => {}
            }
        }
    }

    if facts.imports.len() == before {
        // Side-effect import: `import './polyfill'`.
        facts.imports.push(Import::new(STAR, specifier, path, line));
    }
}

fn push_import(facts: &mut ParsedFile, import: Import, is_namespace: bool) {
    facts.local_symbols.insert(
        import.local_name().to_string(),
        LocalSymbolBinding {
            specifier: import.source.clone(),
            source: None,
            original_name: import.name.clone(),
            is_namespace,
        },
    );
    facts.imports.push(import);
}

fn function_signature(func: Node, src: &str) -> Option<String> {
    let params = match func.child_by_field_name("parameters") {
        Some(p) => text(p, src).to_string(),
        None => format!("({})", func.child_by_field_name("parameter").map(|p| text(p, src)).unwrap_or("")),
    };
    let ret = func
        .child_by_field_name("return_type")
        .map(|r| text(r, src))
        .unwrap_or("");
    Some(normalize_signature(&format!("{}{}", params, ret)))
}

/// `(name, declaration)` pairs introduced by one declaration node.
fn declaration_entries(node: Node, src: &str) -> Vec<(String, Declaration)> {
    let named = |kind: ExportKind, signature: Option<String>| -> Vec<(String, Declaration)> {
        node.child_by_field_name("name")
            .map(|n| vec![(text(n, src).to_string(), Declaration { kind, signature })])
            .unwrap_or_default()
    };

    match node.kind() {
        "function_declaration" | "generator_function_declaration" | "function_signature" => {
            named(ExportKind::Function, function_signature(node, src))
        }
        "class_declaration" | "abstract_class_declaration" => named(ExportKind::Class, None),
        "interface_declaration" => named(ExportKind::Interface, None),
        "type_alias_declaration" => named(ExportKind::Type, None),
        "enum_declaration" => named(ExportKind::Enum, None),
        "lexical_declaration" | "variable_declaration" => {
            let is_const = node.child(0).map(|c| c.kind() == "const").unwrap_or(false);
            let mut out = Vec::new();
            let mut cursor = node.walk();
            for declarator in node.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                let Some(name) = declarator.child_by_field_name("name") else {
                    continue;
                };
                let value = declarator.child_by_field_name("value");
                let decl = match value {
                    Some(v) if FUNCTION_VALUE_KINDS.contains(&v.kind()) => Declaration {
                        kind: ExportKind::Function,
                        signature: function_signature(v, src),
                    },
                    _ if is_const => Declaration { kind: ExportKind::Const, signature: None },
                    _ => Declaration { kind: ExportKind::Variable, signature: None },
                };
                let mut names = Vec::new();
                pattern_names(name, src, &mut names);
                out.extend(names.into_iter().map(|n| (n, decl.clone())));
            }
            out
        }
        _ => Vec::new(),
    }
}

fn collect_declarations(src: &str, root: Node) -> BTreeMap<String, Declaration> {
    let mut declarations = BTreeMap::new();
    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        let node = if child.kind() == "export_statement" {
            match child.child_by_field_name("declaration") {
                Some(d) => d,
                None => continue,
            }
        } else {
            child
        };
        for (name, decl) in declaration_entries(node, src) {
            declarations.entry(name).or_insert(decl);
        }
    }
    declarations
}

fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == token);
    found
}

fn collect_export(
    path: &str,
    src: &str,
    node: Node,
    declarations: &BTreeMap<String, Declaration>,
    facts: &mut ParsedFile,
) {
    let line = line_of(node);

    if let Some(source) = node.child_by_field_name("source") {
        collect_re_export(path, src, node, &string_value(source, src), line, facts);
        return;
    }

    let is_default = has_token(node, "default");

    if let Some(decl) = node.child_by_field_name("declaration") {
        for (name, d) in declaration_entries(decl, src) {
            let export = if is_default {
                let mut e = Export::new(DEFAULT_EXPORT, d.kind, path, line);
                e.is_default = true;
                e.original_name = Some(name);
                e
            } else {
                Export::new(name, d.kind, path, line)
            };
            facts.exports.push(Export { signature: d.signature, ..export });
        }
        return;
    }

    if let Some(value) = node.child_by_field_name("value") {
        let mut export = Export::new(DEFAULT_EXPORT, ExportKind::Variable, path, line);
        export.is_default = true;
        match value.kind() {
            "identifier" => {
                let ident = text(value, src);
                if let Some(binding) = facts.local_symbols.get(ident) {
                    export.kind = ExportKind::Unknown;
                    export.is_re_export = true;
                    export.original_source = Some(binding.specifier.clone());
                    export.original_name = Some(binding.original_name.clone());
                } else {
                    if let Some(d) = declarations.get(ident) {
                        export.kind = d.kind;
                        export.signature = d.signature.clone();
                    } else {
                        export.kind = ExportKind::Unknown;
                    }
                    export.original_name = Some(ident.to_string());
                }
            }
            k if FUNCTION_VALUE_KINDS.contains(&k) => {
                export.kind = ExportKind::Function;
                export.signature = function_signature(value, src);
                export.original_name = value.child_by_field_name("name").map(|n| text(n, src).to_string());
            }
            "class" => {
                export.kind = ExportKind::Class;
                export.original_name = value.child_by_field_name("name").map(|n| text(n, src).to_string());
            }
            _ => {}
        }
        facts.exports.push(export);
        return;
    }

    // `export { a, b as c }` of local or imported names.
    let mut cursor = node.walk();
    for clause in node.children(&mut cursor) {
        if clause.kind() != "export_clause" {
            continue;
        }
        let mut inner = clause.walk();
        for spec in clause.named_children(&mut inner) {
            let Some((local, exported)) = specifier_names(spec, src) else {
                continue;
            };
            let mut export = Export::new(&exported, ExportKind::Unknown, path, line);
            export.is_default = exported == DEFAULT_EXPORT;
            if let Some(binding) = facts.local_symbols.get(&local) {
                export.is_re_export = true;
                export.original_source = Some(binding.specifier.clone());
                export.original_name = Some(binding.original_name.clone());
            } else {
                if let Some(d) = declarations.get(&local) {
                    export.kind = d.kind;
                    export.signature = d.signature.clone();
                }
                if local != exported {
                    export.original_name = Some(local);
                }
            }
            facts.exports.push(export);
        }
    }
}

/// `(name, exported_as)` of an `export_specifier`.
fn specifier_names(spec: Node, src: &str) -> Option<(String, String)> {
    if spec.kind() != "export_specifier" {
        return None;
    }
    let name = string_value(spec.child_by_field_name("name")?, src);
    let exported = spec
        .child_by_field_name("alias")
        .map(|a| string_value(a, src))
        .unwrap_or_else(|| name.clone());
    Some((name, exported))
}

fn collect_re_export(path: &str, src: &str, node: Node, specifier: &str, line: usize, facts: &mut ParsedFile) {
    let mut handled = false;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "export_clause" => {
                handled = true;
                let mut inner = child.walk();
                for spec in child.named_children(&mut inner) {
                    let Some((name, exported)) = specifier_names(spec, src) else {
                        continue;
                    };
                    let mut export = Export::new(&exported, ExportKind::Unknown, path, line);
                    export.is_default = exported == DEFAULT_EXPORT;
                    export.is_re_export = true;
                    export.original_source = Some(specifier.to_string());
                    export.original_name = Some(name.clone());
                    facts.exports.push(export);

                    let mut import = Import::new(&name, specifier, path, line);
                    import.is_default = name == DEFAULT_EXPORT;
                    import.is_re_export = true;
                    if exported != name {
                        import.alias = Some(exported);
                    }
                    facts.imports.push(import);
                }
            }
            "namespace_export" => {
                handled = true;
                let mut inner = child.walk();
                let ns = child
                    .named_children(&mut inner)
                    .next()
                    .map(|n| string_value(n, src));
                if let Some(ns) = ns {
                    let mut export = Export::new(&ns, ExportKind::Variable, path, line);
                    export.is_re_export = true;
                    export.original_source = Some(specifier.to_string());
                    export.original_name = Some(STAR.to_string());
                    facts.exports.push(export);

                    let mut import = Import::new(STAR, specifier, path, line);
                    import.alias = Some(ns);
                    import.is_namespace = true;
                    import.is_re_export = true;
                    facts.imports.push(import);
                }
            }
            _ => {}
        }
    }

    if !handled {
        let mut export = Export::new(STAR, ExportKind::Unknown, path, line);
        export.is_re_export = true;
        export.original_source = Some(specifier.to_string());
        facts.exports.push(export);

        let mut import = Import::new(STAR, specifier, path, line);
        import.is_re_export = true;
        facts.imports.push(import);
    }
}
