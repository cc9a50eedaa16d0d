//! TypeScript / JavaScript front-end built on tree-sitter.
//!
//! `.ts` files use the TypeScript grammar; `.tsx` and the JavaScript
//! extensions use the TSX grammar so JSX parses. Parsers are created per call
//! since `tree_sitter::Parser` is not `Sync`.

use std::collections::BTreeSet;
use std::sync::OnceLock;
use tree_sitter::{Node, Parser, Tree};

use super::{
    compile_patterns, FunctionExtractor, ImpurityPattern, LanguageParser, ResolverConfig,
    SymbolReference,
};
use crate::callgraph::{CallEdge, FunctionNode, NodeTable};
use crate::common::paths::extension;
use crate::error::{SymtraceError, SymtraceResult};
use crate::model::{LocalSymbols, ParsedFile};

mod functions;
mod parser;
mod purity;
mod usage;

/// Front-end for `ts, tsx, js, jsx, mjs, cjs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeScriptFrontend;

const EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// Parse `content` with the grammar matching `path`'s extension.
pub(crate) fn parse_tree(path: &str, content: &str) -> SymtraceResult<Tree> {
    let language: tree_sitter::Language = match extension(path) {
        Some("ts") => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        _ => tree_sitter_typescript::LANGUAGE_TSX.into(),
    };
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| SymtraceError::internal(format!("failed to load grammar: {}", e)))?;
    let tree = parser
        .parse(content, None)
        .ok_or_else(|| SymtraceError::parse(path, "tree-sitter produced no tree"))?;
    if tree.root_node().has_error() {
        tracing::debug!(file = path, "syntax errors present, continuing with partial tree");
    }
    Ok(tree)
}

#[inline]
pub(crate) fn text<'a>(node: Node, src: &'a str) -> &'a str {
    node.utf8_text(src.as_bytes()).unwrap_or("")
}

#[inline]
pub(crate) fn line_of(node: Node) -> usize {
    node.start_position().row + 1
}

/// String literal contents without quotes.
pub(crate) fn string_value(node: Node, src: &str) -> String {
    text(node, src)
        .trim_matches(|c| c == '\'' || c == '"' || c == '`')
        .to_string()
}

/// Initializer kinds that make a variable declarator a function.
pub(crate) const FUNCTION_VALUE_KINDS: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

/// Names bound by a declaration pattern (`x`, `{a, b: c}`, `[d, ...e]`, `f = 1`).
pub(crate) fn pattern_names(node: Node, src: &str, out: &mut Vec<String>) {
    match node.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => {
            out.push(text(node, src).to_string());
        }
        "pair_pattern" => {
            if let Some(value) = node.child_by_field_name("value") {
                pattern_names(value, src, out);
            }
        }
        "assignment_pattern" | "object_assignment_pattern" => {
            if let Some(left) = node.child_by_field_name("left") {
                pattern_names(left, src, out);
            }
        }
        "required_parameter" | "optional_parameter" => {
            if let Some(pattern) = node.child_by_field_name("pattern") {
                pattern_names(pattern, src, out);
            }
        }
        "object_pattern" | "array_pattern" | "rest_pattern" | "formal_parameters" => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                pattern_names(child, src, out);
            }
        }
        _ => {}
    }
}

/// Parameter names of a function-like node.
pub(crate) fn parameter_names(func: Node, src: &str) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(params) = func.child_by_field_name("parameters") {
        pattern_names(params, src, &mut names);
    }
    if let Some(param) = func.child_by_field_name("parameter") {
        pattern_names(param, src, &mut names);
    }
    names
}

fn patterns() -> &'static [ImpurityPattern] {
    static PATTERNS: OnceLock<Vec<ImpurityPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| compile_patterns(purity::RAW_PATTERNS))
}

impl LanguageParser for TypeScriptFrontend {
    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn parse_file(&self, path: &str, content: &str) -> SymtraceResult<ParsedFile> {
        let tree = parse_tree(path, content)?;
        Ok(parser::extract_facts(path, content, &tree))
    }

    fn resolve_import(&self, specifier: &str, from_file: &str, config: &ResolverConfig) -> Option<String> {
        config.resolve_module_specifier(specifier, from_file)
    }

    fn trace_references(
        &self,
        path: &str,
        content: &str,
        local_symbols: &LocalSymbols,
        same_file_names: &BTreeSet<String>,
    ) -> SymtraceResult<Vec<SymbolReference>> {
        let tree = parse_tree(path, content)?;
        Ok(usage::collect_references(content, &tree, local_symbols, same_file_names))
    }
}

impl FunctionExtractor for TypeScriptFrontend {
    fn extract_functions(&self, path: &str, content: &str) -> SymtraceResult<Vec<FunctionNode>> {
        let tree = parse_tree(path, content)?;
        Ok(functions::extract_functions(path, content, &tree))
    }

    fn extract_calls(&self, path: &str, content: &str, table: &NodeTable) -> SymtraceResult<Vec<CallEdge>> {
        let tree = parse_tree(path, content)?;
        Ok(functions::extract_calls(path, content, &tree, table))
    }

    fn impurity_patterns(&self) -> &'static [ImpurityPattern] {
        patterns()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(patterns().len(), purity::RAW_PATTERNS.len());
    }

    #[test]
    fn test_jsx_needs_tsx_grammar() {
        let tree = parse_tree("App.tsx", "const a = <div>{x}</div>;").unwrap();
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn test_pattern_names_destructuring() {
        let src = "const { a, b: c, ...rest } = obj, [d, e = 1] = arr;";
        let tree = parse_tree("a.ts", src).unwrap();
        let decl = tree.root_node().named_child(0).unwrap();
        let mut names = Vec::new();
        let mut cursor = decl.walk();
        for declarator in decl.named_children(&mut cursor) {
            if let Some(n) = declarator.child_by_field_name("name") {
                pattern_names(n, src, &mut names);
            }
        }
        assert_eq!(names, vec!["a", "c", "rest", "d", "e"]);
    }
}
