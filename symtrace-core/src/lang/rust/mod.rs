//! Rust front-end built on `syn`.
//!
//! Line numbers come from `proc-macro2` span locations. Module paths follow
//! the file layout (`src/a/b.rs` and `src/a/b/mod.rs` are both `crate::a::b`).

use proc_macro2::LineColumn;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use syn::File;

use super::{
    compile_patterns, FunctionExtractor, ImpurityPattern, LanguageParser, ResolverConfig,
    SymbolReference,
};
use crate::callgraph::{CallEdge, FunctionNode, NodeTable};
use crate::error::{SymtraceError, SymtraceResult};
use crate::model::{Import, LocalSymbols, ParsedFile, STAR};

mod functions;
mod parser;
pub mod path_resolver;
mod purity;
mod usage;

pub use path_resolver::{ModuleIndex, ModulePathContext};

/// Front-end for `.rs` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustFrontend;

const EXTENSIONS: &[&str] = &["rs"];

pub(crate) fn parse_ast(path: &str, content: &str) -> SymtraceResult<File> {
    syn::parse_file(content).map_err(|e| {
        let start = e.span().start();
        SymtraceError::parse_at(path, e.to_string(), start.line, start.column + 1)
    })
}

/// Byte offset of a span location in `src` (columns count chars).
pub(crate) fn byte_offset(src: &str, at: LineColumn) -> Option<usize> {
    let line_start = if at.line <= 1 {
        0
    } else {
        src.match_indices('\n').nth(at.line - 2).map(|(i, _)| i + 1)?
    };
    let line = &src[line_start..];
    match line.char_indices().nth(at.column) {
        Some((i, _)) => Some(line_start + i),
        None => Some(src.len()),
    }
}

/// Source text between two span locations, whitespace-normalised.
pub(crate) fn text_between(src: &str, start: LineColumn, end: LineColumn) -> Option<String> {
    let a = byte_offset(src, start)?;
    let b = byte_offset(src, end)?;
    (a <= b).then(|| super::normalize_signature(&src[a..b]))
}

fn patterns() -> &'static [ImpurityPattern] {
    static PATTERNS: OnceLock<Vec<ImpurityPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| compile_patterns(purity::RAW_PATTERNS))
}

impl LanguageParser for RustFrontend {
    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn parse_file(&self, path: &str, content: &str) -> SymtraceResult<ParsedFile> {
        let ast = parse_ast(path, content)?;
        Ok(parser::extract_facts(path, content, &ast))
    }

    fn resolve_import(&self, specifier: &str, from_file: &str, config: &ResolverConfig) -> Option<String> {
        path_resolver::resolve_to_file(specifier, from_file, config.rust_modules()).map(|(file, _)| file.to_string())
    }

    fn resolve_import_in_place(&self, import: &mut Import, config: &ResolverConfig) {
        if import.targets_symbol() && !import.is_re_export {
            let full = if import.source.is_empty() {
                import.name.clone()
            } else {
                format!("{}::{}", import.source, import.name)
            };
            let index = config.rust_modules();
            if let Some((file, rest)) = path_resolver::resolve_to_file(&full, &import.file_path, index) {
                if rest.is_empty() {
                    // `use crate::db;` brings the module itself into scope.
                    import.alias = Some(import.local_name().to_string());
                    import.name = STAR.to_string();
                    import.is_namespace = true;
                    import.source = full;
                    import.resolved_path = Some(file.to_string());
                    return;
                }
            }
        }
        import.resolved_path = self.resolve_import(&import.source, &import.file_path, config);
    }

    fn trace_references(
        &self,
        path: &str,
        content: &str,
        local_symbols: &LocalSymbols,
        same_file_names: &BTreeSet<String>,
    ) -> SymtraceResult<Vec<SymbolReference>> {
        let ast = parse_ast(path, content)?;
        Ok(usage::collect_references(content, &ast, local_symbols, same_file_names))
    }
}

impl FunctionExtractor for RustFrontend {
    fn extract_functions(&self, path: &str, content: &str) -> SymtraceResult<Vec<FunctionNode>> {
        let ast = parse_ast(path, content)?;
        Ok(functions::extract_functions(path, content, &ast))
    }

    fn extract_calls(&self, path: &str, content: &str, table: &NodeTable) -> SymtraceResult<Vec<CallEdge>> {
        let ast = parse_ast(path, content)?;
        Ok(functions::extract_calls(path, &ast, table))
    }

    fn impurity_patterns(&self) -> &'static [ImpurityPattern] {
        patterns()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_parse_error_carries_location() {
        let err = RustFrontend.parse_file("src/broken.rs", "fn broken(").unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(err.path().map(|p| p.display().to_string()).as_deref(), Some("src/broken.rs"));
    }

    #[test]
    fn test_byte_offset_counts_chars() {
        let src = "fn a() {}\nfn é() {}\n";
        assert_eq!(byte_offset(src, LineColumn { line: 2, column: 0 }), Some(10));
        assert_eq!(byte_offset(src, LineColumn { line: 2, column: 4 }), Some(15));
    }

    #[test]
    fn test_module_use_becomes_namespace() {
        let files = ["src/lib.rs", "src/db.rs"].map(String::from);
        let config = ResolverConfig::new(&BTreeMap::new(), None, files);
        let mut facts = RustFrontend
            .parse_file("src/lib.rs", "mod db;\nuse crate::db;\nuse crate::db::query;\n")
            .unwrap();
        RustFrontend.resolve_facts(&mut facts, &config);

        let module = facts.imports.iter().find(|i| i.local_name() == "db").unwrap();
        assert!(module.is_namespace);
        assert_eq!(module.resolved_path.as_deref(), Some("src/db.rs"));
        assert!(facts.local_symbols["db"].is_namespace);

        let query = &facts.local_symbols["query"];
        assert_eq!(query.source.as_deref(), Some("src/db.rs"));
        assert_eq!(query.original_name, "query");
    }

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(patterns().len(), purity::RAW_PATTERNS.len());
    }
}
