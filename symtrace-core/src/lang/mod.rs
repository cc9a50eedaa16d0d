//! Language front-ends.
//!
//! A front-end turns one file's text into raw facts. Two contracts:
//!
//! - [`LanguageParser`]: exports, imports and local bindings, import
//!   resolution, and identifier references for the usage pass.
//! - [`FunctionExtractor`]: function nodes, call edges against a resolved
//!   [`NodeTable`], and the per-language impurity patterns.
//!
//! Front-ends are selected by file extension through a [`ParserRegistry`]
//! built once per engine. Dispatch is static over the [`Frontend`] enum.
//!
//! ```text
//! ┌──────────────────┐   ext   ┌────────────────────┐
//! │  ParserRegistry  │ ──────▶ │ Frontend::TypeScript│ tree-sitter
//! └──────────────────┘         │ Frontend::Rust      │ syn
//!                              └────────────────────┘
//! ```

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};

use crate::callgraph::{CallEdge, FunctionNode, NodeTable};
use crate::common::paths::extension;
use crate::error::SymtraceResult;
use crate::model::{Import, LocalSymbols, ParsedFile, Usage, UsageType};

pub mod resolve;
pub mod rust;
pub mod typescript;

pub use resolve::ResolverConfig;
pub use rust::RustFrontend;
pub use typescript::TypeScriptFrontend;

/// Longest context snippet kept for a usage.
pub const MAX_CONTEXT_LEN: usize = 120;

/// Trimmed source line used as usage context.
pub fn line_context(content: &str, line: usize) -> String {
    let text = content.lines().nth(line.saturating_sub(1)).unwrap_or("").trim();
    if text.chars().count() > MAX_CONTEXT_LEN {
        text.chars().take(MAX_CONTEXT_LEN).collect()
    } else {
        text.to_string()
    }
}

/// Collapse whitespace runs so formatting changes do not alter a signature.
pub fn normalize_signature(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// What an identifier reference resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceTarget {
    /// A name bound by an import; `member` is set for `ns.member` accesses.
    Import { local: String, member: Option<String> },
    /// A top-level declaration of the same file.
    SameFile { name: String },
}

/// One identifier reference found by the usage walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolReference {
    pub target: ReferenceTarget,
    pub line: usize,
    pub context: String,
    pub usage_type: UsageType,
}

impl SymbolReference {
    /// Name the reference is spelled with in its file.
    pub fn local_name(&self) -> &str {
        match &self.target {
            ReferenceTarget::Import { local, .. } => local,
            ReferenceTarget::SameFile { name } => name,
        }
    }

    pub fn to_usage(&self, file_path: &str) -> Usage {
        Usage {
            file_path: file_path.to_string(),
            line: self.line,
            context: self.context.clone(),
            usage_type: self.usage_type,
        }
    }
}

/// Per-language parser for project-level facts.
pub trait LanguageParser {
    /// File extensions (without dot) handled by this parser.
    fn extensions(&self) -> &'static [&'static str];

    /// Exports, imports and local bindings of one file, with raw specifiers.
    ///
    /// Implementations walk imports before exports so a local re-export
    /// (`import {x} from A; export {x}`) is classified from its binding.
    fn parse_file(&self, path: &str, content: &str) -> SymtraceResult<ParsedFile>;

    /// Resolve a raw specifier written in `from_file` to a project file.
    fn resolve_import(&self, specifier: &str, from_file: &str, config: &ResolverConfig) -> Option<String>;

    /// Resolve `import` in place, setting `resolved_path`.
    ///
    /// Front-ends may reclassify the import once its target is known (a Rust
    /// `use crate::db;` names a module and becomes a namespace import).
    fn resolve_import_in_place(&self, import: &mut Import, config: &ResolverConfig) {
        import.resolved_path = self.resolve_import(&import.source, &import.file_path, config);
    }

    /// Resolve every import of `facts` and point the bindings at the resolved files.
    fn resolve_facts(&self, facts: &mut ParsedFile, config: &ResolverConfig) {
        for import in facts.imports.iter_mut() {
            self.resolve_import_in_place(import, config);
        }
        for import in &facts.imports {
            if import.is_re_export {
                continue;
            }
            if let Some(binding) = facts.local_symbols.get_mut(import.local_name()) {
                binding.specifier = import.source.clone();
                binding.source = import.resolved_path.clone();
                binding.original_name = import.name.clone();
                binding.is_namespace = import.is_namespace;
            }
        }
    }

    /// Every reference to an imported binding or to one of `same_file_names`
    /// that is not shadowed by a local declaration.
    fn trace_references(
        &self,
        path: &str,
        content: &str,
        local_symbols: &LocalSymbols,
        same_file_names: &BTreeSet<String>,
    ) -> SymtraceResult<Vec<SymbolReference>>;

    /// Usages of one name (an imported binding or a same-file declaration).
    fn find_usages(
        &self,
        path: &str,
        content: &str,
        symbol_name: &str,
        local_symbols: &LocalSymbols,
    ) -> SymtraceResult<Vec<Usage>> {
        let names = BTreeSet::from([symbol_name.to_string()]);
        Ok(self
            .trace_references(path, content, local_symbols, &names)?
            .into_iter()
            .filter(|r| r.local_name() == symbol_name)
            .map(|r| r.to_usage(path))
            .collect())
    }
}

/// A side-effect signal matched against function text.
#[derive(Debug, Clone)]
pub struct ImpurityPattern {
    pub regex: Regex,
    pub reason: &'static str,
}

/// Compile `(pattern, reason)` pairs; every pattern is a literal in this crate.
pub(crate) fn compile_patterns(raw: &[(&str, &'static str)]) -> Vec<ImpurityPattern> {
    raw.iter()
        .filter_map(|(pat, reason)| {
            Regex::new(pat)
                .ok()
                .map(|regex| ImpurityPattern { regex, reason })
        })
        .collect()
}

/// Per-language extractor for function-level facts.
pub trait FunctionExtractor {
    /// Function nodes of one file, purity `Unknown`.
    ///
    /// Structural side effects that need the syntax tree (outer-state
    /// mutation) may already be listed in `impurity_reasons`.
    fn extract_functions(&self, path: &str, content: &str) -> SymtraceResult<Vec<FunctionNode>>;

    /// Call edges originating in `path`, resolved against `table`.
    fn extract_calls(&self, path: &str, content: &str, table: &NodeTable) -> SymtraceResult<Vec<CallEdge>>;

    /// Text patterns that mark a function as directly impure.
    fn impurity_patterns(&self) -> &'static [ImpurityPattern];
}

/// Statically dispatched front-end selected by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frontend {
    TypeScript,
    Rust,
}

impl Frontend {
    pub const ALL: [Frontend; 2] = [Frontend::TypeScript, Frontend::Rust];

    pub fn name(&self) -> &'static str {
        match self {
            Self::TypeScript => "typescript",
            Self::Rust => "rust",
        }
    }
}

impl LanguageParser for Frontend {
    fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::TypeScript => TypeScriptFrontend.extensions(),
            Self::Rust => RustFrontend.extensions(),
        }
    }

    fn parse_file(&self, path: &str, content: &str) -> SymtraceResult<ParsedFile> {
        match self {
            Self::TypeScript => TypeScriptFrontend.parse_file(path, content),
            Self::Rust => RustFrontend.parse_file(path, content),
        }
    }

    fn resolve_import(&self, specifier: &str, from_file: &str, config: &ResolverConfig) -> Option<String> {
        match self {
            Self::TypeScript => TypeScriptFrontend.resolve_import(specifier, from_file, config),
            Self::Rust => RustFrontend.resolve_import(specifier, from_file, config),
        }
    }

    fn resolve_import_in_place(&self, import: &mut Import, config: &ResolverConfig) {
        match self {
            Self::TypeScript => TypeScriptFrontend.resolve_import_in_place(import, config),
            Self::Rust => RustFrontend.resolve_import_in_place(import, config),
        }
    }

    fn trace_references(
        &self,
        path: &str,
        content: &str,
        local_symbols: &LocalSymbols,
        same_file_names: &BTreeSet<String>,
    ) -> SymtraceResult<Vec<SymbolReference>> {
        match self {
            Self::TypeScript => TypeScriptFrontend.trace_references(path, content, local_symbols, same_file_names),
            Self::Rust => RustFrontend.trace_references(path, content, local_symbols, same_file_names),
        }
    }
}

impl FunctionExtractor for Frontend {
    fn extract_functions(&self, path: &str, content: &str) -> SymtraceResult<Vec<FunctionNode>> {
        match self {
            Self::TypeScript => TypeScriptFrontend.extract_functions(path, content),
            Self::Rust => RustFrontend.extract_functions(path, content),
        }
    }

    fn extract_calls(&self, path: &str, content: &str, table: &NodeTable) -> SymtraceResult<Vec<CallEdge>> {
        match self {
            Self::TypeScript => TypeScriptFrontend.extract_calls(path, content, table),
            Self::Rust => RustFrontend.extract_calls(path, content, table),
        }
    }

    fn impurity_patterns(&self) -> &'static [ImpurityPattern] {
        match self {
            Self::TypeScript => TypeScriptFrontend.impurity_patterns(),
            Self::Rust => RustFrontend.impurity_patterns(),
        }
    }
}

/// Extension -> front-end map, built once at engine construction.
#[derive(Debug, Clone)]
pub struct ParserRegistry {
    by_extension: BTreeMap<&'static str, Frontend>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserRegistry {
    /// Registry with every built-in front-end.
    pub fn new() -> Self {
        Self::with_frontends(Frontend::ALL)
    }

    pub fn with_frontends(frontends: impl IntoIterator<Item = Frontend>) -> Self {
        let mut by_extension = BTreeMap::new();
        for frontend in frontends {
            for ext in frontend.extensions() {
                by_extension.insert(*ext, frontend);
            }
        }
        Self { by_extension }
    }

    /// Front-end responsible for `path`, if any.
    pub fn for_path(&self, path: &str) -> Option<Frontend> {
        extension(path).and_then(|ext| self.by_extension.get(ext).copied())
    }

    /// All registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&'static str> {
        self.by_extension.keys().copied().collect()
    }

    /// Parse with the responsible front-end; unknown extensions yield empty facts.
    pub fn parse_file(&self, path: &str, content: &str) -> SymtraceResult<ParsedFile> {
        match self.for_path(path) {
            Some(frontend) => frontend.parse_file(path, content),
            None => Ok(ParsedFile::default()),
        }
    }
}
