//! Project-level symbol model: exports, imports, bindings, traces.
//!
//! Every trace is keyed by `file:name` ([`symbol_key`]), which stays stable for
//! the whole run so later passes can look up earlier results without
//! re-walking syntax trees.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// Name used for `export * from` markers and namespace/side-effect imports.
pub const STAR: &str = "*";

/// Name under which default exports are recorded.
pub const DEFAULT_EXPORT: &str = "default";

/// Build the stable `file:name` key used for traces and function nodes.
#[inline]
pub fn symbol_key(file: &str, name: &str) -> String {
    format!("{}:{}", file, name)
}

/// Kind of an exported declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Function,
    Class,
    Variable,
    Type,
    Interface,
    Enum,
    Const,
    #[default]
    Unknown,
}

impl ExportKind {
    /// Types and interfaces vanish at runtime, so "imported but unused" says nothing about them.
    pub fn has_runtime_usage(&self) -> bool {
        !matches!(self, Self::Type | Self::Interface)
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Variable => "variable",
            Self::Type => "type",
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::Const => "const",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A named declaration a file makes available to other files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Export {
    pub name: String,
    pub kind: ExportKind,
    pub file_path: String,
    pub line: usize,
    pub is_default: bool,
    pub is_re_export: bool,
    /// For re-exports: the file the symbol ultimately comes from. Front-ends
    /// store the raw specifier here; the analyzer replaces it with a resolved path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_source: Option<String>,
    /// For aliased re-exports (`export { a as b } from`): the name in the source file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Export {
    pub fn new(name: impl Into<String>, kind: ExportKind, file_path: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            file_path: file_path.into(),
            line,
            is_default: false,
            is_re_export: false,
            original_source: None,
            original_name: None,
            signature: None,
        }
    }

    /// `export * from` marker (not a real symbol).
    pub fn is_star(&self) -> bool {
        self.name == STAR
    }

    /// Name of the symbol in the file it is re-exported from.
    pub fn source_name(&self) -> &str {
        self.original_name.as_deref().unwrap_or(&self.name)
    }

    pub fn key(&self) -> String {
        symbol_key(&self.file_path, &self.name)
    }
}

/// One imported name (or a namespace / side-effect import).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Import {
    /// Imported name in the source file; [`STAR`] for namespace, star and side-effect imports.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Raw specifier as written.
    pub source: String,
    pub file_path: String,
    pub line: usize,
    pub is_default: bool,
    #[serde(default)]
    pub is_namespace: bool,
    /// Emitted by an `export ... from` statement rather than an `import`.
    #[serde(default)]
    pub is_re_export: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<String>,
}

impl Import {
    pub fn new(name: impl Into<String>, source: impl Into<String>, file_path: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            alias: None,
            source: source.into(),
            file_path: file_path.into(),
            line,
            is_default: false,
            is_namespace: false,
            is_re_export: false,
            resolved_path: None,
        }
    }

    /// Name the binding is visible under inside the importing file.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Whether this import names one specific symbol of the target file.
    pub fn targets_symbol(&self) -> bool {
        !self.is_namespace && self.name != STAR && !self.name.is_empty()
    }
}

/// What a name visible inside one file refers to, when it came from an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSymbolBinding {
    /// Raw specifier the binding was imported from.
    pub specifier: String,
    /// Resolved project file, absent for external packages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Name in the source file ([`DEFAULT_EXPORT`] for default imports).
    pub original_name: String,
    #[serde(default)]
    pub is_namespace: bool,
}

/// Local name -> import binding for one file.
pub type LocalSymbols = BTreeMap<String, LocalSymbolBinding>;

/// Raw per-file facts produced by a language front-end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedFile {
    pub exports: Vec<Export>,
    pub imports: Vec<Import>,
    pub local_symbols: LocalSymbols,
}

/// How an identifier reference uses a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageType {
    Call,
    Reference,
    Type,
    Jsx,
    Namespace,
}

/// One place where an exported symbol is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub file_path: String,
    pub line: usize,
    pub context: String,
    pub usage_type: UsageType,
}

/// A file that imports a traced symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImporterRef {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub line: usize,
}

/// Accumulated usage history of one export across the project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolTrace {
    /// `file:name`
    pub symbol: String,
    pub file_path: String,
    pub name: String,
    pub imported_by: Vec<ImporterRef>,
    pub usages: Vec<Usage>,
    /// Transitive closure of importing files.
    pub dependents: Vec<String>,
    pub usage_count: usize,
}

impl SymbolTrace {
    pub fn new(file_path: &str, name: &str) -> Self {
        Self {
            symbol: symbol_key(file_path, name),
            file_path: file_path.to_string(),
            name: name.to_string(),
            imported_by: Vec::new(),
            usages: Vec::new(),
            dependents: Vec::new(),
            usage_count: 0,
        }
    }

    /// Register an importer once per (file, line).
    pub fn add_importer(&mut self, importer: ImporterRef) {
        if !self
            .imported_by
            .iter()
            .any(|i| i.file == importer.file && i.line == importer.line)
        {
            self.imported_by.push(importer);
        }
    }

    pub fn is_imported(&self) -> bool {
        !self.imported_by.is_empty()
    }

    pub fn is_used(&self) -> bool {
        !self.usages.is_empty()
    }
}

/// Per-file result of local analysis (pass 1), after import resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnalysis {
    pub path: String,
    pub content_hash: String,
    pub exports: Vec<Export>,
    pub imports: Vec<Import>,
    pub local_symbols: LocalSymbols,
    /// Facts were reused from the content-hash cache.
    pub from_cache: bool,
    /// Set when the file could not be read or parsed; its facts are then empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate counts for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisSummary {
    pub files: usize,
    pub exports: usize,
    pub imports: usize,
    pub cycles: usize,
    pub cache_hits: usize,
}

/// Immutable snapshot of one whole-project analysis.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAnalysis {
    pub root_dir: PathBuf,
    pub files: BTreeMap<String, FileAnalysis>,
    /// Export name -> every export with that name, across files.
    pub exports: BTreeMap<String, Vec<Export>>,
    /// File -> files it imports.
    pub import_graph: BTreeMap<String, BTreeSet<String>>,
    /// File -> files importing it.
    pub reverse_graph: BTreeMap<String, BTreeSet<String>>,
    pub symbol_traces: BTreeMap<String, SymbolTrace>,
    /// Symbol key -> keys of the exports that directly re-export it.
    pub re_export_links: BTreeMap<String, BTreeSet<String>>,
    pub circular_dependencies: Vec<Vec<String>>,
}

impl ProjectAnalysis {
    /// Exports declared (or synthesized) in one file.
    pub fn exports_of(&self, file: &str) -> &[Export] {
        self.files
            .get(file)
            .map(|f| f.exports.as_slice())
            .unwrap_or(&[])
    }

    pub fn trace(&self, file: &str, name: &str) -> Option<&SymbolTrace> {
        self.symbol_traces.get(&symbol_key(file, name))
    }

    /// Files that directly import `file`.
    pub fn importers_of(&self, file: &str) -> Vec<&str> {
        self.reverse_graph
            .get(file)
            .map(|s| s.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary {
            files: self.files.len(),
            exports: self
                .files
                .values()
                .flat_map(|f| f.exports.iter())
                .filter(|e| !e.is_star())
                .count(),
            imports: self.files.values().map(|f| f.imports.len()).sum(),
            cycles: self.circular_dependencies.len(),
            cache_hits: self.files.values().filter(|f| f.from_cache).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_key_format() {
        assert_eq!(symbol_key("src/a.ts", "helper"), "src/a.ts:helper");
    }

    #[test]
    fn test_type_exports_have_no_runtime_usage() {
        assert!(!ExportKind::Type.has_runtime_usage());
        assert!(!ExportKind::Interface.has_runtime_usage());
        assert!(ExportKind::Function.has_runtime_usage());
        assert!(ExportKind::Unknown.has_runtime_usage());
    }

    #[test]
    fn test_add_importer_dedups_same_line() {
        let mut t = SymbolTrace::new("a.ts", "x");
        let imp = ImporterRef { file: "b.ts".into(), alias: None, line: 1 };
        t.add_importer(imp.clone());
        t.add_importer(imp);
        t.add_importer(ImporterRef { file: "c.ts".into(), alias: Some("y".into()), line: 3 });
        assert_eq!(t.imported_by.len(), 2);
    }

    #[test]
    fn test_export_serializes_camel_case() {
        let mut e = Export::new("foo", ExportKind::Function, "a.ts", 2);
        e.is_re_export = true;
        e.original_source = Some("b.ts".into());
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["isReExport"], true);
        assert_eq!(json["originalSource"], "b.ts");
        assert_eq!(json["kind"], "function");
        assert!(json.get("signature").is_none());
    }

    #[test]
    fn test_import_local_name() {
        let mut i = Import::new("foo", "./a", "b.ts", 1);
        assert_eq!(i.local_name(), "foo");
        i.alias = Some("bar".into());
        assert_eq!(i.local_name(), "bar");
        assert!(i.targets_symbol());
        i.is_namespace = true;
        assert!(!i.targets_symbol());
    }
}
