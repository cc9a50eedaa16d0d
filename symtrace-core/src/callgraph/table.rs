//! Resolved node table handed to call extraction.
//!
//! Edge extraction needs every node id of the project plus, per file, the
//! import bindings resolved to project files. The table is built once after
//! all functions are known and is read-only afterwards.

use std::collections::{BTreeMap, BTreeSet};

use super::model::FunctionNode;
use crate::model::{symbol_key, LocalSymbolBinding, LocalSymbols, DEFAULT_EXPORT, STAR};
use crate::project::MAX_REEXPORT_DEPTH;

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    name: String,
    short: String,
    is_method: bool,
    is_nested: bool,
}

/// An exported name that points at another name, usually in another file.
///
/// Covers `export { a } from`, `export * from` (`name` is `*`), `pub use`,
/// and local aliases such as `export default greet` or `export { a as b }`.
#[derive(Debug, Clone)]
struct Forward {
    name: String,
    source: String,
    source_name: String,
}

/// Lookup structure over all function nodes of one build.
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    ids: BTreeSet<String>,
    by_file: BTreeMap<String, Vec<Entry>>,
    bindings: BTreeMap<String, LocalSymbols>,
    forwards: BTreeMap<String, Vec<Forward>>,
    files: BTreeSet<String>,
}

impl NodeTable {
    pub fn new<'a>(nodes: impl IntoIterator<Item = &'a FunctionNode>) -> Self {
        let mut table = Self::default();
        for node in nodes {
            table.ids.insert(node.id.clone());
            table
                .by_file
                .entry(node.file_path.clone())
                .or_default()
                .push(Entry {
                    id: node.id.clone(),
                    name: node.name.clone(),
                    short: node.short_name().to_string(),
                    is_method: node.is_method,
                    is_nested: node.is_nested,
                });
        }
        table
    }

    /// Register every project file, including files without functions.
    pub fn with_files(mut self, files: impl IntoIterator<Item = String>) -> Self {
        self.files.extend(files);
        self
    }

    /// Record the resolved import bindings of one file.
    pub fn set_bindings(&mut self, file: &str, bindings: LocalSymbols) {
        self.bindings.insert(file.to_string(), bindings);
    }

    /// Record that `file` exports `name` as `source_name` of `source`.
    ///
    /// `name` and `source_name` are both `*` for a star re-export.
    pub fn add_forward(&mut self, file: &str, name: &str, source: &str, source_name: &str) {
        self.forwards.entry(file.to_string()).or_default().push(Forward {
            name: name.to_string(),
            source: source.to_string(),
            source_name: source_name.to_string(),
        });
    }

    pub fn files(&self) -> impl Iterator<Item = &String> {
        self.files.iter()
    }

    pub fn binding(&self, file: &str, local: &str) -> Option<&LocalSymbolBinding> {
        self.bindings.get(file).and_then(|b| b.get(local))
    }

    /// Id of `name` declared in `file` if such a node exists.
    pub fn id_in(&self, file: &str, name: &str) -> Option<String> {
        let id = symbol_key(file, name);
        self.ids.contains(&id).then_some(id)
    }

    /// Function that `file` exports as `name`, following aliases, named
    /// re-exports and star re-exports to the declaring file.
    pub fn exported_id(&self, file: &str, name: &str) -> Option<String> {
        let mut visited = BTreeSet::new();
        self.follow(file, name, 0, &mut visited)
    }

    fn follow<'a>(
        &'a self,
        file: &'a str,
        name: &'a str,
        depth: usize,
        visited: &mut BTreeSet<(&'a str, &'a str)>,
    ) -> Option<String> {
        if depth > MAX_REEXPORT_DEPTH || !visited.insert((file, name)) {
            return None;
        }
        let forwards = self.forwards.get(file).map(Vec::as_slice).unwrap_or(&[]);

        if let Some(f) = forwards.iter().find(|f| f.name == name) {
            // `export * as ns from` names a module, not a function.
            if f.source_name == STAR {
                return None;
            }
            return self.follow(&f.source, &f.source_name, depth + 1, visited);
        }
        if let Some(id) = self.id_in(file, name) {
            return Some(id);
        }
        if name == DEFAULT_EXPORT {
            return None;
        }
        forwards
            .iter()
            .filter(|f| f.name == STAR)
            .find_map(|f| self.follow(&f.source, name, depth + 1, visited))
    }

    /// Same-file function with this exact local name, preferring top-level ones.
    pub fn resolve_local(&self, file: &str, name: &str) -> Option<String> {
        let entries = self.by_file.get(file)?;
        entries
            .iter()
            .filter(|e| e.name == name)
            .min_by_key(|e| (e.is_method || e.is_nested, e.id.len()))
            .map(|e| e.id.clone())
    }

    /// Same-file method whose last name component is `method`.
    pub fn resolve_method(&self, file: &str, method: &str) -> Option<String> {
        self.by_file
            .get(file)?
            .iter()
            .find(|e| e.is_method && e.short == method)
            .map(|e| e.id.clone())
    }

    /// Target of an imported name, following the file's bindings and the
    /// source file's re-exports.
    pub fn resolve_imported(&self, file: &str, local: &str) -> Option<String> {
        let binding = self.binding(file, local)?;
        if binding.is_namespace {
            return None;
        }
        self.exported_id(binding.source.as_deref()?, &binding.original_name)
    }

    /// `ns.member` where `ns` is a namespace import.
    pub fn resolve_namespace_member(&self, file: &str, ns: &str, member: &str) -> Option<String> {
        let binding = self.binding(file, ns)?;
        if !binding.is_namespace {
            return None;
        }
        self.exported_id(binding.source.as_deref()?, member)
    }

    /// Same-file method or nested function whose last name component is `short`.
    pub fn resolve_member(&self, file: &str, short: &str) -> Option<String> {
        self.by_file
            .get(file)?
            .iter()
            .find(|e| (e.is_method || e.is_nested) && e.short == short)
            .map(|e| e.id.clone())
    }
}
