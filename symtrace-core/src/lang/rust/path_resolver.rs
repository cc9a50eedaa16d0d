//! Module path resolution for Rust sources.
//!
//! Maps files to their position in the crate hierarchy and resolves `use`
//! and call paths against the discovered files:
//! - `use crate::db::query` in any file -> `crate::db` -> `src/db.rs`
//! - `super::config::load()` from `src/api/v1/handler.rs` -> `src/api/v1/config.rs`
//! - `self::router::Route::new()` from `src/api/mod.rs` -> `src/api/router.rs`

use std::collections::BTreeMap;

use crate::common::paths::file_name;

/// A file's position in its crate.
///
/// Example: `core/src/api/v1/mod.rs` -> crate `core`, segments `["api", "v1"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModulePathContext {
    /// Directory holding the crate's `src/`, relative to the project root.
    pub crate_dir: String,
    /// Path segments from the crate root (excluding `crate::`).
    pub segments: Vec<String>,
}

impl ModulePathContext {
    /// Context for a project-relative, forward-slash file path.
    ///
    /// Examples:
    /// - `src/lib.rs` -> `[]`
    /// - `src/api/mod.rs` -> `["api"]`
    /// - `src/api/v1/handler.rs` -> `["api", "v1", "handler"]`
    pub fn from_file_path(path: &str) -> Self {
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();

        let Some(src_idx) = parts.iter().rposition(|p| *p == "src") else {
            // Outside `src/` every file is its own crate root.
            let crate_dir = parts[..parts.len().saturating_sub(1)].join("/");
            let stem = file_name(path).trim_end_matches(".rs");
            let segments = match stem {
                "lib" | "main" | "mod" => Vec::new(),
                other => vec![other.to_string()],
            };
            return Self { crate_dir, segments };
        };

        let crate_dir = parts[..src_idx].join("/");
        let mut segments = Vec::new();
        for part in &parts[src_idx + 1..] {
            // mod.rs, lib.rs and main.rs stand for their directory
            if matches!(*part, "mod.rs" | "lib.rs" | "main.rs") {
                continue;
            }
            segments.push(part.strip_suffix(".rs").unwrap_or(part).to_string());
        }
        Self { crate_dir, segments }
    }

    /// Fully qualified path with `crate` prefix.
    pub fn to_crate_path(&self) -> String {
        if self.segments.is_empty() {
            "crate".to_string()
        } else {
            format!("crate::{}", self.segments.join("::"))
        }
    }

    /// Parent module context (for `super::`).
    pub fn parent(&self) -> Self {
        Self {
            crate_dir: self.crate_dir.clone(),
            segments: if self.segments.is_empty() {
                Vec::new()
            } else {
                self.segments[..self.segments.len() - 1].to_vec()
            },
        }
    }
}

/// `(crate_dir, module segments)` -> file, over every discovered `.rs` file.
#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    modules: BTreeMap<(String, Vec<String>), String>,
}

impl ModuleIndex {
    pub fn build<'a>(files: impl IntoIterator<Item = &'a String>) -> Self {
        let mut modules = BTreeMap::new();
        for file in files {
            if !file.ends_with(".rs") {
                continue;
            }
            let ctx = ModulePathContext::from_file_path(file);
            // Sorted input keeps `lib.rs` ahead of `main.rs` for the crate root.
            modules
                .entry((ctx.crate_dir, ctx.segments))
                .or_insert_with(|| file.clone());
        }
        Self { modules }
    }

    pub fn file_for(&self, crate_dir: &str, segments: &[String]) -> Option<&str> {
        self.modules
            .get(&(crate_dir.to_string(), segments.to_vec()))
            .map(String::as_str)
    }

    pub fn contains(&self, crate_dir: &str, segments: &[String]) -> bool {
        self.file_for(crate_dir, segments).is_some()
    }

    /// File of the longest module prefix of `segments`, with the number of
    /// segments that prefix consumed.
    pub fn resolve_longest(&self, crate_dir: &str, segments: &[String]) -> Option<(&str, usize)> {
        (0..=segments.len())
            .rev()
            .find_map(|n| self.file_for(crate_dir, &segments[..n]).map(|f| (f, n)))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Resolve a path that starts with `crate`, `self`, `super` or a module name
/// to absolute segments. External crates yield `None`.
pub fn resolve_prefix_path(path: &[String], ctx: &ModulePathContext, index: &ModuleIndex) -> Option<Vec<String>> {
    let first = path.first()?;
    match first.as_str() {
        "crate" => Some(path[1..].to_vec()),
        "self" => {
            let mut result = ctx.segments.clone();
            result.extend_from_slice(&path[1..]);
            Some(result)
        }
        "super" => {
            let mut base = ctx.clone();
            let mut rest = path;
            while rest.first().map(String::as_str) == Some("super") {
                base = base.parent();
                rest = &rest[1..];
            }
            let mut result = base.segments;
            result.extend_from_slice(rest);
            Some(result)
        }
        _ => {
            // 2018 paths: a child module of the current module, then of the crate root.
            let mut local = ctx.segments.clone();
            local.push(first.clone());
            if index.contains(&ctx.crate_dir, &local) {
                local.extend_from_slice(&path[1..]);
                return Some(local);
            }
            if index.contains(&ctx.crate_dir, std::slice::from_ref(first)) {
                return Some(path.to_vec());
            }
            None
        }
    }
}

/// Split a `::` path string into segments.
pub fn split_path(path: &str) -> Vec<String> {
    path.split("::")
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve a `::` path written in `from_file` to `(file, remaining segments)`.
pub fn resolve_to_file<'a>(path: &str, from_file: &str, index: &'a ModuleIndex) -> Option<(&'a str, Vec<String>)> {
    let ctx = ModulePathContext::from_file_path(from_file);
    let absolute = resolve_prefix_path(&split_path(path), &ctx, index)?;
    let (file, consumed) = index.resolve_longest(&ctx.crate_dir, &absolute)?;
    Some((file, absolute[consumed..].to_vec()))
}
