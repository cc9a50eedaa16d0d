//! Import specifier resolution against the discovered file set.
//!
//! Resolution never touches the disk: a specifier resolves only to a file the
//! scan found. Anything else is an external package.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use super::rust::ModuleIndex;
use crate::common::paths::{join_normalized, parent_dir};
use crate::config::AnalyzerConfig;

/// Extensions tried, in order, after a specifier without one.
pub const RESOLVE_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".d.ts"];

/// Everything a front-end needs to turn a specifier into a project file.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// `(prefix, targets)` sorted by descending prefix length.
    path_aliases: Vec<(String, Vec<String>)>,
    base_dir: Option<String>,
    known_files: BTreeSet<String>,
    rust_modules: OnceLock<ModuleIndex>,
}

impl ResolverConfig {
    pub fn new(
        aliases: &BTreeMap<String, Vec<String>>,
        base_dir: Option<String>,
        known_files: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut path_aliases: Vec<(String, Vec<String>)> = aliases
            .iter()
            .map(|(prefix, targets)| {
                (
                    prefix.trim_end_matches('*').to_string(),
                    targets
                        .iter()
                        .map(|t| t.trim_end_matches('*').to_string())
                        .collect(),
                )
            })
            .collect();
        path_aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Self {
            path_aliases,
            base_dir: base_dir.map(|d| d.trim_matches('/').to_string()),
            known_files: known_files.into_iter().collect(),
            rust_modules: OnceLock::new(),
        }
    }

    pub fn from_config(config: &AnalyzerConfig, known_files: impl IntoIterator<Item = String>) -> Self {
        Self::new(&config.path_aliases, config.base_dir.clone(), known_files)
    }

    pub fn is_known(&self, file: &str) -> bool {
        self.known_files.contains(file)
    }

    pub fn known_files(&self) -> &BTreeSet<String> {
        &self.known_files
    }

    /// Module path index over the `.rs` files, built on first use.
    pub(crate) fn rust_modules(&self) -> &ModuleIndex {
        self.rust_modules
            .get_or_init(|| ModuleIndex::build(self.known_files.iter()))
    }

    /// Try `base` as a file, with each extension, then as a directory index.
    pub fn first_existing(&self, base: &str) -> Option<String> {
        let base = base.trim_end_matches('/');
        if base.is_empty() {
            return None;
        }
        if self.is_known(base) {
            return Some(base.to_string());
        }

        // ESM style: `./util.js` written for `util.ts`.
        for (written, actual) in [(".js", ".ts"), (".js", ".tsx"), (".jsx", ".tsx"), (".mjs", ".mts"), (".cjs", ".cts")] {
            if let Some(stem) = base.strip_suffix(written) {
                let candidate = format!("{}{}", stem, actual);
                if self.is_known(&candidate) {
                    return Some(candidate);
                }
            }
        }

        for ext in RESOLVE_EXTENSIONS {
            let candidate = format!("{}{}", base, ext);
            if self.is_known(&candidate) {
                return Some(candidate);
            }
        }
        for ext in RESOLVE_EXTENSIONS {
            let candidate = format!("{}/index{}", base, ext);
            if self.is_known(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Resolve a JavaScript/TypeScript specifier imported from `from_file`.
    pub fn resolve_module_specifier(&self, specifier: &str, from_file: &str) -> Option<String> {
        if specifier.starts_with("./") || specifier.starts_with("../") || specifier == "." || specifier == ".." {
            let joined = join_normalized(parent_dir(from_file), specifier)?;
            return self.first_existing(&joined);
        }
        if specifier.starts_with('/') {
            return self.first_existing(specifier.trim_start_matches('/'));
        }

        for (prefix, targets) in &self.path_aliases {
            let Some(rest) = specifier.strip_prefix(prefix.as_str()) else {
                continue;
            };
            for target in targets {
                let joined = if rest.is_empty() {
                    join_normalized("", target)
                } else {
                    join_normalized(target.trim_end_matches('/'), rest)
                };
                if let Some(found) = joined.and_then(|j| self.first_existing(&j)) {
                    return Some(found);
                }
            }
        }

        if let Some(base) = &self.base_dir {
            if let Some(found) = join_normalized(base, specifier).and_then(|j| self.first_existing(&j)) {
                return Some(found);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ResolverConfig {
        let mut aliases = BTreeMap::new();
        aliases.insert("@/".to_string(), vec!["src/".to_string()]);
        aliases.insert("@/lib/*".to_string(), vec!["vendor/lib/*".to_string(), "src/lib/*".to_string()]);
        ResolverConfig::new(
            &aliases,
            Some("src".to_string()),
            [
                "src/a.ts",
                "src/utils/index.ts",
                "src/utils/format.tsx",
                "src/lib/math.ts",
                "src/types.d.ts",
                "src/esm.ts",
            ]
            .map(String::from),
        )
    }

    #[test]
    fn test_relative_with_extension_fallbacks() {
        let r = resolver();
        assert_eq!(r.resolve_module_specifier("./a", "src/b.ts").as_deref(), Some("src/a.ts"));
        assert_eq!(r.resolve_module_specifier("../a", "src/utils/index.ts").as_deref(), Some("src/a.ts"));
        assert_eq!(r.resolve_module_specifier("./utils", "src/a.ts").as_deref(), Some("src/utils/index.ts"));
        assert_eq!(r.resolve_module_specifier("./utils/format", "src/a.ts").as_deref(), Some("src/utils/format.tsx"));
        assert_eq!(r.resolve_module_specifier("./types", "src/a.ts").as_deref(), Some("src/types.d.ts"));
        assert_eq!(r.resolve_module_specifier("./esm.js", "src/a.ts").as_deref(), Some("src/esm.ts"));
        assert!(r.resolve_module_specifier("./missing", "src/a.ts").is_none());
    }

    #[test]
    fn test_longest_alias_prefix_wins() {
        let r = resolver();
        // `@/lib/` beats `@/`, and its first target does not exist.
        assert_eq!(r.resolve_module_specifier("@/lib/math", "src/a.ts").as_deref(), Some("src/lib/math.ts"));
        assert_eq!(r.resolve_module_specifier("@/utils", "src/a.ts").as_deref(), Some("src/utils/index.ts"));
    }

    #[test]
    fn test_base_dir_then_external() {
        let r = resolver();
        assert_eq!(r.resolve_module_specifier("utils/format", "src/a.ts").as_deref(), Some("src/utils/format.tsx"));
        assert!(r.resolve_module_specifier("react", "src/a.ts").is_none());
    }
}
