//! Entry-point detection.
//!
//! A file is an entry point when it matches a configured glob, has a
//! conventional name (`index.*`, `main.*`, Rust `main.rs` / `lib.rs` /
//! `src/bin/*`), or is a `main` / `module` / `bin` / `exports` target of the
//! root `package.json`. Exports of entry points may be used from outside the
//! project, so they are never reported as dead by default.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::common::paths::{file_name, file_stem, normalize_path_string};
use crate::error::{SymtraceError, SymtraceResult};

const PACKAGE_MANIFEST: &str = "package.json";

/// Conventional entry-point file stems.
const CONVENTIONAL_STEMS: &[&str] = &["index", "main"];

/// Everything needed to answer "is this file an entry point".
#[derive(Debug, Clone)]
pub struct EntryPoints {
    globs: GlobSet,
    /// Manifest targets without extension (`dist/index`).
    manifest_targets: BTreeSet<String>,
}

impl EntryPoints {
    /// Compile `patterns` and read the manifest under `root` (if any).
    pub fn new(root: &Path, patterns: &[String]) -> SymtraceResult<Self> {
        let mut builder = GlobSetBuilder::new();
        for pat in patterns {
            let glob = Glob::new(pat).map_err(|e| {
                SymtraceError::invalid_argument(format!("invalid entry point glob '{}': {}", pat, e))
            })?;
            builder.add(glob);
        }
        let globs = builder
            .build()
            .map_err(|e| SymtraceError::invalid_argument(format!("invalid entry point set: {}", e)))?;

        Ok(Self {
            globs,
            manifest_targets: read_manifest_targets(root),
        })
    }

    pub fn is_entry_point(&self, file: &str) -> bool {
        if self.globs.is_match(file) {
            return true;
        }

        let name = file_name(file);
        if CONVENTIONAL_STEMS.contains(&file_stem(name)) {
            return true;
        }
        if file.ends_with(".rs") && (name == "main.rs" || name == "lib.rs" || file.contains("src/bin/")) {
            return true;
        }

        self.manifest_targets.contains(strip_extension(file))
    }
}

fn strip_extension(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => path,
        Some(i) => &path[..path.len() - name.len() + i],
    }
}

fn normalize_target(target: &str) -> String {
    let target = normalize_path_string(target);
    strip_extension(target.trim_start_matches("./")).to_string()
}

/// Every string leaf of a manifest field (`exports` may nest conditions).
fn collect_targets(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            out.insert(normalize_target(s));
        }
        Value::Object(map) => {
            for v in map.values() {
                collect_targets(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_targets(v, out);
            }
        }
        _ => {}
    }
}

fn read_manifest_targets(root: &Path) -> BTreeSet<String> {
    let path = root.join(PACKAGE_MANIFEST);
    let mut targets = BTreeSet::new();
    let Ok(text) = fs::read_to_string(&path) else {
        return targets;
    };
    let manifest: Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable package manifest, ignoring");
            return targets;
        }
    };
    for field in ["main", "module", "bin", "exports"] {
        if let Some(value) = manifest.get(field) {
            collect_targets(value, &mut targets);
        }
    }
    debug!(count = targets.len(), "package manifest entry targets");
    targets
}
