//! Parallel, deterministic source discovery with early directory pruning.
//!
//! - Subtrees like `node_modules/` and `target/` are skipped through
//!   `WalkDir::filter_entry` before any of their entries are visited.
//! - User ignore globs (`symtrace.toml` `ignore`) are compiled once into a
//!   `GlobSet` and matched against project-relative paths.
//! - Remaining entries are filtered in parallel via Rayon's `par_bridge`.
//!
//! Paths are returned relative to the root with forward slashes and sorted,
//! so every later pass sees the files in the same order on every platform.

use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::common::paths::{extension, relative_to};
use crate::config::STATE_DIR;
use crate::error::{SymtraceError, SymtraceResult};

/// Directories never descended into.
const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "target",
    "dist",
    "build",
    STATE_DIR,
];

/// Compile ignore patterns into a single matcher.
pub fn build_ignore_set(patterns: &[String]) -> SymtraceResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).map_err(|e| {
            SymtraceError::invalid_argument(format!("invalid ignore glob '{}': {}", pat, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| SymtraceError::invalid_argument(format!("invalid ignore set: {}", e)))
}

#[inline]
fn is_excluded_dir(entry: &walkdir::DirEntry, excludes: &HashSet<&str>) -> bool {
    entry.file_type().is_dir()
        && entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| excludes.contains(name))
}

/// Gather every file under `root` whose extension is in `extensions`.
///
/// Directories matching an ignore glob are pruned; files matching one are dropped.
/// Unreadable directory entries are logged and skipped.
pub fn gather_source_files(
    root: &Path,
    extensions: &[&str],
    ignore: &[String],
) -> SymtraceResult<Vec<String>> {
    if !root.is_dir() {
        return Err(SymtraceError::invalid_argument(format!(
            "not a directory: {}",
            root.display()
        )));
    }

    let excludes: HashSet<&str> = EXCLUDED_DIRS.iter().copied().collect();
    let ignore_set = build_ignore_set(ignore)?;

    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| {
            if is_excluded_dir(e, &excludes) {
                return false;
            }
            if e.depth() > 0 && e.file_type().is_dir() {
                return !ignore_set.is_match(relative_to(root, e.path()));
            }
            true
        })
        .par_bridge()
        .filter_map(|entry| match entry {
            Ok(e) => {
                if !e.file_type().is_file() {
                    return None;
                }
                let rel = relative_to(root, e.path());
                let ext = extension(&rel)?;
                if !extensions.contains(&ext) || ignore_set.is_match(&rel) {
                    return None;
                }
                Some(rel)
            }
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .collect();

    files.sort();
    debug!(root = %root.display(), count = files.len(), "discovered source files");
    Ok(files)
}
