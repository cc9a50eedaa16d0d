//! Incremental parsing cache using SHA-256 for change detection.
//!
//! - Parallel file reading, hashing and parsing via Rayon
//! - Read-once pattern: file content read once, then hashed and parsed
//! - O(changed_files) parsing work, O(1) cache lookups
//!
//! Only per-file facts (exports, imports, local bindings) are cached. Usages
//! depend on other files and are recomputed every run.
//!
//! # Cache Versioning
//!
//! The cache is discarded wholesale (cold start) when:
//! - `CACHE_VERSION` changes (the stored facts changed shape)
//! - the major version of symtrace changes (front-ends may parse differently)
//! - the file is corrupted

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

use crate::config::STATE_DIR;
use crate::error::{IoResultExt, SymtraceResult};
use crate::model::ParsedFile;

/// Maximum cache file size (50MB).
const MAX_CACHE_SIZE_BYTES: usize = 50_000_000;

/// Current cache schema version. Increment when `ParsedFile` changes shape.
pub const CACHE_VERSION: u32 = 1;

/// Tool version recorded in the cache.
const SYMTRACE_VERSION: &str = env!("CARGO_PKG_VERSION");

const CACHE_FILE: &str = "cache.json";

/// Cached facts for one file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedFile {
    pub content_hash: String,
    pub facts: ParsedFile,
}

/// The whole cache, stored at `.symtrace/cache.json`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisCache {
    pub version: u32,
    pub tool_version: String,
    pub created_at: DateTime<Utc>,
    /// Project-relative path -> cached facts.
    pub files: BTreeMap<String, CachedFile>,
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            tool_version: SYMTRACE_VERSION.to_string(),
            created_at: Utc::now(),
            files: BTreeMap::new(),
        }
    }
}

impl AnalysisCache {
    /// Check if this cache was written by a compatible engine.
    pub fn is_compatible(&self) -> bool {
        if self.version != CACHE_VERSION {
            return false;
        }
        let current_major = SYMTRACE_VERSION.split('.').next().unwrap_or("0");
        let cached_major = self.tool_version.split('.').next().unwrap_or("0");
        current_major == cached_major
    }

    /// Cached facts for `path` if its content hash still matches.
    pub fn lookup(&self, path: &str, content_hash: &str) -> Option<&ParsedFile> {
        self.files
            .get(path)
            .filter(|c| c.content_hash == content_hash)
            .map(|c| &c.facts)
    }
}

/// Compute SHA-256 hash of in-memory bytes.
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut sha = Sha256::new();
    sha.update(bytes);
    format!("{:x}", sha.finalize())
}

fn cache_path(root: &Path) -> PathBuf {
    root.join(STATE_DIR).join(CACHE_FILE)
}

/// Load the cache from `.symtrace/cache.json`.
///
/// Returns `None` if the file is missing, corrupted or incompatible.
pub fn load_cache(root: &Path) -> Option<AnalysisCache> {
    let path = cache_path(root);
    if !path.exists() {
        return None;
    }

    let text = match fs::read_to_string(&path) {
        Ok(t) => t,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cache unreadable, starting cold");
            return None;
        }
    };
    let cache: AnalysisCache = match serde_json::from_str(&text) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cache corrupted, starting cold");
            return None;
        }
    };

    if !cache.is_compatible() {
        info!(
            cached = cache.version,
            current = CACHE_VERSION,
            "cache version mismatch, rebuilding"
        );
        let _ = fs::remove_file(&path);
        return None;
    }

    Some(cache)
}

/// Write `contents` to `dir/file_name` through a uniquely named temp file and a rename.
pub(crate) fn write_atomic(dir: &Path, file_name: &str, contents: &str) -> SymtraceResult<PathBuf> {
    fs::create_dir_all(dir).with_path(dir)?;

    let path = dir.join(file_name);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_path = dir.join(format!("{}.{}.{}.tmp", file_name, std::process::id(), nanos));

    fs::write(&temp_path, contents).with_path(&temp_path)?;
    if let Err(e) = fs::rename(&temp_path, &path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e).with_path(&path);
    }
    Ok(path)
}

/// Save the cache to disk atomically (temp file + rename).
///
/// A cache over `MAX_CACHE_SIZE_BYTES` is not written and the old one is removed.
pub fn save_cache(root: &Path, cache: &AnalysisCache) -> SymtraceResult<()> {
    let json = serde_json::to_string(cache)?;

    if json.len() > MAX_CACHE_SIZE_BYTES {
        warn!(
            limit_mb = MAX_CACHE_SIZE_BYTES / 1_000_000,
            "cache exceeds size limit, clearing"
        );
        let _ = fs::remove_file(cache_path(root));
        return Ok(());
    }

    write_atomic(&root.join(STATE_DIR), CACHE_FILE, &json)?;
    Ok(())
}

/// One discovered file after the local-analysis pass.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub path: String,
    /// Source text, kept for the usage pass. Empty when unreadable.
    pub content: String,
    pub content_hash: String,
    pub facts: ParsedFile,
    pub from_cache: bool,
    pub error: Option<String>,
}

/// Read, hash and (on cache miss) parse one file.
fn process_file<F>(root: &Path, rel: &str, old_cache: Option<&AnalysisCache>, parse: &F) -> LoadedFile
where
    F: Fn(&str, &str) -> SymtraceResult<ParsedFile>,
{
    let full = root.join(rel);
    let content = match fs::read_to_string(&full) {
        Ok(c) => c,
        Err(e) => {
            warn!(file = rel, error = %e, "read error, file degraded");
            return LoadedFile {
                path: rel.to_string(),
                content: String::new(),
                content_hash: String::new(),
                facts: ParsedFile::default(),
                from_cache: false,
                error: Some(e.to_string()),
            };
        }
    };

    let content_hash = hash_bytes(content.as_bytes());

    if let Some(facts) = old_cache.and_then(|c| c.lookup(rel, &content_hash)) {
        return LoadedFile {
            path: rel.to_string(),
            content,
            content_hash,
            facts: facts.clone(),
            from_cache: true,
            error: None,
        };
    }

    let (facts, error) = match parse(rel, &content) {
        Ok(f) => (f, None),
        Err(e) => {
            if e.is_recoverable() {
                warn!(file = rel, error = %e, "parse failed, file degraded");
            } else {
                error!(file = rel, error = %e, "front-end failure, file degraded");
            }
            (ParsedFile::default(), Some(e.to_string()))
        }
    };

    LoadedFile {
        path: rel.to_string(),
        content,
        content_hash,
        facts,
        from_cache: false,
        error,
    }
}

/// Incremental local analysis over `files` in parallel.
///
/// - unchanged hash: cached facts are reused without parsing
/// - changed or new file: `parse` runs on the content already in memory
/// - unreadable or unparsable file: empty facts plus an error, never a failure
///
/// Returns the files in input order and the cache to persist for the next run.
/// Degraded files are left out of the new cache so they are retried.
pub fn incremental_parse<F>(
    root: &Path,
    files: &[String],
    old_cache: Option<&AnalysisCache>,
    parse: F,
) -> (Vec<LoadedFile>, AnalysisCache)
where
    F: Fn(&str, &str) -> SymtraceResult<ParsedFile> + Sync,
{
    let loaded: Vec<LoadedFile> = files
        .par_iter()
        .map(|rel| process_file(root, rel, old_cache, &parse))
        .collect();

    let mut new_cache = AnalysisCache::default();
    for file in &loaded {
        if file.error.is_none() {
            new_cache.files.insert(
                file.path.clone(),
                CachedFile {
                    content_hash: file.content_hash.clone(),
                    facts: file.facts.clone(),
                },
            );
        }
    }

    let hits = loaded.iter().filter(|f| f.from_cache).count();
    debug!(files = loaded.len(), cache_hits = hits, "local analysis complete");

    (loaded, new_cache)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Export, ExportKind};
    use crate::error::SymtraceError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fake_parse(path: &str, content: &str) -> SymtraceResult<ParsedFile> {
        if content.contains("@@") {
            return Err(SymtraceError::parse(path, "bad token"));
        }
        let mut facts = ParsedFile::default();
        for (i, line) in content.lines().enumerate() {
            if let Some(name) = line.strip_prefix("export ") {
                facts
                    .exports
                    .push(Export::new(name.trim(), ExportKind::Function, path, i + 1));
            }
        }
        Ok(facts)
    }

    #[test]
    fn test_hash_bytes_deterministic() {
        let hash1 = hash_bytes(b"export const a = 1;");
        let hash2 = hash_bytes(b"export const a = 1;");
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, hash_bytes(b"export const a = 2;"));
    }

    #[test]
    fn test_cache_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = AnalysisCache::default();
        cache.files.insert(
            "src/a.ts".to_string(),
            CachedFile {
                content_hash: "abc123".to_string(),
                facts: ParsedFile::default(),
            },
        );

        save_cache(dir.path(), &cache).unwrap();

        let loaded = load_cache(dir.path()).unwrap();
        assert_eq!(loaded.files.len(), 1);
        assert!(loaded.lookup("src/a.ts", "abc123").is_some());
        assert!(loaded.lookup("src/a.ts", "other").is_none());
    }

    #[test]
    fn test_load_cache_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_cache(dir.path()).is_none());
    }

    #[test]
    fn test_corrupted_cache_is_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(STATE_DIR)).unwrap();
        fs::write(cache_path(dir.path()), "{ not json").unwrap();
        assert!(load_cache(dir.path()).is_none());
    }

    #[test]
    fn test_version_mismatch_is_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AnalysisCache {
            version: CACHE_VERSION + 1,
            ..AnalysisCache::default()
        };
        save_cache(dir.path(), &cache).unwrap();
        assert!(load_cache(dir.path()).is_none());
        assert!(!cache_path(dir.path()).exists());
    }

    #[test]
    fn test_incremental_parse_reuses_unchanged_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "export foo\n").unwrap();
        fs::write(dir.path().join("b.ts"), "export bar\n").unwrap();
        let files = vec!["a.ts".to_string(), "b.ts".to_string()];

        let (first, cache) = incremental_parse(dir.path(), &files, None, fake_parse);
        assert!(first.iter().all(|f| !f.from_cache));
        assert_eq!(first[0].facts.exports[0].name, "foo");

        fs::write(dir.path().join("b.ts"), "export baz\n").unwrap();

        let calls = AtomicUsize::new(0);
        let (second, _) = incremental_parse(dir.path(), &files, Some(&cache), |p, c| {
            calls.fetch_add(1, Ordering::SeqCst);
            fake_parse(p, c)
        });
        assert!(second[0].from_cache);
        assert!(!second[1].from_cache);
        assert_eq!(second[1].facts.exports[0].name, "baz");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bad_files_degrade() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.ts"), "@@").unwrap();
        let files = vec!["bad.ts".to_string(), "missing.ts".to_string()];

        let (loaded, cache) = incremental_parse(dir.path(), &files, None, fake_parse);
        assert_eq!(loaded.len(), 2);
        assert!(loaded.iter().all(|f| f.error.is_some()));
        assert!(loaded.iter().all(|f| f.facts.exports.is_empty()));
        assert!(cache.files.is_empty());
    }
}
