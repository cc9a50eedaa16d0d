//! Configuration: `symtrace.toml` loading and the explicit engine state.
//!
//! Nothing here is global. A [`AnalyzerConfig`] is built once (from a file or
//! programmatically) and handed to each engine at construction.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, SymtraceError, SymtraceResult};

/// Name of the optional configuration file at the project root.
pub const CONFIG_FILE: &str = "symtrace.toml";

/// Directory holding the analysis cache and the gold standard.
pub const STATE_DIR: &str = ".symtrace";

/// Raw `symtrace.toml` contents.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SymtraceConfig {
    /// Glob patterns of files and directories to skip.
    pub ignore: Vec<String>,
    /// Glob patterns of files treated as public entry points.
    pub entry_points: Vec<String>,
    /// Path aliases, e.g. `"@/" = ["src/"]`.
    pub paths: BTreeMap<String, Vec<String>>,
    /// Base directory for bare specifiers (`baseUrl`).
    pub base_url: Option<String>,
    /// Whether the content-hash cache is used.
    pub cache: Option<bool>,
    /// Report entry-point exports as unused too.
    pub strict: bool,
    pub extraction: Option<ExtractionSection>,
    pub hubs: Option<HubSection>,
}

/// `[extraction]` table.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ExtractionSection {
    pub max_file_fraction: Option<f64>,
    pub max_candidates: Option<usize>,
}

/// `[hubs]` table.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct HubSection {
    pub threshold: Option<usize>,
}

/// Loads configuration from `symtrace.toml` if it exists.
pub fn load_config(root: &Path) -> SymtraceResult<Option<SymtraceConfig>> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path).with_path(&path)?;
    let cfg = toml::from_str(&content)
        .map_err(|e| SymtraceError::config(&path, format!("invalid {}: {}", CONFIG_FILE, e)))?;
    Ok(Some(cfg))
}

/// Thresholds for extraction-candidate scoring.
///
/// The defaults are empirical and kept configurable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionThresholds {
    /// A group must cover strictly less than this fraction of the file's functions.
    pub max_file_fraction: f64,
    /// Number of candidates kept after ranking.
    pub max_candidates: usize,
    /// Minimum group size; singletons are never candidates.
    pub min_group_size: usize,
}

impl Default for ExtractionThresholds {
    fn default() -> Self {
        Self {
            max_file_fraction: 0.7,
            max_candidates: 5,
            min_group_size: 2,
        }
    }
}

/// Default degree above which a function is reported as a hub.
pub const DEFAULT_HUB_THRESHOLD: usize = 5;

/// Explicit engine state shared by the analyzer, the call-graph engine and the verifier.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub root_dir: PathBuf,
    pub ignore_globs: Vec<String>,
    pub entry_point_patterns: Vec<String>,
    pub path_aliases: BTreeMap<String, Vec<String>>,
    pub base_dir: Option<String>,
    pub cache_enabled: bool,
    pub strict: bool,
    pub extraction: ExtractionThresholds,
    pub hub_threshold: usize,
}

impl AnalyzerConfig {
    /// Create a configuration with defaults for the given project root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root.into(),
            ignore_globs: Vec::new(),
            entry_point_patterns: Vec::new(),
            path_aliases: BTreeMap::new(),
            base_dir: None,
            cache_enabled: true,
            strict: false,
            extraction: ExtractionThresholds::default(),
            hub_threshold: DEFAULT_HUB_THRESHOLD,
        }
    }

    /// Build from a parsed `symtrace.toml`.
    pub fn from_file_config(root: impl Into<PathBuf>, cfg: &SymtraceConfig) -> Self {
        let mut out = Self::new(root);
        out.ignore_globs = cfg.ignore.clone();
        out.entry_point_patterns = cfg.entry_points.clone();
        out.path_aliases = cfg.paths.clone();
        out.base_dir = cfg.base_url.clone();
        out.cache_enabled = cfg.cache.unwrap_or(true);
        out.strict = cfg.strict;
        if let Some(ex) = &cfg.extraction {
            if let Some(f) = ex.max_file_fraction {
                out.extraction.max_file_fraction = f;
            }
            if let Some(n) = ex.max_candidates {
                out.extraction.max_candidates = n;
            }
        }
        if let Some(t) = cfg.hubs.as_ref().and_then(|h| h.threshold) {
            out.hub_threshold = t;
        }
        out
    }

    /// Load `symtrace.toml` from `root` if present, otherwise use defaults.
    pub fn load(root: impl Into<PathBuf>) -> SymtraceResult<Self> {
        let root = root.into();
        match load_config(&root)? {
            Some(cfg) => Ok(Self::from_file_config(root, &cfg)),
            None => Ok(Self::new(root)),
        }
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_ignore(mut self, globs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ignore_globs.extend(globs.into_iter().map(Into::into));
        self
    }

    pub fn with_entry_points(mut self, globs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.entry_point_patterns
            .extend(globs.into_iter().map(Into::into));
        self
    }

    /// Add a path alias mapping a prefix to candidate target roots (tried in order).
    pub fn with_alias(
        mut self,
        prefix: impl Into<String>,
        targets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.path_aliases.insert(
            prefix.into(),
            targets.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<String>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_extraction(mut self, thresholds: ExtractionThresholds) -> Self {
        self.extraction = thresholds;
        self
    }

    /// Directory holding persisted state (`<root>/.symtrace`).
    pub fn state_dir(&self) -> PathBuf {
        self.root_dir.join(STATE_DIR)
    }
}
