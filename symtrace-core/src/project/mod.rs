//! Project-level symbol analysis.
//!
//! Five ordered passes build one [`ProjectAnalysis`]; each pass reads only
//! what earlier passes finished writing:
//!
//! 1. local analysis: hash, reuse cached facts or parse, resolve specifiers
//! 2. import graph and importer registration
//! 3. re-export resolution (named backfill, star expansion)
//! 4. usage tracing (scope-aware, per file in parallel)
//! 5. finalization: dependents, usage counts, cycles
//!
//! The mutable [`AnalysisBuilder`] never leaves this module.
//!
//! # Example
//!
//! ```ignore
//! use symtrace_core::project::{ProjectAnalyzer, UnusedOptions};
//!
//! let analyzer = ProjectAnalyzer::new(AnalyzerConfig::load(".")?)?;
//! let analysis = analyzer.analyze()?;
//! for dead in analyzer.find_unused_exports(&analysis, UnusedOptions::default()) {
//!     println!("{}:{} {} ({})", dead.export.file_path, dead.export.line, dead.export.name, dead.reason);
//! }
//! ```

mod cycles;
mod entry;
mod impact;
mod unused;

pub use cycles::{build_import_graph, find_cycles};
pub use entry::EntryPoints;
pub use impact::{compare_analyses, compare_exports, get_impact, BreakingChange, BreakingChangeKind};
pub use unused::{
    find_unused_exports, UnusedExport, UnusedKind, UnusedOptions, REASON_ENTRY_POINT, REASON_IMPORTED_NOT_USED,
    REASON_NEVER_USED,
};

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::cache::{incremental_parse, load_cache, save_cache, LoadedFile};
use crate::config::AnalyzerConfig;
use crate::error::SymtraceResult;
use crate::lang::{Frontend, LanguageParser, ParserRegistry, ReferenceTarget, ResolverConfig};
use crate::model::{
    symbol_key, Export, ExportKind, FileAnalysis, ImporterRef, ProjectAnalysis, SymbolTrace, Usage,
    DEFAULT_EXPORT, STAR,
};
use crate::scan::gather_source_files;
use impact::transitive_dependents;

/// Longest re-export chain followed before giving up.
pub const MAX_REEXPORT_DEPTH: usize = 16;

/// Whole-project export/import/usage analysis.
#[derive(Debug, Clone)]
pub struct ProjectAnalyzer {
    config: AnalyzerConfig,
    registry: ParserRegistry,
    entry_points: EntryPoints,
}

impl ProjectAnalyzer {
    /// Fails only on invalid entry-point globs.
    pub fn new(config: AnalyzerConfig) -> SymtraceResult<Self> {
        let entry_points = EntryPoints::new(&config.root_dir, &config.entry_point_patterns)?;
        Ok(Self {
            config,
            registry: ParserRegistry::new(),
            entry_points,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn is_entry_point(&self, file: &str) -> bool {
        self.entry_points.is_entry_point(file)
    }

    pub fn find_unused_exports(&self, analysis: &ProjectAnalysis, options: UnusedOptions) -> Vec<UnusedExport> {
        find_unused_exports(analysis, &self.entry_points, options)
    }

    /// Run all five passes over the project on disk.
    pub fn analyze(&self) -> SymtraceResult<ProjectAnalysis> {
        let root = &self.config.root_dir;
        let files = gather_source_files(root, &self.registry.extensions(), &self.config.ignore_globs)?;

        let old_cache = if self.config.cache_enabled {
            load_cache(root)
        } else {
            None
        };
        let (loaded, new_cache) =
            incremental_parse(root, &files, old_cache.as_ref(), |path, content| self.registry.parse_file(path, content));
        if self.config.cache_enabled {
            if let Err(e) = save_cache(root, &new_cache) {
                warn!(error = %e, "could not save analysis cache");
            }
        }

        let mut builder = AnalysisBuilder::new(&self.registry, ResolverConfig::from_config(&self.config, files), root.clone());
        builder.local_analysis(loaded);
        builder.assemble_import_graph();
        builder.resolve_re_exports();
        builder.trace_usages();
        Ok(builder.finish())
    }
}

/// Kind, signature and ultimate origin copied onto a named re-export.
struct Backfill {
    file: String,
    index: usize,
    kind: ExportKind,
    signature: Option<String>,
    origin_file: String,
    origin_name: String,
}

/// The declaring export behind `file:name`, following named re-exports and
/// star re-exports up to [`MAX_REEXPORT_DEPTH`] hops.
fn origin<'f>(files: &'f BTreeMap<String, FileAnalysis>, file: &str, name: &str, depth: usize) -> Option<&'f Export> {
    if depth > MAX_REEXPORT_DEPTH {
        return None;
    }
    let analysis = files.get(file)?;

    if let Some(export) = analysis.exports.iter().find(|e| e.name == name && !e.is_star()) {
        if !export.is_re_export || export.source_name() == STAR {
            return Some(export);
        }
        let source = export.original_source.as_deref()?;
        return origin(files, source, export.source_name(), depth + 1);
    }

    if name == DEFAULT_EXPORT {
        return None;
    }
    analysis
        .exports
        .iter()
        .filter(|e| e.is_star())
        .filter_map(|e| e.original_source.as_deref())
        .find_map(|source| origin(files, source, name, depth + 1))
}

/// Every non-default name `file` exports, including through its star re-exports.
fn star_names(files: &BTreeMap<String, FileAnalysis>, file: &str) -> BTreeSet<String> {
    fn collect<'f>(
        files: &'f BTreeMap<String, FileAnalysis>,
        file: &'f str,
        depth: usize,
        visited: &mut BTreeSet<&'f str>,
        out: &mut BTreeSet<String>,
    ) {
        if depth > MAX_REEXPORT_DEPTH || !visited.insert(file) {
            return;
        }
        let Some(analysis) = files.get(file) else { return };
        for export in &analysis.exports {
            if export.is_star() {
                if let Some(source) = export.original_source.as_deref() {
                    collect(files, source, depth + 1, visited, out);
                }
            } else if export.name != DEFAULT_EXPORT {
                out.insert(export.name.clone());
            }
        }
    }

    let mut names = BTreeSet::new();
    if let Some((key, _)) = files.get_key_value(file) {
        collect(files, key, 0, &mut BTreeSet::new(), &mut names);
    }
    names
}

/// References found in one file, as `(trace key, usage)` pairs.
fn file_usages(frontend: Frontend, path: &str, content: &str, file: &FileAnalysis) -> Vec<(String, Usage)> {
    // Local declaration name -> names it is exported under.
    let mut declared: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for export in file.exports.iter().filter(|e| !e.is_re_export && !e.is_star()) {
        let local = export.original_name.as_deref().unwrap_or(&export.name);
        declared.entry(local).or_default().push(&export.name);
    }
    let same_file: BTreeSet<String> = declared.keys().map(|s| s.to_string()).collect();

    let references = match frontend.trace_references(path, content, &file.local_symbols, &same_file) {
        Ok(r) => r,
        Err(e) => {
            debug!(file = path, error = %e, "no usages for unparsable file");
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    for reference in references {
        let usage = reference.to_usage(path);
        match &reference.target {
            ReferenceTarget::Import { local, member } => {
                let Some(binding) = file.local_symbols.get(local) else { continue };
                let Some(source) = binding.source.as_deref() else { continue };
                let name = if binding.is_namespace {
                    match member {
                        Some(m) => m.as_str(),
                        None => continue,
                    }
                } else {
                    binding.original_name.as_str()
                };
                out.push((symbol_key(source, name), usage));
            }
            ReferenceTarget::SameFile { name } => {
                for exported in declared.get(name.as_str()).into_iter().flatten() {
                    out.push((symbol_key(path, exported), usage.clone()));
                }
            }
        }
    }
    out
}

/// Mutable state accumulated across the passes, frozen by [`Self::finish`].
struct AnalysisBuilder<'a> {
    registry: &'a ParserRegistry,
    resolver: ResolverConfig,
    root_dir: PathBuf,
    files: BTreeMap<String, FileAnalysis>,
    contents: BTreeMap<String, String>,
    import_graph: BTreeMap<String, BTreeSet<String>>,
    reverse_graph: BTreeMap<String, BTreeSet<String>>,
    traces: BTreeMap<String, SymbolTrace>,
    re_export_links: BTreeMap<String, BTreeSet<String>>,
    /// Importers of names that only exist once star re-exports are expanded.
    pending: BTreeMap<String, Vec<ImporterRef>>,
}

impl<'a> AnalysisBuilder<'a> {
    fn new(registry: &'a ParserRegistry, resolver: ResolverConfig, root_dir: PathBuf) -> Self {
        Self {
            registry,
            resolver,
            root_dir,
            files: BTreeMap::new(),
            contents: BTreeMap::new(),
            import_graph: BTreeMap::new(),
            reverse_graph: BTreeMap::new(),
            traces: BTreeMap::new(),
            re_export_links: BTreeMap::new(),
            pending: BTreeMap::new(),
        }
    }

    /// Pass 1: resolve every specifier of the (cached or fresh) facts and open a trace per export.
    fn local_analysis(&mut self, loaded: Vec<LoadedFile>) {
        for file in loaded {
            let mut facts = file.facts;
            if let Some(frontend) = self.registry.for_path(&file.path) {
                frontend.resolve_facts(&mut facts, &self.resolver);
                for export in facts.exports.iter_mut().filter(|e| e.is_re_export) {
                    export.original_source = export
                        .original_source
                        .as_deref()
                        .and_then(|spec| frontend.resolve_import(spec, &file.path, &self.resolver));
                }
            }

            for export in facts.exports.iter().filter(|e| !e.is_star()) {
                self.traces
                    .entry(export.key())
                    .or_insert_with(|| SymbolTrace::new(&export.file_path, &export.name));
            }

            self.contents.insert(file.path.clone(), file.content);
            self.files.insert(
                file.path.clone(),
                FileAnalysis {
                    path: file.path,
                    content_hash: file.content_hash,
                    exports: facts.exports,
                    imports: facts.imports,
                    local_symbols: facts.local_symbols,
                    from_cache: file.from_cache,
                    error: file.error,
                },
            );
        }
        debug!(files = self.files.len(), traces = self.traces.len(), "pass 1: local analysis");
    }

    /// Pass 2: file edges for every resolved import, importers for every named one.
    fn assemble_import_graph(&mut self) {
        for (path, file) in &self.files {
            self.import_graph.entry(path.clone()).or_default();
            for import in &file.imports {
                let Some(target) = import.resolved_path.as_deref() else {
                    continue;
                };
                if target == path {
                    continue;
                }
                self.import_graph
                    .entry(path.clone())
                    .or_default()
                    .insert(target.to_string());
                self.reverse_graph
                    .entry(target.to_string())
                    .or_default()
                    .insert(path.clone());

                if !import.targets_symbol() || import.is_re_export {
                    continue;
                }
                let importer = ImporterRef {
                    file: path.clone(),
                    alias: import.alias.clone(),
                    line: import.line,
                };
                let key = symbol_key(target, &import.name);
                match self.traces.get_mut(&key) {
                    Some(trace) => trace.add_importer(importer),
                    None => self.pending.entry(key).or_default().push(importer),
                }
            }
        }
        debug!(
            edges = self.import_graph.values().map(BTreeSet::len).sum::<usize>(),
            pending = self.pending.len(),
            "pass 2: import graph"
        );
    }

    /// Pass 3: backfill named re-exports, synthesize star re-exports, record chains.
    fn resolve_re_exports(&mut self) {
        let mut backfills = Vec::new();
        let mut synthesized = Vec::new();
        let mut links = Vec::new();

        let files = &self.files;
        for (path, file) in files {
            let names: BTreeSet<&str> = file
                .exports
                .iter()
                .filter(|e| !e.is_star())
                .map(|e| e.name.as_str())
                .collect();
            let mut star_exports: Vec<Export> = Vec::new();

            for (index, export) in file.exports.iter().enumerate() {
                if !export.is_re_export {
                    continue;
                }
                let Some(source) = export.original_source.as_deref() else {
                    continue;
                };

                if export.is_star() {
                    for name in star_names(files, source) {
                        if names.contains(name.as_str()) || star_exports.iter().any(|e| e.name == name) {
                            continue;
                        }
                        let mut synth = Export::new(&name, ExportKind::Unknown, path, export.line);
                        synth.is_re_export = true;
                        match origin(files, source, &name, 1) {
                            Some(o) => {
                                synth.kind = o.kind;
                                synth.signature = o.signature.clone();
                                synth.original_source = Some(o.file_path.clone());
                                synth.original_name = Some(o.name.clone());
                            }
                            None => {
                                synth.original_source = Some(source.to_string());
                                synth.original_name = Some(name.clone());
                            }
                        }
                        links.push((symbol_key(source, &name), synth.key()));
                        star_exports.push(synth);
                    }
                } else if export.source_name() == STAR {
                    // `export * as ns from`: the namespace carries every export of the source.
                    for name in star_names(files, source) {
                        links.push((symbol_key(source, &name), export.key()));
                    }
                } else {
                    links.push((symbol_key(source, export.source_name()), export.key()));
                    if let Some(o) = origin(files, source, export.source_name(), 1) {
                        backfills.push(Backfill {
                            file: path.clone(),
                            index,
                            kind: o.kind,
                            signature: o.signature.clone(),
                            origin_file: o.file_path.clone(),
                            origin_name: o.name.clone(),
                        });
                    }
                }
            }
            synthesized.extend(star_exports);
        }

        for b in backfills {
            let Some(export) = self.files.get_mut(&b.file).and_then(|f| f.exports.get_mut(b.index)) else {
                continue;
            };
            export.kind = b.kind;
            if export.signature.is_none() {
                export.signature = b.signature;
            }
            export.original_source = Some(b.origin_file);
            export.original_name = Some(b.origin_name);
        }

        let synthesized_count = synthesized.len();
        for export in synthesized {
            let key = export.key();
            let trace = self
                .traces
                .entry(key.clone())
                .or_insert_with(|| SymbolTrace::new(&export.file_path, &export.name));
            for importer in self.pending.remove(&key).unwrap_or_default() {
                trace.add_importer(importer);
            }
            if let Some(file) = self.files.get_mut(&export.file_path) {
                file.exports.push(export);
            }
        }

        for (source, re_exporter) in links {
            self.re_export_links
                .entry(source)
                .or_default()
                .insert(re_exporter);
        }

        if !self.pending.is_empty() {
            debug!(names = self.pending.len(), "imports of names no file exports");
        }
        debug!(
            synthesized = synthesized_count,
            links = self.re_export_links.len(),
            "pass 3: re-export resolution"
        );
    }

    /// Pass 4: record every reference against the trace it resolves to.
    fn trace_usages(&mut self) {
        let registry = self.registry;
        let contents = &self.contents;
        let per_file: Vec<Vec<(String, Usage)>> = self
            .files
            .par_iter()
            .map(|(path, file)| {
                let Some(frontend) = registry.for_path(path) else {
                    return Vec::new();
                };
                let content = contents.get(path).map(String::as_str).unwrap_or("");
                if content.is_empty() {
                    return Vec::new();
                }
                file_usages(frontend, path, content, file)
            })
            .collect();

        let mut recorded = 0usize;
        for (key, usage) in per_file.into_iter().flatten() {
            if let Some(trace) = self.traces.get_mut(&key) {
                trace.usages.push(usage);
                recorded += 1;
            }
        }
        debug!(usages = recorded, "pass 4: usage tracing");
    }

    /// Pass 5: dependents, usage counts and cycles; freezes the builder.
    fn finish(mut self) -> ProjectAnalysis {
        for trace in self.traces.values_mut() {
            let importers = trace.imported_by.iter().map(|i| i.file.as_str());
            trace.dependents = transitive_dependents(&self.reverse_graph, importers, &trace.file_path);
            trace.usage_count = trace.usages.len();
        }

        let circular_dependencies = find_cycles(&self.import_graph);

        let mut exports: BTreeMap<String, Vec<Export>> = BTreeMap::new();
        for export in self.files.values().flat_map(|f| f.exports.iter()) {
            if !export.is_star() {
                exports
                    .entry(export.name.clone())
                    .or_default()
                    .push(export.clone());
            }
        }

        info!(
            files = self.files.len(),
            exports = self.traces.len(),
            cycles = circular_dependencies.len(),
            "project analysis complete"
        );

        ProjectAnalysis {
            root_dir: self.root_dir,
            files: self.files,
            exports,
            import_graph: self.import_graph,
            reverse_graph: self.reverse_graph,
            symbol_traces: self.traces,
            re_export_links: self.re_export_links,
            circular_dependencies,
        }
    }
}
