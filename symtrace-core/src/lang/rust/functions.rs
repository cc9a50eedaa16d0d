//! Function nodes and call edges for Rust files.
//!
//! Naming inside one file:
//!
//! - free functions: `name`
//! - impl and trait default methods: `Type.method`
//! - functions declared in a function body: `outer.inner`
//! - anything inside an inline `mod m { .. }`: `m::...`

use std::collections::BTreeSet;
use syn::visit::{self, Visit};
use syn::{Expr, File, ImplItem, Item, TraitItem};

use super::path_resolver::{resolve_to_file, ModuleIndex};
use super::text_between;
use super::usage::{macro_exprs, LexicalScopes, ScopedVisit};
use crate::callgraph::{CallEdge, FunctionNode, NodeTable};
use crate::common::{is_importable, ModulePathBuilder};

/// Readable name of an impl's self type.
fn extract_type_name(ty: &syn::Type) -> String {
    match ty {
        syn::Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string())
            .unwrap_or_else(|| "<unknown>".to_string()),
        syn::Type::Reference(r) => extract_type_name(&r.elem),
        _ => "<unknown>".to_string(),
    }
}

/// One function body seen by the walkers.
struct FnSite<'ast> {
    sig: &'ast syn::Signature,
    block: &'ast syn::Block,
}

/// Walks items and tracks the module, impl type and enclosing function.
///
/// Shared by node extraction and call extraction so both agree on ids.
struct FunctionCollector<'a> {
    path: &'a str,
    src: &'a str,
    mod_stack: Vec<String>,
    owner_stack: Vec<String>,
    impl_type: Option<String>,
    results: Vec<FunctionNode>,
    seen: BTreeSet<String>,
}

impl ModulePathBuilder for FunctionCollector<'_> {
    fn current_mod(&self) -> &[String] {
        &self.mod_stack
    }
}

impl<'a> FunctionCollector<'a> {
    fn new(path: &'a str, src: &'a str) -> Self {
        Self {
            path,
            src,
            mod_stack: Vec::new(),
            owner_stack: Vec::new(),
            impl_type: None,
            results: Vec::with_capacity(32),
            seen: BTreeSet::new(),
        }
    }

    fn push_fn(&mut self, site: FnSite<'_>, name: String, is_method: bool, is_exported: bool) {
        let is_nested = !self.owner_stack.is_empty();
        let line = site.sig.ident.span().start().line;
        let end_line = site.block.brace_token.span.close().end().line;

        let mut node = FunctionNode::new(self.path, &name, line, end_line);
        node.is_method = is_method;
        node.is_nested = is_nested;
        node.is_exported = is_exported && !is_nested;
        node.signature = text_between(
            self.src,
            site.sig.fn_token.span.start(),
            site.block.brace_token.span.open().start(),
        );

        if self.seen.insert(node.id.clone()) {
            self.results.push(node);
        }

        self.owner_stack.push(name);
        self.visit_block(site.block);
        self.owner_stack.pop();
    }

    fn node_name(&self, owner: Option<&str>, name: &str) -> String {
        match self.owner_stack.last() {
            // Enclosing function names already carry the module prefix.
            Some(parent) => match owner {
                Some(owner) => format!("{}.{}.{}", parent, owner, name),
                None => format!("{}.{}", parent, name),
            },
            None => self.build_node_name(owner, name),
        }
    }
}

impl<'ast> Visit<'ast> for FunctionCollector<'_> {
    fn visit_item(&mut self, item: &'ast Item) {
        match item {
            Item::Fn(f) => {
                let name = self.node_name(None, &f.sig.ident.to_string());
                let exported = is_importable(&f.vis) && self.mod_stack.is_empty();
                self.push_fn(FnSite { sig: &f.sig, block: &f.block }, name, false, exported);
            }

            Item::Impl(imp) => {
                let type_name = extract_type_name(&imp.self_ty);
                let trait_impl = imp.trait_.is_some();
                let previous = self.impl_type.replace(type_name.clone());
                for impl_item in &imp.items {
                    if let ImplItem::Fn(method) = impl_item {
                        let name = self.node_name(Some(&type_name), &method.sig.ident.to_string());
                        let exported = (trait_impl || is_importable(&method.vis)) && self.mod_stack.is_empty();
                        self.push_fn(FnSite { sig: &method.sig, block: &method.block }, name, true, exported);
                    }
                }
                self.impl_type = previous;
            }

            Item::Trait(tr) => {
                let trait_name = tr.ident.to_string();
                let previous = self.impl_type.replace(trait_name.clone());
                for trait_item in &tr.items {
                    if let TraitItem::Fn(method) = trait_item {
                        if let Some(block) = &method.default {
                            let name = self.node_name(Some(&trait_name), &method.sig.ident.to_string());
                            let exported = is_importable(&tr.vis) && self.mod_stack.is_empty();
                            self.push_fn(FnSite { sig: &method.sig, block }, name, true, exported);
                        }
                    }
                }
                self.impl_type = previous;
            }

            Item::Mod(m) => {
                if let Some((_, items)) = &m.content {
                    self.mod_stack.push(m.ident.to_string());
                    for i in items {
                        self.visit_item(i);
                    }
                    self.mod_stack.pop();
                }
            }

            _ => visit::visit_item(self, item),
        }
    }
}

pub(crate) fn extract_functions(path: &str, src: &str, ast: &File) -> Vec<FunctionNode> {
    let mut collector = FunctionCollector::new(path, src);
    collector.visit_file(ast);
    collector.results
}

/// Walks function bodies and resolves each call against the node table.
///
/// A single-segment callee bound by a local `let`, parameter or pattern is
/// not a call of the function it shadows.
struct CallCollector<'a> {
    path: &'a str,
    table: &'a NodeTable,
    index: ModuleIndex,
    mod_stack: Vec<String>,
    owner_stack: Vec<String>,
    impl_type: Option<String>,
    current: Vec<String>,
    scopes: LexicalScopes,
    edges: Vec<CallEdge>,
}

impl ModulePathBuilder for CallCollector<'_> {
    fn current_mod(&self) -> &[String] {
        &self.mod_stack
    }
}

impl CallCollector<'_> {
    fn node_name(&self, owner: Option<&str>, name: &str) -> String {
        match self.owner_stack.last() {
            Some(parent) => match owner {
                Some(owner) => format!("{}.{}.{}", parent, owner, name),
                None => format!("{}.{}", parent, name),
            },
            None => self.build_node_name(owner, name),
        }
    }

    fn enter<'ast>(&mut self, name: String, sig: &'ast syn::Signature, block: &'ast syn::Block) {
        let id = self.table.id_in(self.path, &name);
        self.owner_stack.push(name);
        if let Some(id) = &id {
            self.current.push(id.clone());
        }
        self.scoped_fn_body(sig, block);
        if id.is_some() {
            self.current.pop();
        }
        self.owner_stack.pop();
    }

    fn record(&mut self, target: Option<String>) {
        if let (Some(from), Some(to)) = (self.current.last(), target) {
            if *from != to {
                self.edges.push(CallEdge::new(from.clone(), to));
            }
        }
    }

    /// A fn item declared in the enclosing body, then one of this file.
    fn local_id(&self, name: &str) -> Option<String> {
        self.owner_stack
            .iter()
            .rev()
            .find_map(|owner| self.table.id_in(self.path, &format!("{}.{}", owner, name)))
            .or_else(|| self.table.id_in(self.path, &self.build_node_name(None, name)))
            .or_else(|| self.table.resolve_local(self.path, name))
    }

    fn resolve_path(&self, path: &syn::Path) -> Option<String> {
        if path.leading_colon.is_some() {
            return None;
        }
        let segments: Vec<String> = path.segments.iter().map(|s| s.ident.to_string()).collect();
        let (first, rest) = segments.split_first()?;

        if rest.is_empty() {
            if self.scopes.is_shadowed(first) {
                return None;
            }
            return self
                .table
                .resolve_imported(self.path, first)
                .or_else(|| self.local_id(first));
        }

        match first.as_str() {
            "Self" => {
                let ty = self.impl_type.as_deref()?;
                self.table.id_in(self.path, &self.build_node_name(Some(ty), &rest.join(".")))
            }
            "crate" | "self" | "super" => {
                let (file, remaining) = resolve_to_file(&segments.join("::"), self.path, &self.index)?;
                self.table.id_in(file, &remaining.join("."))
            }
            _ => {
                if let Some(binding) = self.table.binding(self.path, first) {
                    let source = binding.source.as_deref()?;
                    let name = if binding.is_namespace {
                        rest.join(".")
                    } else {
                        format!("{}.{}", binding.original_name, rest.join("."))
                    };
                    return self.table.id_in(source, &name);
                }
                // `Type::assoc()` for a type of this file, or a path into a child module.
                self.table
                    .id_in(self.path, &self.build_node_name(None, &segments.join(".")))
                    .or_else(|| {
                        let (file, remaining) = resolve_to_file(&segments.join("::"), self.path, &self.index)?;
                        self.table.id_in(file, &remaining.join("."))
                    })
            }
        }
    }
}

impl<'ast> ScopedVisit<'ast> for CallCollector<'_> {
    fn scopes(&mut self) -> &mut LexicalScopes {
        &mut self.scopes
    }
}

impl<'ast> Visit<'ast> for CallCollector<'_> {
    fn visit_item(&mut self, item: &'ast Item) {
        match item {
            Item::Fn(f) => {
                let name = self.node_name(None, &f.sig.ident.to_string());
                self.enter(name, &f.sig, &f.block);
            }
            Item::Impl(imp) => {
                let type_name = extract_type_name(&imp.self_ty);
                let previous = self.impl_type.replace(type_name.clone());
                for impl_item in &imp.items {
                    if let ImplItem::Fn(method) = impl_item {
                        let name = self.node_name(Some(&type_name), &method.sig.ident.to_string());
                        self.enter(name, &method.sig, &method.block);
                    }
                }
                self.impl_type = previous;
            }
            Item::Trait(tr) => {
                let trait_name = tr.ident.to_string();
                let previous = self.impl_type.replace(trait_name.clone());
                for trait_item in &tr.items {
                    if let TraitItem::Fn(method) = trait_item {
                        if let Some(block) = &method.default {
                            let name = self.node_name(Some(&trait_name), &method.sig.ident.to_string());
                            self.enter(name, &method.sig, block);
                        }
                    }
                }
                self.impl_type = previous;
            }
            Item::Mod(m) => {
                if let Some((_, items)) = &m.content {
                    self.mod_stack.push(m.ident.to_string());
                    for i in items {
                        self.visit_item(i);
                    }
                    self.mod_stack.pop();
                }
            }
            _ => visit::visit_item(self, item),
        }
    }

    fn visit_expr(&mut self, expr: &'ast Expr) {
        match expr {
            Expr::Call(call) => {
                if let Expr::Path(p) = &*call.func {
                    if p.qself.is_none() {
                        let target = self.resolve_path(&p.path);
                        self.record(target);
                    }
                }
            }
            Expr::MethodCall(mc) => {
                let method = mc.method.to_string();
                let target = match &*mc.receiver {
                    Expr::Path(p) if p.path.is_ident("self") => self
                        .impl_type
                        .as_deref()
                        .and_then(|ty| self.table.id_in(self.path, &self.build_node_name(Some(ty), &method)))
                        .or_else(|| self.table.resolve_method(self.path, &method)),
                    _ => self.table.resolve_method(self.path, &method),
                };
                self.record(target);
            }
            _ => {}
        }
        visit::visit_expr(self, expr);
    }

    fn visit_macro(&mut self, mac: &'ast syn::Macro) {
        for expr in macro_exprs(mac) {
            self.visit_expr(&expr);
        }
    }

    fn visit_block(&mut self, block: &'ast syn::Block) {
        self.scoped_block(block);
    }

    fn visit_expr_closure(&mut self, c: &'ast syn::ExprClosure) {
        self.scoped_closure(c);
    }

    fn visit_expr_for_loop(&mut self, f: &'ast syn::ExprForLoop) {
        self.scoped_for_loop(f);
    }

    fn visit_arm(&mut self, arm: &'ast syn::Arm) {
        self.scoped_arm(arm);
    }

    fn visit_expr_let(&mut self, l: &'ast syn::ExprLet) {
        self.scoped_let(l);
    }
}

pub(crate) fn extract_calls(path: &str, ast: &File, table: &NodeTable) -> Vec<CallEdge> {
    let mut collector = CallCollector {
        path,
        table,
        index: ModuleIndex::build(table.files()),
        mod_stack: Vec::new(),
        owner_stack: Vec::new(),
        impl_type: None,
        current: Vec::new(),
        scopes: LexicalScopes::default(),
        edges: Vec::new(),
    };
    collector.visit_file(ast);
    let mut edges = collector.edges;
    edges.sort();
    edges.dedup();
    edges
}
