//! Path references with lexical shadowing.
//!
//! A path whose first segment is an imported name (or a top-level item of
//! the same file) is a reference unless a `let`, closure parameter, fn
//! parameter, `for` binding or match-arm binding in an enclosing scope
//! declares the same name.

use std::collections::BTreeSet;
use syn::punctuated::Punctuated;
use syn::visit::{self, Visit};
use syn::{Expr, File, Pat, Token};

use crate::lang::{line_context, ReferenceTarget, SymbolReference};
use crate::model::{LocalSymbols, UsageType};

pub(crate) fn collect_references(
    src: &str,
    ast: &File,
    locals: &LocalSymbols,
    same_file: &BTreeSet<String>,
) -> Vec<SymbolReference> {
    let mut visitor = ReferenceVisitor {
        src,
        locals,
        same_file,
        scopes: LexicalScopes::default(),
        out: Vec::new(),
    };
    visitor.visit_file(ast);
    visitor.out
}

/// Identifiers bound by a pattern.
pub(crate) fn pattern_bindings(pat: &Pat, out: &mut Vec<String>) {
    match pat {
        Pat::Ident(p) => {
            out.push(p.ident.to_string());
            if let Some((_, sub)) = &p.subpat {
                pattern_bindings(sub, out);
            }
        }
        Pat::Reference(r) => pattern_bindings(&r.pat, out),
        Pat::Type(t) => pattern_bindings(&t.pat, out),
        Pat::Tuple(t) => t.elems.iter().for_each(|p| pattern_bindings(p, out)),
        Pat::TupleStruct(t) => t.elems.iter().for_each(|p| pattern_bindings(p, out)),
        Pat::Slice(s) => s.elems.iter().for_each(|p| pattern_bindings(p, out)),
        Pat::Or(o) => o.cases.iter().for_each(|p| pattern_bindings(p, out)),
        Pat::Paren(p) => pattern_bindings(&p.pat, out),
        Pat::Struct(s) => s.fields.iter().for_each(|f| pattern_bindings(&f.pat, out)),
        _ => {}
    }
}

/// Names bound in the open lexical scopes of one function body.
#[derive(Debug, Default)]
pub(crate) struct LexicalScopes(Vec<Vec<String>>);

impl LexicalScopes {
    pub(crate) fn is_shadowed(&self, name: &str) -> bool {
        self.0.iter().any(|s| s.iter().any(|n| n == name))
    }

    fn declare(&mut self, pat: &Pat) {
        let mut names = Vec::new();
        pattern_bindings(pat, &mut names);
        if let Some(scope) = self.0.last_mut() {
            scope.extend(names);
        }
    }
}

/// Visitors that track [`LexicalScopes`] through fn parameters, blocks,
/// closures, `for` loops, match arms and `if let`.
///
/// Implementors route the matching `visit_*` methods to the `scoped_*` ones.
pub(crate) trait ScopedVisit<'ast>: Visit<'ast> + Sized {
    fn scopes(&mut self) -> &mut LexicalScopes;

    fn with_scope(&mut self, names: Vec<String>, f: impl FnOnce(&mut Self)) {
        self.scopes().0.push(names);
        f(self);
        self.scopes().0.pop();
    }

    /// A fn item body; fn items do not capture the bindings around them.
    fn scoped_fn_body(&mut self, sig: &'ast syn::Signature, block: &'ast syn::Block) {
        let outer = std::mem::take(self.scopes());
        self.with_scope(fn_param_names(sig), |v| v.visit_block(block));
        *self.scopes() = outer;
    }

    fn scoped_block(&mut self, block: &'ast syn::Block) {
        self.with_scope(Vec::new(), |v| {
            for stmt in &block.stmts {
                match stmt {
                    syn::Stmt::Local(local) => {
                        if let Some(init) = &local.init {
                            v.visit_expr(&init.expr);
                            if let Some((_, diverge)) = &init.diverge {
                                v.visit_expr(diverge);
                            }
                        }
                        if let Pat::Type(t) = &local.pat {
                            v.visit_type(&t.ty);
                        }
                        v.scopes().declare(&local.pat);
                    }
                    other => v.visit_stmt(other),
                }
            }
        });
    }

    fn scoped_closure(&mut self, c: &'ast syn::ExprClosure) {
        let mut names = Vec::new();
        for input in &c.inputs {
            pattern_bindings(input, &mut names);
        }
        self.with_scope(names, |v| v.visit_expr(&c.body));
    }

    fn scoped_for_loop(&mut self, f: &'ast syn::ExprForLoop) {
        self.visit_expr(&f.expr);
        let mut names = Vec::new();
        pattern_bindings(&f.pat, &mut names);
        self.with_scope(names, |v| v.visit_block(&f.body));
    }

    fn scoped_arm(&mut self, arm: &'ast syn::Arm) {
        self.visit_pat(&arm.pat);
        let mut names = Vec::new();
        pattern_bindings(&arm.pat, &mut names);
        self.with_scope(names, |v| {
            if let Some((_, guard)) = &arm.guard {
                v.visit_expr(guard);
            }
            v.visit_expr(&arm.body);
        });
    }

    fn scoped_let(&mut self, l: &'ast syn::ExprLet) {
        self.visit_expr(&l.expr);
        self.visit_pat(&l.pat);
        // `if let` bindings reach the rest of the enclosing block.
        self.scopes().declare(&l.pat);
    }
}

struct ReferenceVisitor<'a> {
    src: &'a str,
    locals: &'a LocalSymbols,
    same_file: &'a BTreeSet<String>,
    scopes: LexicalScopes,
    out: Vec<SymbolReference>,
}

impl ReferenceVisitor<'_> {
    fn record_path(&mut self, path: &syn::Path, usage_type: UsageType) {
        if path.leading_colon.is_some() {
            return;
        }
        let mut segments = path.segments.iter();
        let Some(first) = segments.next() else {
            return;
        };
        let name = first.ident.to_string();
        if self.scopes.is_shadowed(&name) {
            return;
        }
        let member = segments.next().map(|s| s.ident.to_string());
        let target = if self.locals.contains_key(&name) {
            ReferenceTarget::Import { local: name, member }
        } else if self.same_file.contains(&name) {
            ReferenceTarget::SameFile { name }
        } else {
            return;
        };
        let line = first.ident.span().start().line;
        self.out.push(SymbolReference {
            target,
            line,
            context: line_context(self.src, line),
            usage_type,
        });
    }
}

impl<'ast> ScopedVisit<'ast> for ReferenceVisitor<'_> {
    fn scopes(&mut self) -> &mut LexicalScopes {
        &mut self.scopes
    }
}

impl<'ast> Visit<'ast> for ReferenceVisitor<'_> {
    fn visit_item_use(&mut self, _: &'ast syn::ItemUse) {}

    fn visit_item_impl(&mut self, i: &'ast syn::ItemImpl) {
        // The implemented type and trait are not usages of themselves.
        for item in &i.items {
            self.visit_impl_item(item);
        }
    }

    fn visit_signature(&mut self, sig: &'ast syn::Signature) {
        // Parameter types and the return type are visited; the bindings are
        // declared by `visit_block` callers.
        for input in &sig.inputs {
            if let syn::FnArg::Typed(t) = input {
                self.visit_type(&t.ty);
            }
        }
        if let syn::ReturnType::Type(_, ty) = &sig.output {
            self.visit_type(ty);
        }
    }

    fn visit_item_fn(&mut self, f: &'ast syn::ItemFn) {
        self.visit_signature(&f.sig);
        self.scoped_fn_body(&f.sig, &f.block);
    }

    fn visit_impl_item_fn(&mut self, f: &'ast syn::ImplItemFn) {
        self.visit_signature(&f.sig);
        self.scoped_fn_body(&f.sig, &f.block);
    }

    fn visit_trait_item_fn(&mut self, f: &'ast syn::TraitItemFn) {
        self.visit_signature(&f.sig);
        if let Some(block) = &f.default {
            self.scoped_fn_body(&f.sig, block);
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

    fn visit_pat(&mut self, pat: &'ast Pat) {
        match pat {
            Pat::Path(p) => self.record_path(&p.path, UsageType::Reference),
            Pat::TupleStruct(t) => self.record_path(&t.path, UsageType::Reference),
            Pat::Struct(s) => self.record_path(&s.path, UsageType::Reference),
            _ => {}
        }
        visit::visit_pat(self, pat);
    }

    fn visit_expr(&mut self, expr: &'ast Expr) {
        match expr {
            Expr::Call(call) => {
                if let Expr::Path(p) = &*call.func {
                    if p.qself.is_none() {
                        self.record_path(&p.path, UsageType::Call);
                    }
                    for arg in &call.args {
                        self.visit_expr(arg);
                    }
                    return;
                }
            }
            Expr::Path(p) if p.qself.is_none() => {
                self.record_path(&p.path, UsageType::Reference);
                return;
            }
            Expr::Struct(s) if s.qself.is_none() => {
                self.record_path(&s.path, UsageType::Reference);
            }
            _ => {}
        }
        visit::visit_expr(self, expr);
    }

    fn visit_type_path(&mut self, t: &'ast syn::TypePath) {
        if t.qself.is_none() {
            self.record_path(&t.path, UsageType::Type);
        }
        visit::visit_type_path(self, t);
    }

    fn visit_macro(&mut self, mac: &'ast syn::Macro) {
        self.record_path(&mac.path, UsageType::Call);
        for expr in macro_exprs(mac) {
            self.visit_expr(&expr);
        }
    }

    fn visit_path(&mut self, path: &'ast syn::Path) {
        // Only generic arguments; the head is recorded by the callers above.
        for segment in &path.segments {
            self.visit_path_arguments(&segment.arguments);
        }
    }
}

fn fn_param_names(sig: &syn::Signature) -> Vec<String> {
    let mut names = Vec::new();
    for input in &sig.inputs {
        if let syn::FnArg::Typed(t) = input {
            pattern_bindings(&t.pat, &mut names);
        }
    }
    names
}

/// Parse a macro body as comma-separated expressions when it has that shape.
pub(crate) fn macro_exprs(mac: &syn::Macro) -> Vec<Expr> {
    mac.parse_body_with(Punctuated::<Expr, Token![,]>::parse_terminated)
        .map(|args| args.into_iter().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::LanguageParser;
    use crate::lang::RustFrontend;

    fn refs(src: &str, same_file: &[&str]) -> Vec<SymbolReference> {
        let facts = RustFrontend.parse_file("src/lib.rs", src).unwrap();
        let ast = syn::parse_file(src).unwrap();
        let names = same_file.iter().map(|s| s.to_string()).collect();
        collect_references(src, &ast, &facts.local_symbols, &names)
    }

    #[test]
    fn test_calls_types_and_members() {
        let src = "use crate::db::{query, Client};\nfn run(c: &Client) {\n    query(1);\n    let x = Client::new();\n}\n";
        let r = refs(src, &[]);
        assert_eq!(r.len(), 3);
        assert_eq!(r[0].usage_type, UsageType::Type);
        assert_eq!(r[1].usage_type, UsageType::Call);
        assert_eq!(r[1].line, 3);
        assert_eq!(r[1].context, "query(1);");
        assert_eq!(
            r[2].target,
            ReferenceTarget::Import { local: "Client".into(), member: Some("new".into()) }
        );
    }

    #[test]
    fn test_shadowing_by_let_param_and_closure() {
        let src = r#"use crate::util::helper;
fn a(helper: u32) -> u32 { helper + 1 }
fn b() {
    let f = |helper: u32| helper;
    let helper = 3;
    helper;
}
fn c() { helper(); }
"#;
        let r = refs(src, &[]);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].line, 8);
    }

    #[test]
    fn test_let_initializer_sees_outer_binding() {
        let src = "use crate::util::helper;\nfn b() { let helper = helper(); }\n";
        let r = refs(src, &[]);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].usage_type, UsageType::Call);
    }

    #[test]
    fn test_macro_arguments_and_same_file() {
        let src = "use crate::util::fmt_name;\npub const LIMIT: usize = 3;\nfn show() { println!(\"{} {}\", fmt_name(), LIMIT); }\n";
        let r = refs(src, &["LIMIT"]);
        let names: Vec<&str> = r.iter().map(|r| r.local_name()).collect();
        assert_eq!(names, vec!["fmt_name", "LIMIT"]);
    }
}
