//! Export / import extraction for Rust files.
//!
//! Only the file's top-level items are considered: inline `mod { .. }` blocks
//! are not addressable through the file-based module index.

use syn::spanned::Spanned;
use syn::{File, Item, UseTree};

use super::text_between;
use crate::common::is_importable;
use crate::model::{Export, ExportKind, Import, LocalSymbolBinding, ParsedFile, STAR};

pub(crate) fn extract_facts(path: &str, src: &str, ast: &File) -> ParsedFile {
    let mut facts = ParsedFile::default();

    for item in &ast.items {
        match item {
            Item::Use(u) => {
                let line = u.use_token.span.start().line;
                let ctx = UseContext {
                    path,
                    line,
                    is_pub: is_importable(&u.vis),
                };
                handle_use_tree(&u.tree, &ctx, &mut facts, Vec::new());
            }
            Item::Mod(m) if m.content.is_none() => {
                let line = m.ident.span().start().line;
                facts
                    .imports
                    .push(Import::new(STAR, format!("self::{}", m.ident), path, line));
            }
            _ => {}
        }
    }

    for item in &ast.items {
        if let Some(export) = export_of(path, src, item) {
            facts.exports.push(export);
        }
    }

    facts
}

struct UseContext<'a> {
    path: &'a str,
    line: usize,
    is_pub: bool,
}

fn handle_use_tree(tree: &UseTree, ctx: &UseContext, facts: &mut ParsedFile, mut prefix: Vec<String>) {
    match tree {
        UseTree::Path(p) => {
            prefix.push(p.ident.to_string());
            handle_use_tree(&p.tree, ctx, facts, prefix);
        }
        UseTree::Name(n) => {
            let name = n.ident.to_string();
            record_use(ctx, facts, prefix, name, None);
        }
        UseTree::Rename(r) => {
            let alias = r.rename.to_string();
            record_use(ctx, facts, prefix, r.ident.to_string(), Some(alias));
        }
        UseTree::Group(g) => {
            for t in &g.items {
                handle_use_tree(t, ctx, facts, prefix.clone());
            }
        }
        UseTree::Glob(_) => {
            let source = prefix.join("::");
            let mut import = Import::new(STAR, &source, ctx.path, ctx.line);
            if ctx.is_pub {
                import.is_re_export = true;
                let mut export = Export::new(STAR, ExportKind::Unknown, ctx.path, ctx.line);
                export.is_re_export = true;
                export.original_source = Some(source);
                facts.exports.push(export);
            }
            facts.imports.push(import);
        }
    }
}

fn record_use(ctx: &UseContext, facts: &mut ParsedFile, mut prefix: Vec<String>, name: String, alias: Option<String>) {
    // `use a::b::{self}` names the module `b` itself.
    let name = if name == "self" {
        match prefix.pop() {
            Some(module) => module,
            None => return,
        }
    } else {
        name
    };
    let source = prefix.join("::");
    let local = alias.clone().unwrap_or_else(|| name.clone());

    let mut import = Import::new(&name, &source, ctx.path, ctx.line);
    import.alias = alias.filter(|a| a != &name);

    // `use Trait as _` brings no name into scope.
    if local != "_" {
        facts.local_symbols.insert(
            local.clone(),
            LocalSymbolBinding {
                specifier: source.clone(),
                source: None,
                original_name: name.clone(),
                is_namespace: false,
            },
        );
        if ctx.is_pub {
            let mut export = Export::new(&local, ExportKind::Unknown, ctx.path, ctx.line);
            export.is_re_export = true;
            export.original_source = Some(source);
            export.original_name = Some(name);
            facts.exports.push(export);
        }
    }
    facts.imports.push(import);
}

fn export_of(path: &str, src: &str, item: &Item) -> Option<Export> {
    let (vis, ident, kind) = match item {
        Item::Fn(f) => (&f.vis, &f.sig.ident, ExportKind::Function),
        Item::Struct(s) => (&s.vis, &s.ident, ExportKind::Class),
        Item::Union(u) => (&u.vis, &u.ident, ExportKind::Class),
        Item::Enum(e) => (&e.vis, &e.ident, ExportKind::Enum),
        Item::Trait(t) => (&t.vis, &t.ident, ExportKind::Interface),
        Item::Type(t) => (&t.vis, &t.ident, ExportKind::Type),
        Item::Const(c) => (&c.vis, &c.ident, ExportKind::Const),
        Item::Static(s) => (&s.vis, &s.ident, ExportKind::Variable),
        Item::Mod(m) => (&m.vis, &m.ident, ExportKind::Unknown),
        _ => return None,
    };
    if !is_importable(vis) {
        return None;
    }

    let mut export = Export::new(ident.to_string(), kind, path, ident.span().start().line);
    if let Item::Fn(f) = item {
        export.signature = text_between(src, f.sig.fn_token.span.start(), f.block.brace_token.span.open().start());
    }
    if let Item::Type(t) = item {
        export.signature = text_between(src, t.ty.span().start(), t.semi_token.spans[0].start());
    }
    Some(export)
}
