//! Import Rewriter.
//!
//! Cells are not modules, so module syntax cannot survive into the wrapper.
//! Each static `import` declaration is replaced in place by a `const` binding
//! awaited from the resolver:
//!
//! ```text
//! import {a, b as c} from "m";   →  const {a, b: c} = await __import("m");
//! import d from "m";             →  const {default: d} = await __import("m");
//! import * as ns from "m";       →  const ns = await __import("m");
//! import "m";                    →  await __import("m");
//! ```
//!
//! `import("m")` calls with a literal specifier are recorded as dynamic
//! imports and routed through the same resolver; calls with a computed
//! specifier are left as they are.

use crate::descriptor::{ImportBinding, ImportKind, ImportSpec};
use crate::error::{SourcePosition, TranspileError};
use crate::options::TranspileOptions;
use crate::parse::{CellAst, ParsedCell};
use crate::rewrite::Replacement;
use oxc_ast::ast::{
    Expression, ImportAttributeKey, ImportDeclaration, ImportDeclarationSpecifier,
    ImportExpression, MetaProperty, ModuleExportName, Statement,
};
use oxc_ast_visit::{walk, Visit};
use oxc_span::Span;

#[derive(Debug, Clone, Default)]
pub struct ImportRewrite {
    /// Static and dynamic imports, in source order.
    pub imports: Vec<ImportSpec>,
    pub replacements: Vec<Replacement>,
}

impl ImportRewrite {
    pub fn has_static(&self) -> bool {
        self.imports.iter().any(|i| i.kind == ImportKind::Static)
    }

    /// Whether any emitted code calls the resolver.
    pub fn uses_resolver(&self) -> bool {
        !self.replacements.is_empty()
    }
}

pub fn rewrite_imports(
    cell: &ParsedCell,
    options: &TranspileOptions,
) -> Result<ImportRewrite, TranspileError> {
    let source = cell.source;
    let mut rewrite = ImportRewrite::default();

    let mut dynamic = DynamicImports::default();
    match &cell.ast {
        CellAst::Expression(expr) => dynamic.visit_expression(expr),
        CellAst::Program(program) => {
            for stmt in &program.body {
                if let Statement::ImportDeclaration(decl) = stmt {
                    let (spec, replacement) =
                        rewrite_static(source, decl, options.effective_resolver())?;
                    rewrite.imports.push(spec);
                    rewrite.replacements.push(replacement);
                }
            }
            dynamic.visit_program(program);
        }
    }

    if let Some((offset, message)) = dynamic.unsupported {
        return Err(TranspileError::unsupported(source, offset, message));
    }

    for site in dynamic.sites {
        let Some(specifier) = site.specifier else {
            continue;
        };
        if options.rewrites_dynamic_imports() {
            rewrite.replacements.push(Replacement::new(
                site.span.start,
                site.span.start + "import".len() as u32,
                options.effective_resolver(),
            ));
        }
        rewrite.imports.push(ImportSpec {
            specifier,
            bindings: Vec::new(),
            kind: ImportKind::Dynamic,
            position: SourcePosition::from_offset(source, site.span.start),
        });
    }

    rewrite.imports.sort_by_key(|spec| spec.position.offset);
    Ok(rewrite)
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATIC IMPORTS
// ═══════════════════════════════════════════════════════════════════════════════

fn rewrite_static(
    source: &str,
    decl: &ImportDeclaration,
    resolver: &str,
) -> Result<(ImportSpec, Replacement), TranspileError> {
    if decl.phase.is_some() {
        return Err(TranspileError::unsupported(
            source,
            decl.span.start,
            "`import source` and `import defer` have no runtime-resolvable form",
        ));
    }

    let specifier = decl.source.value.to_string();
    let mut args = js_string(&specifier);
    if let Some(with_clause) = &decl.with_clause {
        let entries: Vec<String> = with_clause
            .with_entries
            .iter()
            .map(|attr| {
                let key = match &attr.key {
                    ImportAttributeKey::Identifier(id) => id.name.to_string(),
                    ImportAttributeKey::StringLiteral(s) => js_string(&s.value),
                };
                format!("{}: {}", key, js_string(&attr.value.value))
            })
            .collect();
        args.push_str(&format!(", {{with: {{{}}}}}", entries.join(", ")));
    }
    let call = format!("await {}({})", resolver, args);

    let mut bindings = Vec::new();
    for specifier in decl.specifiers.iter().flatten() {
        let binding = match specifier {
            ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => ImportBinding {
                local: s.local.name.to_string(),
                imported: "default".to_string(),
            },
            ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => ImportBinding {
                local: s.local.name.to_string(),
                imported: "*".to_string(),
            },
            ImportDeclarationSpecifier::ImportSpecifier(s) => ImportBinding {
                local: s.local.name.to_string(),
                imported: export_name(&s.imported),
            },
        };
        bindings.push(binding);
    }

    let statement = if bindings.is_empty() {
        format!("{};", call)
    } else if let Some(namespace) = bindings.iter().find(|b| b.is_namespace()) {
        // Only a default import can share a declaration with a namespace
        match bindings.iter().find(|b| b.is_default()) {
            Some(default) => format!(
                "const {ns} = {call}; const {{default: {local}}} = {ns};",
                ns = namespace.local,
                call = call,
                local = default.local
            ),
            None => format!("const {} = {};", namespace.local, call),
        }
    } else {
        let properties: Vec<String> = bindings.iter().map(destructure_property).collect();
        format!("const {{{}}} = {};", properties.join(", "), call)
    };

    let spec = ImportSpec {
        specifier,
        bindings,
        kind: ImportKind::Static,
        position: SourcePosition::from_offset(source, decl.span.start),
    };
    Ok((spec, Replacement::new(decl.span.start, decl.span.end, statement)))
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(s) => s.value.to_string(),
    }
}

fn destructure_property(binding: &ImportBinding) -> String {
    if binding.imported == binding.local {
        binding.local.clone()
    } else if is_identifier_name(&binding.imported) {
        format!("{}: {}", binding.imported, binding.local)
    } else {
        format!("{}: {}", js_string(&binding.imported), binding.local)
    }
}

fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// A double-quoted JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// DYNAMIC IMPORTS
// ═══════════════════════════════════════════════════════════════════════════════

struct DynamicSite {
    span: Span,
    /// `None` when the specifier is only known at run time.
    specifier: Option<String>,
}

#[derive(Default)]
struct DynamicImports {
    sites: Vec<DynamicSite>,
    unsupported: Option<(u32, &'static str)>,
}

impl<'a> Visit<'a> for DynamicImports {
    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        if expr.phase.is_some() {
            self.unsupported.get_or_insert((
                expr.span.start,
                "`import.source()` and `import.defer()` have no runtime-resolvable form",
            ));
        }
        let specifier = match &expr.source {
            Expression::StringLiteral(s) => Some(s.value.to_string()),
            Expression::TemplateLiteral(t) => t.single_quasi().map(|q| q.to_string()),
            _ => None,
        };
        self.sites.push(DynamicSite {
            span: expr.span,
            specifier,
        });
        walk::walk_import_expression(self, expr);
    }

    fn visit_meta_property(&mut self, meta: &MetaProperty<'a>) {
        if meta.meta.name.as_str() == "import" {
            self.unsupported.get_or_insert((
                meta.span.start,
                "`import.meta` is only available inside modules",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_cell;
    use oxc_allocator::Allocator;

    fn rewrite_source(source: &str) -> Result<ImportRewrite, TranspileError> {
        rewrite_with(source, &TranspileOptions::default())
    }

    fn rewrite_with(source: &str, options: &TranspileOptions) -> Result<ImportRewrite, TranspileError> {
        let allocator = Allocator::default();
        let cell = parse_cell(&allocator, source, options)?;
        rewrite_imports(&cell, options)
    }

    #[test]
    fn test_named_import() {
        let r = rewrite_source(r#"import {foo, bar as baz} from "some-module";"#).unwrap();
        assert_eq!(r.imports.len(), 1);
        assert_eq!(r.imports[0].specifier, "some-module");
        assert_eq!(r.imports[0].kind, ImportKind::Static);
        assert_eq!(r.imports[0].local_names(), vec!["foo", "baz"]);
        assert_eq!(
            r.replacements[0].text,
            r#"const {foo, bar: baz} = await __import("some-module");"#
        );
    }

    #[test]
    fn test_default_and_namespace() {
        let r = rewrite_source("import d from 'a';\nimport * as ns from 'b';").unwrap();
        assert_eq!(r.replacements[0].text, r#"const {default: d} = await __import("a");"#);
        assert_eq!(r.replacements[1].text, r#"const ns = await __import("b");"#);
        assert_eq!(r.imports[0].bindings[0].imported, "default");
        assert_eq!(r.imports[1].bindings[0].imported, "*");
    }

    #[test]
    fn test_default_with_namespace() {
        let r = rewrite_source("import d, * as ns from 'm';").unwrap();
        assert_eq!(
            r.replacements[0].text,
            r#"const ns = await __import("m"); const {default: d} = ns;"#
        );
    }

    #[test]
    fn test_side_effect_import() {
        let r = rewrite_source("import './setup.js';").unwrap();
        assert!(r.imports[0].bindings.is_empty());
        assert!(r.has_static());
        assert_eq!(r.replacements[0].text, r#"await __import("./setup.js");"#);
    }

    #[test]
    fn test_string_export_name() {
        let r = rewrite_source(r#"import {"kebab-name" as k} from "m";"#).unwrap();
        assert_eq!(r.replacements[0].text, r#"const {"kebab-name": k} = await __import("m");"#);
    }

    #[test]
    fn test_import_attributes() {
        let r = rewrite_source(r#"import data from "./d.json" with { type: "json" };"#).unwrap();
        assert_eq!(
            r.replacements[0].text,
            r#"const {default: data} = await __import("./d.json", {with: {type: "json"}});"#
        );
    }

    #[test]
    fn test_dynamic_import_recorded_and_routed() {
        let r = rewrite_source("const m = import('lib'); const n = import(name);").unwrap();
        assert_eq!(r.imports.len(), 1);
        assert_eq!(r.imports[0].kind, ImportKind::Dynamic);
        assert_eq!(r.imports[0].specifier, "lib");
        assert!(!r.has_static());
        assert_eq!(r.replacements, vec![Replacement::new(10, 16, "__import")]);
    }

    #[test]
    fn test_native_resolver_leaves_dynamic_imports() {
        let opts = TranspileOptions::default().with_resolver("import");
        let r = rewrite_with("import(`lib`)", &opts).unwrap();
        assert_eq!(r.imports[0].specifier, "lib");
        assert!(r.replacements.is_empty());
    }

    #[test]
    fn test_imports_in_source_order() {
        let r = rewrite_source("const lazy = () => import('late');\nimport x from 'early';").unwrap();
        let order: Vec<&str> = r.imports.iter().map(|i| i.specifier.as_str()).collect();
        assert_eq!(order, vec!["late", "early"]);
    }

    #[test]
    fn test_import_meta_rejected() {
        let err = rewrite_source("const here = import.meta.url;").err().unwrap();
        assert!(matches!(err, TranspileError::UnsupportedSyntax { .. }));
    }
}
