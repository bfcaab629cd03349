//! Code Generator.
//!
//! Combines the analyses of one cell into its [`CellDescriptor`]. The
//! generated wrapper is an arrow function whose parameters are the cell's
//! free references in first-use order:
//!
//! ```text
//! async (foo) => {
//! const {bar} = await __import("m");
//! let x = foo(bar);
//! return {bar, x};
//! }
//! ```
//!
//! An expression cell returns its value directly instead of a record.
//! Output depends on nothing but `(source, index, options)`.

use crate::bindings::{self, synthetic_name, CellBindings};
use crate::descriptor::{BindingKind, CellDescriptor};
use crate::error::TranspileError;
use crate::imports::{self, ImportRewrite};
use crate::options::TranspileOptions;
use crate::parse::{parse_cell, CellAst};
use crate::rewrite::{self, Replacement};
use crate::scope::{self, ScopeAnalysis};
use oxc_allocator::Allocator;
use oxc_span::GetSpan;

/// Transpile one cell with the default options.
pub fn transpile(source: &str, index: u32) -> Result<CellDescriptor, TranspileError> {
    transpile_with_options(source, index, &TranspileOptions::default())
}

pub fn transpile_with_options(
    source: &str,
    index: u32,
    options: &TranspileOptions,
) -> Result<CellDescriptor, TranspileError> {
    let allocator = Allocator::default();
    let cell = parse_cell(&allocator, source, options)?;

    let analysis = scope::analyze(&cell, &options.globals);
    let bindings = bindings::collect(&cell, index)?;
    let imports = imports::rewrite_imports(&cell, options)?;

    check_synthetic_name(source, index, &bindings, &analysis)?;
    check_resolver_name(source, options, &imports, &analysis)?;

    let mut replacements = imports.replacements.clone();
    replacements.extend(
        cell.mutable_sites
            .iter()
            .map(|site| Replacement::new(site.start, site.end, "let")),
    );

    let (start, end) = match &cell.ast {
        CellAst::Expression(expr) => (expr.span().start, expr.span().end),
        CellAst::Program(_) => (0, source.len() as u32),
    };
    let text = &source[start as usize..end as usize];
    let body = rewrite::apply(text, start, &replacements);

    let is_async = analysis.top_level_await || imports.has_static();
    let parameters: Vec<&str> = analysis
        .free_references
        .iter()
        .map(|r| r.name.as_str())
        .collect();

    let inner = match bindings.trailing {
        Some(trailing) => {
            replacements.push(Replacement::insert(trailing.expression.start, "return ("));
            replacements.push(Replacement::new(
                trailing.expression.end,
                trailing.statement.end,
                ");",
            ));
            rewrite::apply(text, start, &replacements)
                .trim()
                .to_string()
        }
        None => {
            let statements = body.trim();
            let record = return_record(&bindings);
            if statements.is_empty() {
                record
            } else {
                format!("{}\n{}", statements, record)
            }
        }
    };

    let generated_source = format!(
        "{}({}) => {{\n{}\n}}",
        if is_async { "async " } else { "" },
        parameters.join(", "),
        inner
    );

    Ok(CellDescriptor {
        index,
        declared_bindings: bindings.declared,
        free_references: analysis.free_references,
        imports: imports.imports,
        is_async,
        body,
        generated_source,
    })
}

fn return_record(bindings: &CellBindings) -> String {
    let names: Vec<&str> = bindings
        .declared
        .iter()
        .map(|b| b.name.as_str())
        .collect();
    format!("return {{{}}};", names.join(", "))
}

/// An expression cell cannot read the name it publishes.
fn check_synthetic_name(
    source: &str,
    index: u32,
    bindings: &CellBindings,
    analysis: &ScopeAnalysis,
) -> Result<(), TranspileError> {
    let is_expression = bindings
        .declared
        .iter()
        .any(|b| b.kind == BindingKind::Expression);
    if !is_expression {
        return Ok(());
    }
    let name = synthetic_name(index);
    match analysis.first_use(&name) {
        Some(offset) => Err(TranspileError::unsupported(
            source,
            offset,
            format!("`{}` names this cell's own value and cannot be referenced here", name),
        )),
        None => Ok(()),
    }
}

/// Emitted resolver calls must reach the runtime's resolver, not a cell
/// parameter or a local binding of the same name.
fn check_resolver_name(
    source: &str,
    options: &TranspileOptions,
    imports: &ImportRewrite,
    analysis: &ScopeAnalysis,
) -> Result<(), TranspileError> {
    if !imports.uses_resolver() {
        return Ok(());
    }
    let resolver = options.resolver_root();
    if analysis.is_free(resolver) || analysis.bound_names.contains(resolver) {
        let offset = imports
            .imports
            .first()
            .map(|spec| spec.position.offset)
            .unwrap_or(0);
        return Err(TranspileError::unsupported(
            source,
            offset,
            format!(
                "`{}` is reserved for the import resolver in cells that import modules",
                resolver
            ),
        ));
    }
    Ok(())
}
