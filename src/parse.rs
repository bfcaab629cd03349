//! AST Adapter.
//!
//! Turns cell source into an oxc AST. A cell is tried as a single expression
//! first and falls back to a module program, so top-level `await` and
//! `for await` parse in both shapes. The mutable keyword is masked to `let`
//! before the program parse; masking never moves an offset, so every span in
//! the returned AST points into the caller's source text.

use crate::error::TranspileError;
use crate::options::{TranspileOptions, DEFAULT_MUTABLE_KEYWORD};
use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, Program, Statement, VariableDeclaration, VariableDeclarationKind};
use oxc_ast_visit::{walk, Visit};
use oxc_diagnostics::OxcDiagnostic;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use regex::Regex;
use std::collections::HashSet;

lazy_static::lazy_static! {
    static ref DEFAULT_MUTABLE_RE: Regex = Regex::new(&mutable_pattern(DEFAULT_MUTABLE_KEYWORD)).unwrap();
}

// Same line only: across a newline `mutable\nx = 1` is already valid JS.
fn mutable_pattern(keyword: &str) -> String {
    format!(
        r"{}[ \t]+([\p{{XID_Start}}_$][\p{{XID_Continue}}$\x{{200C}}\x{{200D}}]*)",
        regex::escape(keyword)
    )
}

pub enum CellAst<'a> {
    /// The whole cell is one expression.
    Expression(Expression<'a>),
    Program(Program<'a>),
}

pub struct ParsedCell<'a> {
    pub source: &'a str,
    pub ast: CellAst<'a>,
    /// Keyword spans of top-level mutable declarations, in source order.
    pub mutable_sites: Vec<Span>,
}

impl<'a> ParsedCell<'a> {
    #[cfg(test)]
    pub fn program(&self) -> Option<&Program<'a>> {
        match &self.ast {
            CellAst::Program(program) => Some(program),
            CellAst::Expression(_) => None,
        }
    }

    pub fn is_mutable_declaration(&self, decl: &VariableDeclaration<'a>) -> bool {
        self.mutable_sites
            .iter()
            .any(|site| site.start == decl.span.start)
    }
}

pub fn parse_cell<'a>(
    allocator: &'a Allocator,
    source: &'a str,
    options: &TranspileOptions,
) -> Result<ParsedCell<'a>, TranspileError> {
    let source_type = SourceType::mjs().with_jsx(options.jsx);

    if let Some(expr) = parse_as_expression(allocator, source, source_type) {
        return Ok(ParsedCell {
            source,
            ast: CellAst::Expression(expr),
            mutable_sites: Vec::new(),
        });
    }

    let candidates = match options.effective_mutable_keyword() {
        Some(keyword) => find_mutable_candidates(source, keyword),
        None => Vec::new(),
    };

    if candidates.is_empty() {
        let program = parse_program(allocator, source, source, source_type)?;
        reject_exports(source, &program)?;
        return Ok(ParsedCell {
            source,
            ast: CellAst::Program(program),
            mutable_sites: Vec::new(),
        });
    }

    let masked: &'a str = allocator.alloc_str(&mask_keywords(source, &candidates));
    let mut program = parse_program(allocator, source, masked, source_type)?;

    let top_level: HashSet<u32> = program
        .body
        .iter()
        .filter_map(|stmt| match stmt {
            Statement::VariableDeclaration(decl) if decl.kind == VariableDeclarationKind::Let => {
                Some(decl.span.start)
            }
            _ => None,
        })
        .collect();
    let mut nested = DeclarationStarts::default();
    nested.visit_program(&program);

    let mut confirmed = Vec::new();
    for site in &candidates {
        if top_level.contains(&site.start) {
            confirmed.push(*site);
        } else if nested.starts.contains(&site.start) {
            return Err(TranspileError::unsupported(
                source,
                site.start,
                "mutable declarations are only allowed at the top level of a cell",
            ));
        }
    }

    // A hit inside a string, comment or template was masked too; reparse
    // with only the real declarations masked so literal values are intact.
    if confirmed.len() != candidates.len() {
        let masked: &'a str = allocator.alloc_str(&mask_keywords(source, &confirmed));
        program = parse_program(allocator, source, masked, source_type)?;
    }

    reject_exports(source, &program)?;
    Ok(ParsedCell {
        source,
        ast: CellAst::Program(program),
        mutable_sites: confirmed,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPRESSION-FIRST PARSE
// ═══════════════════════════════════════════════════════════════════════════════

fn parse_as_expression<'a>(
    allocator: &'a Allocator,
    source: &'a str,
    source_type: SourceType,
) -> Option<Expression<'a>> {
    if is_trivia(source) {
        return None;
    }
    let expr = Parser::new(allocator, source, source_type)
        .parse_expression()
        .ok()?;
    // parse_expression stops at the first token it cannot use
    if !is_trivia(source.get(expr.span().end as usize..)?) {
        return None;
    }
    match &expr {
        // `function f() {}` and `class C {}` are declarations in a cell
        Expression::FunctionExpression(func) if func.id.is_some() => None,
        Expression::ClassExpression(class) if class.id.is_some() => None,
        _ => Some(expr),
    }
}

/// True if `text` holds nothing but whitespace and comments.
fn is_trivia(text: &str) -> bool {
    let mut rest = text;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return true;
        }
        if let Some(comment) = rest.strip_prefix("//") {
            match comment.find(['\n', '\r', '\u{2028}', '\u{2029}']) {
                Some(end) => rest = &comment[end..],
                None => return true,
            }
        } else if let Some(comment) = rest.strip_prefix("/*") {
            match comment.find("*/") {
                Some(end) => rest = &comment[end + 2..],
                None => return false,
            }
        } else {
            return false;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROGRAM PARSE
// ═══════════════════════════════════════════════════════════════════════════════

fn parse_program<'a>(
    allocator: &'a Allocator,
    source: &str,
    text: &'a str,
    source_type: SourceType,
) -> Result<Program<'a>, TranspileError> {
    let ret = Parser::new(allocator, text, source_type).parse();
    if let Some(diagnostic) = ret.errors.first() {
        return Err(diagnostic_to_error(source, diagnostic));
    }
    if ret.panicked {
        return Err(TranspileError::parse(source, 0, "Unexpected end of input"));
    }
    Ok(ret.program)
}

fn diagnostic_to_error(source: &str, diagnostic: &OxcDiagnostic) -> TranspileError {
    let offset = diagnostic
        .labels
        .as_ref()
        .and_then(|labels| labels.first())
        .map(|label| label.offset() as u32)
        .unwrap_or(0);
    TranspileError::parse(source, offset, diagnostic.message.to_string())
}

fn reject_exports(source: &str, program: &Program) -> Result<(), TranspileError> {
    for stmt in &program.body {
        let span = match stmt {
            Statement::ExportAllDeclaration(decl) => decl.span,
            Statement::ExportDefaultDeclaration(decl) => decl.span,
            Statement::ExportNamedDeclaration(decl) => decl.span,
            _ => continue,
        };
        return Err(TranspileError::unsupported(
            source,
            span.start,
            "export declarations are not allowed in a cell; top-level declarations are published automatically",
        ));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// MUTABLE KEYWORD
// ═══════════════════════════════════════════════════════════════════════════════

/// Keyword spans that look like `<keyword> <name>`. Some of them may sit in
/// strings or comments; the parse decides.
fn find_mutable_candidates(source: &str, keyword: &str) -> Vec<Span> {
    let custom;
    let re = if keyword == DEFAULT_MUTABLE_KEYWORD {
        &*DEFAULT_MUTABLE_RE
    } else if let Ok(re) = Regex::new(&mutable_pattern(keyword)) {
        custom = re;
        &custom
    } else {
        return Vec::new();
    };

    let mut sites = Vec::new();
    for caps in re.captures_iter(source) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let preceded_by_ident = source[..whole.start()]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.');
        if preceded_by_ident || matches!(name.as_str(), "in" | "of" | "instanceof") {
            continue;
        }
        let start = whole.start() as u32;
        sites.push(Span::new(start, start + keyword.len() as u32));
    }
    sites
}

fn mask_keywords(source: &str, sites: &[Span]) -> String {
    let mut masked = source.to_string();
    for site in sites {
        let width = (site.end - site.start) as usize;
        let replacement = format!("{:<width$}", "let", width = width);
        masked.replace_range(site.start as usize..site.end as usize, &replacement);
    }
    masked
}

#[derive(Default)]
struct DeclarationStarts {
    starts: HashSet<u32>,
}

impl<'a> Visit<'a> for DeclarationStarts {
    fn visit_variable_declaration(&mut self, decl: &VariableDeclaration<'a>) {
        self.starts.insert(decl.span.start);
        walk::walk_variable_declaration(self, decl);
    }
}
