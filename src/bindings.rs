//! Binding Collector.
//!
//! Enumerates the names a cell publishes: its top-level `var`, `let`,
//! `const`, `function`, `class` and `import` bindings. A cell that publishes
//! nothing and ends in an expression publishes that value under a synthetic
//! name derived from its index.

use crate::descriptor::{BindingKind, DeclaredBinding};
use crate::error::{SourcePosition, TranspileError};
use crate::parse::{CellAst, ParsedCell};
use crate::scope::bound_names;
use oxc_ast::ast::{ImportDeclarationSpecifier, Statement, VariableDeclarationKind};
use oxc_span::{GetSpan, Span};
use std::collections::HashMap;

/// Name under which an expression cell publishes its value.
pub fn synthetic_name(index: u32) -> String {
    format!("__cell_{}", index)
}

/// The expression an expression cell returns, and the statement holding it
/// up to the end of any empty statements that follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingExpression {
    pub statement: Span,
    pub expression: Span,
}

#[derive(Debug, Clone, Default)]
pub struct CellBindings {
    pub declared: Vec<DeclaredBinding>,
    pub trailing: Option<TrailingExpression>,
}

pub fn collect(cell: &ParsedCell, index: u32) -> Result<CellBindings, TranspileError> {
    let program = match &cell.ast {
        CellAst::Expression(expr) => {
            let span = expr.span();
            return Ok(expression_cell(
                cell.source,
                index,
                TrailingExpression {
                    statement: span,
                    expression: span,
                },
            ));
        }
        CellAst::Program(program) => program,
    };

    let mut collector = Collector::new(cell.source);
    for stmt in &program.body {
        match stmt {
            Statement::VariableDeclaration(decl) => {
                if matches!(
                    decl.kind,
                    VariableDeclarationKind::Using | VariableDeclarationKind::AwaitUsing
                ) {
                    return Err(TranspileError::unsupported(
                        cell.source,
                        decl.span.start,
                        "top-level `using` declarations would be disposed as soon as the cell returns",
                    ));
                }
                let kind = if cell.is_mutable_declaration(decl) {
                    BindingKind::Mutable
                } else {
                    BindingKind::Immutable
                };
                let mut names = Vec::new();
                for declarator in &decl.declarations {
                    bound_names(&declarator.id, &mut names);
                }
                for (name, span) in names {
                    collector.publish(name, span, kind)?;
                }
            }
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    collector.publish(id.name.to_string(), id.span, BindingKind::Immutable)?;
                }
            }
            Statement::ClassDeclaration(class) => {
                if let Some(id) = &class.id {
                    collector.publish(id.name.to_string(), id.span, BindingKind::Immutable)?;
                }
            }
            Statement::ImportDeclaration(import) => {
                for specifier in import.specifiers.iter().flatten() {
                    let local = match specifier {
                        ImportDeclarationSpecifier::ImportSpecifier(s) => &s.local,
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => &s.local,
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => &s.local,
                    };
                    collector.publish(local.name.to_string(), local.span, BindingKind::Immutable)?;
                }
            }
            _ => {}
        }
    }

    if !collector.declared.is_empty() {
        return Ok(CellBindings {
            declared: collector.declared,
            trailing: None,
        });
    }

    let last = program
        .body
        .iter()
        .rev()
        .find(|stmt| !matches!(stmt, Statement::EmptyStatement(_)));
    // Empty statements after the expression are replaced along with it
    let body_end = program.body.last().map(|stmt| stmt.span().end);
    let trailing = match last {
        Some(Statement::ExpressionStatement(stmt)) => Some(TrailingExpression {
            statement: Span::new(stmt.span.start, body_end.unwrap_or(stmt.span.end)),
            expression: stmt.expression.span(),
        }),
        Some(_) => None,
        // A lone string literal parses as a directive
        None => program.directives.last().map(|directive| TrailingExpression {
            statement: Span::new(directive.span.start, body_end.unwrap_or(directive.span.end)),
            expression: directive.expression.span,
        }),
    };

    Ok(match trailing {
        Some(trailing) => expression_cell(cell.source, index, trailing),
        None => CellBindings::default(),
    })
}

fn expression_cell(source: &str, index: u32, trailing: TrailingExpression) -> CellBindings {
    CellBindings {
        declared: vec![DeclaredBinding {
            name: synthetic_name(index),
            kind: BindingKind::Expression,
            position: SourcePosition::from_offset(source, trailing.expression.start),
        }],
        trailing: Some(trailing),
    }
}

struct Collector<'s> {
    source: &'s str,
    declared: Vec<DeclaredBinding>,
    first_seen: HashMap<String, u32>,
}

impl<'s> Collector<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            declared: Vec::new(),
            first_seen: HashMap::new(),
        }
    }

    fn publish(&mut self, name: String, span: Span, kind: BindingKind) -> Result<(), TranspileError> {
        if let Some(&first) = self.first_seen.get(&name) {
            return Err(TranspileError::duplicate(self.source, &name, first, span.start));
        }
        self.first_seen.insert(name.clone(), span.start);
        self.declared.push(DeclaredBinding {
            name,
            kind,
            position: SourcePosition::from_offset(self.source, span.start),
        });
        Ok(())
    }
}
