//! Scope Walker.
//!
//! Resolves every identifier reference in a cell to "bound by one of the
//! cell's own scopes" or "free". Free references become the wrapper's
//! parameters, so a name that is wrongly classified as bound is a missing
//! dependency edge and a name wrongly classified as free is a spurious one.
//!
//! Frames are pushed for function and arrow bodies (plus their parameter
//! lists), class bodies, blocks, `catch` clauses, loop heads and `switch`
//! bodies. Each frame is filled before its contents are visited, which is
//! what makes hoisted functions and `var`s visible to earlier references.

use crate::descriptor::FreeReference;
use crate::parse::{CellAst, ParsedCell};
use oxc_ast::ast::{
    ArrowFunctionExpression, AssignmentTargetPropertyIdentifier, AwaitExpression, BindingPattern,
    BlockStatement, CatchClause, Class, Expression, ForInStatement, ForOfStatement, ForStatement,
    ForStatementInit, ForStatementLeft, FormalParameters, Function, FunctionBody, FunctionType,
    IdentifierReference, ImportDeclarationSpecifier, SimpleAssignmentTarget, Statement,
    StaticBlock, SwitchStatement, UnaryExpression, VariableDeclaration, VariableDeclarationKind,
};
use oxc_ast_visit::{walk, Visit};
use oxc_span::Span;
use oxc_syntax::operator::UnaryOperator;
use oxc_syntax::scope::ScopeFlags;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Names the language provides implicitly; never reported as free.
const IMPLICIT_NAMES: [&str; 2] = ["arguments", "eval"];

/// Outcome of walking one cell.
#[derive(Debug, Clone, Default)]
pub struct ScopeAnalysis {
    /// In order of first use.
    pub free_references: Vec<FreeReference>,
    first_use: Vec<u32>,
    /// `await`, `for await` or `await using` outside any function.
    pub top_level_await: bool,
    /// Every name bound by any scope of the cell, top level included.
    pub bound_names: HashSet<String>,
}

impl ScopeAnalysis {
    pub fn first_use(&self, name: &str) -> Option<u32> {
        self.free_references
            .iter()
            .position(|r| r.name == name)
            .map(|i| self.first_use[i])
    }

    pub fn is_free(&self, name: &str) -> bool {
        self.free_references.iter().any(|r| r.name == name)
    }
}

pub fn analyze(cell: &ParsedCell, globals: &BTreeSet<String>) -> ScopeAnalysis {
    let mut walker = ScopeWalker::new(globals);
    match &cell.ast {
        CellAst::Expression(expr) => walker.visit_expression(expr),
        CellAst::Program(program) => {
            walker.hoist_vars(&program.body);
            walker.declare_lexical(&program.body);
            walker.visit_program(program);
        }
    }
    walker.finish()
}

/// Collect the names a binding pattern introduces, in source order.
pub fn bound_names(pattern: &BindingPattern, out: &mut Vec<(String, Span)>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => out.push((id.name.to_string(), id.span)),
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                bound_names(&prop.value, out);
            }
            if let Some(rest) = &obj.rest {
                bound_names(&rest.argument, out);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for element in arr.elements.iter().flatten() {
                bound_names(element, out);
            }
            if let Some(rest) = &arr.rest {
                bound_names(&rest.argument, out);
            }
        }
        BindingPattern::AssignmentPattern(assign) => bound_names(&assign.left, out),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WALKER
// ═══════════════════════════════════════════════════════════════════════════════

struct ScopeWalker<'g> {
    scope_stack: Vec<HashSet<String>>,
    globals: &'g BTreeSet<String>,
    references: Vec<FreeReference>,
    first_use: Vec<u32>,
    seen: HashMap<String, usize>,
    bound_names: HashSet<String>,
    function_depth: u32,
    top_level_await: bool,
}

impl<'g> ScopeWalker<'g> {
    fn new(globals: &'g BTreeSet<String>) -> Self {
        Self {
            scope_stack: vec![HashSet::new()],
            globals,
            references: Vec::new(),
            first_use: Vec::new(),
            seen: HashMap::new(),
            bound_names: HashSet::new(),
            function_depth: 0,
            top_level_await: false,
        }
    }

    fn finish(self) -> ScopeAnalysis {
        ScopeAnalysis {
            free_references: self.references,
            first_use: self.first_use,
            top_level_await: self.top_level_await,
            bound_names: self.bound_names,
        }
    }

    fn push_scope(&mut self) {
        self.scope_stack.push(HashSet::new());
    }

    fn pop_scope(&mut self) {
        self.scope_stack.pop();
    }

    fn add_local(&mut self, name: &str) {
        self.bound_names.insert(name.to_string());
        if let Some(scope) = self.scope_stack.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn is_local(&self, name: &str) -> bool {
        self.scope_stack.iter().rev().any(|s| s.contains(name))
    }

    fn reference(&mut self, name: &str, span: Span, optional: bool, assigned: bool) {
        if self.is_local(name) || IMPLICIT_NAMES.contains(&name) || self.globals.contains(name) {
            return;
        }
        match self.seen.get(name) {
            Some(&i) => {
                let existing = &mut self.references[i];
                existing.optional &= optional;
                existing.assigned |= assigned;
            }
            None => {
                self.seen.insert(name.to_string(), self.references.len());
                self.references.push(FreeReference {
                    name: name.to_string(),
                    optional,
                    assigned,
                });
                self.first_use.push(span.start);
            }
        }
    }

    fn declare_pattern(&mut self, pattern: &BindingPattern) {
        let mut names = Vec::new();
        bound_names(pattern, &mut names);
        for (name, _) in names {
            self.add_local(&name);
        }
    }

    fn declare_declarators(&mut self, decl: &VariableDeclaration) {
        for declarator in &decl.declarations {
            self.declare_pattern(&declarator.id);
        }
    }

    fn declare_params(&mut self, params: &FormalParameters) {
        for param in &params.items {
            self.declare_pattern(&param.pattern);
        }
        if let Some(rest) = &params.rest {
            self.declare_pattern(&rest.rest.argument);
        }
    }

    /// Block-scoped declarations made directly in `stmts`.
    fn declare_lexical(&mut self, stmts: &[Statement]) {
        for stmt in stmts {
            match stmt {
                Statement::VariableDeclaration(decl) if decl.kind.is_lexical() => {
                    self.declare_declarators(decl);
                }
                Statement::FunctionDeclaration(func) => {
                    if let Some(id) = &func.id {
                        self.add_local(&id.name);
                    }
                }
                Statement::ClassDeclaration(class) => {
                    if let Some(id) = &class.id {
                        self.add_local(&id.name);
                    }
                }
                Statement::ImportDeclaration(import) => {
                    for specifier in import.specifiers.iter().flatten() {
                        let local = match specifier {
                            ImportDeclarationSpecifier::ImportSpecifier(s) => &s.local,
                            ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => &s.local,
                            ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => &s.local,
                        };
                        self.add_local(&local.name);
                    }
                }
                _ => {}
            }
        }
    }

    /// `var` declarations anywhere in `stmts` outside nested functions.
    fn hoist_vars(&mut self, stmts: &[Statement]) {
        let mut hoister = VarHoister::default();
        for stmt in stmts {
            hoister.visit_statement(stmt);
        }
        for name in hoister.names {
            self.add_local(&name);
        }
    }

    fn visit_body(&mut self, body: &FunctionBody<'_>) {
        self.push_scope();
        self.hoist_vars(&body.statements);
        self.declare_lexical(&body.statements);
        self.visit_function_body(body);
        self.pop_scope();
    }
}

impl<'a, 'g> Visit<'a> for ScopeWalker<'g> {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.reference(&ident.name, ident.span, false, false);
    }

    fn visit_unary_expression(&mut self, expr: &UnaryExpression<'a>) {
        if expr.operator == UnaryOperator::Typeof {
            if let Expression::Identifier(ident) = expr.argument.without_parentheses() {
                self.reference(&ident.name, ident.span, true, false);
                return;
            }
        }
        walk::walk_unary_expression(self, expr);
    }

    fn visit_simple_assignment_target(&mut self, target: &SimpleAssignmentTarget<'a>) {
        if let SimpleAssignmentTarget::AssignmentTargetIdentifier(ident) = target {
            self.reference(&ident.name, ident.span, false, true);
            return;
        }
        walk::walk_simple_assignment_target(self, target);
    }

    fn visit_assignment_target_property_identifier(
        &mut self,
        prop: &AssignmentTargetPropertyIdentifier<'a>,
    ) {
        self.reference(&prop.binding.name, prop.binding.span, false, true);
        if let Some(init) = &prop.init {
            self.visit_expression(init);
        }
    }

    fn visit_await_expression(&mut self, expr: &AwaitExpression<'a>) {
        if self.function_depth == 0 {
            self.top_level_await = true;
        }
        walk::walk_await_expression(self, expr);
    }

    fn visit_variable_declaration(&mut self, decl: &VariableDeclaration<'a>) {
        if decl.kind == VariableDeclarationKind::AwaitUsing && self.function_depth == 0 {
            self.top_level_await = true;
        }
        walk::walk_variable_declaration(self, decl);
    }

    fn visit_function(&mut self, func: &Function<'a>, _flags: ScopeFlags) {
        // A named function expression sees its own name; a declaration's
        // name lives in the enclosing scope.
        let named_expression =
            func.r#type == FunctionType::FunctionExpression && func.id.is_some();
        if named_expression {
            self.push_scope();
            if let Some(id) = &func.id {
                self.add_local(&id.name);
            }
        }

        self.function_depth += 1;
        self.push_scope();
        self.declare_params(&func.params);
        self.visit_formal_parameters(&func.params);
        if let Some(body) = &func.body {
            self.visit_body(body);
        }
        self.pop_scope();
        self.function_depth -= 1;

        if named_expression {
            self.pop_scope();
        }
    }

    fn visit_arrow_function_expression(&mut self, arrow: &ArrowFunctionExpression<'a>) {
        self.function_depth += 1;
        self.push_scope();
        self.declare_params(&arrow.params);
        self.visit_formal_parameters(&arrow.params);
        self.visit_body(&arrow.body);
        self.pop_scope();
        self.function_depth -= 1;
    }

    fn visit_class(&mut self, class: &Class<'a>) {
        self.push_scope();
        if let Some(id) = &class.id {
            self.add_local(&id.name);
        }
        walk::walk_class(self, class);
        self.pop_scope();
    }

    fn visit_static_block(&mut self, block: &StaticBlock<'a>) {
        self.function_depth += 1;
        self.push_scope();
        self.hoist_vars(&block.body);
        self.declare_lexical(&block.body);
        for stmt in &block.body {
            self.visit_statement(stmt);
        }
        self.pop_scope();
        self.function_depth -= 1;
    }

    fn visit_block_statement(&mut self, block: &BlockStatement<'a>) {
        self.push_scope();
        self.declare_lexical(&block.body);
        walk::walk_block_statement(self, block);
        self.pop_scope();
    }

    fn visit_catch_clause(&mut self, clause: &CatchClause<'a>) {
        self.push_scope();
        if let Some(param) = &clause.param {
            self.declare_pattern(&param.pattern);
        }
        walk::walk_catch_clause(self, clause);
        self.pop_scope();
    }

    fn visit_for_statement(&mut self, stmt: &ForStatement<'a>) {
        self.push_scope();
        if let Some(ForStatementInit::VariableDeclaration(decl)) = &stmt.init {
            if decl.kind.is_lexical() {
                self.declare_declarators(decl);
            }
        }
        walk::walk_for_statement(self, stmt);
        self.pop_scope();
    }

    fn visit_for_in_statement(&mut self, stmt: &ForInStatement<'a>) {
        self.push_scope();
        if let ForStatementLeft::VariableDeclaration(decl) = &stmt.left {
            if decl.kind.is_lexical() {
                self.declare_declarators(decl);
            }
        }
        walk::walk_for_in_statement(self, stmt);
        self.pop_scope();
    }

    fn visit_for_of_statement(&mut self, stmt: &ForOfStatement<'a>) {
        if stmt.r#await && self.function_depth == 0 {
            self.top_level_await = true;
        }
        self.push_scope();
        if let ForStatementLeft::VariableDeclaration(decl) = &stmt.left {
            if decl.kind.is_lexical() {
                self.declare_declarators(decl);
            }
        }
        walk::walk_for_of_statement(self, stmt);
        self.pop_scope();
    }

    fn visit_switch_statement(&mut self, stmt: &SwitchStatement<'a>) {
        self.visit_expression(&stmt.discriminant);
        self.push_scope();
        for case in &stmt.cases {
            self.declare_lexical(&case.consequent);
        }
        for case in &stmt.cases {
            self.visit_switch_case(case);
        }
        self.pop_scope();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VAR HOISTING
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct VarHoister {
    names: Vec<String>,
}

impl<'a> Visit<'a> for VarHoister {
    fn visit_variable_declaration(&mut self, decl: &VariableDeclaration<'a>) {
        if decl.kind.is_var() {
            let mut names = Vec::new();
            for declarator in &decl.declarations {
                bound_names(&declarator.id, &mut names);
            }
            self.names.extend(names.into_iter().map(|(name, _)| name));
        }
    }

    // `var` never escapes a function or a class static block
    fn visit_function(&mut self, _func: &Function<'a>, _flags: ScopeFlags) {}

    fn visit_arrow_function_expression(&mut self, _arrow: &ArrowFunctionExpression<'a>) {}

    fn visit_class(&mut self, _class: &Class<'a>) {}
}
