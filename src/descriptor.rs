//! Cell Descriptor: the structured result of transpiling one cell.
//!
//! A descriptor is built once per call and never mutated afterwards. All
//! types serialize in camelCase so hosts can consume them as JSON.

use crate::error::SourcePosition;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// DECLARED BINDINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// How a published name may be used by other cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BindingKind {
    /// Ordinary `var`/`let`/`const`/`function`/`class`/`import` publication.
    Immutable,
    /// Declared through the mutable keyword; downstream cells may assign it.
    Mutable,
    /// The synthetic name carrying an expression cell's value.
    Expression,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclaredBinding {
    pub name: String,
    pub kind: BindingKind,
    pub position: SourcePosition,
}

impl DeclaredBinding {
    pub fn is_mutable(&self) -> bool {
        self.kind == BindingKind::Mutable
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FREE REFERENCES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeReference {
    pub name: String,
    /// Every use is a `typeof` operand, so the value may be absent at call time.
    pub optional: bool,
    /// The cell assigns to this name somewhere. Only valid against a mutable producer.
    pub assigned: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// IMPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportKind {
    Static,
    Dynamic,
}

/// One local name introduced by an import.
///
/// `imported` is the exported name, `"default"` for a default import and
/// `"*"` for a namespace import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBinding {
    pub local: String,
    pub imported: String,
}

impl ImportBinding {
    pub fn is_namespace(&self) -> bool {
        self.imported == "*"
    }

    pub fn is_default(&self) -> bool {
        self.imported == "default"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSpec {
    pub specifier: String,
    pub bindings: Vec<ImportBinding>,
    pub kind: ImportKind,
    pub position: SourcePosition,
}

impl ImportSpec {
    pub fn local_names(&self) -> Vec<&str> {
        self.bindings.iter().map(|b| b.local.as_str()).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DESCRIPTOR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellDescriptor {
    pub index: u32,
    pub declared_bindings: Vec<DeclaredBinding>,
    pub free_references: Vec<FreeReference>,
    pub imports: Vec<ImportSpec>,
    pub is_async: bool,
    /// The rewritten statements, without the wrapper or the final return.
    pub body: String,
    /// The complete wrapper expression.
    pub generated_source: String,
}

impl CellDescriptor {
    /// A single synthetic binding means the wrapper returns a bare value
    /// rather than a record.
    pub fn is_expression_cell(&self) -> bool {
        matches!(
            self.declared_bindings.as_slice(),
            [binding] if binding.kind == BindingKind::Expression
        )
    }

    pub fn declared_names(&self) -> impl Iterator<Item = &str> {
        self.declared_bindings.iter().map(|b| b.name.as_str())
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.free_references.iter().map(|r| r.name.as_str())
    }
}
