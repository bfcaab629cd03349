//! # Cell Transpiler
//!
//! Compiles one JavaScript cell into a wrapper function for a reactive
//! runtime. A cell's free identifiers become the wrapper's parameters and
//! its top-level declarations become the record it returns.
//!
//! ## Invariants
//!
//! 1. **Purity**: `transpile(source, index)` depends on nothing else. No
//!    counters, clocks, caches or logging inside the core.
//!
//! 2. **Disjointness**: a name is either published by the cell or free in
//!    it, never both.
//!
//! 3. **Arity**: the wrapper has exactly one parameter per free reference,
//!    in order of first use.
//!
//! 4. **No module syntax**: static imports become awaited resolver calls,
//!    and any static import makes the wrapper `async`.
//!
//! 5. **One producer per name**: duplicate top-level declarations are an
//!    error, never a silent shadow.
//!
//! ## Layers
//!
//! `parse` → (`scope`, `bindings`, `imports`) → `codegen` form the pure
//! core. `document` and `cache` are caller-side helpers built on top of it.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod bindings;
mod cache;
mod codegen;
mod descriptor;
mod document;
mod error;
mod imports;
mod options;
mod parse;
mod rewrite;
mod scope;

#[cfg(test)]
mod scope_tests;

pub use bindings::synthetic_name;
pub use cache::{CacheStats, CellCache};
pub use codegen::{transpile, transpile_with_options};
pub use descriptor::{
    BindingKind, CellDescriptor, DeclaredBinding, FreeReference, ImportBinding, ImportKind,
    ImportSpec,
};
pub use document::{
    transpile_document, CellReport, CompiledDocument, DependencyEdge, DocumentConflict,
    UnresolvedReference,
};
pub use error::{
    CellDiagnostic, SourcePosition, TranspileError, ERR_DUPLICATE_DECLARATION, ERR_PARSE,
    ERR_UNSUPPORTED_SYNTAX,
};
pub use options::{TranspileOptions, DEFAULT_GLOBALS, DEFAULT_RESOLVER};

#[cfg(feature = "napi")]
pub use document::transpile_document_native;

#[cfg(feature = "napi")]
fn options_from_json(options_json: Option<String>) -> napi::Result<TranspileOptions> {
    match options_json {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| napi::Error::from_reason(format!("Invalid transpile options: {}", e))),
        None => Ok(TranspileOptions::default()),
    }
}

/// Transpile one cell for a JS host. Failures reject with the
/// [`CellDiagnostic`] serialized as JSON in the error message.
#[cfg(feature = "napi")]
#[napi]
pub fn transpile_cell_native(
    source: String,
    index: u32,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let options = options_from_json(options_json)?;
    let descriptor = transpile_with_options(&source, index, &options).map_err(|e| {
        let reason = serde_json::to_string(&e.to_diagnostic()).unwrap_or_else(|_| e.to_string());
        napi::Error::from_reason(reason)
    })?;
    serde_json::to_value(&descriptor).map_err(|e| napi::Error::from_reason(e.to_string()))
}
