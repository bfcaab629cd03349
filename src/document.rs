//! Document-level driver.
//!
//! Transpiles every cell of a document, in parallel, and links the results:
//! each free reference is matched to the cell that publishes it. A failing
//! cell is reported and skipped; the rest of the document still compiles.
//! This is the layer that logs; the transpiler core never does.

#[cfg(feature = "napi")]
use napi_derive::napi;

use crate::cache::CellCache;
use crate::codegen::transpile_with_options;
use crate::descriptor::{BindingKind, CellDescriptor};
use crate::error::CellDiagnostic;
use crate::options::TranspileOptions;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, instrument, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// DOCUMENT IR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellReport {
    pub index: u32,
    pub descriptor: Option<CellDescriptor>,
    pub diagnostic: Option<CellDiagnostic>,
}

/// A cross-cell problem no single transpile call can see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DocumentConflict {
    /// Two cells publish the same name.
    #[serde(rename_all = "camelCase")]
    DuplicateName {
        name: String,
        first_cell: u32,
        second_cell: u32,
    },
    /// A cell assigns a name whose producer did not declare it mutable.
    #[serde(rename_all = "camelCase")]
    ImmutableAssignment {
        name: String,
        cell: u32,
        producer: u32,
    },
}

/// `consumer` reads `name`, which `producer` publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyEdge {
    pub name: String,
    pub producer: u32,
    pub consumer: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedReference {
    pub name: String,
    pub cell: u32,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledDocument {
    pub cells: Vec<CellReport>,
    pub conflicts: Vec<DocumentConflict>,
    pub edges: Vec<DependencyEdge>,
    /// Free references no cell publishes; the runtime must supply them.
    pub unresolved: Vec<UnresolvedReference>,
}

impl CompiledDocument {
    pub fn descriptors(&self) -> impl Iterator<Item = &CellDescriptor> {
        self.cells.iter().filter_map(|c| c.descriptor.as_ref())
    }

    pub fn failed(&self) -> impl Iterator<Item = &CellReport> {
        self.cells.iter().filter(|c| c.diagnostic.is_some())
    }

    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty() && self.failed().next().is_none()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DRIVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Transpile `cells` in document order; a cell's position is its index.
#[instrument(level = "debug", skip_all, fields(cells = cells.len()))]
pub fn transpile_document<S>(
    cells: &[S],
    options: &TranspileOptions,
    cache: Option<&CellCache>,
) -> CompiledDocument
where
    S: AsRef<str> + Sync,
{
    let reports: Vec<CellReport> = cells
        .par_iter()
        .enumerate()
        .map(|(i, source)| compile_cell(i as u32, source.as_ref(), options, cache))
        .collect();

    let mut document = CompiledDocument {
        cells: reports,
        ..CompiledDocument::default()
    };
    link(&mut document);

    for conflict in &document.conflicts {
        warn!(?conflict, "document conflict");
    }
    debug!(
        edges = document.edges.len(),
        unresolved = document.unresolved.len(),
        "document linked"
    );
    document
}

fn compile_cell(
    index: u32,
    source: &str,
    options: &TranspileOptions,
    cache: Option<&CellCache>,
) -> CellReport {
    let started = Instant::now();
    let result = match cache {
        Some(cache) => cache.get_or_transpile(source, index, options),
        None => transpile_with_options(source, index, options),
    };

    match result {
        Ok(descriptor) => {
            debug!(index, elapsed_us = started.elapsed().as_micros() as u64, "cell transpiled");
            CellReport {
                index,
                descriptor: Some(descriptor),
                diagnostic: None,
            }
        }
        Err(err) => {
            warn!(index, code = err.code(), "skipping cell: {}", err);
            CellReport {
                index,
                descriptor: None,
                diagnostic: Some(err.to_diagnostic()),
            }
        }
    }
}

/// Resolve free references against published names, in document order.
fn link(document: &mut CompiledDocument) {
    let mut producers: HashMap<&str, (u32, BindingKind)> = HashMap::new();
    let mut conflicts = Vec::new();

    for descriptor in document.cells.iter().filter_map(|c| c.descriptor.as_ref()) {
        for binding in &descriptor.declared_bindings {
            match producers.get(binding.name.as_str()) {
                Some(&(first_cell, _)) => conflicts.push(DocumentConflict::DuplicateName {
                    name: binding.name.clone(),
                    first_cell,
                    second_cell: descriptor.index,
                }),
                None => {
                    producers.insert(&binding.name, (descriptor.index, binding.kind));
                }
            }
        }
    }

    let mut edges = Vec::new();
    let mut unresolved = Vec::new();
    for descriptor in document.cells.iter().filter_map(|c| c.descriptor.as_ref()) {
        for reference in &descriptor.free_references {
            match producers.get(reference.name.as_str()) {
                Some(&(producer, kind)) => {
                    if reference.assigned && kind != BindingKind::Mutable {
                        conflicts.push(DocumentConflict::ImmutableAssignment {
                            name: reference.name.clone(),
                            cell: descriptor.index,
                            producer,
                        });
                    }
                    edges.push(DependencyEdge {
                        name: reference.name.clone(),
                        producer,
                        consumer: descriptor.index,
                    });
                }
                None => unresolved.push(UnresolvedReference {
                    name: reference.name.clone(),
                    cell: descriptor.index,
                    optional: reference.optional,
                }),
            }
        }
    }

    document.conflicts = conflicts;
    document.edges = edges;
    document.unresolved = unresolved;
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI BRIDGE
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn transpile_document_native(
    cells: Vec<String>,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let options = crate::options_from_json(options_json)?;
    let document = transpile_document(&cells, &options, None);
    serde_json::to_value(&document).map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(cells: &[&str]) -> CompiledDocument {
        transpile_document(cells, &TranspileOptions::default(), None)
    }

    #[test]
    fn test_cells_keep_document_order() {
        let doc = compile(&["let a = 1;", "let b = a + 1;", "a + b"]);
        let indexes: Vec<u32> = doc.cells.iter().map(|c| c.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert!(doc.is_clean());
    }

    #[test]
    fn test_edges_link_consumers_to_producers() {
        let doc = compile(&["let a = 1;", "let b = a + 1;", "a + b"]);
        let edges: Vec<(&str, u32, u32)> = doc
            .edges
            .iter()
            .map(|e| (e.name.as_str(), e.producer, e.consumer))
            .collect();
        assert_eq!(edges, vec![("a", 0, 1), ("a", 0, 2), ("b", 1, 2)]);
        assert!(doc.unresolved.is_empty());
    }

    #[test]
    fn test_expression_cells_can_be_referenced() {
        let doc = compile(&["40 + 2", "__cell_0 / 2"]);
        assert_eq!(doc.edges.len(), 1);
        assert_eq!(doc.edges[0].producer, 0);
    }

    #[test]
    fn test_failing_cell_is_skipped() {
        let doc = compile(&["let a = 1;", "let = ;", "a * 2"]);
        assert_eq!(doc.failed().count(), 1);
        assert_eq!(doc.descriptors().count(), 2);
        let failed = doc.failed().next().unwrap();
        assert_eq!(failed.index, 1);
        assert_eq!(
            failed.diagnostic.as_ref().map(|d| d.code.as_str()),
            Some(crate::error::ERR_PARSE)
        );
        assert!(!doc.is_clean());
    }

    #[test]
    fn test_duplicate_name_across_cells() {
        let doc = compile(&["let a = 1;", "const a = 2;"]);
        assert_eq!(
            doc.conflicts,
            vec![DocumentConflict::DuplicateName {
                name: "a".to_string(),
                first_cell: 0,
                second_cell: 1,
            }]
        );
    }

    #[test]
    fn test_assignment_needs_mutable_producer() {
        let doc = compile(&["mutable n = 0;", "const m = 1;", "n += 1; m = 2;"]);
        assert_eq!(
            doc.conflicts,
            vec![DocumentConflict::ImmutableAssignment {
                name: "m".to_string(),
                cell: 2,
                producer: 1,
            }]
        );
    }

    #[test]
    fn test_unresolved_references() {
        let doc = compile(&["typeof window === 'undefined' ? fallback : window"]);
        let unresolved: Vec<(&str, bool)> = doc
            .unresolved
            .iter()
            .map(|u| (u.name.as_str(), u.optional))
            .collect();
        assert_eq!(unresolved, vec![("window", false), ("fallback", false)]);
    }

    #[test]
    fn test_cache_is_used() {
        let cache = CellCache::new();
        let opts = TranspileOptions::default();
        transpile_document(&["let a = 1;"], &opts, Some(&cache));
        transpile_document(&["let a = 1;"], &opts, Some(&cache));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_serializes_with_type_tags() {
        let doc = compile(&["let a = 1;", "let a = 2;"]);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["conflicts"][0]["type"], "duplicateName");
        assert_eq!(json["conflicts"][0]["firstCell"], 0);
    }
}
