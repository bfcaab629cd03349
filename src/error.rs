//! Cell diagnostics.
//!
//! Every failure a transpile call can report is a [`TranspileError`]. Hosts
//! that want a flat record (JSON over the N-API bridge, document reports)
//! convert it with [`TranspileError::to_diagnostic`].

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_PARSE: &str = "CELL-ERR-PARSE-001";
pub const ERR_UNSUPPORTED_SYNTAX: &str = "CELL-ERR-SYNTAX-002";
pub const ERR_DUPLICATE_DECLARATION: &str = "CELL-ERR-DUPLICATE-003";

fn get_guarantee(code: &str) -> &'static str {
    match code {
        ERR_PARSE => "Only syntactically valid JavaScript is compiled; no partial output is produced.",
        ERR_UNSUPPORTED_SYNTAX => {
            "Cells publish bindings implicitly and never contain module syntax in their output."
        }
        ERR_DUPLICATE_DECLARATION => "Every published name has exactly one producer.",
        _ => "Unknown diagnostic.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE POSITIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// A location inside a cell's source text.
///
/// `offset` is a UTF-8 byte offset; `line` and `column` are 1-based, with the
/// column counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct SourcePosition {
    pub offset: u32,
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    pub fn from_offset(source: &str, offset: u32) -> Self {
        let mut line = 1;
        let mut column = 1;
        for (i, ch) in source.char_indices() {
            if i as u32 >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        SourcePosition {
            offset: offset.min(source.len() as u32),
            line,
            column,
        }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSPILE ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranspileError {
    #[error("parse error at {position}: {message}")]
    Parse {
        message: String,
        position: SourcePosition,
    },

    #[error("unsupported syntax at {position}: {message}")]
    UnsupportedSyntax {
        message: String,
        position: SourcePosition,
    },

    #[error("duplicate declaration of '{name}' at {second} (first declared at {first})")]
    DuplicateDeclaration {
        name: String,
        first: SourcePosition,
        second: SourcePosition,
    },
}

impl TranspileError {
    pub fn parse(source: &str, offset: u32, message: impl Into<String>) -> Self {
        TranspileError::Parse {
            message: message.into(),
            position: SourcePosition::from_offset(source, offset),
        }
    }

    pub fn unsupported(source: &str, offset: u32, message: impl Into<String>) -> Self {
        TranspileError::UnsupportedSyntax {
            message: message.into(),
            position: SourcePosition::from_offset(source, offset),
        }
    }

    pub fn duplicate(source: &str, name: &str, first: u32, second: u32) -> Self {
        TranspileError::DuplicateDeclaration {
            name: name.to_string(),
            first: SourcePosition::from_offset(source, first),
            second: SourcePosition::from_offset(source, second),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TranspileError::Parse { .. } => ERR_PARSE,
            TranspileError::UnsupportedSyntax { .. } => ERR_UNSUPPORTED_SYNTAX,
            TranspileError::DuplicateDeclaration { .. } => ERR_DUPLICATE_DECLARATION,
        }
    }

    /// Where the caller should point. For duplicates this is the second
    /// declaration, since that is the one that has to go.
    pub fn position(&self) -> SourcePosition {
        match self {
            TranspileError::Parse { position, .. }
            | TranspileError::UnsupportedSyntax { position, .. } => *position,
            TranspileError::DuplicateDeclaration { second, .. } => *second,
        }
    }

    pub fn to_diagnostic(&self) -> CellDiagnostic {
        let position = self.position();
        let (error_type, related, hints) = match self {
            TranspileError::Parse { .. } => ("PARSE_ERROR", None, vec![]),
            TranspileError::UnsupportedSyntax { .. } => (
                "UNSUPPORTED_SYNTAX",
                None,
                vec!["Cells publish their top-level declarations; remove `export` and module-only forms.".to_string()],
            ),
            TranspileError::DuplicateDeclaration { name, first, .. } => (
                "DUPLICATE_DECLARATION",
                Some(*first),
                vec![format!("Rename one of the two declarations of `{}`.", name)],
            ),
        };
        CellDiagnostic {
            code: self.code().to_string(),
            error_type: error_type.to_string(),
            message: self.to_string(),
            guarantee: get_guarantee(self.code()).to_string(),
            offset: position.offset,
            line: position.line,
            column: position.column,
            related,
            hints,
        }
    }
}

/// Flat, serializable form of a [`TranspileError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct CellDiagnostic {
    pub code: String,
    pub error_type: String,
    pub message: String,
    pub guarantee: String,
    pub offset: u32,
    pub line: u32,
    pub column: u32,
    /// The other side of a two-location diagnostic (first declaration of a duplicate).
    pub related: Option<SourcePosition>,
    pub hints: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_from_offset() {
        let src = "let a = 1;\nlet b = 2;";
        let pos = SourcePosition::from_offset(src, 15);
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 5);
        assert_eq!(pos.offset, 15);
    }

    #[test]
    fn test_position_counts_characters() {
        let src = "'é' + x";
        // 'é' is two bytes, so `x` sits at byte 7 but column 7
        let pos = SourcePosition::from_offset(src, 7);
        assert_eq!(pos.line, 1);
        assert_eq!(pos.column, 7);
    }

    #[test]
    fn test_offset_past_end_is_clamped() {
        let pos = SourcePosition::from_offset("ab", 10);
        assert_eq!(pos.offset, 2);
        assert_eq!(pos.column, 3);
    }

    #[test]
    fn test_duplicate_diagnostic_carries_both_positions() {
        let src = "let x = 1; let x = 2;";
        let err = TranspileError::duplicate(src, "x", 4, 15);
        let diag = err.to_diagnostic();
        assert_eq!(diag.code, ERR_DUPLICATE_DECLARATION);
        assert_eq!(diag.offset, 15);
        assert_eq!(diag.related.map(|p| p.offset), Some(4));
        assert!(diag.message.contains("'x'"));
        assert!(!diag.guarantee.is_empty());
    }
}
