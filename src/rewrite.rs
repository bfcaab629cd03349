//! Span-based source splicing.
//!
//! Rewrites never regenerate code from the AST; they replace byte ranges of
//! the original text so everything outside a rewritten range stays
//! byte-identical.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub start: u32,
    pub end: u32,
    pub text: String,
}

impl Replacement {
    pub fn new(start: u32, end: u32, text: impl Into<String>) -> Self {
        Replacement {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn insert(at: u32, text: impl Into<String>) -> Self {
        Self::new(at, at, text)
    }
}

/// Apply `replacements` to `text`, where `text` starts at `base` in the
/// coordinate space the replacements were recorded in.
///
/// Ranges must not overlap. An insertion and a replacement starting at the
/// same offset are applied insertion first.
pub fn apply(text: &str, base: u32, replacements: &[Replacement]) -> String {
    let mut sorted: Vec<&Replacement> = replacements.iter().collect();
    // Apply back to front so earlier offsets stay valid
    sorted.sort_by(|a, b| b.start.cmp(&a.start).then(b.end.cmp(&a.end)));

    let mut result = text.to_string();
    let mut limit = base as usize + text.len();
    for r in sorted {
        debug_assert!(r.start >= base && r.end as usize <= limit, "overlapping rewrite");
        let start = (r.start - base) as usize;
        let end = (r.end - base) as usize;
        result.replace_range(start..end, &r.text);
        limit = r.start as usize;
    }
    result
}
