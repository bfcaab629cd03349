//! Transpile configuration.
//!
//! Hosts pass these as camelCase JSON; every field has a default so `{}` is
//! a valid configuration.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_RESOLVER: &str = "__import";
pub const DEFAULT_MUTABLE_KEYWORD: &str = "mutable";

/// Reserved and contextual words that already start JavaScript syntax.
const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for",
    "from", "function", "get", "if", "implements", "import", "in", "instanceof", "interface",
    "let", "new", "null", "of", "package", "private", "protected", "public", "return", "set",
    "static", "super", "switch", "this", "throw", "true", "try", "typeof", "using", "var",
    "void", "while", "with", "yield",
];

lazy_static::lazy_static! {
    /// `name` or `name.member.member`.
    static ref RESOLVER_RE: Regex = Regex::new(
        r"^[\p{XID_Start}_$][\p{XID_Continue}$\x{200C}\x{200D}]*(?:\.[\p{XID_Start}_$][\p{XID_Continue}$\x{200C}\x{200D}]*)*$"
    ).unwrap();

    /// Ambient names a browser cell can rely on without another cell producing them.
    pub static ref DEFAULT_GLOBALS: BTreeSet<&'static str> = {
        let mut s = BTreeSet::new();
        // ECMAScript
        s.insert("Array");
        s.insert("ArrayBuffer");
        s.insert("BigInt");
        s.insert("Boolean");
        s.insert("DataView");
        s.insert("Date");
        s.insert("Error");
        s.insert("Function");
        s.insert("Infinity");
        s.insert("Intl");
        s.insert("JSON");
        s.insert("Map");
        s.insert("Math");
        s.insert("NaN");
        s.insert("Number");
        s.insert("Object");
        s.insert("Promise");
        s.insert("Proxy");
        s.insert("Reflect");
        s.insert("RegExp");
        s.insert("Set");
        s.insert("String");
        s.insert("Symbol");
        s.insert("TypeError");
        s.insert("Uint8Array");
        s.insert("WeakMap");
        s.insert("WeakSet");
        s.insert("decodeURIComponent");
        s.insert("encodeURIComponent");
        s.insert("globalThis");
        s.insert("isFinite");
        s.insert("isNaN");
        s.insert("parseFloat");
        s.insert("parseInt");
        s.insert("undefined");

        // Browser environment
        s.insert("window");
        s.insert("document");
        s.insert("navigator");
        s.insert("location");
        s.insert("console");
        s.insert("fetch");
        s.insert("setTimeout");
        s.insert("clearTimeout");
        s.insert("setInterval");
        s.insert("clearInterval");
        s.insert("requestAnimationFrame");
        s.insert("cancelAnimationFrame");
        s.insert("URL");
        s.insert("URLSearchParams");
        s.insert("Event");
        s.insert("CustomEvent");
        s.insert("HTMLElement");
        s.insert("localStorage");
        s.insert("sessionStorage");
        s
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranspileOptions {
    /// Callee that static imports are awaited through.
    pub resolver: String,
    /// Keyword introducing a mutable top-level binding, `None` to disable.
    pub mutable_keyword: Option<String>,
    /// Names never reported as free references.
    pub globals: BTreeSet<String>,
    pub jsx: bool,
}

impl Default for TranspileOptions {
    fn default() -> Self {
        Self {
            resolver: DEFAULT_RESOLVER.to_string(),
            mutable_keyword: Some(DEFAULT_MUTABLE_KEYWORD.to_string()),
            globals: BTreeSet::new(),
            jsx: false,
        }
    }
}

impl TranspileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_globals(mut self) -> Self {
        self.globals
            .extend(DEFAULT_GLOBALS.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_resolver(mut self, resolver: impl Into<String>) -> Self {
        self.resolver = resolver.into();
        self
    }

    pub fn with_mutable_keyword(mut self, keyword: Option<&str>) -> Self {
        self.mutable_keyword = keyword.map(str::to_string);
        self
    }

    pub fn with_jsx(mut self, jsx: bool) -> Self {
        self.jsx = jsx;
        self
    }

    /// The configured keyword, if it can be rewritten in place.
    ///
    /// Declarations are rewritten to `let` without moving any offsets, so the
    /// keyword has to be an ASCII identifier at least three characters long.
    /// JavaScript keywords are refused: ordinary declarations would match them.
    pub fn effective_mutable_keyword(&self) -> Option<&str> {
        let keyword = self.mutable_keyword.as_deref()?;
        let valid = keyword.len() >= 3
            && keyword
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
            && !keyword.as_bytes()[0].is_ascii_digit()
            && !KEYWORDS.contains(&keyword);
        valid.then_some(keyword)
    }

    /// The resolver callee as emitted into generated code.
    ///
    /// Anything other than an identifier or a dotted member path falls back
    /// to [`DEFAULT_RESOLVER`]. `import` itself is accepted and means the
    /// native dynamic import.
    pub fn effective_resolver(&self) -> &str {
        let resolver = self.resolver.as_str();
        if resolver == "import" {
            return resolver;
        }
        let root = resolver.split('.').next().unwrap_or_default();
        if RESOLVER_RE.is_match(resolver) && !KEYWORDS.contains(&root) {
            resolver
        } else {
            DEFAULT_RESOLVER
        }
    }

    /// Identifier the resolver call depends on in the wrapper's scope.
    pub fn resolver_root(&self) -> &str {
        let resolver = self.effective_resolver();
        resolver.split('.').next().unwrap_or(resolver)
    }

    /// Whether dynamic imports are routed through a resolver other than the
    /// native `import()`.
    pub fn rewrites_dynamic_imports(&self) -> bool {
        self.effective_resolver() != "import"
    }
}
