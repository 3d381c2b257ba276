//! Best-effort static dependency scan for `define()` factories.
//!
//! `define(function(require, exports, module) ... end)` may omit its
//! dependency list. The list is then inferred from the factory's source
//! text:
//!
//! 1. Recover the factory's text from the unit that defined it, using the
//!    function's `line_defined..=last_line_defined` range.
//! 2. Strip Lua comments.
//! 3. Collect literal `require("x")` / `require 'x'` calls.
//! 4. Prepend the standard dependencies `require, exports, module`,
//!    truncated to the factory's declared parameter count.
//!
//! # False negatives
//!
//! This is pattern matching, not parsing. It misses computed ids
//! (`require(prefix .. "x")`), comments using `--[==[` long brackets, and
//! factories created in a different chunk than the one being evaluated
//! (those get no inferred dependencies at all). Code sharing a line with
//! the factory's first or last line is scanned too.

use mlua::Function;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::trace;

/// Standard dependencies in their fixed order.
pub const STANDARD_DEPENDENCIES: [&str; 3] = ["require", "exports", "module"];

static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)--\[\[.*?\]\]|--[^\n]*").expect("comment pattern is valid"));

static REQUIRE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\brequire\s*\(?\s*["']([^"'\n]+)["']"#).expect("require pattern is valid")
});

static PARAMS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bfunction\b\s*[\w.:]*\s*\(([^)]*)\)").expect("parameter pattern is valid")
});

/// Source text of the unit currently being evaluated.
#[derive(Debug, Clone)]
pub struct ScanSource {
    text: Arc<str>,
    first_line: usize,
    chunk_name: String,
}

impl ScanSource {
    /// Describes `text` evaluated under `chunk_name` starting at `first_line`.
    pub fn new(text: impl Into<Arc<str>>, first_line: usize, chunk_name: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            first_line: first_line.max(1),
            chunk_name: chunk_name.into(),
        }
    }

    /// Returns the lines `first..=last` (absolute line numbers).
    fn lines(&self, first: usize, last: usize) -> Option<String> {
        let start = first.checked_sub(self.first_line)?;
        let end = last.checked_sub(self.first_line)?;
        if end < start {
            return None;
        }
        let lines: Vec<&str> = self.text.lines().skip(start).take(end - start + 1).collect();
        (!lines.is_empty()).then(|| lines.join("\n"))
    }
}

/// Recovers the text of `factory` if it was defined in `source`.
#[must_use]
pub fn factory_text(factory: &Function, source: &ScanSource) -> Option<String> {
    let info = factory.info();
    if info.source.as_deref() != Some(source.chunk_name.as_str()) {
        return None;
    }
    let first = info.line_defined?;
    let last = info.last_line_defined?;
    source.lines(first, last)
}

/// Removes `--` line comments and `--[[ ]]` block comments.
#[must_use]
pub fn strip_comments(text: &str) -> String {
    COMMENT_RE.replace_all(text, "").into_owned()
}

/// Literal `require` ids in order of appearance, duplicates kept.
#[must_use]
pub fn literal_requires(text: &str) -> Vec<String> {
    REQUIRE_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Number of named parameters of the first function in `text`.
///
/// A trailing `...` is not counted.
#[must_use]
pub fn declared_params(text: &str) -> usize {
    PARAMS_RE.captures(text).map_or(0, |caps| {
        caps[1]
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty() && *p != "...")
            .count()
    })
}

/// Infers the dependency list for a factory without an explicit one.
///
/// Returns an empty list when the factory's text cannot be recovered.
#[must_use]
pub fn implicit_dependencies(factory: &Function, source: Option<&ScanSource>) -> Vec<String> {
    let Some(text) = source.and_then(|s| factory_text(factory, s)) else {
        trace!("Factory text unavailable, no implicit dependencies");
        return Vec::new();
    };

    let stripped = strip_comments(&text);
    let standard = declared_params(&stripped).min(STANDARD_DEPENDENCIES.len());

    let mut deps: Vec<String> = STANDARD_DEPENDENCIES[..standard]
        .iter()
        .map(|s| (*s).to_string())
        .collect();
    deps.extend(literal_requires(&stripped));

    trace!(?deps, "Scanned implicit dependencies");
    deps
}
