//! Canonical module paths and module identifier helpers.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Fully resolved, globally unique (per loader) identifier of a module.
///
/// Produced by a file system from a `(base, id)` pair and used as the
/// cache key for module records. Paths use `/` as separator regardless
/// of platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalPath(String);

impl CanonicalPath {
    /// Wraps an already-resolved path.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the directory portion, including the trailing `/`.
    ///
    /// A path without any separator has an empty directory.
    ///
    /// ```
    /// use cordon_types::CanonicalPath;
    ///
    /// assert_eq!(CanonicalPath::new("/pkg/a/b.lua").dir(), "/pkg/a/");
    /// assert_eq!(CanonicalPath::new("beets").dir(), "");
    /// ```
    #[must_use]
    pub fn dir(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..=idx],
            None => "",
        }
    }

    /// Consumes the wrapper and returns the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CanonicalPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CanonicalPath {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CanonicalPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Returns `true` if a module identifier is relative (`./x`, `../x`).
///
/// Relative identifiers resolve against the requiring module's directory;
/// all others resolve against a file system's root.
#[must_use]
pub fn is_relative_id(id: &str) -> bool {
    id.starts_with('.')
}

/// Renders an optional base path the way diagnostics print it.
#[must_use]
pub fn display_base(base: Option<&CanonicalPath>) -> &str {
    base.map_or("null", CanonicalPath::as_str)
}
