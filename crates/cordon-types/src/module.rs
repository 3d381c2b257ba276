//! Module source metadata.

use crate::{CanonicalPath, Principal};

/// Source text and diagnostic metadata for one canonical path.
///
/// Fetched once per canonical path by a file system and cached by the
/// loader for the lifetime of the module record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Canonical path the info was fetched for.
    pub path: CanonicalPath,
    /// Filename reported in tracebacks. Defaults to the canonical path.
    pub filename: String,
    /// Module source text.
    pub contents: String,
    /// Privilege tier requested by the module, if any.
    ///
    /// `None` lets the context factory apply its default principal.
    pub principal: Option<Principal>,
}

impl ModuleInfo {
    /// Creates info whose filename is the canonical path itself.
    #[must_use]
    pub fn new(path: CanonicalPath, contents: impl Into<String>) -> Self {
        Self {
            filename: path.as_str().to_string(),
            path,
            contents: contents.into(),
            principal: None,
        }
    }

    /// Overrides the diagnostic filename.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Requests a specific principal for the module's context.
    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Returns `true` if the module explicitly asked for elevation.
    #[must_use]
    pub fn needs_elevation(&self) -> bool {
        self.principal.is_some_and(Principal::is_elevated)
    }
}
