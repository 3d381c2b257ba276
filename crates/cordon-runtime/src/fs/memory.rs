//! In-memory module tree.

use super::{resolve_id, FileSystem, FsError, DEFAULT_EXTENSION};
use cordon_types::{CanonicalPath, ModuleInfo, Principal};
use std::collections::HashMap;
use tracing::warn;

/// Pre-fetched module sources laid out under a virtual root.
///
/// Resolution follows the same rule as [`LocalFileSystem`](super::LocalFileSystem),
/// so relative identifiers behave identically. Useful for embedding bundled
/// modules and for tests.
///
/// # Example
///
/// ```
/// use cordon_runtime::fs::{FileSystem, MemoryFileSystem};
///
/// let fs = MemoryFileSystem::new("/pkg")
///     .with_extension("js")
///     .with_module("a/b", "exports.b = 1")
///     .with_module("a/c", "exports.c = 1");
///
/// let b = fs.resolve_module(None, "a/b").unwrap();
/// let c = fs.resolve_module(Some(&b), "./c").unwrap();
/// assert_eq!(c.as_str(), "/pkg/a/c.js");
/// ```
#[derive(Debug, Clone)]
pub struct MemoryFileSystem {
    root: String,
    extension: String,
    files: HashMap<CanonicalPath, ModuleInfo>,
}

impl MemoryFileSystem {
    /// Creates an empty tree under a virtual root such as `/pkg`.
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let root = if root.is_empty() { "/".to_string() } else { root };
        Self {
            root,
            extension: DEFAULT_EXTENSION.to_string(),
            files: HashMap::new(),
        }
    }

    /// Sets the module file extension. Call before adding modules.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Adds a module under its root-relative id.
    #[must_use]
    pub fn with_module(mut self, id: &str, contents: impl Into<String>) -> Self {
        self.insert(id, contents.into(), None);
        self
    }

    /// Adds a module that requests an elevated context.
    #[must_use]
    pub fn with_elevated_module(mut self, id: &str, contents: impl Into<String>) -> Self {
        self.insert(id, contents.into(), Some(Principal::Elevated));
        self
    }

    /// Adds (or replaces) a module, returning its canonical path.
    pub fn insert(
        &mut self,
        id: &str,
        contents: String,
        principal: Option<Principal>,
    ) -> Option<CanonicalPath> {
        let Some(resolved) = resolve_id(&self.root, None, id, &self.extension) else {
            warn!(id, root = %self.root, "Module id escapes memory root, ignored");
            return None;
        };

        let path = CanonicalPath::new(resolved);
        let mut info = ModuleInfo::new(path.clone(), contents);
        info.principal = principal;
        self.files.insert(path.clone(), info);
        Some(path)
    }

    /// Number of modules held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if no module is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileSystem for MemoryFileSystem {
    fn resolve_module(&self, base: Option<&CanonicalPath>, id: &str) -> Option<CanonicalPath> {
        let candidate = CanonicalPath::new(resolve_id(&self.root, base, id, &self.extension)?);
        self.files.contains_key(&candidate).then_some(candidate)
    }

    fn get_file(&self, path: &CanonicalPath) -> Result<ModuleInfo, FsError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| FsError::Missing(path.clone()))
    }
}
