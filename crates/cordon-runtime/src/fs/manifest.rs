//! Manifest-driven principal assignment.

use super::{FileSystem, FsError};
use crate::manifest::Manifest;
use cordon_types::{CanonicalPath, ModuleInfo, Principal};
use std::sync::Arc;
use tracing::debug;

/// Wraps a file system and marks manifest-elevated modules as [`Principal::Elevated`].
///
/// Modules the manifest does not mark keep whatever principal the inner
/// file system reported.
pub struct ManifestFileSystem<F> {
    inner: F,
    manifest: Arc<Manifest>,
}

impl<F: FileSystem> ManifestFileSystem<F> {
    /// Wraps `inner` with `manifest`.
    pub fn new(inner: F, manifest: Arc<Manifest>) -> Self {
        Self { inner, manifest }
    }

    /// Returns the manifest in use.
    #[must_use]
    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }
}

impl<F: FileSystem> FileSystem for ManifestFileSystem<F> {
    fn resolve_module(&self, base: Option<&CanonicalPath>, id: &str) -> Option<CanonicalPath> {
        self.inner.resolve_module(base, id)
    }

    fn get_file(&self, path: &CanonicalPath) -> Result<ModuleInfo, FsError> {
        let info = self.inner.get_file(path)?;
        if self.manifest.needs_elevated(path) {
            debug!(path = %path, "Manifest requests elevated context");
            return Ok(info.with_principal(Principal::Elevated));
        }
        Ok(info)
    }
}
