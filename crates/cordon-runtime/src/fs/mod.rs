//! Module file systems.
//!
//! A [`FileSystem`] turns `(base, id)` pairs into [`CanonicalPath`]s and
//! fetches [`ModuleInfo`] for a canonical path.
//!
//! # Implementations
//!
//! ```text
//! ┌──────────────────────┐
//! │ CompositeFileSystem  │──► tries members in order, remembers the winner
//! └──────────┬───────────┘
//!            │
//!   ┌────────┴─────────┬─────────────────────┐
//!   ▼                  ▼                     ▼
//! LocalFileSystem   MemoryFileSystem   ManifestFileSystem<inner>
//! (one on-disk tree) (pre-fetched)      (stamps principals)
//! ```
//!
//! # Resolution Rule
//!
//! Identifiers starting with `.` resolve against the directory of `base`;
//! every other identifier resolves against the file system's root. The
//! configured extension is appended and `.`/`..` segments are collapsed.
//! Results that leave the root resolve to `None`.

mod composite;
mod local;
mod manifest;
mod memory;

pub use composite::CompositeFileSystem;
pub use local::LocalFileSystem;
pub use manifest::ManifestFileSystem;
pub use memory::MemoryFileSystem;

use cordon_types::{is_relative_id, CanonicalPath, ErrorCode, ModuleInfo};
use std::sync::Arc;
use thiserror::Error;

/// Default module file extension.
pub const DEFAULT_EXTENSION: &str = "lua";

/// Resolves module identifiers and fetches module sources.
///
/// `resolve_module` returning `None` is not an error by itself; the loader
/// reports "not found" only after every composed file system declined.
pub trait FileSystem: Send + Sync {
    /// Resolves `id` relative to `base` (or the root) to a canonical path.
    fn resolve_module(&self, base: Option<&CanonicalPath>, id: &str) -> Option<CanonicalPath>;

    /// Fetches the source for a canonical path this file system produced.
    ///
    /// # Errors
    ///
    /// Returns [`FsError`] if the path is unknown or cannot be read.
    fn get_file(&self, path: &CanonicalPath) -> Result<ModuleInfo, FsError>;
}

impl<T: FileSystem + ?Sized> FileSystem for Arc<T> {
    fn resolve_module(&self, base: Option<&CanonicalPath>, id: &str) -> Option<CanonicalPath> {
        (**self).resolve_module(base, id)
    }

    fn get_file(&self, path: &CanonicalPath) -> Result<ModuleInfo, FsError> {
        (**self).get_file(path)
    }
}

impl<T: FileSystem + ?Sized> FileSystem for Box<T> {
    fn resolve_module(&self, base: Option<&CanonicalPath>, id: &str) -> Option<CanonicalPath> {
        (**self).resolve_module(base, id)
    }

    fn get_file(&self, path: &CanonicalPath) -> Result<ModuleInfo, FsError> {
        (**self).get_file(path)
    }
}

/// File system errors.
#[derive(Debug, Clone, Error)]
pub enum FsError {
    /// The root of a file system is unusable.
    #[error("invalid module root '{path}': {reason}")]
    Root { path: String, reason: String },

    /// Reading a module file failed.
    #[error("failed to read module file '{path}': {source}")]
    Read {
        path: CanonicalPath,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// No member of a composite file system produced this path.
    #[error("no file system resolved '{0}'")]
    Unrouted(CanonicalPath),

    /// The path is not known to this file system.
    #[error("module file '{0}' does not exist")]
    Missing(CanonicalPath),
}

impl FsError {
    /// Creates a root error.
    pub fn root(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Root {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a read error.
    pub fn read(path: CanonicalPath, source: std::io::Error) -> Self {
        Self::Read {
            path,
            source: Arc::new(source),
        }
    }
}

impl ErrorCode for FsError {
    fn code(&self) -> &'static str {
        match self {
            Self::Root { .. } => "FS_ROOT",
            Self::Read { .. } => "FS_READ",
            Self::Unrouted(_) => "FS_UNROUTED",
            Self::Missing(_) => "FS_MISSING",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Read { .. })
    }
}

/// Lexically resolves `id` inside the tree rooted at `root`.
///
/// `root` is a `/`-separated directory path without trailing separator
/// (a lone `/` is accepted). Returns `None` when the normalized result
/// escapes the root.
pub(crate) fn resolve_id(
    root: &str,
    base: Option<&CanonicalPath>,
    id: &str,
    extension: &str,
) -> Option<String> {
    if id.is_empty() {
        return None;
    }

    let start = match base {
        Some(base) if is_relative_id(id) => base.dir().to_string(),
        _ => format!("{}/", root.trim_end_matches('/')),
    };

    let mut joined = format!("{start}{id}");
    if !extension.is_empty() {
        joined.push('.');
        joined.push_str(extension);
    }

    let resolved = normalize(&joined)?;
    let prefix = format!("{}/", root.trim_end_matches('/'));
    resolved.starts_with(&prefix).then_some(resolved)
}

/// Collapses `.`, `..` and empty segments. `None` if `..` climbs past the top.
fn normalize(path: &str) -> Option<String> {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    Some(if absolute { format!("/{joined}") } else { joined })
}
