//! On-disk module tree.

use super::{resolve_id, FileSystem, FsError, DEFAULT_EXTENSION};
use cordon_types::{CanonicalPath, ModuleInfo};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A single directory tree of module files.
///
/// The root is canonicalized at construction. A root naming a file uses
/// the file's parent directory. Module files are decoded as UTF-8.
///
/// # Example
///
/// ```no_run
/// use cordon_runtime::fs::{FileSystem, LocalFileSystem};
///
/// let fs = LocalFileSystem::new("./lib")?.with_extension("lua");
/// if let Some(path) = fs.resolve_module(None, "util/strings") {
///     let info = fs.get_file(&path)?;
///     println!("{} bytes", info.contents.len());
/// }
/// # Ok::<(), cordon_runtime::fs::FsError>(())
/// ```
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
    root_str: String,
    extension: String,
}

impl LocalFileSystem {
    /// Opens a tree rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Root`] if `root` is empty or does not exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, FsError> {
        let root = root.as_ref();
        if root.as_os_str().is_empty() {
            return Err(FsError::root("", "need a root path for module filesystem"));
        }

        let mut canonical = root
            .canonicalize()
            .map_err(|e| FsError::root(root.display().to_string(), e.to_string()))?;
        if canonical.is_file() {
            if let Some(parent) = canonical.parent() {
                canonical = parent.to_path_buf();
            }
        }

        let root_str = canonical.to_string_lossy().replace('\\', "/");
        debug!(root = %root_str, "Opened local module tree");

        Ok(Self {
            root: canonical,
            root_str,
            extension: DEFAULT_EXTENSION.to_string(),
        })
    }

    /// Sets the module file extension (without the dot).
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Returns the canonical root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owns(&self, path: &CanonicalPath) -> bool {
        let prefix = format!("{}/", self.root_str.trim_end_matches('/'));
        path.as_str().starts_with(&prefix)
    }
}

impl FileSystem for LocalFileSystem {
    fn resolve_module(&self, base: Option<&CanonicalPath>, id: &str) -> Option<CanonicalPath> {
        let candidate = resolve_id(&self.root_str, base, id, &self.extension)?;
        Path::new(&candidate)
            .is_file()
            .then(|| CanonicalPath::new(candidate))
    }

    fn get_file(&self, path: &CanonicalPath) -> Result<ModuleInfo, FsError> {
        if !self.owns(path) {
            return Err(FsError::Missing(path.clone()));
        }

        let contents = std::fs::read_to_string(path.as_str()).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FsError::Missing(path.clone())
            } else {
                FsError::read(path.clone(), e)
            }
        })?;

        Ok(ModuleInfo::new(path.clone(), contents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().expect("create temp dir");
        std::fs::create_dir_all(dir.path().join("a")).expect("mkdir a");
        std::fs::write(dir.path().join("a/b.lua"), "return 'b'").expect("write b");
        std::fs::write(dir.path().join("a/c.lua"), "return 'c'").expect("write c");
        std::fs::write(dir.path().join("top.lua"), "return 'top'").expect("write top");
        dir
    }

    #[test]
    fn resolves_existing_files_only() {
        let dir = tree();
        let fs = LocalFileSystem::new(dir.path()).expect("open tree");

        let path = fs.resolve_module(None, "a/b").expect("a/b resolves");
        assert!(path.as_str().ends_with("/a/b.lua"));
        assert!(fs.resolve_module(None, "a/missing").is_none());
    }

    #[test]
    fn relative_lookup_uses_requiring_module_dir() {
        let dir = tree();
        let fs = LocalFileSystem::new(dir.path()).expect("open tree");

        let b = fs.resolve_module(None, "a/b").expect("a/b resolves");
        let c = fs.resolve_module(Some(&b), "./c").expect("./c resolves");
        assert!(c.as_str().ends_with("/a/c.lua"));
        assert!(fs.resolve_module(Some(&b), "./top").is_none());
        assert!(fs.resolve_module(Some(&b), "../top").is_some());
    }

    #[test]
    fn reads_contents() {
        let dir = tree();
        let fs = LocalFileSystem::new(dir.path()).expect("open tree");

        let path = fs.resolve_module(None, "top").expect("top resolves");
        let info = fs.get_file(&path).expect("read top");
        assert_eq!(info.contents, "return 'top'");
        assert_eq!(info.filename, path.as_str());
        assert!(info.principal.is_none());
    }

    #[test]
    fn file_root_uses_parent_directory() {
        let dir = tree();
        let fs = LocalFileSystem::new(dir.path().join("top.lua")).expect("open via file");
        assert!(fs.resolve_module(None, "a/c").is_some());
    }

    #[test]
    fn missing_root_is_error() {
        let dir = TempDir::new().expect("create temp dir");
        let err = LocalFileSystem::new(dir.path().join("nope")).expect_err("should fail");
        assert!(matches!(err, FsError::Root { .. }));
    }

    #[test]
    fn empty_root_is_error() {
        let err = LocalFileSystem::new("").expect_err("should fail");
        assert!(err.to_string().contains("need a root path"));
    }

    #[test]
    fn custom_extension() {
        let dir = tree();
        std::fs::write(dir.path().join("m.js"), "x").expect("write m.js");
        let fs = LocalFileSystem::new(dir.path())
            .expect("open tree")
            .with_extension(".js");
        assert!(fs.resolve_module(None, "m").is_some());
        assert!(fs.resolve_module(None, "top").is_none());
    }

    #[test]
    fn foreign_paths_are_missing() {
        let dir = tree();
        let fs = LocalFileSystem::new(dir.path()).expect("open tree");
        let err = fs
            .get_file(&CanonicalPath::new("/definitely/not/here.lua"))
            .expect_err("foreign path");
        assert!(matches!(err, FsError::Missing(_)));
    }
}
