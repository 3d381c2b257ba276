//! Test doubles for hosts embedding the loader.
//!
//! - [`CountingFileSystem`] counts resolution and fetch calls
//! - [`CountingFactory`] counts created contexts
//! - [`OutputCapture`] collects what modules `print`

use crate::error::LoaderError;
use crate::overrides::ContextHook;
use crate::sandbox::{join_display, ContextFactory, Sandbox, SandboxFactory};
use cordon_runtime::{FileSystem, FsError};
use cordon_types::{CanonicalPath, ModuleInfo, Principal};
use mlua::{Lua, MultiValue};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Wraps a file system and counts calls into it.
#[derive(Debug, Default)]
pub struct CountingFileSystem<F> {
    inner: F,
    resolve_calls: AtomicUsize,
    get_file_calls: AtomicUsize,
}

impl<F: FileSystem> CountingFileSystem<F> {
    #[must_use]
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            resolve_calls: AtomicUsize::new(0),
            get_file_calls: AtomicUsize::new(0),
        }
    }

    /// Number of `resolve_module` calls so far.
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_file` calls so far.
    pub fn get_file_calls(&self) -> usize {
        self.get_file_calls.load(Ordering::SeqCst)
    }
}

impl<F: FileSystem> FileSystem for CountingFileSystem<F> {
    fn resolve_module(&self, base: Option<&CanonicalPath>, id: &str) -> Option<CanonicalPath> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve_module(base, id)
    }

    fn get_file(&self, path: &CanonicalPath) -> Result<ModuleInfo, FsError> {
        self.get_file_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_file(path)
    }
}

/// A [`SandboxFactory`] that counts the contexts it creates.
#[derive(Debug, Default)]
pub struct CountingFactory {
    inner: SandboxFactory,
    create_calls: AtomicUsize,
}

impl CountingFactory {
    #[must_use]
    pub fn new(inner: SandboxFactory) -> Self {
        Self {
            inner,
            create_calls: AtomicUsize::new(0),
        }
    }

    /// Number of contexts created so far.
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

impl ContextFactory for CountingFactory {
    fn create_context(&self, lua: &Lua, principal: Option<Principal>) -> Result<Sandbox, LoaderError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.create_context(lua, principal)
    }
}

/// Replaces `print` in every context and records its lines.
#[derive(Debug, Clone, Default)]
pub struct OutputCapture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl OutputCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a capturing `print` in `sandbox`.
    ///
    /// # Errors
    ///
    /// Returns an error if the VM fails to create the function.
    pub fn install(&self, lua: &Lua, sandbox: &Sandbox) -> mlua::Result<()> {
        let lines = Arc::clone(&self.lines);
        let print = lua.create_function(move |_, args: MultiValue| {
            lines.lock().push(join_display(&args));
            Ok(())
        })?;
        sandbox.define_binding("print", print)
    }

    /// Lines printed so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl ContextHook for OutputCapture {
    fn on_context(&self, lua: &Lua, sandbox: &Sandbox, _info: &ModuleInfo) -> mlua::Result<()> {
        self.install(lua, sandbox)
    }
}
