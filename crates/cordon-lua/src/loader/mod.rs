//! The securable module loader.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── Loader ─────────────────────────────┐
//! │                                                                 │
//! │  require_from(base, id)                                         │
//! │    │                                                            │
//! │    ├─► ExportsOverride ── answered ──────────────┐              │
//! │    │                                             │              │
//! │    ├─► FileSystem::resolve_module ─► ModuleRegistry             │
//! │    │                                   │ cached ─┤              │
//! │    │                                   ▼         │              │
//! │    │   FileSystem::get_file ─► allow_eval        │              │
//! │    │   ContextFactory::create_context            │              │
//! │    │   console, globals, require/define, hook    │              │
//! │    │   module/exports, evaluate                  │              │
//! │    │                                             ▼              │
//! │    └────────────────────────────────────► allow_import ─► value │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Caching
//!
//! Exports are cached per canonical path, so two ids resolving to the same
//! file share one evaluation. A placeholder `exports` table is cached
//! before evaluation starts, which is what a circular `require` observes.
//! A load that fails leaves nothing behind: the next `require` fetches and
//! evaluates the file again.
//!
//! # Locking
//!
//! Registry and loading-stack locks are only held for bookkeeping. Lua
//! code, policy checks and host hooks always run with every lock released,
//! since any of them may re-enter the loader.

mod api;
mod registry;

use crate::console::install_console;
use crate::depscan::ScanSource;
use crate::error::{LoaderError, REASON_EXPORTS_AFTER_DEFINE};
use crate::overrides::{ContextHook, ExportsOverride};
use crate::policy::{ManifestPolicy, SecurityPolicy};
use crate::sandbox::{snapshot_libraries, ContextFactory, Sandbox, SandboxFactory};
use api::ModuleApi;
use cordon_runtime::config::DEFAULT_PARENT_ORIGIN;
use cordon_runtime::fs::{CompositeFileSystem, LocalFileSystem, ManifestFileSystem, DEFAULT_EXTENSION};
use cordon_runtime::{FileSystem, LoaderConfig, Manifest};
use cordon_types::{display_base, CanonicalPath, ModuleInfo, Principal};
use mlua::{Function, IntoLua, Lua, LuaSerdeExt, Table, Value};
use parking_lot::Mutex;
use registry::{ModuleKey, ModuleRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

const SET_EXPORTS: &str = "local module = ...\nreturn function(obj) module.exports = obj return obj end";

/// Construction options for a [`Loader`].
///
/// Either a file system or at least one root path is required.
///
/// # Example
///
/// ```
/// use cordon_lua::{Loader, LoaderOptions};
/// use cordon_runtime::fs::MemoryFileSystem;
///
/// let fs = MemoryFileSystem::new("/pkg").with_module("greet", "exports.text = 'hi'");
/// let loader = Loader::new(LoaderOptions::new().with_file_system(fs)).unwrap();
/// let exports = loader.require("greet").unwrap();
/// assert!(matches!(exports, mlua::Value::Table(_)));
/// ```
pub struct LoaderOptions {
    file_system: Option<Arc<dyn FileSystem>>,
    root_paths: Vec<PathBuf>,
    extension: String,
    context_factory: Option<Arc<dyn ContextFactory>>,
    default_principal: Principal,
    parent_origin: String,
    manifest: Option<Arc<Manifest>>,
    security_policy: Option<Arc<dyn SecurityPolicy>>,
    exports_override: Option<Arc<dyn ExportsOverride>>,
    context_hook: Option<Arc<dyn ContextHook>>,
    globals: Vec<(String, serde_json::Value)>,
    console: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            file_system: None,
            root_paths: Vec::new(),
            extension: DEFAULT_EXTENSION.to_string(),
            context_factory: None,
            default_principal: Principal::Restricted,
            parent_origin: DEFAULT_PARENT_ORIGIN.to_string(),
            manifest: None,
            security_policy: None,
            exports_override: None,
            context_hook: None,
            globals: Vec::new(),
            console: true,
        }
    }
}

impl LoaderOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds options from a layered configuration.
    ///
    /// Loads the configured manifest, if any, and installs a
    /// [`ManifestPolicy`] with the configured enforcement.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Manifest`] if the manifest cannot be read.
    pub fn from_config(config: &LoaderConfig) -> Result<Self, LoaderError> {
        let mut options = Self::new()
            .with_extension(config.extension.clone())
            .with_default_principal(config.default_principal)
            .with_parent_origin(config.parent_origin.clone())
            .with_root_paths(config.root_paths.iter().cloned());

        for (name, value) in &config.globals {
            options = options.with_json_global(name.clone(), value.clone());
        }

        if let Some(path) = &config.manifest {
            let manifest = Arc::new(Manifest::from_file(path)?);
            info!(path = %path.display(), modules = manifest.modules.len(), "Loaded manifest");
            options = options
                .with_manifest(Arc::clone(&manifest))
                .with_security_policy(ManifestPolicy::new(manifest).with_enforcement(config.enforcement));
        }

        Ok(options)
    }

    /// Uses `fs` for resolution, ignoring root paths.
    #[must_use]
    pub fn with_file_system(mut self, fs: impl FileSystem + 'static) -> Self {
        self.file_system = Some(Arc::new(fs));
        self
    }

    /// Adds a directory searched for modules, in order.
    #[must_use]
    pub fn with_root_path(mut self, root: impl Into<PathBuf>) -> Self {
        self.root_paths.push(root.into());
        self
    }

    /// Adds several root directories, in order.
    #[must_use]
    pub fn with_root_paths<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.root_paths.extend(roots.into_iter().map(Into::into));
        self
    }

    /// Module file extension for root paths (default `lua`).
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Replaces the default [`SandboxFactory`].
    #[must_use]
    pub fn with_context_factory(mut self, factory: impl ContextFactory + 'static) -> Self {
        self.context_factory = Some(Arc::new(factory));
        self
    }

    /// Principal for modules that request none.
    #[must_use]
    pub fn with_default_principal(mut self, principal: Principal) -> Self {
        self.default_principal = principal;
        self
    }

    /// Diagnostic parent reported by elevated contexts.
    #[must_use]
    pub fn with_parent_origin(mut self, origin: impl Into<String>) -> Self {
        self.parent_origin = origin.into();
        self
    }

    /// Elevates modules the manifest marks as `needs_elevated`.
    #[must_use]
    pub fn with_manifest(mut self, manifest: Arc<Manifest>) -> Self {
        self.manifest = Some(manifest);
        self
    }

    #[must_use]
    pub fn with_security_policy(mut self, policy: impl SecurityPolicy + 'static) -> Self {
        self.security_policy = Some(Arc::new(policy));
        self
    }

    #[must_use]
    pub fn with_exports_override(mut self, hook: impl ExportsOverride + 'static) -> Self {
        self.exports_override = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn with_context_hook(mut self, hook: impl ContextHook + 'static) -> Self {
        self.context_hook = Some(Arc::new(hook));
        self
    }

    /// Injects a JSON value as a global into every context.
    #[must_use]
    pub fn with_json_global(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.globals.push((name.into(), value));
        self
    }

    /// Leaves `console` out of new contexts.
    #[must_use]
    pub fn without_console(mut self) -> Self {
        self.console = false;
        self
    }

    fn build_file_system(&mut self) -> Result<Arc<dyn FileSystem>, LoaderError> {
        let fs: Arc<dyn FileSystem> = match self.file_system.take() {
            Some(fs) => fs,
            None if self.root_paths.is_empty() => return Err(LoaderError::NoFileSystem),
            None => {
                let mut composite = CompositeFileSystem::default();
                for root in &self.root_paths {
                    composite = composite
                        .with_member(LocalFileSystem::new(root)?.with_extension(self.extension.clone()));
                }
                Arc::new(composite)
            }
        };

        Ok(match self.manifest.take() {
            Some(manifest) => Arc::new(ManifestFileSystem::new(fs, manifest)),
            None => fs,
        })
    }
}

/// Options for evaluating a top-level script.
#[derive(Debug, Clone)]
pub struct ScriptOptions {
    contents: String,
    filename: String,
    line: usize,
    principal: Option<Principal>,
}

impl ScriptOptions {
    /// Script text attributed to `<string>` at line 1.
    #[must_use]
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            filename: "<string>".to_string(),
            line: 1,
            principal: None,
        }
    }

    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Line number of the script's first line.
    #[must_use]
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = line.max(1);
        self
    }

    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }
}

impl From<&str> for ScriptOptions {
    fn from(contents: &str) -> Self {
        Self::new(contents)
    }
}

impl From<String> for ScriptOptions {
    fn from(contents: String) -> Self {
        Self::new(contents)
    }
}

pub(crate) struct LoaderInner {
    fs: Arc<dyn FileSystem>,
    factory: Arc<dyn ContextFactory>,
    policy: Option<Arc<dyn SecurityPolicy>>,
    exports_override: Option<Arc<dyn ExportsOverride>>,
    context_hook: Option<Arc<dyn ContextHook>>,
    console: bool,
    globals: Mutex<Vec<(String, Value)>>,
    registry: Mutex<ModuleRegistry>,
    /// Filenames currently being evaluated, outermost first.
    loading: Mutex<Vec<String>>,
    lua: Lua,
}

/// A module loader owning one Lua VM.
///
/// Cloning is cheap and shares the VM and the module cache.
#[derive(Clone)]
pub struct Loader {
    inner: Arc<LoaderInner>,
}

impl Loader {
    /// Creates a loader with a fresh Lua VM.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::NoFileSystem`] without a file system or root
    /// path, or a file system error if a root path is unusable.
    pub fn new(mut options: LoaderOptions) -> Result<Self, LoaderError> {
        let fs = options.build_file_system()?;
        let factory = options.context_factory.take().unwrap_or_else(|| {
            Arc::new(
                SandboxFactory::new()
                    .with_default_principal(options.default_principal)
                    .with_parent_origin(options.parent_origin.clone()),
            )
        });

        let lua = Lua::new();
        snapshot_libraries(&lua)?;
        let mut globals = Vec::with_capacity(options.globals.len());
        for (name, json) in &options.globals {
            globals.push((name.clone(), lua.to_value(json)?));
        }

        debug!(
            globals = globals.len(),
            policy = options.security_policy.is_some(),
            "Created loader"
        );

        Ok(Self {
            inner: Arc::new(LoaderInner {
                fs,
                factory,
                policy: options.security_policy,
                exports_override: options.exports_override,
                context_hook: options.context_hook,
                console: options.console,
                globals: Mutex::new(globals),
                registry: Mutex::new(ModuleRegistry::default()),
                loading: Mutex::new(Vec::new()),
                lua,
            }),
        })
    }

    /// The loader's Lua VM.
    #[must_use]
    pub fn lua(&self) -> &Lua {
        &self.inner.lua
    }

    pub(crate) fn file_system(&self) -> &dyn FileSystem {
        &*self.inner.fs
    }

    /// Requires `id` as a top-level module.
    ///
    /// # Errors
    ///
    /// See [`require_from`](Self::require_from).
    pub fn require(&self, id: &str) -> Result<Value, LoaderError> {
        self.require_from(None, id)
    }

    /// Requires `id` on behalf of the module at `base`.
    ///
    /// # Errors
    ///
    /// - [`LoaderError::NotFound`] if `id` does not resolve
    /// - [`LoaderError::EvalDenied`] / [`LoaderError::ImportDenied`] from the policy
    /// - [`LoaderError::Evaluation`] if the module's source fails
    /// - any error raised by a nested `require` or `define`
    pub fn require_from(&self, base: Option<&CanonicalPath>, id: &str) -> Result<Value, LoaderError> {
        let inner = &self.inner;

        if let Some(hook) = &inner.exports_override {
            if let Some(exports) = hook.module_exports(&inner.lua, base, id)? {
                if !exports.is_nil() {
                    trace!(id, base = %display_base(base), "Exports supplied by override");
                    self.check_import(base, id, None, &exports)?;
                    return Ok(exports);
                }
            }
        }

        let path = inner
            .fs
            .resolve_module(base, id)
            .ok_or_else(|| LoaderError::not_found(id, display_base(base)))?;

        let key = inner.registry.lock().record_access(&path, id);
        let cached = {
            let registry = inner.registry.lock();
            let record = registry.record(key);
            record
                .exports
                .clone()
                .map(|exports| (exports, record.info.clone()))
        };

        let (exports, info) = match cached {
            Some(hit) => {
                trace!(id, path = %path, "Module cache hit");
                hit
            }
            None => match self.load_fresh(key, &path, base, id) {
                Ok(loaded) => loaded,
                Err(err) => {
                    inner.registry.lock().discard(key);
                    debug!(id, path = %path, error = %err, "Module load failed");
                    return Err(err);
                }
            },
        };

        self.check_import(base, id, info.as_ref(), &exports)?;
        Ok(exports)
    }

    fn load_fresh(
        &self,
        key: ModuleKey,
        path: &CanonicalPath,
        base: Option<&CanonicalPath>,
        id: &str,
    ) -> Result<(Value, Option<ModuleInfo>), LoaderError> {
        let inner = &self.inner;
        let lua = &inner.lua;

        let info = inner.fs.get_file(path)?;
        if let Some(policy) = &inner.policy {
            if !policy.allow_eval(self, base, id, &info) {
                warn!(id, base = %display_base(base), "Evaluation denied by security policy");
                return Err(LoaderError::EvalDenied { id: id.to_string() });
            }
        }

        let sandbox = inner.factory.create_context(lua, info.principal)?;
        debug!(
            id,
            path = %path,
            principal = %sandbox.principal(),
            "Loading module"
        );

        let scan = ScanSource::new(info.contents.as_str(), 1, sandbox.chunk_name(&info.filename));
        let api = ModuleApi::new(Arc::downgrade(inner), Some(path.clone()), Some(scan));
        self.populate(&sandbox, &api)?;
        sandbox.define_binding("__url__", path.as_str())?;
        if let Some(hook) = &inner.context_hook {
            hook.on_context(lua, &sandbox, &info)?;
        }

        let (module, placeholder) = module_binding(lua, id)?;
        sandbox.define_binding("module", module.clone())?;
        sandbox.define_binding("exports", placeholder.clone())?;

        {
            let mut registry = inner.registry.lock();
            let record = registry.record_mut(key);
            record.info = Some(info.clone());
            record.context = Some(sandbox.clone());
            record.exports = Some(Value::Table(placeholder.clone()));
        }

        let trace = self.enter(&info.filename);
        let result = sandbox.evaluate(lua, &info.contents, &info.filename, 1);
        self.leave();
        result.map_err(|err| LoaderError::from_evaluation(err, &info.filename, trace))?;

        let assigned: Value = module.raw_get("exports")?;
        let mut registry = inner.registry.lock();
        let record = registry.record_mut(key);
        if assigned != Value::Table(placeholder) {
            if record.define_used {
                return Err(LoaderError::convention_conflict(
                    path.as_str(),
                    REASON_EXPORTS_AFTER_DEFINE,
                ));
            }
            record.exports = Some(assigned);
        }

        Ok((record.exports.clone().unwrap_or(Value::Nil), record.info.clone()))
    }

    /// Installs console, globals and the module API into `sandbox`.
    fn populate(&self, sandbox: &Sandbox, api: &Arc<ModuleApi>) -> Result<(), LoaderError> {
        let lua = &self.inner.lua;
        if self.inner.console {
            install_console(lua, sandbox)?;
        }
        let globals = self.inner.globals.lock().clone();
        for (name, value) in globals {
            sandbox.define_binding(&name, value)?;
        }
        api.install(lua, sandbox)?;
        Ok(())
    }

    fn check_import(
        &self,
        base: Option<&CanonicalPath>,
        id: &str,
        info: Option<&ModuleInfo>,
        exports: &Value,
    ) -> Result<(), LoaderError> {
        if let Some(policy) = &self.inner.policy {
            if !policy.allow_import(self, base, id, info, exports) {
                warn!(id, base = %display_base(base), "Import denied by security policy");
                return Err(LoaderError::ImportDenied { id: id.to_string() });
            }
        }
        Ok(())
    }

    fn enter(&self, filename: &str) -> Vec<String> {
        let mut loading = self.inner.loading.lock();
        loading.push(filename.to_string());
        loading.clone()
    }

    fn leave(&self) {
        self.inner.loading.lock().pop();
    }

    /// Runs `deps` through the AMD loader, then calls `callback` with them.
    ///
    /// Returns the callback's return value.
    ///
    /// # Errors
    ///
    /// Returns the first dependency failure, or the callback's error.
    pub fn require_async(&self, deps: &[&str], callback: Function) -> Result<Value, LoaderError> {
        let lua = &self.inner.lua;
        let api = ModuleApi::new(Arc::downgrade(&self.inner), None, None);
        let deps: Vec<String> = deps.iter().map(|d| (*d).to_string()).collect();
        let exports = lua.create_table()?;
        Ok(api.async_main(lua, self, None, &exports, &deps, Some(callback))?)
    }

    /// Evaluates a top-level script in a fresh context.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Evaluation`] if the script fails, or the
    /// error of a module it requires.
    pub fn run_script(&self, options: impl Into<ScriptOptions>) -> Result<Value, LoaderError> {
        self.run_script_with_sandbox(options).map(|(value, _)| value)
    }

    /// Like [`run_script`](Self::run_script), also returning the script's context.
    ///
    /// # Errors
    ///
    /// See [`run_script`](Self::run_script).
    pub fn run_script_with_sandbox(
        &self,
        options: impl Into<ScriptOptions>,
    ) -> Result<(Value, Sandbox), LoaderError> {
        let options = options.into();
        let lua = &self.inner.lua;

        let sandbox = self.inner.factory.create_context(lua, options.principal)?;
        let scan = ScanSource::new(
            options.contents.as_str(),
            options.line,
            sandbox.chunk_name(&options.filename),
        );
        let api = ModuleApi::new(Arc::downgrade(&self.inner), None, Some(scan));
        self.populate(&sandbox, &api)?;

        let trace = self.enter(&options.filename);
        let result = sandbox.evaluate(lua, &options.contents, &options.filename, options.line);
        self.leave();
        let value =
            result.map_err(|err| LoaderError::from_evaluation(err, &options.filename, trace))?;
        Ok((value, sandbox))
    }

    /// Returns the context a module runs in, loading the module if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::NotFound`] if `id` does not resolve, or any
    /// error from loading it.
    pub fn find_sandbox_for_module(&self, id: &str) -> Result<Sandbox, LoaderError> {
        let path = self
            .inner
            .fs
            .resolve_module(None, id)
            .ok_or_else(|| LoaderError::not_found(id, display_base(None)))?;

        if let Some(sandbox) = self.context_for(&path) {
            return Ok(sandbox);
        }
        self.require(id)?;
        self.context_for(&path)
            .ok_or_else(|| LoaderError::Internal(format!("path not in sandboxes: {path}")))
    }

    /// Adds a global to every context created from now on.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be converted to a Lua value.
    pub fn define_global(&self, name: impl Into<String>, value: impl IntoLua) -> Result<(), LoaderError> {
        let value = value.into_lua(&self.inner.lua)?;
        self.inner.globals.lock().push((name.into(), value));
        Ok(())
    }

    /// Number of times `id` (resolved top-level) has been required.
    #[must_use]
    pub fn access_count(&self, id: &str) -> usize {
        self.top_level_record(id, |record| record.access_count)
            .unwrap_or(0)
    }

    /// Returns `true` if `id` (resolved top-level) has cached exports.
    #[must_use]
    pub fn is_cached(&self, id: &str) -> bool {
        self.top_level_record(id, |record| record.is_cached())
            .unwrap_or(false)
    }

    /// Metadata of a loaded module.
    #[must_use]
    pub fn module_info(&self, id: &str) -> Option<ModuleInfo> {
        self.top_level_record(id, |record| record.info.clone())
            .flatten()
    }

    /// Canonical paths with cached exports, in first-access order.
    #[must_use]
    pub fn cached_paths(&self) -> Vec<CanonicalPath> {
        self.inner.registry.lock().cached_paths()
    }

    fn top_level_record<T>(&self, id: &str, f: impl FnOnce(&registry::ModuleRecord) -> T) -> Option<T> {
        let path = self.inner.fs.resolve_module(None, id)?;
        let registry = self.inner.registry.lock();
        registry.by_path(&path).map(f)
    }

    fn context_for(&self, path: &CanonicalPath) -> Option<Sandbox> {
        self.inner
            .registry
            .lock()
            .by_path(path)
            .and_then(|record| record.context.clone())
    }

    // Bookkeeping used by the module API.

    pub(crate) fn record_id(&self, path: &CanonicalPath) -> Option<String> {
        self.inner
            .registry
            .lock()
            .by_path(path)
            .and_then(|record| record.id.clone())
    }

    /// Marks `define()` as used for `path`, returning the previous flag.
    pub(crate) fn mark_define_used(&self, path: &CanonicalPath) -> bool {
        let mut registry = self.inner.registry.lock();
        let Some(key) = registry.key(path) else {
            return false;
        };
        std::mem::replace(&mut registry.record_mut(key).define_used, true)
    }

    /// The cached exports table for `path`, creating one if needed.
    pub(crate) fn exports_placeholder(
        &self,
        lua: &Lua,
        path: &CanonicalPath,
    ) -> mlua::Result<(Table, Option<String>)> {
        let mut registry = self.inner.registry.lock();
        let key = registry.entry(path);
        let record = registry.record_mut(key);
        if let Some(Value::Table(exports)) = &record.exports {
            return Ok((exports.clone(), record.id.clone()));
        }
        let exports = lua.create_table()?;
        record.exports = Some(Value::Table(exports.clone()));
        Ok((exports, record.id.clone()))
    }

    pub(crate) fn set_exports(&self, path: &CanonicalPath, exports: Value) {
        let mut registry = self.inner.registry.lock();
        let key = registry.entry(path);
        registry.record_mut(key).exports = Some(exports);
    }

    /// Replaces exports with a define factory's return value.
    ///
    /// Refused once another module has observed the placeholder.
    pub(crate) fn replace_exports_from_define(
        &self,
        path: &CanonicalPath,
        name: Option<&str>,
        exports: Value,
    ) -> Result<(), LoaderError> {
        let mut registry = self.inner.registry.lock();
        let key = registry.entry(path);
        let record = registry.record_mut(key);
        if record.access_count > 1 {
            let shown = name.unwrap_or_else(|| record.display_name()).to_string();
            return Err(LoaderError::UnsafeRedefinition { path: shown });
        }
        record.exports = Some(exports);
        Ok(())
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("cached", &self.inner.registry.lock().cached_paths().len())
            .field("policy", &self.inner.policy.is_some())
            .finish_non_exhaustive()
    }
}

/// Builds the `module` table and its placeholder `exports`.
fn module_binding(lua: &Lua, id: &str) -> mlua::Result<(Table, Table)> {
    let placeholder = lua.create_table()?;
    let module = lua.create_table()?;
    module.raw_set("id", id)?;
    module.raw_set("exports", placeholder.clone())?;

    let set_exports: Function = lua
        .load(SET_EXPORTS)
        .set_name("=setExports")
        .call(module.clone())?;
    module.raw_set("setExports", set_exports)?;

    Ok((module, placeholder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cordon_runtime::fs::MemoryFileSystem;

    fn loader(fs: MemoryFileSystem) -> Loader {
        Loader::new(LoaderOptions::new().with_file_system(fs).without_console()).expect("loader")
    }

    #[test]
    fn options_require_a_file_system() {
        let err = Loader::new(LoaderOptions::new()).expect_err("no fs");
        assert!(matches!(err, LoaderError::NoFileSystem));
        assert_eq!(err.to_string(), "need a root path for module filesystem");
    }

    #[test]
    fn set_exports_replaces_exports() {
        let fs = MemoryFileSystem::new("/pkg").with_module("m", "module.setExports('replaced')");
        let loader = loader(fs);
        let value = loader.require("m").expect("require");
        let Value::String(text) = value else {
            panic!("expected string exports");
        };
        assert_eq!(&*text.to_str().expect("utf8"), "replaced");
    }

    #[test]
    fn module_id_is_the_requiring_id() {
        let fs = MemoryFileSystem::new("/pkg").with_module("m", "exports.id = module.id");
        let loader = loader(fs);
        let exports = loader.require("m").expect("require");
        let Value::Table(exports) = exports else {
            panic!("expected table");
        };
        assert_eq!(exports.get::<String>("id").expect("id"), "m");
    }

    #[test]
    fn failed_loads_leave_no_record() {
        let fs = MemoryFileSystem::new("/pkg").with_module("bad", "error('nope')");
        let loader = loader(fs);
        assert!(loader.require("bad").is_err());
        assert!(!loader.is_cached("bad"));
        assert_eq!(loader.access_count("bad"), 0);
        assert!(loader.cached_paths().is_empty());
    }

    #[test]
    fn script_options_defaults() {
        let options = ScriptOptions::from("return 1");
        assert_eq!(options.filename, "<string>");
        assert_eq!(options.line, 1);
        assert!(options.principal.is_none());
        assert_eq!(ScriptOptions::new("x").with_line(0).line, 1);
    }
}
