//! `require` and `define` bindings handed to Lua code.
//!
//! Each module context (and each top-level script) gets its own
//! [`ModuleApi`], scoped to the module's canonical path as base. Bindings
//! hold only a weak reference to the loader, so Lua closures never keep
//! the loader (and through it the VM) alive.
//!
//! # Lua Surface
//!
//! ```lua
//! local m = require("id")                    -- synchronous
//! require({"a", "b"}, function(a, b) end)    -- AMD style, runs immediately
//!
//! define(function(require, exports, module) ... end)
//! define("name", {"dep"}, function(dep) return value end)
//! define({ literal = "exports" })
//! ```

use super::{Loader, LoaderInner};
use crate::depscan::{implicit_dependencies, ScanSource};
use crate::error::{LoaderError, REASON_EXPORTS_AND_RETURN};
use crate::sandbox::Sandbox;
use cordon_types::{display_base, CanonicalPath};
use mlua::{Function, Lua, MultiValue, Table, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

pub(crate) struct ModuleApi {
    loader: Weak<LoaderInner>,
    base: Option<CanonicalPath>,
    scan: Option<ScanSource>,
    /// `define()` bookkeeping for units without a canonical path.
    unpathed_define_used: AtomicBool,
}

impl ModuleApi {
    pub(crate) fn new(
        loader: Weak<LoaderInner>,
        base: Option<CanonicalPath>,
        scan: Option<ScanSource>,
    ) -> Arc<Self> {
        Arc::new(Self {
            loader,
            base,
            scan,
            unpathed_define_used: AtomicBool::new(false),
        })
    }

    fn loader(&self) -> Result<Loader, LoaderError> {
        self.loader
            .upgrade()
            .map(|inner| Loader { inner })
            .ok_or(LoaderError::Disposed)
    }

    fn base_display(&self) -> String {
        display_base(self.base.as_ref()).to_string()
    }

    /// Binds `require` and `define` in `sandbox`.
    pub(crate) fn install(self: &Arc<Self>, lua: &Lua, sandbox: &Sandbox) -> mlua::Result<()> {
        sandbox.define_binding("require", self.require_function(lua)?)?;
        sandbox.define_binding("define", self.define_function(lua)?)?;
        Ok(())
    }

    pub(crate) fn require_function(self: &Arc<Self>, lua: &Lua) -> mlua::Result<Function> {
        let api = Arc::clone(self);
        lua.create_function(move |lua, (deps, callback): (Value, Value)| {
            api.async_require(lua, deps, callback)
        })
    }

    fn define_function(self: &Arc<Self>, lua: &Lua) -> mlua::Result<Function> {
        let api = Arc::clone(self);
        lua.create_function(move |lua, (first, second, third): (Value, Value, Value)| {
            api.define(lua, first, second, third)
        })
    }

    /// `require(id)` or `require(deps, callback)`.
    fn async_require(self: &Arc<Self>, lua: &Lua, deps: Value, callback: Value) -> mlua::Result<Value> {
        let loader = self.loader()?;

        let callback = match callback {
            Value::Nil => None,
            Value::Function(f) => Some(f),
            other => {
                return Err(LoaderError::invalid_argument(
                    "require",
                    format!("callback must be a function, got {}", other.type_name()),
                )
                .into())
            }
        };

        let deps = match (deps, &callback) {
            (Value::String(id), None) => {
                let id = id.to_str()?.to_string();
                return Ok(loader.require_from(self.base.as_ref(), &id)?);
            }
            (Value::String(id), Some(_)) => vec![id.to_str()?.to_string()],
            (Value::Table(list), _) => string_sequence("require", &list)?,
            (other, _) => {
                return Err(LoaderError::invalid_argument(
                    "require",
                    format!("expected a module id or a list of ids, got {}", other.type_name()),
                )
                .into())
            }
        };

        let exports = lua.create_table()?;
        self.async_main(lua, &loader, None, &exports, &deps, callback)
    }

    /// Loads `deps`, then calls `factory` with them.
    ///
    /// Returns the factory's return value (`nil` when there is no factory).
    pub(crate) fn async_main(
        self: &Arc<Self>,
        lua: &Lua,
        loader: &Loader,
        module_id: Option<String>,
        exports: &Table,
        deps: &[String],
        factory: Option<Function>,
    ) -> mlua::Result<Value> {
        let mut args = Vec::with_capacity(deps.len());
        let mut uses_exports = false;

        for dep in deps {
            let value = match dep.as_str() {
                "require" => Value::Function(self.require_function(lua)?),
                "exports" => {
                    uses_exports = true;
                    Value::Table(exports.clone())
                }
                "module" => {
                    let module = lua.create_table()?;
                    module.raw_set("id", module_id.clone())?;
                    Value::Table(module)
                }
                other => loader.require_from(self.base.as_ref(), other)?,
            };
            args.push(value);
        }

        let Some(factory) = factory else {
            return Ok(Value::Nil);
        };

        let returned: Value = factory.call(args.into_iter().collect::<MultiValue>())?;
        if !returned.is_nil() && uses_exports {
            return Err(
                LoaderError::convention_conflict(self.base_display(), REASON_EXPORTS_AND_RETURN)
                    .into(),
            );
        }
        Ok(returned)
    }

    /// `define([name], [deps], factory)`.
    fn define(self: &Arc<Self>, lua: &Lua, first: Value, second: Value, third: Value) -> mlua::Result<()> {
        let loader = self.loader()?;
        self.claim_define(&loader)?;

        let (name, deps_arg, factory_arg) = match first {
            Value::String(name) => (Some(name.to_str()?.to_string()), second, third),
            other => (None, other, second),
        };

        let (deps, factory_arg) = match (deps_arg, factory_arg) {
            (Value::Table(list), factory @ Value::Function(_)) => {
                (Some(string_sequence("define", &list)?), factory)
            }
            (value, _) => (None, value),
        };

        if let Some(name) = &name {
            self.check_define_name(&loader, name)?;
        }

        let factory = match factory_arg {
            Value::Function(factory) => factory,
            Value::Nil => {
                return Err(LoaderError::invalid_argument(
                    "define",
                    "expected a factory function or an exports value",
                )
                .into())
            }
            literal => {
                if let Some(path) = &self.base {
                    debug!(path = %path, "define() with literal exports");
                    loader.set_exports(path, literal);
                }
                return Ok(());
            }
        };

        let deps = match deps {
            Some(deps) => deps,
            None => implicit_dependencies(&factory, self.scan.as_ref()),
        };

        let (exports, record_id) = match &self.base {
            Some(path) => loader.exports_placeholder(lua, path)?,
            None => (lua.create_table()?, None),
        };
        let module_id = name.clone().or(record_id);

        let returned = self.async_main(lua, &loader, module_id, &exports, &deps, Some(factory))?;
        if returned.is_nil() {
            return Ok(());
        }

        if let Some(path) = &self.base {
            loader.replace_exports_from_define(path, name.as_deref(), returned)?;
        }
        Ok(())
    }

    /// Marks `define()` as used for this unit, failing on a second call.
    fn claim_define(&self, loader: &Loader) -> Result<(), LoaderError> {
        let already_used = match &self.base {
            Some(path) => loader.mark_define_used(path),
            None => self.unpathed_define_used.swap(true, Ordering::SeqCst),
        };
        if already_used {
            return Err(LoaderError::define_misuse(
                self.base_display(),
                "only one call to define() allowed per file",
            ));
        }
        Ok(())
    }

    /// A named `define()` must name the module being evaluated.
    fn check_define_name(&self, loader: &Loader, name: &str) -> Result<(), LoaderError> {
        let resolved = loader.file_system().resolve_module(self.base.as_ref(), name);
        if self.base.is_some() && resolved.as_ref() == self.base.as_ref() {
            return Ok(());
        }

        let expected = self
            .base
            .as_ref()
            .and_then(|path| loader.record_id(path))
            .unwrap_or_else(|| self.base_display());
        Err(LoaderError::define_misuse(
            self.base_display(),
            format!("mismatched define(): named module \"{name}\" does not match expected name of \"{expected}\""),
        ))
    }
}

/// Reads a Lua sequence of module ids.
fn string_sequence(function: &'static str, list: &Table) -> Result<Vec<String>, LoaderError> {
    let mut ids = Vec::new();
    for value in list.clone().sequence_values::<Value>() {
        match value? {
            Value::String(s) => ids.push(s.to_str()?.to_string()),
            other => {
                return Err(LoaderError::invalid_argument(
                    function,
                    format!("dependency ids must be strings, got {}", other.type_name()),
                ))
            }
        }
    }
    Ok(ids)
}
