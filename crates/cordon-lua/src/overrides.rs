//! Host hooks: exports overrides and context customization.
//!
//! # Exports Override
//!
//! An [`ExportsOverride`] short-circuits resolution for well-known ids.
//! When it answers, the loader skips the file system, the module cache and
//! evaluation; only the import check of the security policy still applies
//! (with no `ModuleInfo`).
//!
//! [`HostCapabilities`] is the stock override: it answers [`HOST_CAPABILITY_ID`]
//! with a bundle of elevated VM facilities, so restricted modules that are
//! allowed to can reach the host through one audited edge.
//!
//! # Context Hook
//!
//! A [`ContextHook`] runs for every new module context after the loader's
//! bindings are installed and before the module preamble, so it may add
//! globals or replace injected ones.

use crate::sandbox::Sandbox;
use cordon_types::{CanonicalPath, ModuleInfo};
use mlua::{Lua, Value};
use std::sync::Arc;
use tracing::debug;

/// Id answered by [`HostCapabilities`].
pub const HOST_CAPABILITY_ID: &str = "host";

/// Host facilities placed in the capability bundle.
const HOST_FACILITIES: &[&str] = &["os", "io", "load", "collectgarbage"];

/// Resolution short-circuit for well-known module ids.
pub trait ExportsOverride: Send + Sync {
    /// Returns exports for `id`, or `None` to let the loader resolve it.
    ///
    /// # Errors
    ///
    /// A returned error fails the `require` call.
    fn module_exports(
        &self,
        lua: &Lua,
        base: Option<&CanonicalPath>,
        id: &str,
    ) -> mlua::Result<Option<Value>>;
}

impl<F> ExportsOverride for F
where
    F: Fn(&Lua, Option<&CanonicalPath>, &str) -> mlua::Result<Option<Value>> + Send + Sync,
{
    fn module_exports(
        &self,
        lua: &Lua,
        base: Option<&CanonicalPath>,
        id: &str,
    ) -> mlua::Result<Option<Value>> {
        self(lua, base, id)
    }
}

/// Answers [`HOST_CAPABILITY_ID`] with a table of elevated VM facilities.
///
/// Other ids go to the wrapped override, if any.
#[derive(Clone, Default)]
pub struct HostCapabilities {
    delegate: Option<Arc<dyn ExportsOverride>>,
}

impl HostCapabilities {
    /// Creates the override without a delegate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forwards ids other than `"host"` to `delegate`.
    #[must_use]
    pub fn with_delegate(mut self, delegate: impl ExportsOverride + 'static) -> Self {
        self.delegate = Some(Arc::new(delegate));
        self
    }
}

impl ExportsOverride for HostCapabilities {
    fn module_exports(
        &self,
        lua: &Lua,
        base: Option<&CanonicalPath>,
        id: &str,
    ) -> mlua::Result<Option<Value>> {
        if id == HOST_CAPABILITY_ID {
            debug!(base = ?base.map(CanonicalPath::as_str), "Handing out host capability bundle");
            let globals = lua.globals();
            let bundle = lua.create_table()?;
            for name in HOST_FACILITIES {
                bundle.raw_set(*name, globals.raw_get::<Value>(*name)?)?;
            }
            return Ok(Some(Value::Table(bundle)));
        }

        match &self.delegate {
            Some(delegate) => delegate.module_exports(lua, base, id),
            None => Ok(None),
        }
    }
}

/// Customizes each new module context.
pub trait ContextHook: Send + Sync {
    /// Called once per module context.
    ///
    /// # Errors
    ///
    /// A returned error fails the module's load.
    fn on_context(&self, lua: &Lua, sandbox: &Sandbox, info: &ModuleInfo) -> mlua::Result<()>;
}

impl<F> ContextHook for F
where
    F: Fn(&Lua, &Sandbox, &ModuleInfo) -> mlua::Result<()> + Send + Sync,
{
    fn on_context(&self, lua: &Lua, sandbox: &Sandbox, info: &ModuleInfo) -> mlua::Result<()> {
        self(lua, sandbox, info)
    }
}
