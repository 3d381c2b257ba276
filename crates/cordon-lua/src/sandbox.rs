//! Isolated execution contexts.
//!
//! Every module runs inside its own [`Sandbox`]: a fresh Lua environment
//! table used as the `_ENV` of the module's chunk. Globals a module defines
//! stay in its sandbox; values it exports are ordinary Lua values and can be
//! shared freely.
//!
//! # Principals
//!
//! ```text
//! Restricted                         Elevated
//! ┌──────────────────────────┐       ┌──────────────────────────┐
//! │ assert error pairs ...   │       │ everything Restricted has│
//! │ string table math utf8   │       │ os io load dofile        │
//! │ coroutine (private copy) │       │ collectgarbage ...       │
//! │ print -> tracing         │       │ print -> tracing         │
//! └──────────────────────────┘       └──────────────────────────┘
//! ```
//!
//! `require`, `define` and `package` are never inherited from the VM; the
//! loader installs its own bindings after creation.
//!
//! # Shared state
//!
//! Library tables are copied per sandbox from a snapshot taken the first
//! time the VM is prepared (see [`snapshot_libraries`]), never from the live
//! globals. Restricted sandboxes see a `getmetatable` that answers `nil` for
//! strings, so the VM's string metatable (and the real `string` table behind
//! its `__index`) is out of reach.
//!
//! # Diagnostics
//!
//! Chunks are named `@<filename>`. Elevated sandboxes prefix the filename
//! with their parent origin (`@cordon -> /lib/sys.lua`) so a failure deep
//! inside trusted code still points back at the host that launched it.

use crate::LoaderError;
use cordon_types::Principal;
use mlua::{FromLua, IntoLua, Lua, MultiValue, Table, Value};
use tracing::info;

/// Core functions copied into restricted sandboxes.
const SAFE_FUNCTIONS: &[&str] = &[
    "assert",
    "error",
    "ipairs",
    "next",
    "pairs",
    "pcall",
    "select",
    "tonumber",
    "tostring",
    "type",
    "xpcall",
    "rawequal",
    "rawget",
    "rawset",
    "rawlen",
    "setmetatable",
];

/// Libraries shallow-copied into restricted sandboxes.
const SAFE_LIBRARIES: &[&str] = &["string", "table", "math", "utf8", "coroutine"];

/// Registry key holding the pristine library snapshot.
const LIBRARY_SNAPSHOT: &str = "cordon.libraries";

/// `getmetatable` for restricted sandboxes.
const GUARDED_GETMETATABLE: &str = r#"
local getmetatable, type = ...
return function(value)
    if type(value) == "string" then
        return nil
    end
    return getmetatable(value)
end
"#;

/// VM globals never inherited by any sandbox.
const LOADER_OWNED: &[&str] = &["require", "package", "_G", "print"];

/// A fresh, isolated global scope for one unit of code.
///
/// Cloning a sandbox clones the handle, not the scope.
#[derive(Clone)]
pub struct Sandbox {
    env: Table,
    principal: Principal,
    parent_origin: Option<String>,
}

impl Sandbox {
    /// Creates a sandbox for `principal`.
    ///
    /// `parent_origin`, if set, is prepended to every filename this
    /// sandbox evaluates.
    ///
    /// # Errors
    ///
    /// Returns an error if the VM fails to allocate the environment.
    pub fn new(lua: &Lua, principal: Principal, parent_origin: Option<String>) -> mlua::Result<Self> {
        let env = lua.create_table()?;
        let globals = lua.globals();
        let libraries = snapshot_libraries(lua)?;

        match principal {
            Principal::Restricted => {
                for name in SAFE_FUNCTIONS {
                    let value: Value = globals.raw_get(*name)?;
                    if !value.is_nil() {
                        env.raw_set(*name, value)?;
                    }
                }
                env.raw_set("getmetatable", guarded_getmetatable(lua, &globals)?)?;
            }
            Principal::Elevated => {
                for pair in globals.pairs::<Value, Value>() {
                    let (key, value) = pair?;
                    let owned = match &key {
                        Value::String(s) => s
                            .to_str()
                            .is_ok_and(|name| LOADER_OWNED.contains(&&*name)),
                        _ => false,
                    };
                    if !owned {
                        env.raw_set(key, value)?;
                    }
                }
            }
        }

        for pair in libraries.pairs::<String, Table>() {
            let (name, lib) = pair?;
            env.raw_set(name, shallow_copy(lua, &lib)?)?;
        }

        env.raw_set("_G", env.clone())?;
        env.raw_set("print", lua.create_function(print_to_tracing)?)?;

        Ok(Self {
            env,
            principal,
            parent_origin,
        })
    }

    /// Principal this sandbox runs under.
    #[must_use]
    pub fn principal(&self) -> Principal {
        self.principal
    }

    /// The sandbox's global scope table.
    #[must_use]
    pub fn global_scope(&self) -> &Table {
        &self.env
    }

    /// Defines (or replaces) a top-level binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be converted.
    pub fn define_binding(&self, name: &str, value: impl IntoLua) -> mlua::Result<()> {
        self.env.raw_set(name, value)
    }

    /// Reads a top-level binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the binding cannot be converted to `V`.
    pub fn binding<V: FromLua>(&self, name: &str) -> mlua::Result<V> {
        self.env.raw_get(name)
    }

    /// Chunk name used for `filename`, including the diagnostic parent.
    #[must_use]
    pub fn chunk_name(&self, filename: &str) -> String {
        match &self.parent_origin {
            Some(parent) => format!("@{parent} -> {filename}"),
            None => format!("@{filename}"),
        }
    }

    /// Evaluates `source` in this sandbox, attributed to `filename` at `line`.
    ///
    /// Returns the value of the chunk (its `return` value, or the value of
    /// a bare expression).
    ///
    /// # Errors
    ///
    /// Returns the Lua error raised by the source.
    pub fn evaluate(&self, lua: &Lua, source: &str, filename: &str, line: usize) -> mlua::Result<Value> {
        let padded;
        let text = if line > 1 {
            padded = format!("{}{source}", "\n".repeat(line - 1));
            padded.as_str()
        } else {
            source
        };

        lua.load(text)
            .set_name(self.chunk_name(filename))
            .set_environment(self.env.clone())
            .eval::<Value>()
    }
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("principal", &self.principal)
            .field("parent_origin", &self.parent_origin)
            .finish_non_exhaustive()
    }
}

/// Creates isolated execution contexts.
///
/// The loader calls this once per module, with the principal the module's
/// [`ModuleInfo`](cordon_types::ModuleInfo) requested (or `None`).
pub trait ContextFactory: Send + Sync {
    /// Creates a fresh context.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError`] if the context cannot be created.
    fn create_context(&self, lua: &Lua, principal: Option<Principal>) -> Result<Sandbox, LoaderError>;
}

impl<T: ContextFactory + ?Sized> ContextFactory for std::sync::Arc<T> {
    fn create_context(&self, lua: &Lua, principal: Option<Principal>) -> Result<Sandbox, LoaderError> {
        (**self).create_context(lua, principal)
    }
}

/// Default [`ContextFactory`] producing [`Sandbox`]es.
#[derive(Debug, Clone)]
pub struct SandboxFactory {
    default_principal: Principal,
    parent_origin: String,
}

impl Default for SandboxFactory {
    fn default() -> Self {
        Self {
            default_principal: Principal::Restricted,
            parent_origin: cordon_runtime::config::DEFAULT_PARENT_ORIGIN.to_string(),
        }
    }
}

impl SandboxFactory {
    /// Creates a factory with a restricted default principal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Principal used when a module requests none.
    #[must_use]
    pub fn with_default_principal(mut self, principal: Principal) -> Self {
        self.default_principal = principal;
        self
    }

    /// Diagnostic parent reported by elevated sandboxes.
    #[must_use]
    pub fn with_parent_origin(mut self, origin: impl Into<String>) -> Self {
        self.parent_origin = origin.into();
        self
    }

    /// Principal used when a module requests none.
    #[must_use]
    pub fn default_principal(&self) -> Principal {
        self.default_principal
    }
}

impl ContextFactory for SandboxFactory {
    fn create_context(&self, lua: &Lua, principal: Option<Principal>) -> Result<Sandbox, LoaderError> {
        let principal = principal.unwrap_or(self.default_principal);
        let parent = principal
            .is_elevated()
            .then(|| self.parent_origin.clone());
        Ok(Sandbox::new(lua, principal, parent)?)
    }
}

/// Snapshots the VM's library tables, once per VM.
///
/// Later calls return the first snapshot, whatever happened to the globals
/// since. The loader calls this as soon as it creates its VM.
///
/// # Errors
///
/// Returns an error if the registry cannot be read or written.
pub fn snapshot_libraries(lua: &Lua) -> mlua::Result<Table> {
    if let Value::Table(snapshot) = lua.named_registry_value::<Value>(LIBRARY_SNAPSHOT)? {
        return Ok(snapshot);
    }

    let globals = lua.globals();
    let snapshot = lua.create_table()?;
    for name in SAFE_LIBRARIES {
        if let Value::Table(lib) = globals.raw_get::<Value>(*name)? {
            snapshot.raw_set(*name, shallow_copy(lua, &lib)?)?;
        }
    }
    lua.set_named_registry_value(LIBRARY_SNAPSHOT, snapshot.clone())?;
    Ok(snapshot)
}

fn guarded_getmetatable(lua: &Lua, globals: &Table) -> mlua::Result<Value> {
    let getmetatable: Value = globals.raw_get("getmetatable")?;
    let type_fn: Value = globals.raw_get("type")?;
    if getmetatable.is_nil() || type_fn.is_nil() {
        return Ok(Value::Nil);
    }
    lua.load(GUARDED_GETMETATABLE)
        .set_name("=getmetatable")
        .call((getmetatable, type_fn))
}

fn shallow_copy(lua: &Lua, source: &Table) -> mlua::Result<Table> {
    let copy = lua.create_table()?;
    for pair in source.pairs::<Value, Value>() {
        let (key, value) = pair?;
        copy.raw_set(key, value)?;
    }
    Ok(copy)
}

fn print_to_tracing(_: &Lua, args: MultiValue) -> mlua::Result<()> {
    info!(target: "cordon::print", "{}", join_display(&args));
    Ok(())
}

/// Joins values the way Lua's `print` separates them.
pub(crate) fn join_display(args: &MultiValue) -> String {
    args.iter().map(display_value).collect::<Vec<_>>().join("\t")
}

/// Renders a Lua value for diagnostics output.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s
            .to_str()
            .map_or_else(|_| "<invalid utf8>".to_string(), |s| s.to_string()),
        other => format!("{}: {:?}", other.type_name(), other.to_pointer()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(lua: &Lua, sandbox: &Sandbox, code: &str) -> mlua::Result<Value> {
        sandbox.evaluate(lua, code, "test.lua", 1)
    }

    #[test]
    fn restricted_sandbox_hides_host_facilities() {
        let lua = Lua::new();
        let sandbox = Sandbox::new(&lua, Principal::Restricted, None).expect("create sandbox");

        for name in ["os", "io", "load", "dofile", "loadfile", "require", "package"] {
            let value = eval(&lua, &sandbox, &format!("return {name}")).expect("eval");
            assert!(value.is_nil(), "{name} should be absent");
        }
        let value = eval(&lua, &sandbox, "return string.upper('x')").expect("string lib");
        assert_eq!(display_value(&value), "X");
    }

    #[test]
    fn elevated_sandbox_sees_host_facilities() {
        let lua = Lua::new();
        let sandbox = Sandbox::new(&lua, Principal::Elevated, None).expect("create sandbox");

        let os_type = eval(&lua, &sandbox, "return type(os)").expect("eval");
        assert_eq!(display_value(&os_type), "table");
        let require = eval(&lua, &sandbox, "return require").expect("eval");
        assert!(require.is_nil());
    }

    #[test]
    fn globals_do_not_leak_between_sandboxes() {
        let lua = Lua::new();
        let a = Sandbox::new(&lua, Principal::Restricted, None).expect("sandbox a");
        let b = Sandbox::new(&lua, Principal::Restricted, None).expect("sandbox b");

        eval(&lua, &a, "leaked = 1; string.custom = true").expect("eval a");
        assert!(eval(&lua, &b, "return leaked").expect("eval b").is_nil());
        assert!(eval(&lua, &b, "return string.custom").expect("eval b").is_nil());
        assert!(lua.globals().get::<Value>("leaked").expect("get").is_nil());
    }

    #[test]
    fn string_metatable_is_hidden_from_restricted_code() {
        let lua = Lua::new();
        let sandbox = Sandbox::new(&lua, Principal::Restricted, None).expect("sandbox");

        assert!(eval(&lua, &sandbox, "return getmetatable('')").expect("eval").is_nil());
        let err = eval(&lua, &sandbox, "getmetatable('').__index.rep = function() return 'x' end")
            .expect_err("no metatable to write through");
        assert!(err.to_string().contains("attempt to index"), "got: {err}");

        let mt = eval(&lua, &sandbox, "local t = setmetatable({}, { tag = 1 }) return getmetatable(t).tag")
            .expect("tables keep their metatables");
        assert_eq!(display_value(&mt), "1");
    }

    #[test]
    fn libraries_come_from_the_first_snapshot() {
        let lua = Lua::new();
        snapshot_libraries(&lua).expect("snapshot");
        lua.load("string.rep = function() return 'poisoned' end")
            .exec()
            .expect("poison host string");

        for principal in [Principal::Restricted, Principal::Elevated] {
            let sandbox = Sandbox::new(&lua, principal, None).expect("sandbox");
            let value = eval(&lua, &sandbox, "return string.rep('x', 2)").expect("eval");
            assert_eq!(display_value(&value), "xx", "{principal}");
        }
    }

    #[test]
    fn elevated_library_writes_stay_private() {
        let lua = Lua::new();
        let elevated = Sandbox::new(&lua, Principal::Elevated, None).expect("elevated");
        eval(&lua, &elevated, "string.rep = function() return 'mine' end").expect("eval");

        let restricted = Sandbox::new(&lua, Principal::Restricted, None).expect("restricted");
        let value = eval(&lua, &restricted, "return string.rep('x', 2)").expect("eval");
        assert_eq!(display_value(&value), "xx");
        let host: String = lua.load("return string.rep('x', 2)").eval().expect("host");
        assert_eq!(host, "xx");
    }

    #[test]
    fn bindings_round_trip() {
        let lua = Lua::new();
        let sandbox = Sandbox::new(&lua, Principal::Restricted, None).expect("sandbox");
        sandbox.define_binding("answer", 42).expect("define");
        assert_eq!(sandbox.binding::<i64>("answer").expect("read"), 42);

        eval(&lua, &sandbox, "baz = 1").expect("eval");
        assert_eq!(sandbox.binding::<i64>("baz").expect("read baz"), 1);
    }

    #[test]
    fn underscore_g_is_the_sandbox() {
        let lua = Lua::new();
        let sandbox = Sandbox::new(&lua, Principal::Restricted, None).expect("sandbox");
        eval(&lua, &sandbox, "_G.via_g = 'yes'").expect("eval");
        assert_eq!(sandbox.binding::<String>("via_g").expect("read"), "yes");
    }

    #[test]
    fn errors_carry_filename_and_line() {
        let lua = Lua::new();
        let sandbox = Sandbox::new(&lua, Principal::Restricted, None).expect("sandbox");
        let err = sandbox
            .evaluate(&lua, "error('boom')", "mod.lua", 5)
            .expect_err("should fail");
        let msg = err.to_string();
        assert!(msg.contains("mod.lua:5:"), "unexpected message: {msg}");
    }

    #[test]
    fn elevated_errors_name_parent_origin() {
        let lua = Lua::new();
        let factory = SandboxFactory::new().with_parent_origin("host");
        let sandbox = factory
            .create_context(&lua, Some(Principal::Elevated))
            .expect("context");
        let err = eval(&lua, &sandbox, "error('deep')").expect_err("should fail");
        assert!(err.to_string().contains("host -> test.lua:1:"), "got: {err}");
    }

    #[test]
    fn factory_applies_default_principal() {
        let lua = Lua::new();
        let factory = SandboxFactory::new().with_default_principal(Principal::Elevated);
        let sandbox = factory.create_context(&lua, None).expect("context");
        assert_eq!(sandbox.principal(), Principal::Elevated);

        let restricted = factory
            .create_context(&lua, Some(Principal::Restricted))
            .expect("context");
        assert_eq!(restricted.principal(), Principal::Restricted);
        assert_eq!(restricted.chunk_name("a.lua"), "@a.lua");
    }

    #[test]
    fn expression_sources_yield_values() {
        let lua = Lua::new();
        let sandbox = Sandbox::new(&lua, Principal::Restricted, None).expect("sandbox");
        let value = eval(&lua, &sandbox, "1 + 2").expect("eval");
        assert_eq!(display_value(&value), "3");
    }
}
