//! `console` diagnostics global.
//!
//! Installed into every module and script sandbox unless the host opts
//! out. Each method joins its arguments like `print` and emits one
//! `tracing` event at the matching level.

use crate::sandbox::{join_display, Sandbox};
use mlua::{Lua, MultiValue};
use tracing::{debug, error, info, warn};

/// Builds the `console` table and binds it in `sandbox`.
///
/// # Errors
///
/// Returns an error if the VM fails to create the functions.
pub fn install_console(lua: &Lua, sandbox: &Sandbox) -> mlua::Result<()> {
    let console = lua.create_table()?;

    console.set(
        "log",
        lua.create_function(|_, args: MultiValue| {
            info!(target: "cordon::console", "{}", join_display(&args));
            Ok(())
        })?,
    )?;
    console.set(
        "info",
        lua.create_function(|_, args: MultiValue| {
            info!(target: "cordon::console", "{}", join_display(&args));
            Ok(())
        })?,
    )?;
    console.set(
        "warn",
        lua.create_function(|_, args: MultiValue| {
            warn!(target: "cordon::console", "{}", join_display(&args));
            Ok(())
        })?,
    )?;
    console.set(
        "error",
        lua.create_function(|_, args: MultiValue| {
            error!(target: "cordon::console", "{}", join_display(&args));
            Ok(())
        })?,
    )?;
    console.set(
        "debug",
        lua.create_function(|_, args: MultiValue| {
            debug!(target: "cordon::console", "{}", join_display(&args));
            Ok(())
        })?,
    )?;

    sandbox.define_binding("console", console)
}
