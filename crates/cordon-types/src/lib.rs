//! Core types for the cordon module loader.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  cordon-types   : Principal, CanonicalPath, ModuleInfo ◄ HERE│
//! ├─────────────────────────────────────────────────────────────┤
//! │  cordon-runtime : FileSystem impls, manifest, configuration │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cordon-lua     : sandboxes, Loader, security policies      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cordon-cli     : command-line front end                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is plain data with no VM or I/O dependency, so file
//! systems and policies can be written without pulling in Lua.

mod error;
mod module;
mod path;
mod principal;

pub use error::{assert_error_code, ErrorCode};
pub use module::ModuleInfo;
pub use path::{display_base, is_relative_id, CanonicalPath};
pub use principal::{Principal, UnknownPrincipal};
