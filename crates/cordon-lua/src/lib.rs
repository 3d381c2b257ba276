//! Securable CommonJS/AMD module loader for sandboxed Lua.
//!
//! Every module runs in its own isolated context. Modules reach each other
//! only through `require`, and every `require` edge passes an optional
//! [`SecurityPolicy`] before source is evaluated and again before exports
//! are handed out.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       cordon-lua                            │
//! │  Loader ── ModuleApi (require/define) ── depscan            │
//! │    │            │                                           │
//! │    │        Sandbox ◄── ContextFactory                      │
//! │    │                                                        │
//! │    ├── SecurityPolicy (ManifestPolicy)                      │
//! │    └── ExportsOverride / ContextHook (HostCapabilities)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cordon-runtime: FileSystem, Manifest, LoaderConfig         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cordon-types: CanonicalPath, ModuleInfo, Principal         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use cordon_lua::{Loader, LoaderOptions};
//! use cordon_runtime::fs::MemoryFileSystem;
//!
//! let fs = MemoryFileSystem::new("/pkg")
//!     .with_module("math2", "define(function(require, exports) exports.double = function(x) return x * 2 end end)")
//!     .with_module("main", "local m = require('math2') answer = m.double(21)");
//!
//! let loader = Loader::new(LoaderOptions::new().with_file_system(fs)).unwrap();
//! loader.require("main").unwrap();
//! let sandbox = loader.find_sandbox_for_module("main").unwrap();
//! assert_eq!(sandbox.binding::<i64>("answer").unwrap(), 42);
//! ```

pub mod console;
pub mod depscan;
pub mod error;
mod loader;
pub mod overrides;
pub mod policy;
pub mod sandbox;
pub mod testing;

pub use error::{find_loader_error, LoaderError};
pub use loader::{Loader, LoaderOptions, ScriptOptions};
pub use overrides::{ContextHook, ExportsOverride, HostCapabilities, HOST_CAPABILITY_ID};
pub use policy::{ManifestPolicy, SecurityPolicy};
pub use sandbox::{ContextFactory, Sandbox, SandboxFactory};
