//! Runtime collaborators of the cordon loader.
//!
//! This crate owns everything the loader consumes but does not evaluate:
//!
//! - [`fs`]: module resolution and source fetching ([`FileSystem`] and its
//!   local, in-memory, composite and manifest-aware implementations)
//! - [`manifest`]: declared dependency edges and elevation requests
//! - [`config`]: layered loader configuration
//!
//! # Example
//!
//! ```
//! use cordon_runtime::fs::{CompositeFileSystem, FileSystem, MemoryFileSystem};
//!
//! let fs = CompositeFileSystem::default()
//!     .with_member(MemoryFileSystem::new("/app").with_module("main", "return 1"))
//!     .with_member(MemoryFileSystem::new("/std").with_module("strings", "return {}"));
//!
//! let path = fs.resolve_module(None, "strings").unwrap();
//! assert_eq!(fs.get_file(&path).unwrap().contents, "return {}");
//! ```

pub mod config;
pub mod fs;
pub mod manifest;

pub use config::{ConfigError, ConfigLoader, LoaderConfig};
pub use fs::{FileSystem, FsError};
pub use manifest::{Enforcement, Manifest, ManifestEntry, ManifestError};
