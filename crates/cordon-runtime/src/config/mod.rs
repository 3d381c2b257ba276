//! Configuration management with hierarchical layering.
//!
//! # Architecture
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌─────────────────────────────────────────┐
//! │  1. CLI flags                           │  Per invocation
//! ├─────────────────────────────────────────┤
//! │  2. Environment Variables (CORDON_*)    │  Runtime override
//! ├─────────────────────────────────────────┤
//! │  3. Project Config (cordon.toml)        │  Project-specific
//! ├─────────────────────────────────────────┤
//! │  4. Global Config (~/.cordon/config.toml)│ User defaults
//! ├─────────────────────────────────────────┤
//! │  5. Default Values (compile-time)       │  Fallback
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `CORDON_ROOT_PATHS` | `root_paths` | path list (platform separator) |
//! | `CORDON_EXTENSION` | `extension` | String |
//! | `CORDON_DEFAULT_PRINCIPAL` | `default_principal` | `restricted` / `elevated` |
//! | `CORDON_PARENT_ORIGIN` | `parent_origin` | String |
//! | `CORDON_MANIFEST` | `manifest` | PathBuf |
//! | `CORDON_ENFORCEMENT` | `enforcement` | `warn` / `deny` |
//! | `CORDON_LOG_LEVEL` | `log_level` | filter directive |
//!
//! # Example Configuration
//!
//! ```toml
//! # cordon.toml
//! root_paths = ["lib", "vendor"]
//! extension = "lua"
//! default_principal = "restricted"
//! manifest = "manifest.json"
//! enforcement = "warn"
//!
//! [globals]
//! app_name = "demo"
//! ```

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::{LoaderConfig, DEFAULT_LOG_LEVEL, DEFAULT_PARENT_ORIGIN};

/// Default global config directory.
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".cordon")
}

/// Default global config file path.
pub fn default_config_path() -> std::path::PathBuf {
    default_config_dir().join("config.toml")
}

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "cordon.toml";
