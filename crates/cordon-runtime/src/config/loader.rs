//! Configuration loader with hierarchical merging.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Global config (`~/.cordon/config.toml`)
//! 3. Project config (`<project>/cordon.toml`) or an explicit file
//! 4. Environment variables (`CORDON_*`)
//!
//! Each layer overrides the previous. Relative paths inside a config file
//! are resolved against the file's directory.

use super::{default_config_path, ConfigError, LoaderConfig, PROJECT_CONFIG_FILE};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Helper macro for parsing `FromStr` environment variables.
macro_rules! parse_env {
    ($field:expr, $var:literal) => {
        if let Ok(val) = std::env::var($var) {
            $field = val
                .parse()
                .map_err(|e| ConfigError::invalid_env_var($var, format!("{e}")))?;
        }
    };
}

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```ignore
/// use cordon_runtime::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_project_root("/path/to/project")
///     .skip_env_vars()  // For testing
///     .load()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Global config file path (defaults to ~/.cordon/config.toml).
    global_config_path: Option<PathBuf>,

    /// Project root directory.
    project_root: Option<PathBuf>,

    /// Explicit config file, replacing the project config lookup.
    config_file: Option<PathBuf>,

    skip_env: bool,
    skip_global: bool,
}

impl ConfigLoader {
    /// Creates a new loader with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom global config path.
    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Sets the project root directory.
    ///
    /// Project config will be loaded from `<project_root>/cordon.toml`.
    #[must_use]
    pub fn with_project_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_root = Some(path.into());
        self
    }

    /// Loads this file instead of the project config. Unlike the project
    /// config, a missing explicit file is an error.
    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Skips environment variable loading.
    ///
    /// Useful for testing with deterministic config.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Skips global config loading.
    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    /// Loads and merges configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any config file exists but cannot be parsed,
    /// if an explicit config file is missing, or if an environment variable
    /// holds an invalid value.
    pub fn load(&self) -> Result<LoaderConfig, ConfigError> {
        let mut config = LoaderConfig::default();

        // Layer 1: Global config
        if !self.skip_global {
            let global_path = self
                .global_config_path
                .clone()
                .unwrap_or_else(default_config_path);

            if let Some(global_config) = self.load_file(&global_path)? {
                debug!(path = %global_path.display(), "Loaded global config");
                config.merge(&global_config);
            }
        }

        // Layer 2: Explicit or project config
        if let Some(ref explicit) = self.config_file {
            let loaded = self
                .load_file(explicit)?
                .ok_or_else(|| {
                    ConfigError::read_file(
                        explicit,
                        std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                    )
                })?;
            debug!(path = %explicit.display(), "Loaded explicit config");
            config.merge(&loaded);
        } else if let Some(ref project_root) = self.project_root {
            let project_config_path = project_root.join(PROJECT_CONFIG_FILE);
            if let Some(project_config) = self.load_file(&project_config_path)? {
                debug!(
                    path = %project_config_path.display(),
                    project = %project_root.display(),
                    "Loaded project config"
                );
                config.merge(&project_config);
            }
        }

        // Layer 3: Environment variables
        if !self.skip_env {
            Self::apply_env_vars(&mut config)?;
        }

        Ok(config)
    }

    /// Loads a config file, returning None if it doesn't exist.
    fn load_file(&self, path: &Path) -> Result<Option<LoaderConfig>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

        let mut config =
            LoaderConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;

        if let Some(dir) = path.parent() {
            config.rebase(dir);
        }

        Ok(Some(config))
    }

    /// Applies environment variable overrides.
    fn apply_env_vars(config: &mut LoaderConfig) -> Result<(), ConfigError> {
        parse_env!(config.default_principal, "CORDON_DEFAULT_PRINCIPAL");
        parse_env!(config.enforcement, "CORDON_ENFORCEMENT");

        if let Ok(val) = std::env::var("CORDON_ROOT_PATHS") {
            config.root_paths = std::env::split_paths(&val)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }

        if let Ok(val) = std::env::var("CORDON_EXTENSION") {
            if val.trim().is_empty() {
                return Err(ConfigError::invalid_env_var(
                    "CORDON_EXTENSION",
                    "extension must not be empty",
                ));
            }
            config.extension = val.trim_start_matches('.').to_string();
        }

        if let Ok(val) = std::env::var("CORDON_PARENT_ORIGIN") {
            config.parent_origin = val;
        }

        if let Ok(val) = std::env::var("CORDON_MANIFEST") {
            config.manifest = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("CORDON_LOG_LEVEL") {
            config.log_level = val;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Enforcement;
    use cordon_types::Principal;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).expect("write config file");
        path
    }

    #[test]
    fn load_defaults_only() {
        let config = ConfigLoader::new()
            .skip_global_config()
            .skip_env_vars()
            .load()
            .expect("load defaults");

        assert_eq!(config, LoaderConfig::default());
    }

    #[test]
    fn load_global_config() {
        let dir = TempDir::new().expect("create temp dir");
        let path = write(dir.path(), "config.toml", "extension = \"js\"\n");

        let config = ConfigLoader::new()
            .with_global_config(&path)
            .skip_env_vars()
            .load()
            .expect("load global");

        assert_eq!(config.extension, "js");
    }

    #[test]
    fn project_overrides_global_and_rebases_paths() {
        let global = TempDir::new().expect("create global dir");
        let project = TempDir::new().expect("create project dir");
        let global_path = write(
            global.path(),
            "config.toml",
            "extension = \"js\"\nparent_origin = \"host\"\n",
        );
        write(
            project.path(),
            PROJECT_CONFIG_FILE,
            "extension = \"luau\"\nroot_paths = [\"lib\"]\n",
        );

        let config = ConfigLoader::new()
            .with_global_config(&global_path)
            .with_project_root(project.path())
            .skip_env_vars()
            .load()
            .expect("load layered");

        assert_eq!(config.extension, "luau");
        assert_eq!(config.parent_origin, "host");
        assert_eq!(config.root_paths, vec![project.path().join("lib")]);
    }

    #[test]
    fn explicit_file_replaces_project_lookup() {
        let dir = TempDir::new().expect("create temp dir");
        write(dir.path(), PROJECT_CONFIG_FILE, "extension = \"project\"\n");
        let explicit = write(dir.path(), "other.toml", "extension = \"explicit\"\n");

        let config = ConfigLoader::new()
            .with_project_root(dir.path())
            .with_config_file(&explicit)
            .skip_global_config()
            .skip_env_vars()
            .load()
            .expect("load explicit");

        assert_eq!(config.extension, "explicit");
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let dir = TempDir::new().expect("create temp dir");
        let err = ConfigLoader::new()
            .with_config_file(dir.path().join("absent.toml"))
            .skip_global_config()
            .skip_env_vars()
            .load()
            .expect_err("explicit file must exist");
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn missing_project_config_ok() {
        let dir = TempDir::new().expect("create temp dir");
        let config = ConfigLoader::new()
            .with_project_root(dir.path())
            .skip_global_config()
            .skip_env_vars()
            .load()
            .expect("load without files");
        assert_eq!(config, LoaderConfig::default());
    }

    #[test]
    fn malformed_config_is_error() {
        let dir = TempDir::new().expect("create temp dir");
        write(dir.path(), PROJECT_CONFIG_FILE, "extension = [");
        let err = ConfigLoader::new()
            .with_project_root(dir.path())
            .skip_global_config()
            .skip_env_vars()
            .load()
            .expect_err("malformed TOML");
        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }

    #[test]
    fn env_var_override() {
        // This test modifies env vars, run in isolation
        std::env::set_var("CORDON_ENFORCEMENT", "deny");
        std::env::set_var("CORDON_DEFAULT_PRINCIPAL", "elevated");
        std::env::set_var("CORDON_PARENT_ORIGIN", "env-origin");

        let config = ConfigLoader::new().skip_global_config().load();

        std::env::remove_var("CORDON_ENFORCEMENT");
        std::env::remove_var("CORDON_DEFAULT_PRINCIPAL");
        std::env::remove_var("CORDON_PARENT_ORIGIN");

        let config = config.expect("load with env");
        assert_eq!(config.enforcement, Enforcement::Deny);
        assert_eq!(config.default_principal, Principal::Elevated);
        assert_eq!(config.parent_origin, "env-origin");
    }
}
