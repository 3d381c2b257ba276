//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use crate::fs::DEFAULT_EXTENSION;
use crate::manifest::Enforcement;
use cordon_types::Principal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default diagnostic parent origin for elevated contexts.
pub const DEFAULT_PARENT_ORIGIN: &str = "cordon";

/// Default log filter directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Loader configuration after merging all layers.
///
/// # Example
///
/// ```
/// use cordon_runtime::config::LoaderConfig;
///
/// let config = LoaderConfig::from_toml(r#"
/// root_paths = ["lib", "vendor"]
/// enforcement = "deny"
///
/// [globals]
/// app_name = "demo"
/// "#).unwrap();
/// assert_eq!(config.root_paths.len(), 2);
/// assert_eq!(config.extension, "lua");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoaderConfig {
    /// Module tree roots, searched in order.
    pub root_paths: Vec<PathBuf>,

    /// Module file extension without the dot.
    pub extension: String,

    /// Principal for modules that do not request one.
    pub default_principal: Principal,

    /// Origin reported as the diagnostic parent of elevated contexts.
    pub parent_origin: String,

    /// Dependency manifest enabling the manifest policy.
    pub manifest: Option<PathBuf>,

    /// How the manifest policy acts on findings.
    pub enforcement: Enforcement,

    /// `tracing` filter directive for the CLI.
    pub log_level: String,

    /// Values injected as globals into every context.
    pub globals: BTreeMap<String, serde_json::Value>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            root_paths: Vec::new(),
            extension: DEFAULT_EXTENSION.to_string(),
            default_principal: Principal::default(),
            parent_origin: DEFAULT_PARENT_ORIGIN.to_string(),
            manifest: None,
            enforcement: Enforcement::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            globals: BTreeMap::new(),
        }
    }
}

impl LoaderConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deserializes from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Serializes to a TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Merges another config into this one.
    ///
    /// Values from `other` override values in `self` only if they differ
    /// from the default. Globals are merged key by key.
    pub fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if !other.root_paths.is_empty() {
            self.root_paths.clone_from(&other.root_paths);
        }
        if other.extension != default.extension {
            self.extension.clone_from(&other.extension);
        }
        if other.default_principal != default.default_principal {
            self.default_principal = other.default_principal;
        }
        if other.parent_origin != default.parent_origin {
            self.parent_origin.clone_from(&other.parent_origin);
        }
        if other.manifest.is_some() {
            self.manifest.clone_from(&other.manifest);
        }
        if other.enforcement != default.enforcement {
            self.enforcement = other.enforcement;
        }
        if other.log_level != default.log_level {
            self.log_level.clone_from(&other.log_level);
        }
        for (name, value) in &other.globals {
            self.globals.insert(name.clone(), value.clone());
        }
    }

    /// Resolves relative paths against `dir` (the directory of the config file).
    pub fn rebase(&mut self, dir: &Path) {
        for root in &mut self.root_paths {
            if root.is_relative() {
                *root = dir.join(&*root);
            }
        }
        if let Some(manifest) = self.manifest.as_mut() {
            if manifest.is_relative() {
                *manifest = dir.join(&*manifest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LoaderConfig::default();
        assert!(config.root_paths.is_empty());
        assert_eq!(config.extension, "lua");
        assert_eq!(config.default_principal, Principal::Restricted);
        assert_eq!(config.parent_origin, "cordon");
        assert_eq!(config.enforcement, Enforcement::Warn);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = LoaderConfig::default();
        config.root_paths.push(PathBuf::from("lib"));
        config.enforcement = Enforcement::Deny;
        config
            .globals
            .insert("answer".into(), serde_json::json!(42));

        let toml = config.to_toml().expect("should serialize config to TOML");
        let restored = LoaderConfig::from_toml(&toml).expect("should deserialize TOML");
        assert_eq!(config, restored);
    }

    #[test]
    fn toml_partial_parse() {
        let config = LoaderConfig::from_toml(
            r#"
default_principal = "elevated"

[globals]
greeting = "hi"
"#,
        )
        .expect("should parse partial TOML with defaults");
        assert_eq!(config.default_principal, Principal::Elevated);
        assert_eq!(config.globals["greeting"], serde_json::json!("hi"));
        assert_eq!(config.extension, "lua");
    }

    #[test]
    fn merge_overrides_non_default() {
        let mut base = LoaderConfig {
            root_paths: vec![PathBuf::from("base")],
            ..Default::default()
        };
        base.globals.insert("a".into(), serde_json::json!(1));

        let mut overlay = LoaderConfig {
            extension: "js".into(),
            ..Default::default()
        };
        overlay.globals.insert("b".into(), serde_json::json!(2));

        base.merge(&overlay);

        assert_eq!(base.extension, "js");
        assert_eq!(base.root_paths, vec![PathBuf::from("base")]);
        assert_eq!(base.globals.len(), 2);
    }

    #[test]
    fn merge_keeps_base_when_overlay_is_default() {
        let mut base = LoaderConfig {
            enforcement: Enforcement::Deny,
            ..Default::default()
        };
        base.merge(&LoaderConfig::default());
        assert_eq!(base.enforcement, Enforcement::Deny);
    }

    #[test]
    fn rebase_only_touches_relative_paths() {
        let mut config = LoaderConfig {
            root_paths: vec![PathBuf::from("lib"), PathBuf::from("/abs")],
            manifest: Some(PathBuf::from("manifest.json")),
            ..Default::default()
        };
        config.rebase(Path::new("/project"));
        assert_eq!(config.root_paths[0], PathBuf::from("/project/lib"));
        assert_eq!(config.root_paths[1], PathBuf::from("/abs"));
        assert_eq!(
            config.manifest,
            Some(PathBuf::from("/project/manifest.json"))
        );
    }
}
