//! Dependency manifests.
//!
//! A manifest lists, per module, whether it needs an elevated context and
//! which dependency edges it declares. Packaging tools produce it; the
//! loader's manifest policy and [`ManifestFileSystem`](crate::fs::ManifestFileSystem)
//! consume it.
//!
//! # Format
//!
//! JSON (or TOML when the file ends in `.toml`). Module keys are
//! root-relative ids without extension and match any canonical path that
//! ends with them.
//!
//! ```json
//! {
//!   "modules": {
//!     "main":      { "dependencies": { "lib/util": { "target": "lib/util" } } },
//!     "lib/util":  { "dependencies": {} },
//!     "platform":  { "needs_elevated": true }
//!   }
//! }
//! ```

use cordon_types::{CanonicalPath, ErrorCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Parsed dependency manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Entries keyed by root-relative module id.
    pub modules: BTreeMap<String, ManifestEntry>,
}

/// Manifest entry for a single module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestEntry {
    /// The module runs elevated and may import anything.
    pub needs_elevated: bool,

    /// Declared dependency edges keyed by the id passed to `require`.
    ///
    /// `None` means the packager recorded nothing for this module.
    pub dependencies: Option<BTreeMap<String, DeclaredDependency>>,
}

/// A declared dependency edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclaredDependency {
    /// Module key the edge is expected to load. `None` if the packager
    /// could not locate it.
    pub target: Option<String>,
}

impl Manifest {
    /// Parses a JSON manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] on malformed input.
    pub fn from_json_str(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json).map_err(|e| ManifestError::parse("<inline>", e.to_string()))
    }

    /// Parses a TOML manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] on malformed input.
    pub fn from_toml_str(text: &str) -> Result<Self, ManifestError> {
        toml::from_str(text).map_err(|e| ManifestError::parse("<inline>", e.to_string()))
    }

    /// Reads a manifest file, choosing TOML for `.toml` files and JSON otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ManifestError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let parsed = if is_toml {
            toml::from_str(&text).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&text).map_err(|e| e.to_string())
        };
        parsed.map_err(|message| ManifestError::parse(path.display().to_string(), message))
    }

    /// Adds an entry.
    #[must_use]
    pub fn with_entry(mut self, key: impl Into<String>, entry: ManifestEntry) -> Self {
        self.modules.insert(key.into(), entry);
        self
    }

    /// Returns the key and entry that describe `path`.
    ///
    /// The longest key matching the path's tail wins.
    #[must_use]
    pub fn entry_for(&self, path: &CanonicalPath) -> Option<(&str, &ManifestEntry)> {
        self.modules
            .iter()
            .filter(|(key, _)| key_matches(path, key))
            .max_by_key(|(key, _)| key.len())
            .map(|(key, entry)| (key.as_str(), entry))
    }

    /// Returns `true` if the module at `path` is marked `needs_elevated`.
    #[must_use]
    pub fn needs_elevated(&self, path: &CanonicalPath) -> bool {
        self.entry_for(path).is_some_and(|(_, e)| e.needs_elevated)
    }
}

impl ManifestEntry {
    /// Marks the entry as needing elevation.
    #[must_use]
    pub fn elevated() -> Self {
        Self {
            needs_elevated: true,
            dependencies: None,
        }
    }

    /// Declares a dependency edge.
    #[must_use]
    pub fn with_dependency(mut self, id: impl Into<String>, target: Option<&str>) -> Self {
        self.dependencies.get_or_insert_with(BTreeMap::new).insert(
            id.into(),
            DeclaredDependency {
                target: target.map(str::to_string),
            },
        );
        self
    }

    /// Looks up a declared edge.
    #[must_use]
    pub fn dependency(&self, id: &str) -> Option<&DeclaredDependency> {
        self.dependencies.as_ref()?.get(id)
    }
}

/// Returns `true` if a manifest key names the module at `path`.
///
/// The path's final extension is ignored; the key must match the whole
/// path or a `/`-delimited tail of it.
#[must_use]
pub fn key_matches(path: &CanonicalPath, key: &str) -> bool {
    let stem = strip_extension(path.as_str());
    let key = key.trim_start_matches('/');
    if key.is_empty() {
        return false;
    }
    stem == key
        || stem
            .strip_suffix(key)
            .is_some_and(|prefix| prefix.ends_with('/'))
}

fn strip_extension(path: &str) -> &str {
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..file_start + dot],
        _ => path,
    }
}

/// How manifest findings are acted upon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    /// Log findings and allow the edge.
    #[default]
    Warn,
    /// Log findings and refuse the edge.
    Deny,
}

impl Enforcement {
    /// Whether an edge with a finding is still allowed.
    #[must_use]
    pub fn permits(self) -> bool {
        matches!(self, Self::Warn)
    }
}

impl fmt::Display for Enforcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Warn => "warn",
            Self::Deny => "deny",
        })
    }
}

impl FromStr for Enforcement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "deny" => Ok(Self::Deny),
            other => Err(format!("unknown enforcement '{other}' (expected 'warn' or 'deny')")),
        }
    }
}

/// Manifest loading errors.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read manifest '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest is malformed.
    #[error("failed to parse manifest '{origin}': {message}")]
    Parse { origin: String, message: String },
}

impl ManifestError {
    fn parse(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            origin: origin.into(),
            message: message.into(),
        }
    }
}

impl ErrorCode for ManifestError {
    fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "MANIFEST_READ",
            Self::Parse { .. } => "MANIFEST_PARSE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
