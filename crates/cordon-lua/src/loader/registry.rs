//! Module record arena.
//!
//! One [`ModuleRecord`] per canonical path, stored in a `Vec` and addressed
//! by a stable [`ModuleKey`]. Records are reset, never removed, so keys
//! stay valid for the loader's lifetime.

use crate::sandbox::Sandbox;
use cordon_types::{CanonicalPath, ModuleInfo};
use mlua::Value;
use std::collections::HashMap;

/// Stable index of a module record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ModuleKey(usize);

/// Loader state for one canonical path.
#[derive(Debug)]
pub(crate) struct ModuleRecord {
    pub(crate) path: CanonicalPath,
    /// Last identifier that resolved to this path.
    pub(crate) id: Option<String>,
    pub(crate) info: Option<ModuleInfo>,
    /// Exports, or the placeholder while the module is evaluating.
    pub(crate) exports: Option<Value>,
    pub(crate) context: Option<Sandbox>,
    pub(crate) access_count: usize,
    pub(crate) define_used: bool,
}

impl ModuleRecord {
    fn new(path: CanonicalPath) -> Self {
        Self {
            path,
            id: None,
            info: None,
            exports: None,
            context: None,
            access_count: 0,
            define_used: false,
        }
    }

    /// Returns `true` once exports (or a placeholder) exist.
    pub(crate) fn is_cached(&self) -> bool {
        self.exports.is_some()
    }

    /// Name used in diagnostics: the requiring id if known, else the path.
    pub(crate) fn display_name(&self) -> &str {
        self.id.as_deref().unwrap_or(self.path.as_str())
    }
}

#[derive(Debug, Default)]
pub(crate) struct ModuleRegistry {
    index: HashMap<CanonicalPath, ModuleKey>,
    records: Vec<ModuleRecord>,
}

impl ModuleRegistry {
    /// Returns the key for `path`, creating an empty record if needed.
    pub(crate) fn entry(&mut self, path: &CanonicalPath) -> ModuleKey {
        if let Some(key) = self.index.get(path) {
            return *key;
        }
        let key = ModuleKey(self.records.len());
        self.records.push(ModuleRecord::new(path.clone()));
        self.index.insert(path.clone(), key);
        key
    }

    /// Counts one resolved access to `path` under identifier `id`.
    pub(crate) fn record_access(&mut self, path: &CanonicalPath, id: &str) -> ModuleKey {
        let key = self.entry(path);
        let record = self.record_mut(key);
        record.access_count += 1;
        record.id = Some(id.to_string());
        key
    }

    pub(crate) fn key(&self, path: &CanonicalPath) -> Option<ModuleKey> {
        self.index.get(path).copied()
    }

    pub(crate) fn record(&self, key: ModuleKey) -> &ModuleRecord {
        &self.records[key.0]
    }

    pub(crate) fn record_mut(&mut self, key: ModuleKey) -> &mut ModuleRecord {
        &mut self.records[key.0]
    }

    pub(crate) fn by_path(&self, path: &CanonicalPath) -> Option<&ModuleRecord> {
        self.key(path).map(|key| self.record(key))
    }

    /// Forgets everything about a module after a failed load.
    pub(crate) fn discard(&mut self, key: ModuleKey) {
        let record = self.record_mut(key);
        let path = record.path.clone();
        *record = ModuleRecord::new(path);
    }

    /// Paths with cached exports, in first-access order.
    pub(crate) fn cached_paths(&self) -> Vec<CanonicalPath> {
        self.records
            .iter()
            .filter(|r| r.is_cached())
            .map(|r| r.path.clone())
            .collect()
    }
}
