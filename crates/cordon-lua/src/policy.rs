//! Pluggable security policies.
//!
//! The loader consults its [`SecurityPolicy`] on every dependency edge
//! `(base, id)`, including edges whose target is already cached. Decisions
//! are never cached.
//!
//! ```text
//! require(id) from base
//!   │
//!   ├─ resolve ─ cached? ──────────────────────────┐
//!   │                                              │
//!   ├─ get_file ─► allow_eval? ──no──► EvalDenied  │
//!   │                  │yes                        │
//!   │              evaluate                        │
//!   │                  │                           ▼
//!   └──────────────────┴──────────────► allow_import? ──no──► ImportDenied
//!                                              │yes
//!                                           exports
//! ```

use crate::overrides::HOST_CAPABILITY_ID;
use crate::Loader;
use cordon_runtime::manifest::{key_matches, Enforcement, Manifest};
use cordon_types::{display_base, CanonicalPath, ModuleInfo};
use mlua::Value;
use std::sync::Arc;
use tracing::warn;

/// Gatekeeper for module evaluation and import.
///
/// Both hooks default to allowing the edge.
pub trait SecurityPolicy: Send + Sync {
    /// Decides whether a module's source may be evaluated at all.
    ///
    /// `base` is `None` for top-level requires.
    fn allow_eval(
        &self,
        loader: &Loader,
        base: Option<&CanonicalPath>,
        id: &str,
        info: &ModuleInfo,
    ) -> bool {
        let _ = (loader, base, id, info);
        true
    }

    /// Decides whether the requiring module may receive `exports`.
    ///
    /// `info` is `None` when the exports came from an override hook.
    fn allow_import(
        &self,
        loader: &Loader,
        base: Option<&CanonicalPath>,
        id: &str,
        info: Option<&ModuleInfo>,
        exports: &Value,
    ) -> bool {
        let _ = (loader, base, id, info, exports);
        true
    }
}

impl<T: SecurityPolicy + ?Sized> SecurityPolicy for Arc<T> {
    fn allow_eval(
        &self,
        loader: &Loader,
        base: Option<&CanonicalPath>,
        id: &str,
        info: &ModuleInfo,
    ) -> bool {
        (**self).allow_eval(loader, base, id, info)
    }

    fn allow_import(
        &self,
        loader: &Loader,
        base: Option<&CanonicalPath>,
        id: &str,
        info: Option<&ModuleInfo>,
        exports: &Value,
    ) -> bool {
        (**self).allow_import(loader, base, id, info, exports)
    }
}

/// Policy driven by a dependency manifest.
///
/// | Edge | Decision |
/// |------|----------|
/// | top-level (`base` is `None`) | allow |
/// | requiring module `needs_elevated` | allow |
/// | declared dependency, target matches | allow |
/// | declared dependency, target missing or different | finding |
/// | undeclared dependency | finding |
/// | import of `"host"` without `needs_elevated` | finding |
///
/// A finding is always logged; it is allowed under [`Enforcement::Warn`]
/// and refused under [`Enforcement::Deny`].
#[derive(Debug, Clone)]
pub struct ManifestPolicy {
    manifest: Arc<Manifest>,
    enforcement: Enforcement,
}

impl ManifestPolicy {
    /// Creates a warn-only policy over `manifest`.
    #[must_use]
    pub fn new(manifest: Arc<Manifest>) -> Self {
        Self {
            manifest,
            enforcement: Enforcement::Warn,
        }
    }

    /// Sets how findings are acted upon.
    #[must_use]
    pub fn with_enforcement(mut self, enforcement: Enforcement) -> Self {
        self.enforcement = enforcement;
        self
    }

    /// Current enforcement mode.
    #[must_use]
    pub fn enforcement(&self) -> Enforcement {
        self.enforcement
    }

    fn check_edge(&self, base: Option<&CanonicalPath>, id: &str, info: Option<&ModuleInfo>) -> bool {
        let Some(base_path) = base else {
            return true;
        };

        if let Some((_, entry)) = self.manifest.entry_for(base_path) {
            if entry.needs_elevated {
                return true;
            }

            if let Some(declared) = entry.dependency(id) {
                let loading = info.map(|i| i.filename.as_str()).unwrap_or("<override>");
                match (declared.target.as_deref(), info) {
                    (Some(target), Some(info)) if !key_matches(&info.path, target) => {
                        warn!(
                            id,
                            base = %base_path,
                            loading,
                            expected = target,
                            "require() is loading a different module than the manifest declares"
                        );
                    }
                    (None, Some(_)) => {
                        warn!(
                            id,
                            base = %base_path,
                            loading,
                            "require() is loading a module the manifest could not locate"
                        );
                    }
                    _ => return true,
                }
                return self.enforcement.permits();
            }
        }

        warn!(id, base = %display_base(base), "Undeclared require()");
        self.enforcement.permits()
    }
}

impl SecurityPolicy for ManifestPolicy {
    fn allow_eval(
        &self,
        _loader: &Loader,
        base: Option<&CanonicalPath>,
        id: &str,
        info: &ModuleInfo,
    ) -> bool {
        self.check_edge(base, id, Some(info))
    }

    fn allow_import(
        &self,
        _loader: &Loader,
        base: Option<&CanonicalPath>,
        id: &str,
        info: Option<&ModuleInfo>,
        _exports: &Value,
    ) -> bool {
        if id != HOST_CAPABILITY_ID {
            return self.check_edge(base, id, info);
        }

        let Some(base_path) = base else {
            return true;
        };
        if self.manifest.needs_elevated(base_path) {
            return true;
        }
        warn!(base = %base_path, "Undeclared require(\"host\") from a module without elevation");
        self.enforcement.permits()
    }
}
