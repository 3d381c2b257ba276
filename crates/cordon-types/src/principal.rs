//! Principal (privilege tier) types.
//!
//! A [`Principal`] names the privilege level an execution context runs
//! under. It is decided once, when a module's [`ModuleInfo`](crate::ModuleInfo)
//! is fetched, and threaded explicitly into context creation.
//!
//! | Variant | Capabilities | Typical Use |
//! |---------|--------------|-------------|
//! | `Restricted` | pure computation helpers only | third-party and add-on modules |
//! | `Elevated` | full host VM facilities (`os`, `io`, `load`, ...) | trusted platform modules |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Privilege tier of an isolated execution context.
///
/// `Restricted` is the default for every module unless the host configures
/// a different default or the module's metadata requests elevation.
///
/// # Example
///
/// ```
/// use cordon_types::Principal;
///
/// let p: Principal = "elevated".parse().unwrap();
/// assert!(p.is_elevated());
/// assert_eq!(Principal::default(), Principal::Restricted);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Principal {
    /// Limited privileges.
    #[default]
    Restricted,

    /// Trusted code with access to host facilities.
    Elevated,
}

impl Principal {
    /// Returns `true` for [`Principal::Elevated`].
    #[must_use]
    pub fn is_elevated(self) -> bool {
        matches!(self, Self::Elevated)
    }

    /// Returns the lowercase name used in configuration and manifests.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Restricted => "restricted",
            Self::Elevated => "elevated",
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown principal name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPrincipal(pub String);

impl fmt::Display for UnknownPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown principal '{}' (expected 'restricted' or 'elevated')",
            self.0
        )
    }
}

impl std::error::Error for UnknownPrincipal {}

impl FromStr for Principal {
    type Err = UnknownPrincipal;

    /// Accepts `restricted`/`elevated`, plus the legacy alias `system` for elevated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "restricted" => Ok(Self::Restricted),
            "elevated" | "system" => Ok(Self::Elevated),
            other => Err(UnknownPrincipal(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_restricted() {
        assert_eq!(Principal::default(), Principal::Restricted);
        assert!(!Principal::default().is_elevated());
    }

    #[test]
    fn parse_names() {
        assert_eq!("restricted".parse(), Ok(Principal::Restricted));
        assert_eq!("Elevated".parse(), Ok(Principal::Elevated));
        assert_eq!("system".parse(), Ok(Principal::Elevated));
        assert!("root".parse::<Principal>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for p in [Principal::Restricted, Principal::Elevated] {
            assert_eq!(p.to_string().parse(), Ok(p));
        }
    }

    #[test]
    fn serde_uses_lowercase() {
        let json = serde_json::to_string(&Principal::Elevated).expect("serialize");
        assert_eq!(json, "\"elevated\"");
        let back: Principal = serde_json::from_str("\"restricted\"").expect("deserialize");
        assert_eq!(back, Principal::Restricted);
    }
}
