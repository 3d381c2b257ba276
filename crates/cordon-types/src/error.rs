//! Unified error code interface for cordon crates.
//!
//! Every error enum in the workspace implements [`ErrorCode`] so hosts can
//! branch on a stable machine-readable code instead of parsing messages.
//!
//! # Example
//!
//! ```
//! use cordon_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum FetchError {
//!     Missing(String),
//!     Busy,
//! }
//!
//! impl ErrorCode for FetchError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Missing(_) => "FETCH_MISSING",
//!             Self::Busy => "FETCH_BUSY",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Busy)
//!     }
//! }
//!
//! assert_eq!(FetchError::Busy.code(), "FETCH_BUSY");
//! assert!(FetchError::Busy.is_recoverable());
//! ```

/// Machine-readable classification of an error.
///
/// # Code Format
///
/// - **UPPER_SNAKE_CASE**, e.g. `"LOADER_NOT_FOUND"`
/// - **Namespace-prefixed** by the owning crate (`FS_`, `LOADER_`, `CONFIG_`, ...)
/// - **Stable**: codes are part of the public contract
pub trait ErrorCode {
    /// Returns the machine-readable error code.
    fn code(&self) -> &'static str;

    /// Returns whether retrying (or a user-side fix without code change) may succeed.
    fn is_recoverable(&self) -> bool;
}

/// Asserts that an error code is non-empty, prefixed and UPPER_SNAKE_CASE.
///
/// Intended for tests that sweep every variant of an error enum.
///
/// # Panics
///
/// Panics with a descriptive message if validation fails.
pub fn assert_error_code<E: ErrorCode>(err: &E, expected_prefix: &str) {
    let code = err.code();

    assert!(!code.is_empty(), "Error code must not be empty");
    assert!(
        code.starts_with(expected_prefix),
        "Error code '{code}' must start with prefix '{expected_prefix}'"
    );
    assert!(
        is_upper_snake_case(code),
        "Error code '{code}' must be UPPER_SNAKE_CASE"
    );
}

fn is_upper_snake_case(s: &str) -> bool {
    !s.starts_with('_')
        && !s.ends_with('_')
        && !s.contains("__")
        && s.chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample(&'static str);

    impl ErrorCode for Sample {
        fn code(&self) -> &'static str {
            self.0
        }

        fn is_recoverable(&self) -> bool {
            false
        }
    }

    #[test]
    fn upper_snake_case_detection() {
        assert!(is_upper_snake_case("LOADER_NOT_FOUND"));
        assert!(is_upper_snake_case("FS_READ2"));
        assert!(!is_upper_snake_case("loader_not_found"));
        assert!(!is_upper_snake_case("_LEADING"));
        assert!(!is_upper_snake_case("TRAILING_"));
        assert!(!is_upper_snake_case("DOUBLE__UNDERSCORE"));
    }

    #[test]
    fn assert_error_code_accepts_valid_code() {
        assert_error_code(&Sample("FS_MISSING"), "FS_");
    }

    #[test]
    #[should_panic(expected = "must start with prefix")]
    fn assert_error_code_rejects_wrong_prefix() {
        assert_error_code(&Sample("LOADER_X"), "FS_");
    }
}
