//! Loader error types.
//!
//! Every failure of a `require`/`define` call is a [`LoaderError`]. When an
//! error crosses a Lua boundary (a module requiring another module) it
//! travels as an `mlua` external error and is recovered unchanged at the
//! outermost call, so hosts always see the innermost cause.

use cordon_runtime::{FsError, ManifestError};
use cordon_types::ErrorCode;
use thiserror::Error;

/// Errors raised by the module loader.
#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    /// Resolution produced no canonical path.
    #[error("module \"{id}\" not found in basepath \"{base}\"")]
    NotFound { id: String, base: String },

    /// The security policy refused to evaluate the module.
    #[error("access denied to execute module: {id}")]
    EvalDenied { id: String },

    /// The security policy refused to hand out the module's exports.
    #[error("access denied to import module: {id}")]
    ImportDenied { id: String },

    /// Both the set-exports convention and the define-return convention were used.
    #[error("{reason}: {path}")]
    ConventionConflict { path: String, reason: &'static str },

    /// Duplicate or mismatched `define()`.
    #[error("{reason} in {path}")]
    DefineMisuse { path: String, reason: String },

    /// `define()` tried to replace exports that another module already observed.
    #[error("module \"{path}\" cannot use return from define to define the module after another module has referenced its exported value")]
    UnsafeRedefinition { path: String },

    /// The module's own source raised an error.
    #[error("error evaluating {filename}: {}", format_lua_error(.source))]
    Evaluation {
        /// Filename of the failing unit.
        filename: String,
        /// Units that were being evaluated, outermost first.
        trace: Vec<String>,
        #[source]
        source: mlua::Error,
    },

    /// The file system failed to fetch a resolved module.
    #[error(transparent)]
    FileSystem(#[from] FsError),

    /// Lua VM error outside module evaluation.
    #[error("lua error: {}", format_lua_error(.0))]
    Lua(#[source] mlua::Error),

    /// Bad arguments passed to `require` or `define`.
    #[error("invalid arguments to {function}(): {message}")]
    InvalidArgument {
        function: &'static str,
        message: String,
    },

    /// A binding outlived its loader.
    #[error("loader has been disposed")]
    Disposed,

    /// The configured manifest could not be loaded.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Neither a file system nor root paths were configured.
    #[error("need a root path for module filesystem")]
    NoFileSystem,

    /// Internal invariant violation.
    #[error("internal loader error: {0}")]
    Internal(String),
}

/// `ConventionConflict` reason: `define()` ran, then exports were replaced.
pub const REASON_EXPORTS_AFTER_DEFINE: &str =
    "define() was used, so module.exports= and module.setExports() may not be used";

/// `ConventionConflict` reason: a factory asked for `exports` and also returned a value.
pub const REASON_EXPORTS_AND_RETURN: &str =
    "cannot use exports and also return a value from a define definition function";

impl LoaderError {
    /// Creates a not-found error.
    pub fn not_found(id: impl Into<String>, base: impl Into<String>) -> Self {
        Self::NotFound {
            id: id.into(),
            base: base.into(),
        }
    }

    /// Creates a define misuse error.
    pub fn define_misuse(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DefineMisuse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a convention conflict error.
    pub fn convention_conflict(path: impl Into<String>, reason: &'static str) -> Self {
        Self::ConventionConflict {
            path: path.into(),
            reason,
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(function: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            function,
            message: message.into(),
        }
    }

    /// Builds the error for a failed module evaluation.
    ///
    /// A loader error raised by a nested `require` is passed through
    /// unchanged; anything else is attributed to `filename`.
    pub fn from_evaluation(err: mlua::Error, filename: &str, trace: Vec<String>) -> Self {
        match find_loader_error(&err) {
            Some(inner) => inner.clone(),
            None => Self::Evaluation {
                filename: filename.to_string(),
                trace,
                source: err,
            },
        }
    }

    /// Returns `true` for either access-denied variant.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::EvalDenied { .. } | Self::ImportDenied { .. })
    }
}

impl From<ManifestError> for LoaderError {
    fn from(err: ManifestError) -> Self {
        Self::Manifest(err.to_string())
    }
}

impl From<mlua::Error> for LoaderError {
    fn from(err: mlua::Error) -> Self {
        match find_loader_error(&err) {
            Some(inner) => inner.clone(),
            None => Self::Lua(err),
        }
    }
}

impl From<LoaderError> for mlua::Error {
    fn from(err: LoaderError) -> Self {
        mlua::Error::external(err)
    }
}

impl ErrorCode for LoaderError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "LOADER_NOT_FOUND",
            Self::EvalDenied { .. } => "LOADER_EVAL_DENIED",
            Self::ImportDenied { .. } => "LOADER_IMPORT_DENIED",
            Self::ConventionConflict { .. } => "LOADER_CONVENTION_CONFLICT",
            Self::DefineMisuse { .. } => "LOADER_DEFINE_MISUSE",
            Self::UnsafeRedefinition { .. } => "LOADER_UNSAFE_REDEFINITION",
            Self::Evaluation { .. } => "LOADER_EVALUATION",
            Self::FileSystem(_) => "LOADER_FILE_SYSTEM",
            Self::Lua(_) => "LOADER_LUA",
            Self::InvalidArgument { .. } => "LOADER_INVALID_ARGUMENT",
            Self::Disposed => "LOADER_DISPOSED",
            Self::Manifest(_) => "LOADER_MANIFEST",
            Self::NoFileSystem => "LOADER_NO_FILE_SYSTEM",
            Self::Internal(_) => "LOADER_INTERNAL",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::FileSystem(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

/// Finds a [`LoaderError`] wrapped anywhere inside an `mlua` error chain.
#[must_use]
pub fn find_loader_error(err: &mlua::Error) -> Option<&LoaderError> {
    match err {
        mlua::Error::ExternalError(inner) => inner.downcast_ref::<LoaderError>(),
        mlua::Error::CallbackError { cause, .. } => find_loader_error(cause),
        mlua::Error::WithContext { cause, .. } => find_loader_error(cause),
        _ => None,
    }
}

/// Formats an `mlua` error without callback tracebacks.
#[must_use]
pub fn format_lua_error(err: &mlua::Error) -> String {
    match err {
        mlua::Error::RuntimeError(msg) => msg.clone(),
        mlua::Error::CallbackError { cause, .. } => format_lua_error(cause),
        mlua::Error::WithContext { context, cause } => {
            format!("{context}: {}", format_lua_error(cause))
        }
        mlua::Error::SyntaxError { message, .. } => format!("syntax error: {message}"),
        mlua::Error::ExternalError(inner) => inner.to_string(),
        _ => err.to_string(),
    }
}
