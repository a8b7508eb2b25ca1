//! Error types for layout rendering.
//!
//! This module provides [`LayoutError`], the single error type returned by path
//! validation, rendering and adapter construction.
//!
//! Errors raised by collaborators are never re-wrapped: an I/O failure from the
//! [`FileSource`](crate::source::FileSource) surfaces as [`LayoutError::Io`] carrying the
//! original [`std::io::Error`], and an engine failure surfaces as
//! [`LayoutError::Template`] carrying the engine's own error. Callers can therefore
//! tell "my input was rejected" apart from "the file system failed" by matching on
//! the variant or by comparing [`LayoutError::code`].

use std::io;
use std::path::PathBuf;

/// Error type for layout rendering operations.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// The file path was missing, empty or not a string.
    #[error("invalid file path: {0}")]
    InvalidFilePath(String),

    /// The file path does not end with the template extension.
    #[error("file path \"{}\" is not a template (expected extension \"{extension}\")", .path.display())]
    FilePathIsNotTemplate {
        /// The rejected path
        path: PathBuf,
        /// The extension templates must carry
        extension: String,
    },

    /// Render data did not serialize to a map.
    #[error("locals must serialize to a map, got {0}")]
    InvalidLocals(&'static str),

    /// Global locals were given but are not an object.
    #[error("global locals must be an object, got {0}")]
    InvalidGlobalLocals(&'static str),

    /// A transform was given but is not a function.
    #[error("transform must be a function, got {0}")]
    InvalidTransformFunction(&'static str),

    /// The layout/include chain went deeper than the configured limit.
    ///
    /// This almost always means a cycle (`a` uses `b` as layout, `b` uses `a`).
    #[error("layout chain exceeded maximum depth of {max_depth} at \"{}\"", .path.display())]
    LayoutCycleOrTooDeep {
        /// The file that would have been rendered past the limit
        path: PathBuf,
        /// The configured limit
        max_depth: usize,
    },

    /// The output of `include` was changed before reaching the template output,
    /// so it could not be spliced back in.
    #[error("the result of include() was altered before output; filters cannot be applied to included content")]
    IncludeAltered,

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// File system error, passed through unchanged.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Template compilation or execution error, passed through unchanged.
    #[error("{0}")]
    Template(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl LayoutError {
    /// Wraps an engine error without altering it.
    pub fn template<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        LayoutError::Template(Box::new(err))
    }

    /// Creates an [`InvalidFilePath`](LayoutError::InvalidFilePath) error.
    pub fn invalid_path(reason: impl Into<String>) -> Self {
        LayoutError::InvalidFilePath(reason.into())
    }

    /// Returns a stable, machine-readable code for this error.
    ///
    /// I/O errors map to the POSIX-style code of their kind, so a missing
    /// template reports `ENOENT` whichever [`FileSource`](crate::source::FileSource)
    /// produced it.
    pub fn code(&self) -> &'static str {
        match self {
            LayoutError::InvalidFilePath(_) => "INVALID_FILEPATH",
            LayoutError::FilePathIsNotTemplate { .. } => "FILEPATH_IS_NOT_TEMPLATE",
            LayoutError::InvalidLocals(_) => "INVALID_LOCALS",
            LayoutError::InvalidGlobalLocals(_) => "INVALID_GLOBAL_LOCALS",
            LayoutError::InvalidTransformFunction(_) => "INVALID_TRANSFORM_LOCALS_FUNCTION",
            LayoutError::LayoutCycleOrTooDeep { .. } => "LAYOUT_TOO_DEEP",
            LayoutError::IncludeAltered => "INCLUDE_ALTERED",
            LayoutError::Config(_) => "CONFIG_ERROR",
            LayoutError::Io(err) => match err.kind() {
                io::ErrorKind::NotFound => "ENOENT",
                io::ErrorKind::PermissionDenied => "EACCES",
                io::ErrorKind::AlreadyExists => "EEXIST",
                _ => "EIO",
            },
            LayoutError::Template(_) => "TEMPLATE_ERROR",
        }
    }

    /// Returns the underlying I/O error kind, if this is a file system error.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            LayoutError::Io(err) => Some(err.kind()),
            _ => None,
        }
    }

    /// Whether this error was raised by input or configuration validation,
    /// as opposed to a collaborator failing.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LayoutError::InvalidFilePath(_)
                | LayoutError::FilePathIsNotTemplate { .. }
                | LayoutError::InvalidLocals(_)
                | LayoutError::InvalidGlobalLocals(_)
                | LayoutError::InvalidTransformFunction(_)
                | LayoutError::Config(_)
        )
    }
}

impl From<minijinja::Error> for LayoutError {
    fn from(err: minijinja::Error) -> Self {
        LayoutError::template(err)
    }
}

impl From<serde_yaml::Error> for LayoutError {
    fn from(err: serde_yaml::Error) -> Self {
        LayoutError::Config(err.to_string())
    }
}

/// Names the JSON type of a value, for error messages.
pub(crate) fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
