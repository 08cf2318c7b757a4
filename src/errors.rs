use crate::schema::Deviation;
use std::{io, path::PathBuf};

/// Shared error type used by every utility in the crate.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    /// An argument was rejected before any work was done.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// File system I/O failure.
    #[error("I/O error while accessing {0}")]
    Io(PathBuf, #[source] io::Error),

    /// Writing to an output stream failed.
    #[error("failed to write output")]
    Output(#[source] io::Error),

    /// A path that must exist does not.
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    /// A path that must not exist already does.
    #[error("path already exists: {0}")]
    AlreadyExists(PathBuf),

    /// A path exists but is the wrong kind or carries the wrong extension.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The requested culture name is not known.
    #[error("unknown culture: {0}")]
    UnknownCulture(String),

    /// The schema document could not be understood.
    #[error("invalid schema: {0}")]
    Schema(String),

    /// A document failed schema validation in fail-fast mode.
    #[error("document is not valid: {0}")]
    Validation(Deviation),

    /// Writing or parsing XML failed outside of schema validation.
    #[error("xml error: {0}")]
    Xml(String),
}

impl CoreError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::InvalidPath(message.into())
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, error: io::Error) -> Self {
        Self::Io(path.into(), error)
    }
}

impl From<io::Error> for CoreError {
    fn from(error: io::Error) -> Self {
        Self::Output(error)
    }
}

/// Shared result alias for the crate.
pub type Result<T> = std::result::Result<T, CoreError>;
