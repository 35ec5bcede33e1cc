//! Error taxonomy for the synchronization layer.

use thiserror::Error;

/// Error codes surfaced by the backend collaborator.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("invalid login credentials")]
    InvalidCredentials,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl BackendError {
    pub fn code(&self) -> &'static str {
        use BackendError::*;
        match self {
            InvalidCredentials => "invalid_credentials",
            Conflict(_) => "conflict",
            NotFound(_) => "not_found",
            Database(_) => "database",
            Io(_) => "io",
            Malformed(_) => "malformed",
            Hash(_) => "hash",
        }
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Errors returned to the view layer. Every failure is scoped to the
/// operation that produced it; prior state is left untouched.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad credentials.
    #[error("invalid email or password")]
    Authentication,

    /// Email or operation not permitted.
    #[error("not permitted: {0}")]
    Authorization(String),

    /// Input rejected before any network call was made.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    /// A remote write failed.
    #[error("could not save changes: {0}")]
    Persistence(#[source] BackendError),

    /// The object store rejected an upload.
    #[error("could not upload file: {0}")]
    Upload(#[source] BackendError),

    /// A message insert failed.
    #[error("could not send message: {0}")]
    Send(#[source] BackendError),

    /// A read against the backend failed.
    #[error("backend unavailable: {0}")]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, Error>;
