//! Error taxonomy shared by every crate in the workspace.
//!
//! `ErrorKind` is a small closed set of surface behaviors ("validation",
//! "transient", "coordinator-fatal", ...) that every crate classifies its
//! failures into. `CoreError` is the concrete error type; `kind()` is what
//! callers actually branch on, wrapping heterogeneous underlying error
//! sources behind one enum while callers mostly match on a handful of
//! variants.

use thiserror::Error;

/// The stable error-kind contract. Names are part of the public API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    Transient,
    RateLimited,
    PermanentDownstream,
    CoordinatorFatal,
}

impl ErrorKind {
    /// Transient and rate-limited errors are retryable by the caller; everything else is not.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient | ErrorKind::RateLimited)
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("rate limited")]
    RateLimited,

    #[error("permanent downstream error: {0}")]
    PermanentDownstream(String),

    #[error("coordinator-fatal: {0}")]
    CoordinatorFatal(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Unauthenticated => ErrorKind::Unauthenticated,
            CoreError::Forbidden(_) => ErrorKind::Forbidden,
            CoreError::NotFound => ErrorKind::NotFound,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::Transient(_) => ErrorKind::Transient,
            CoreError::RateLimited => ErrorKind::RateLimited,
            CoreError::PermanentDownstream(_) => ErrorKind::PermanentDownstream,
            CoreError::CoordinatorFatal(_) => ErrorKind::CoordinatorFatal,
            CoreError::Database(_) => ErrorKind::Transient,
            CoreError::Serialization(_) => ErrorKind::PermanentDownstream,
            CoreError::Config(_) => ErrorKind::CoordinatorFatal,
        }
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
