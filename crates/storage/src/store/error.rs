#![forbid(unsafe_code)]

use thiserror::Error;

/// Failures of the backend itself rather than of the caller's request.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("repository schema is not installed (missing table {0})")]
    MissingSchema(&'static str),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("referential integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("format violation: {0}")]
    FormatViolation(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("transaction state: {0}")]
    TransactionState(&'static str),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("not logged in")]
    NotLoggedIn,

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("backend: {0}")]
    Backend(#[from] BackendError),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::InvalidPath { .. } => "INVALID_PATH",
            Self::IntegrityViolation(_) => "INTEGRITY_VIOLATION",
            Self::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            Self::FormatViolation(_) => "FORMAT_VIOLATION",
            Self::NotSupported(_) => "NOT_SUPPORTED",
            Self::TransactionState(_) => "TRANSACTION_STATE",
            Self::InvalidQuery(_) => "INVALID_QUERY",
            Self::NotLoggedIn => "NOT_LOGGED_IN",
            Self::Authentication(_) => "AUTHENTICATION",
            Self::Backend(_) => "BACKEND",
        }
    }

    pub(crate) fn invalid_path(path: &str, err: cr_core::NodePathError) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason: err.message(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Backend(BackendError::Sql(value))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Backend(BackendError::Io(value))
    }
}

impl From<serde_yaml::Error> for StoreError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Backend(BackendError::Config(value.to_string()))
    }
}
