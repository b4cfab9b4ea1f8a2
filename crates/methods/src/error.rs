use std::path::PathBuf;

use linewire_context::ContextError;
use linewire_delegate::DelegateError;
use linewire_rpc::MethodError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Invalid SQLite connection string")]
    InvalidConnection,

    #[error("Database file not found: {0}")]
    NotFound(PathBuf),

    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database worker failed: {0}")]
    Worker(String),
}

impl DatabaseError {
    /// Store failures are reported to the caller; worker failures are ours.
    pub(crate) fn into_method_error(self) -> MethodError {
        match self {
            DatabaseError::Worker(msg) => MethodError::internal(msg),
            other => MethodError::domain(format!("Database error: {other}")),
        }
    }
}

pub(crate) fn context_failure(err: ContextError) -> MethodError {
    match err {
        ContextError::InvalidKey(_) => MethodError::invalid_params(err.to_string()),
        other => MethodError::domain(other.to_string()),
    }
}

pub(crate) fn delegate_failure(err: DelegateError) -> MethodError {
    MethodError::domain(err.to_string())
}
