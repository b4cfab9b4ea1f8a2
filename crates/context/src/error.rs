use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Invalid context key: {0:?}")]
    InvalidKey(String),

    #[error("Failed to create context directory {path}: {source}")]
    Namespace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Context I/O error for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt metadata for key '{key}': {source}")]
    CorruptMetadata {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
