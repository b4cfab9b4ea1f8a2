use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DelegateError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Delegate exited with code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("Delegate timed out after {0:?}")]
    Timeout(Duration),

    #[error("Delegate I/O error: {0}")]
    Io(#[from] std::io::Error),
}
