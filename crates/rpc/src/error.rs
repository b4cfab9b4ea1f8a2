//! Error types for the RPC crate.

use crate::types::{error_codes, JsonRpcError};

/// Failures of the line transport itself. These end the dispatch loop.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Failed to encode an outgoing message.
    #[error("JSON encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Transport I/O error.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),
}

/// Per-request failure, converted into an error envelope by the dispatch
/// loop. Nothing here is fatal to the process.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MethodError {
    /// The requested method is not registered.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Parameters are missing, mistyped, or not an object.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// The operation ran and failed (store error, delegate failure, ...).
    #[error("{0}")]
    Domain(String),

    /// The server failed to run the handler at all.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MethodError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        MethodError::InvalidParams(message.into())
    }

    pub fn domain(message: impl Into<String>) -> Self {
        MethodError::Domain(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        MethodError::Internal(message.into())
    }

    /// JSON-RPC error code for this failure.
    pub fn code(&self) -> i64 {
        match self {
            MethodError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            MethodError::InvalidParams(_) => error_codes::INVALID_PARAMS,
            MethodError::Domain(_) => error_codes::DOMAIN_ERROR,
            MethodError::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }

    /// Convert to a JSON-RPC error object.
    pub fn to_rpc_error(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.code(),
            message: self.to_string(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(MethodError::MethodNotFound("x".into()).code(), -32601);
        assert_eq!(MethodError::invalid_params("x").code(), -32602);
        assert_eq!(MethodError::domain("x").code(), -32000);
        assert_eq!(MethodError::internal("x").code(), -32603);
    }

    #[test]
    fn test_domain_message_is_verbatim() {
        let err = MethodError::domain("Database error: no such table: t");
        assert_eq!(err.to_rpc_error().message, "Database error: no such table: t");
    }
}
