//! The dispatch loop.
//!
//! Reads one line, answers it, then reads the next. Requests are never
//! overlapped, so responses leave in the order requests arrived.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{MethodError, RpcError};
use crate::registry::MethodRegistry;
use crate::transport::RpcTransport;
use crate::types::{decode_line, Incoming, JsonRpcRequest, JsonRpcResponse, Outcome};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    Interrupted,
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeSummary {
    pub requests: u64,
    pub opaque_lines: u64,
    pub reason: StopReason,
}

/// Line-delimited JSON-RPC server over a fixed `MethodRegistry`.
pub struct RpcServer {
    registry: Arc<MethodRegistry>,
    server_name: String,
    echo_marker: String,
    requests: u64,
    opaque_lines: u64,
}

impl RpcServer {
    pub fn new(registry: Arc<MethodRegistry>) -> Self {
        Self {
            registry,
            server_name: "linewire".to_string(),
            echo_marker: "[ECHO]".to_string(),
            requests: 0,
            opaque_lines: 0,
        }
    }

    /// Set the server name used in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    /// Set the prefix written before echoed opaque lines.
    pub fn with_echo_marker(mut self, marker: impl Into<String>) -> Self {
        self.echo_marker = marker.into();
        self
    }

    /// Run until end of stream.
    pub async fn run<T: RpcTransport>(
        &mut self,
        transport: &mut T,
    ) -> Result<ServeSummary, RpcError> {
        self.run_until(transport, std::future::pending::<()>()).await
    }

    /// Run until end of stream or until `shutdown` resolves.
    ///
    /// `shutdown` is only observed while waiting for input: a request that
    /// has been read is always answered and flushed first.
    pub async fn run_until<T, F>(
        &mut self,
        transport: &mut T,
        shutdown: F,
    ) -> Result<ServeSummary, RpcError>
    where
        T: RpcTransport,
        F: Future<Output = ()>,
    {
        info!(
            server = %self.server_name,
            methods = self.registry.len(),
            "RPC server starting"
        );
        tokio::pin!(shutdown);

        let reason = loop {
            let line = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Interrupt received, shutting down");
                    break StopReason::Interrupted;
                }
                line = transport.receive() => line?,
            };

            let Some(line) = line else {
                info!("EOF received, shutting down");
                break StopReason::EndOfStream;
            };

            if let Some(out) = self.handle_line(&line).await? {
                transport.send(&out).await?;
            }
        };

        let summary = ServeSummary {
            requests: self.requests,
            opaque_lines: self.opaque_lines,
            reason,
        };
        info!(
            server = %self.server_name,
            requests = summary.requests,
            opaque_lines = summary.opaque_lines,
            "Processed {} requests",
            summary.requests
        );
        Ok(summary)
    }

    /// Handle one raw line, returning the line to write back (if any).
    pub async fn handle_line(&mut self, line: &str) -> Result<Option<String>, RpcError> {
        if line.trim().is_empty() {
            return Ok(None);
        }

        match decode_line(line) {
            Incoming::Opaque { reason } => {
                self.opaque_lines += 1;
                warn!(
                    reason = %reason,
                    line = %preview(line),
                    "Non-protocol line received, echoing"
                );
                Ok(Some(format!("{} {}", self.echo_marker, line)))
            }
            Incoming::Request(request) => {
                self.requests += 1;
                debug!(
                    count = self.requests,
                    method = %request.method,
                    id = ?request.id,
                    "Processing request #{}",
                    self.requests
                );
                match self.handle_request(request).await {
                    Some(response) => Ok(Some(serde_json::to_string(&response)?)),
                    None => Ok(None),
                }
            }
        }
    }

    /// Dispatch a decoded request. Notifications run but produce no response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let JsonRpcRequest {
            jsonrpc,
            id,
            method,
            params,
        } = request;

        let outcome = match self.registry.dispatch(&method, params).await {
            Ok(value) => Outcome::Result(value),
            Err(err) => {
                log_failure(&method, &err);
                Outcome::Error(err.to_rpc_error())
            }
        };

        match id {
            Some(id) => Some(JsonRpcResponse {
                jsonrpc,
                id,
                outcome,
            }),
            None => {
                debug!(method = %method, "Notification handled, no response sent");
                None
            }
        }
    }
}

fn log_failure(method: &str, err: &MethodError) {
    match err {
        MethodError::MethodNotFound(_) => warn!(method = %method, "Unknown method"),
        MethodError::InvalidParams(msg) => warn!(method = %method, error = %msg, "Invalid params"),
        MethodError::Domain(msg) => warn!(method = %method, error = %msg, "Method failed"),
        MethodError::Internal(msg) => {
            tracing::error!(method = %method, error = %msg, "Internal error")
        }
    }
}

fn preview(line: &str) -> String {
    const MAX: usize = 50;
    if line.chars().count() <= MAX {
        line.to_string()
    } else {
        let head: String = line.chars().take(MAX).collect();
        format!("{head}...")
    }
}
