//! Line-delimited JSON-RPC 2.0 server for linewire.
//!
//! # Architecture
//!
//! - **types**: JSON-RPC 2.0 envelopes and line classification
//! - **transport**: Line transport over async streams (stdio) or channels
//! - **registry**: Method definitions, parameter validation, handler lookup
//! - **server**: The sequential dispatch loop
//! - **mcp**: MCP tool bridge over a method registry
//! - **error**: Transport and per-request error types
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use linewire_rpc::{MethodRegistry, RpcServer, StdioTransport};
//!
//! # async fn example() {
//! let registry = MethodRegistry::new();
//! let mut server = RpcServer::new(Arc::new(registry));
//! let mut transport = StdioTransport::stdio();
//! server.run(&mut transport).await.unwrap();
//! # }
//! ```

pub mod error;
pub mod mcp;
pub mod registry;
pub mod server;
pub mod transport;
pub mod types;

pub use error::{MethodError, RpcError};
pub use registry::{
    FallbackHandler, MethodDefinition, MethodHandler, MethodRegistry, ParamKind, ParamSpec, Params,
    RegistryError,
};
pub use server::{RpcServer, ServeSummary, StopReason};
pub use transport::{ChannelTransport, RpcTransport, StdioTransport, StreamTransport};
pub use types::*;
