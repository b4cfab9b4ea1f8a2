//! Method handlers for the three server profiles.
//!
//! - [`echo`]: generic responder that acknowledges any method
//! - [`database`]: SQLite-backed `database/query`, `database/execute`, `database/schema`
//! - [`assistant`]: external delegate plus keyed context, also exposed as MCP tools

pub mod assistant;
pub mod database;
pub mod echo;
pub mod error;

pub use error::DatabaseError;
