//! File-backed keyed context store shared by the assistant methods.

pub mod error;
pub mod store;

pub use error::ContextError;
pub use store::{ContextRecord, ContextStore};
