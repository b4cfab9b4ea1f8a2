//! Runs the external assistant program for the delegate methods.

pub mod error;
pub mod invoker;

pub use error::DelegateError;
pub use invoker::{DelegateInvoker, DelegateReply};
