//! Shared identifier types for the workflow engine.

mod types;

pub use types::TransactionId;
