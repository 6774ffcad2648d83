//! Audit error types

use thiserror::Error;

/// Errors from the audit store.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The backing store rejected or could not complete the operation.
    #[error("Audit store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid audit filter: {0}")]
    InvalidFilter(String),
}

/// Result type for audit operations
pub type Result<T> = std::result::Result<T, AuditError>;
