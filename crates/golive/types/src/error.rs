//! Parse errors for core types

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("Unknown domain: {0}")]
    UnknownDomain(String),

    #[error("Unknown risk level: {0}")]
    UnknownRiskLevel(String),
}
