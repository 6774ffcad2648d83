//! Registry error types

use golive_types::CapabilityId;
use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Capability not found: {0}")]
    CapabilityNotFound(CapabilityId),

    #[error("Invalid capability {id}: {reason}")]
    InvalidCapability { id: CapabilityId, reason: String },

    #[error("Capability source '{source_name}' failed: {reason}")]
    Source { source_name: String, reason: String },

    #[error("Manifest parse error: {0}")]
    Manifest(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
