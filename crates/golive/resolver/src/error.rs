//! Resolver error types

use golive_types::CapabilityId;
use thiserror::Error;

/// Errors returned by ordering and impact queries.
///
/// Ordering fails closed: any of these means no order is safe to use.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolverError {
    #[error("Unknown capability: {0}")]
    UnknownCapability(CapabilityId),

    #[error("Circular dependency: {}", format_cycle(.cycle))]
    CircularDependency { cycle: Vec<CapabilityId> },

    #[error("Capability {capability_id} depends on unknown capability {missing}")]
    MissingDependency {
        capability_id: CapabilityId,
        missing: CapabilityId,
    },
}

fn format_cycle(cycle: &[CapabilityId]) -> String {
    cycle
        .iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, ResolverError>;
