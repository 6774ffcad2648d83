//! Simulation error types

use thiserror::Error;

/// Errors from malformed simulation requests.
///
/// Infeasible changes are not errors: they come back as a
/// [`crate::SimulationResult`] with `feasible == false` and blockers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SimulationError {
    #[error("Simulation requires at least one action")]
    NoActions,
}

/// Result type for simulation operations
pub type Result<T> = std::result::Result<T, SimulationError>;
