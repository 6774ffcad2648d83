//! Go-Live Simulator - Non-mutating rollout feasibility analysis
//!
//! [`RolloutSimulator`] answers "what would happen if": the safe order of
//! state changes, conflicts, blast radius and risk for one or more proposed
//! capability actions. Every infeasible result carries a machine-readable
//! blocker list, and results are referentially transparent: identical
//! registry state and actions produce byte-identical results, including the
//! content-derived [`golive_types::SimulationId`].

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod simulator;

pub use error::{Result, SimulationError};
pub use simulator::{ImpactSummary, RolloutSimulator, SimulationResult, StateComparison};
