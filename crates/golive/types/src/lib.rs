//! Go-Live Types - Core types for the capability rollout control plane
//!
//! Shared by every control plane crate:
//!
//! - **Identifiers**: [`CapabilityId`], [`PlanId`], [`ExecutionId`], [`AuditEventId`], [`SimulationId`]
//! - **Capabilities**: [`Capability`] with its closed [`Domain`] and [`RiskLevel`] enums
//! - **Changes**: [`CapabilityAction`], [`EnablementState`], [`StateChange`]
//! - **Blockers**: [`Blocker`], the machine-readable reason list behind every refusal

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod action;
pub mod blocker;
pub mod capability;
pub mod error;
pub mod ids;

pub use action::{ActionKind, CapabilityAction, EnablementState, StateChange};
pub use blocker::Blocker;
pub use capability::{Capability, Domain, RiskLevel};
pub use error::TypeError;
pub use ids::{AuditEventId, CapabilityId, ExecutionId, PlanId, SimulationId};
