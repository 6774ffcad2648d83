//! # Go-Live Control Plane
//!
//! Unified facade over the go-live subsystems.
//!
//! ## Overview
//!
//! The [`GoLiveControlPlane`] is the single entry point for capability
//! rollout. It composes the registry, dependency resolver, readiness
//! evaluator, rollout simulator, plan executor and audit log behind one API
//! that:
//!
//! - Answers `Disabled` for every operation while the master switch is off
//! - Records simulations, registrations and plan lifecycle events in the audit log
//! - Folds subsystem errors into one taxonomy with machine-readable reasons
//!
//! ## Example
//!
//! ```rust,no_run
//! use golive_control::{ExecuteOptions, GoLiveControlPlaneBuilder};
//! use golive_types::{Capability, CapabilityAction, Domain};
//!
//! # async fn example() -> golive_control::Result<()> {
//! let plane = GoLiveControlPlaneBuilder::new().build()?;
//! plane
//!     .register_capabilities(
//!         vec![
//!             Capability::new("search", "Search", Domain::Search),
//!             Capability::new("facets", "Facets", Domain::Search).depends_on(["search"]),
//!         ],
//!         "ops",
//!     )
//!     .await?;
//!
//! let simulation = plane.simulate(CapabilityAction::enable("facets"), "ops").await?;
//! let plan = plane.create_plan(&simulation, "enable facets", "alice").await?;
//! plane.approve_plan(&plan.id, "bob").await?;
//! let result = plane.execute_plan(&plan.id, ExecuteOptions::by("bob")).await?;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod builder;
pub mod config;
pub mod control_plane;
pub mod error;
pub mod probes;

pub use builder::GoLiveControlPlaneBuilder;
pub use config::ControlPlaneConfig;
pub use control_plane::GoLiveControlPlane;
pub use error::{ControlPlaneError, Result};
pub use probes::{DependencyGraphProbe, RegistryIntegrityProbe};

// Request and result types callers need alongside the facade
pub use golive_executor::{ExecuteOptions, ExecutionPlan, ExecutionResult, PlanStatus, RollbackResult};
