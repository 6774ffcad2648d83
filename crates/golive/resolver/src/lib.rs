//! Go-Live Resolver - Dependency graph analysis and conflict detection
//!
//! This crate provides:
//!
//! - **DependencyGraph**: id-to-index arena with adjacency lists, iterative
//!   cycle detection and deterministic topological ordering
//! - **DependencyResolver**: graph validation, invalid-state detection,
//!   blast radius and enable/disable orders
//! - **ConflictDetector**: exclusion and dependency checks against a
//!   projected enablement state
//!
//! Nothing here performs I/O or touches the live registry; everything works
//! on a [`golive_registry::RegistrySnapshot`] or plain capability lists.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod conflict;
pub mod error;
pub mod graph;
pub mod resolver;

pub use conflict::{has_blocking_conflicts, Conflict, ConflictDetector, ConflictKind, ConflictSeverity};
pub use error::{ResolverError, Result};
pub use graph::{DependencyGraph, MissingDependency};
pub use resolver::{
    blast_risk, BlastRadius, DependencyResolver, DependencyValidation, InvalidStateIssue,
    InvalidStateReport,
};
