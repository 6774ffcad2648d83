//! Go-Live Registry - Capability store and discovery
//!
//! This crate provides:
//!
//! - **CapabilityRegistry**: the single in-memory authority over capability
//!   definitions and live enablement flags
//! - **Discovery**: [`CapabilitySource`] implementations that read capability
//!   definitions from code or TOML manifests
//!
//! Persistent backends mirror the registry from an external store; the
//! control plane itself only needs the in-memory authority.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod discovery;
pub mod error;
pub mod registry;

pub use discovery::{discover, CapabilitySource, ManifestSource, StaticSource};
pub use error::{RegistryError, Result};
pub use registry::{CapabilityRegistry, DomainGroup, RegistrationSummary, RegistrySnapshot};
