//! Go-Live Audit - Immutable record of rollout decisions
//!
//! Every simulation, plan transition, execution step, override and rollback
//! is appended here. The public surface offers append and read only: there
//! is no way to update or delete a past event.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod event;
pub mod log;
pub mod store;

pub use error::{AuditError, Result};
pub use event::{AuditAction, AuditEvent, AuditFilter};
pub use log::{ActivitySummary, AuditLog};
pub use store::{AuditStore, InMemoryAuditStore};
