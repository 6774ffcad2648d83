//! Go-Live Readiness - Environment health for capability rollouts
//!
//! This crate provides:
//!
//! - **Probe**: the plugin interface for external health checks, plus
//!   [`FnProbe`] for closure-backed probes
//! - **ReadinessEvaluator**: concurrent, timeout-isolated probe execution with
//!   a TTL-cached [`ReadinessSnapshot`]
//! - **GoLiveReadiness**: numeric score and `PROCEED` / `PROCEED_WITH_CAUTION` /
//!   `DO_NOT_PROCEED` recommendation, where `DO_NOT_PROCEED` holds exactly
//!   when readiness is `BLOCKED`

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod error;
pub mod evaluator;
pub mod probe;

pub use config::ReadinessConfig;
pub use error::{ReadinessError, Result};
pub use evaluator::{
    GoLiveReadiness, ProbeGroup, ReadinessEvaluator, ReadinessSnapshot, ReadinessStatus,
    Recommendation,
};
pub use probe::{FnProbe, Probe, ProbeCategory, ProbeOutcome, ProbeResult, ProbeStatus};
