//! Readiness probe plugin interface.
//!
//! A probe is an external health check (database connectivity, queue
//! liveness, a dependent service) that reports `pass`, `warn` or `fail`.
//! The evaluator depends only on the [`Probe`] trait, never on probe
//! internals, and measures duration itself.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Status reported by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Pass,
    Warn,
    Fail,
}

impl ProbeStatus {
    /// Contribution to the readiness score: pass 1, warn 0.5, fail 0.
    pub fn weight(&self) -> f64 {
        match self {
            ProbeStatus::Pass => 1.0,
            ProbeStatus::Warn => 0.5,
            ProbeStatus::Fail => 0.0,
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Pass => write!(f, "pass"),
            ProbeStatus::Warn => write!(f, "warn"),
            ProbeStatus::Fail => write!(f, "fail"),
        }
    }
}

/// Grouping of probes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeCategory {
    /// Primary data store.
    Database,
    /// Caches and session stores.
    Cache,
    /// Message queues and job runners.
    Queue,
    /// Object and file storage.
    Storage,
    /// Third-party services.
    External,
    /// Internal consistency of the control plane itself.
    Integrity,
    /// Application-defined category.
    Custom(String),
}

impl fmt::Display for ProbeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeCategory::Database => write!(f, "database"),
            ProbeCategory::Cache => write!(f, "cache"),
            ProbeCategory::Queue => write!(f, "queue"),
            ProbeCategory::Storage => write!(f, "storage"),
            ProbeCategory::External => write!(f, "external"),
            ProbeCategory::Integrity => write!(f, "integrity"),
            ProbeCategory::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// What a probe's `run` returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Reported status.
    pub status: ProbeStatus,

    /// Optional detail for operators.
    pub message: Option<String>,
}

impl ProbeOutcome {
    /// Create a passing outcome.
    pub fn pass() -> Self {
        Self {
            status: ProbeStatus::Pass,
            message: None,
        }
    }

    /// Create a warning outcome.
    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Warn,
            message: Some(message.into()),
        }
    }

    /// Create a failing outcome.
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Fail,
            message: Some(message.into()),
        }
    }
}

/// Result of one probe execution as recorded by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Probe that was executed.
    pub probe_id: String,

    /// Category of the probe.
    pub category: ProbeCategory,

    /// Final status, after timeout and error handling.
    pub status: ProbeStatus,

    /// Whether a `fail` from this probe blocks go-live.
    pub blocking: bool,

    /// Time the probe took, or the timeout if it timed out.
    pub duration_ms: u64,

    /// Optional message with details.
    pub message: Option<String>,

    /// When the probe finished.
    pub timestamp: DateTime<Utc>,
}

impl ProbeResult {
    /// Create a result from a probe's own outcome.
    pub fn from_outcome(probe: &dyn Probe, outcome: ProbeOutcome, duration_ms: u64) -> Self {
        Self {
            probe_id: probe.id().to_string(),
            category: probe.category(),
            status: outcome.status,
            blocking: probe.blocking(),
            duration_ms,
            message: outcome.message,
            timestamp: Utc::now(),
        }
    }

    /// Create a failed result for a probe that errored or panicked.
    pub fn failure(probe: &dyn Probe, message: impl Into<String>, duration_ms: u64) -> Self {
        Self::from_outcome(probe, ProbeOutcome::fail(message), duration_ms)
    }

    /// Create a failed result for a probe that exceeded its timeout.
    pub fn timeout(probe: &dyn Probe, timeout: Duration) -> Self {
        let timeout_ms = timeout.as_millis() as u64;
        Self::failure(
            probe,
            format!("Probe timed out after {}ms", timeout_ms),
            timeout_ms,
        )
    }

    /// Whether this result fails and blocks go-live.
    pub fn is_blocking_failure(&self) -> bool {
        self.blocking && self.status == ProbeStatus::Fail
    }
}

/// Trait for readiness probes.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Unique probe id.
    fn id(&self) -> &str;

    /// Category for grouping and reporting.
    fn category(&self) -> ProbeCategory;

    /// Whether a `fail` blocks go-live. Non-blocking failures only degrade.
    fn blocking(&self) -> bool {
        true
    }

    /// Whether the probe is cheap enough for high-frequency polling.
    fn lightweight(&self) -> bool {
        false
    }

    /// Per-probe timeout; the evaluator default applies when `None`.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Execute the probe.
    async fn run(&self) -> Result<ProbeOutcome>;
}

/// Probe backed by an async closure.
///
/// ```ignore
/// let probe = FnProbe::new("db", ProbeCategory::Database, || async {
///     Ok(ProbeOutcome::pass())
/// })
/// .quick();
/// ```
pub struct FnProbe<F> {
    id: String,
    category: ProbeCategory,
    blocking: bool,
    lightweight: bool,
    timeout: Option<Duration>,
    check: F,
}

impl<F, Fut> FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ProbeOutcome>> + Send + 'static,
{
    pub fn new(id: impl Into<String>, category: ProbeCategory, check: F) -> Self {
        Self {
            id: id.into(),
            category,
            blocking: true,
            lightweight: false,
            timeout: None,
            check,
        }
    }

    pub fn non_blocking(mut self) -> Self {
        self.blocking = false;
        self
    }

    /// Include the probe in quick health checks.
    pub fn quick(mut self) -> Self {
        self.lightweight = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ProbeOutcome>> + Send + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> ProbeCategory {
        self.category.clone()
    }

    fn blocking(&self) -> bool {
        self.blocking
    }

    fn lightweight(&self) -> bool {
        self.lightweight
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn run(&self) -> Result<ProbeOutcome> {
        (self.check)().await
    }
}
