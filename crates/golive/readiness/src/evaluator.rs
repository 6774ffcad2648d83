//! Readiness evaluator.
//!
//! Runs every registered probe concurrently, each in its own task under its
//! own timeout, and folds the results into a [`ReadinessSnapshot`]. A probe
//! that errors, panics or times out becomes a `fail` result; it never aborts
//! the batch.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::ReadinessConfig;
use crate::error::{ReadinessError, Result};
use crate::probe::{Probe, ProbeCategory, ProbeResult, ProbeStatus};

/// Aggregate environment health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessStatus {
    Ready,
    Degraded,
    Blocked,
}

impl fmt::Display for ReadinessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessStatus::Ready => write!(f, "READY"),
            ReadinessStatus::Degraded => write!(f, "DEGRADED"),
            ReadinessStatus::Blocked => write!(f, "BLOCKED"),
        }
    }
}

/// Immutable result of one readiness evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessSnapshot {
    pub timestamp: DateTime<Utc>,
    pub status: ReadinessStatus,
    pub probe_results: Vec<ProbeResult>,
    pub recommendations: Vec<String>,
}

impl ReadinessSnapshot {
    /// Aggregate probe results.
    ///
    /// `BLOCKED` if any blocking probe failed, `DEGRADED` if any probe warned
    /// or a non-blocking probe failed, `READY` otherwise.
    pub fn from_results(probe_results: Vec<ProbeResult>) -> Self {
        let status = if probe_results.iter().any(ProbeResult::is_blocking_failure) {
            ReadinessStatus::Blocked
        } else if probe_results.iter().any(|r| r.status != ProbeStatus::Pass) {
            ReadinessStatus::Degraded
        } else {
            ReadinessStatus::Ready
        };

        let mut recommendations: Vec<String> = probe_results
            .iter()
            .filter(|r| r.status != ProbeStatus::Pass)
            .map(|r| {
                let detail = r.message.as_deref().unwrap_or("no details");
                match (r.status, r.blocking) {
                    (ProbeStatus::Fail, true) => {
                        format!("Resolve failing {} probe '{}': {}", r.category, r.probe_id, detail)
                    }
                    (ProbeStatus::Fail, false) => format!(
                        "Investigate non-blocking {} probe '{}': {}",
                        r.category, r.probe_id, detail
                    ),
                    _ => format!("Review {} probe '{}' warning: {}", r.category, r.probe_id, detail),
                }
            })
            .collect();

        if recommendations.is_empty() {
            recommendations.push("All readiness probes are passing".to_string());
        }

        Self {
            timestamp: Utc::now(),
            status,
            probe_results,
            recommendations,
        }
    }

    /// Score 0-100: average of pass 1, warn 0.5, fail 0. No probes scores 100.
    pub fn score(&self) -> u8 {
        if self.probe_results.is_empty() {
            return 100;
        }
        let total: f64 = self.probe_results.iter().map(|r| r.status.weight()).sum();
        let average = total / self.probe_results.len() as f64;
        (average * 100.0).round().clamp(0.0, 100.0) as u8
    }

    /// Results of blocking probes that failed.
    pub fn blocking_failures(&self) -> impl Iterator<Item = &ProbeResult> {
        self.probe_results.iter().filter(|r| r.is_blocking_failure())
    }
}

/// Go-live recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Proceed,
    ProceedWithCaution,
    DoNotProceed,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Proceed => write!(f, "PROCEED"),
            Recommendation::ProceedWithCaution => write!(f, "PROCEED_WITH_CAUTION"),
            Recommendation::DoNotProceed => write!(f, "DO_NOT_PROCEED"),
        }
    }
}

/// Readiness snapshot with a score and a recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoLiveReadiness {
    pub snapshot: ReadinessSnapshot,
    pub score: u8,
    pub recommendation: Recommendation,
    /// One entry per failing blocking probe; empty unless `DO_NOT_PROCEED`.
    pub blocking_reasons: Vec<String>,
}

impl GoLiveReadiness {
    /// `DO_NOT_PROCEED` exactly when the snapshot is `BLOCKED`. A `DEGRADED`
    /// snapshot is `PROCEED` at or above `proceed_threshold`, otherwise
    /// `PROCEED_WITH_CAUTION`.
    pub fn from_snapshot(snapshot: ReadinessSnapshot, proceed_threshold: u8) -> Self {
        let score = snapshot.score();
        let recommendation = match snapshot.status {
            ReadinessStatus::Blocked => Recommendation::DoNotProceed,
            ReadinessStatus::Degraded if score >= proceed_threshold => Recommendation::Proceed,
            ReadinessStatus::Degraded => Recommendation::ProceedWithCaution,
            ReadinessStatus::Ready => Recommendation::Proceed,
        };

        let blocking_reasons = snapshot
            .blocking_failures()
            .map(|r| match &r.message {
                Some(message) => format!("{}: {}", r.probe_id, message),
                None => r.probe_id.clone(),
            })
            .collect();

        Self {
            snapshot,
            score,
            recommendation,
            blocking_reasons,
        }
    }
}

/// Probes of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeGroup {
    pub category: ProbeCategory,
    pub probe_ids: Vec<String>,
}

struct CachedSnapshot {
    taken_at: Instant,
    snapshot: ReadinessSnapshot,
}

/// Readiness evaluator
pub struct ReadinessEvaluator {
    config: ReadinessConfig,
    probes: RwLock<Vec<Arc<dyn Probe>>>,
    cache: RwLock<Option<CachedSnapshot>>,
    semaphore: Arc<Semaphore>,
}

impl ReadinessEvaluator {
    pub fn new(config: ReadinessConfig) -> Self {
        let permits = config.max_concurrent_probes.max(1);
        Self {
            config,
            probes: RwLock::new(Vec::new()),
            cache: RwLock::new(None),
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn config(&self) -> &ReadinessConfig {
        &self.config
    }

    /// Register a probe. Ids must be unique.
    pub fn register_probe(&self, probe: Arc<dyn Probe>) -> Result<()> {
        let mut probes = self.probes.write();
        if probes.iter().any(|p| p.id() == probe.id()) {
            return Err(ReadinessError::DuplicateProbe(probe.id().to_string()));
        }
        debug!(probe_id = probe.id(), category = %probe.category(), "Probe registered");
        probes.push(probe);
        Ok(())
    }

    pub fn unregister_probe(&self, probe_id: &str) -> Result<()> {
        let mut probes = self.probes.write();
        let before = probes.len();
        probes.retain(|p| p.id() != probe_id);
        if probes.len() == before {
            return Err(ReadinessError::ProbeNotFound(probe_id.to_string()));
        }
        Ok(())
    }

    pub fn probe_count(&self) -> usize {
        self.probes.read().len()
    }

    /// Registered probe ids grouped by category.
    pub fn probes_by_category(&self) -> Vec<ProbeGroup> {
        let mut groups: BTreeMap<ProbeCategory, Vec<String>> = BTreeMap::new();
        for probe in self.probes.read().iter() {
            groups
                .entry(probe.category())
                .or_default()
                .push(probe.id().to_string());
        }
        groups
            .into_iter()
            .map(|(category, probe_ids)| ProbeGroup { category, probe_ids })
            .collect()
    }

    /// Run every probe and return the individual results, in registration order.
    #[instrument(skip(self))]
    pub async fn run_all_probes(&self) -> Vec<ProbeResult> {
        let probes = self.probes.read().clone();
        self.run_probes(probes).await
    }

    /// Evaluate readiness, serving a cached snapshot younger than the TTL
    /// when `use_cache` is set.
    #[instrument(skip(self))]
    pub async fn evaluate_readiness(&self, use_cache: bool) -> ReadinessSnapshot {
        if use_cache {
            if let Some(snapshot) = self.cached_snapshot() {
                debug!("Serving cached readiness snapshot");
                return snapshot;
            }
        }

        let snapshot = ReadinessSnapshot::from_results(self.run_all_probes().await);

        info!(
            status = %snapshot.status,
            probes = snapshot.probe_results.len(),
            "Readiness evaluated"
        );

        // Replace, never mutate, the cached snapshot
        *self.cache.write() = Some(CachedSnapshot {
            taken_at: Instant::now(),
            snapshot: snapshot.clone(),
        });

        snapshot
    }

    /// Run only lightweight probes. Never cached.
    #[instrument(skip(self))]
    pub async fn quick_health_check(&self) -> ReadinessSnapshot {
        let probes: Vec<Arc<dyn Probe>> = self
            .probes
            .read()
            .iter()
            .filter(|p| p.lightweight())
            .cloned()
            .collect();

        ReadinessSnapshot::from_results(self.run_probes(probes).await)
    }

    /// Readiness snapshot plus score and recommendation.
    pub async fn get_go_live_readiness(&self, use_cache: bool) -> GoLiveReadiness {
        let snapshot = self.evaluate_readiness(use_cache).await;
        GoLiveReadiness::from_snapshot(snapshot, self.config.proceed_threshold)
    }

    pub fn invalidate_cache(&self) {
        *self.cache.write() = None;
    }

    /// Drop every probe and the cache.
    pub fn reset(&self) {
        self.probes.write().clear();
        self.invalidate_cache();
    }

    fn cached_snapshot(&self) -> Option<ReadinessSnapshot> {
        let cache = self.cache.read();
        cache
            .as_ref()
            .filter(|cached| cached.taken_at.elapsed() < self.config.cache_ttl)
            .map(|cached| cached.snapshot.clone())
    }

    async fn run_probes(&self, probes: Vec<Arc<dyn Probe>>) -> Vec<ProbeResult> {
        let tasks = probes.into_iter().map(|probe| {
            let semaphore = Arc::clone(&self.semaphore);
            let timeout = probe.timeout().unwrap_or(self.config.probe_timeout);
            let task_probe = Arc::clone(&probe);

            // One task per probe so a panic stays inside that task
            let handle = tokio::spawn(async move {
                // The timeout budget starts once a permit is held
                let _permit = semaphore.acquire_owned().await;
                let start = Instant::now();

                match tokio::time::timeout(timeout, task_probe.run()).await {
                    Ok(Ok(outcome)) => {
                        ProbeResult::from_outcome(&*task_probe, outcome, elapsed_ms(start))
                    }
                    Ok(Err(e)) => {
                        warn!(probe_id = task_probe.id(), error = %e, "Probe returned an error");
                        ProbeResult::failure(&*task_probe, e.to_string(), elapsed_ms(start))
                    }
                    Err(_) => {
                        warn!(
                            probe_id = task_probe.id(),
                            timeout_ms = timeout.as_millis() as u64,
                            "Probe timed out"
                        );
                        ProbeResult::timeout(&*task_probe, timeout)
                    }
                }
            });

            async move {
                match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(probe_id = probe.id(), error = %e, "Probe task aborted");
                        ProbeResult::failure(&*probe, format!("Probe task aborted: {}", e), 0)
                    }
                }
            }
        });

        join_all(tasks).await
    }
}

impl Default for ReadinessEvaluator {
    fn default() -> Self {
        Self::new(ReadinessConfig::default())
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{FnProbe, ProbeOutcome};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn ok(outcome: ProbeOutcome) -> Result<ProbeOutcome> {
        Ok(outcome)
    }

    fn passing(id: &str) -> Arc<dyn Probe> {
        Arc::new(FnProbe::new(id, ProbeCategory::Database, || async {
            ok(ProbeOutcome::pass())
        }))
    }

    fn failing(id: &str) -> FnProbe<impl Fn() -> futures::future::Ready<Result<ProbeOutcome>> + Send + Sync + 'static> {
        FnProbe::new(id, ProbeCategory::Queue, || {
            futures::future::ready(ok(ProbeOutcome::fail("queue unreachable")))
        })
    }

    fn warning(id: &str) -> Arc<dyn Probe> {
        Arc::new(FnProbe::new(id, ProbeCategory::Cache, || async {
            ok(ProbeOutcome::warn("hit rate low"))
        }))
    }

    fn evaluator() -> ReadinessEvaluator {
        ReadinessEvaluator::new(ReadinessConfig::default())
    }

    #[tokio::test]
    async fn test_no_probes_is_ready() {
        let readiness = evaluator().get_go_live_readiness(false).await;
        assert_eq!(readiness.snapshot.status, ReadinessStatus::Ready);
        assert_eq!(readiness.score, 100);
        assert_eq!(readiness.recommendation, Recommendation::Proceed);
    }

    #[tokio::test]
    async fn test_blocking_failure_blocks() {
        let evaluator = evaluator();
        evaluator.register_probe(passing("db")).unwrap();
        evaluator.register_probe(Arc::new(failing("queue"))).unwrap();

        let readiness = evaluator.get_go_live_readiness(false).await;
        assert_eq!(readiness.snapshot.status, ReadinessStatus::Blocked);
        assert_eq!(readiness.recommendation, Recommendation::DoNotProceed);
        assert_eq!(readiness.score, 50);
        assert_eq!(readiness.blocking_reasons, vec!["queue: queue unreachable"]);
    }

    #[tokio::test]
    async fn test_non_blocking_failure_degrades() {
        let evaluator = evaluator();
        evaluator.register_probe(passing("db")).unwrap();
        evaluator
            .register_probe(Arc::new(failing("queue").non_blocking()))
            .unwrap();

        let readiness = evaluator.get_go_live_readiness(false).await;
        assert_eq!(readiness.snapshot.status, ReadinessStatus::Degraded);
        assert_eq!(readiness.recommendation, Recommendation::ProceedWithCaution);
        assert!(readiness.blocking_reasons.is_empty());
    }

    #[tokio::test]
    async fn test_degraded_above_threshold_proceeds() {
        let evaluator = evaluator();
        for i in 0..39 {
            evaluator.register_probe(passing(&format!("db-{i}"))).unwrap();
        }
        evaluator.register_probe(warning("cache")).unwrap();

        let readiness = evaluator.get_go_live_readiness(false).await;
        assert_eq!(readiness.snapshot.status, ReadinessStatus::Degraded);
        assert_eq!(readiness.score, 99);
        assert_eq!(readiness.recommendation, Recommendation::Proceed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_isolated() {
        let evaluator = evaluator();
        evaluator.register_probe(passing("db")).unwrap();
        evaluator
            .register_probe(Arc::new(
                FnProbe::new("slow", ProbeCategory::External, || async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    ok(ProbeOutcome::pass())
                })
                .with_timeout(Duration::from_millis(100)),
            ))
            .unwrap();

        let results = evaluator.run_all_probes().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, ProbeStatus::Pass);
        assert_eq!(results[1].status, ProbeStatus::Fail);
        assert_eq!(results[1].duration_ms, 100);
    }

    #[tokio::test]
    async fn test_error_and_panic_become_failures() {
        let evaluator = evaluator();
        evaluator
            .register_probe(Arc::new(FnProbe::new("errors", ProbeCategory::Storage, || async {
                Err::<ProbeOutcome, _>(ReadinessError::probe_failed("errors", "bucket missing"))
            })))
            .unwrap();
        evaluator
            .register_probe(Arc::new(FnProbe::new("panics", ProbeCategory::Storage, || async {
                if true {
                    panic!("probe bug");
                }
                ok(ProbeOutcome::pass())
            })))
            .unwrap();
        evaluator.register_probe(passing("db")).unwrap();

        let results = evaluator.run_all_probes().await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].status, ProbeStatus::Fail);
        assert!(results[0].message.as_deref().unwrap().contains("bucket missing"));
        assert_eq!(results[1].status, ProbeStatus::Fail);
        assert_eq!(results[2].status, ProbeStatus::Pass);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_starts_after_permit() {
        let mut config = ReadinessConfig::default();
        config.max_concurrent_probes = 1;
        config.probe_timeout = Duration::from_millis(1500);
        let evaluator = ReadinessEvaluator::new(config);

        for id in ["a", "b"] {
            evaluator
                .register_probe(Arc::new(FnProbe::new(id, ProbeCategory::External, || async {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    ok(ProbeOutcome::pass())
                })))
                .unwrap();
        }

        let results = evaluator.run_all_probes().await;
        assert!(results.iter().all(|r| r.status == ProbeStatus::Pass));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_ttl() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);

        let evaluator = evaluator();
        evaluator
            .register_probe(Arc::new(FnProbe::new("db", ProbeCategory::Database, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { ok(ProbeOutcome::pass()) }
            })))
            .unwrap();

        evaluator.evaluate_readiness(true).await;
        evaluator.evaluate_readiness(true).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        evaluator.evaluate_readiness(false).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        tokio::time::advance(Duration::from_secs(31)).await;
        evaluator.evaluate_readiness(true).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_quick_check_runs_lightweight_only() {
        let evaluator = evaluator();
        evaluator.register_probe(Arc::new(failing("queue"))).unwrap();
        evaluator
            .register_probe(Arc::new(
                FnProbe::new("ping", ProbeCategory::Integrity, || async { ok(ProbeOutcome::pass()) })
                    .quick(),
            ))
            .unwrap();

        let snapshot = evaluator.quick_health_check().await;
        assert_eq!(snapshot.probe_results.len(), 1);
        assert_eq!(snapshot.status, ReadinessStatus::Ready);
    }

    #[test]
    fn test_duplicate_probe_rejected() {
        let evaluator = evaluator();
        evaluator.register_probe(passing("db")).unwrap();
        assert!(matches!(
            evaluator.register_probe(passing("db")),
            Err(ReadinessError::DuplicateProbe(_))
        ));
        assert!(evaluator.unregister_probe("db").is_ok());
        assert!(evaluator.unregister_probe("db").is_err());
    }

    #[test]
    fn test_probes_by_category() {
        let evaluator = evaluator();
        evaluator.register_probe(passing("db-primary")).unwrap();
        evaluator.register_probe(passing("db-replica")).unwrap();
        evaluator.register_probe(warning("cache")).unwrap();

        let groups = evaluator.probes_by_category();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].category, ProbeCategory::Database);
        assert_eq!(groups[0].probe_ids.len(), 2);
    }

    #[test]
    fn test_do_not_proceed_iff_blocked() {
        let make = |status, blocking| ProbeResult {
            probe_id: "p".into(),
            category: ProbeCategory::External,
            status,
            blocking,
            duration_ms: 1,
            message: None,
            timestamp: Utc::now(),
        };

        for status in [ProbeStatus::Pass, ProbeStatus::Warn, ProbeStatus::Fail] {
            for blocking in [true, false] {
                for threshold in [0u8, 50, 100] {
                    let snapshot = ReadinessSnapshot::from_results(vec![make(status, blocking)]);
                    let blocked = snapshot.status == ReadinessStatus::Blocked;
                    let readiness = GoLiveReadiness::from_snapshot(snapshot, threshold);
                    assert_eq!(readiness.recommendation == Recommendation::DoNotProceed, blocked);
                }
            }
        }
    }
}
