//! Built-in readiness probes over the capability graph
//!
//! Both probes are lightweight: they read a registry snapshot and never do
//! I/O, so they also run in quick health checks. Only the graph probe is
//! blocking; an inconsistent registry degrades readiness so the repair plan
//! can still pass the readiness gate.

use std::sync::Arc;

use async_trait::async_trait;
use golive_readiness::{Probe, ProbeCategory, ProbeOutcome, Result};
use golive_registry::CapabilityRegistry;
use golive_resolver::DependencyResolver;

/// Fails on dependency cycles, warns on dependencies that are not registered.
pub struct DependencyGraphProbe {
    registry: Arc<CapabilityRegistry>,
}

impl DependencyGraphProbe {
    pub const ID: &'static str = "dependency-graph";

    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Probe for DependencyGraphProbe {
    fn id(&self) -> &str {
        Self::ID
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::Integrity
    }

    fn lightweight(&self) -> bool {
        true
    }

    async fn run(&self) -> Result<ProbeOutcome> {
        let validation =
            DependencyResolver::from_snapshot(&self.registry.snapshot()).validate_dependencies();

        if !validation.circular_dependencies.is_empty() {
            let cycles: Vec<String> = validation
                .circular_dependencies
                .iter()
                .map(|cycle| {
                    cycle
                        .iter()
                        .map(|id| id.as_str())
                        .collect::<Vec<_>>()
                        .join(" -> ")
                })
                .collect();
            return Ok(ProbeOutcome::fail(format!(
                "circular dependencies: {}",
                cycles.join(", ")
            )));
        }

        if !validation.missing_dependencies.is_empty() {
            let missing: Vec<String> = validation
                .missing_dependencies
                .iter()
                .map(|m| format!("{} -> {}", m.capability_id, m.missing))
                .collect();
            return Ok(ProbeOutcome::warn(format!(
                "missing dependencies: {}",
                missing.join(", ")
            )));
        }

        Ok(ProbeOutcome::pass())
    }
}

/// Fails while any enabled capability has a disabled dependency. Non-blocking.
pub struct RegistryIntegrityProbe {
    registry: Arc<CapabilityRegistry>,
}

impl RegistryIntegrityProbe {
    pub const ID: &'static str = "registry-integrity";

    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Probe for RegistryIntegrityProbe {
    fn id(&self) -> &str {
        Self::ID
    }

    fn category(&self) -> ProbeCategory {
        ProbeCategory::Integrity
    }

    fn blocking(&self) -> bool {
        false
    }

    fn lightweight(&self) -> bool {
        true
    }

    async fn run(&self) -> Result<ProbeOutcome> {
        let report =
            DependencyResolver::from_snapshot(&self.registry.snapshot()).detect_invalid_states();

        if report.has_invalid_states {
            let issues: Vec<&str> = report.issues.iter().map(|i| i.reason.as_str()).collect();
            return Ok(ProbeOutcome::fail(issues.join("; ")));
        }

        Ok(ProbeOutcome::pass())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use golive_readiness::{
        ProbeStatus, ReadinessConfig, ReadinessEvaluator, ReadinessStatus, Recommendation,
    };
    use golive_types::{Capability, Domain};

    fn registry(caps: Vec<Capability>) -> Arc<CapabilityRegistry> {
        let registry = Arc::new(CapabilityRegistry::new());
        registry.register(caps);
        registry
    }

    #[tokio::test]
    async fn test_graph_probe_fails_on_cycle() {
        let registry = registry(vec![
            Capability::new("a", "A", Domain::Content).depends_on(["b"]),
            Capability::new("b", "B", Domain::Content).depends_on(["a"]),
        ]);
        let outcome = DependencyGraphProbe::new(registry).run().await.unwrap();
        assert_eq!(outcome.status, ProbeStatus::Fail);
    }

    #[tokio::test]
    async fn test_graph_probe_warns_on_missing_dependency() {
        let registry = registry(vec![Capability::new("a", "A", Domain::Content).depends_on(["ghost"])]);
        let outcome = DependencyGraphProbe::new(registry).run().await.unwrap();
        assert_eq!(outcome.status, ProbeStatus::Warn);
        assert!(outcome.message.unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn test_integrity_probe() {
        let registry = registry(vec![
            Capability::new("a", "A", Domain::Content),
            Capability::new("b", "B", Domain::Content).depends_on(["a"]).enabled(true),
        ]);
        let probe = RegistryIntegrityProbe::new(registry.clone());
        assert_eq!(probe.run().await.unwrap().status, ProbeStatus::Fail);

        registry.set_enabled(&"a".into(), true).unwrap();
        assert_eq!(probe.run().await.unwrap().status, ProbeStatus::Pass);
    }

    #[tokio::test]
    async fn test_inconsistent_registry_degrades_without_blocking() {
        let registry = registry(vec![
            Capability::new("a", "A", Domain::Content),
            Capability::new("b", "B", Domain::Content).depends_on(["a"]).enabled(true),
        ]);
        let evaluator = ReadinessEvaluator::new(ReadinessConfig::default());
        evaluator
            .register_probe(Arc::new(DependencyGraphProbe::new(registry.clone())))
            .unwrap();
        evaluator
            .register_probe(Arc::new(RegistryIntegrityProbe::new(registry)))
            .unwrap();

        let readiness = evaluator.get_go_live_readiness(false).await;
        assert_eq!(readiness.snapshot.status, ReadinessStatus::Degraded);
        assert_ne!(readiness.recommendation, Recommendation::DoNotProceed);
        assert!(readiness.blocking_reasons.is_empty());
    }
}
