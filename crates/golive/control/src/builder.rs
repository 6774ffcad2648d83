//! Builder for the control plane

use std::sync::Arc;

use golive_audit::{AuditLog, AuditStore};
use golive_executor::{CheckpointStore, PlanExecutor, StepHook};
use golive_readiness::{Probe, ReadinessEvaluator};
use golive_registry::CapabilityRegistry;

use crate::config::ControlPlaneConfig;
use crate::control_plane::GoLiveControlPlane;
use crate::error::Result;
use crate::probes::{DependencyGraphProbe, RegistryIntegrityProbe};

/// Builder for [`GoLiveControlPlane`].
///
/// Every collaborator defaults to its in-memory implementation.
#[derive(Default)]
pub struct GoLiveControlPlaneBuilder {
    config: ControlPlaneConfig,
    registry: Option<Arc<CapabilityRegistry>>,
    audit_store: Option<Arc<dyn AuditStore>>,
    checkpoint_store: Option<Arc<dyn CheckpointStore>>,
    step_hook: Option<Arc<dyn StepHook>>,
    probes: Vec<Arc<dyn Probe>>,
}

impl GoLiveControlPlaneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ControlPlaneConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing registry, e.g. one configured with capability sources.
    pub fn with_registry(mut self, registry: Arc<CapabilityRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_audit_store(mut self, store: Arc<dyn AuditStore>) -> Self {
        self.audit_store = Some(store);
        self
    }

    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint_store = Some(store);
        self
    }

    pub fn with_step_hook(mut self, hook: Arc<dyn StepHook>) -> Self {
        self.step_hook = Some(hook);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probes.push(probe);
        self
    }

    /// Build the control plane. Fails on duplicate probe ids.
    pub fn build(self) -> Result<GoLiveControlPlane> {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(CapabilityRegistry::new()));
        let audit = match self.audit_store {
            Some(store) => AuditLog::new(store),
            None => AuditLog::in_memory(),
        };

        let readiness = Arc::new(ReadinessEvaluator::new(self.config.readiness.clone()));
        if self.config.builtin_probes {
            readiness.register_probe(Arc::new(DependencyGraphProbe::new(registry.clone())))?;
            readiness.register_probe(Arc::new(RegistryIntegrityProbe::new(registry.clone())))?;
        }
        for probe in self.probes {
            readiness.register_probe(probe)?;
        }

        let mut executor = PlanExecutor::new(
            registry.clone(),
            readiness.clone(),
            audit.clone(),
            self.config.executor.clone(),
        );
        if let Some(store) = self.checkpoint_store {
            executor = executor.with_checkpoint_store(store);
        }
        if let Some(hook) = self.step_hook {
            executor = executor.with_step_hook(hook);
        }

        Ok(GoLiveControlPlane::from_parts(
            self.config,
            registry,
            readiness,
            executor,
            audit,
        ))
    }
}
