//! Main GoLiveControlPlane implementation
//!
//! The GoLiveControlPlane is the single entry point for go-live operations.
//! It composes the registry, resolver, readiness evaluator, simulator,
//! executor and audit log behind one API that honours the enablement flag
//! and records every decision.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use golive_audit::{ActivitySummary, AuditAction, AuditEvent, AuditFilter, AuditLog};
use golive_executor::{
    Checkpoint, ExecuteOptions, ExecutionPlan, ExecutionResult, PlanExecutor, RollbackResult,
};
use golive_readiness::{GoLiveReadiness, Probe, ProbeGroup, ReadinessEvaluator, ReadinessSnapshot};
use golive_registry::{CapabilityRegistry, DomainGroup, RegistrationSummary};
use golive_resolver::{BlastRadius, DependencyResolver, DependencyValidation, InvalidStateReport};
use golive_simulator::{RolloutSimulator, SimulationResult, StateComparison};
use golive_types::{Capability, CapabilityAction, CapabilityId, ExecutionId, PlanId};
use tracing::{info, instrument, warn};

use crate::config::ControlPlaneConfig;
use crate::error::{ControlPlaneError, Result};

/// Unified control plane for go-live operations
pub struct GoLiveControlPlane {
    enabled: AtomicBool,
    config: ControlPlaneConfig,
    registry: Arc<CapabilityRegistry>,
    readiness: Arc<ReadinessEvaluator>,
    simulator: RolloutSimulator,
    executor: PlanExecutor,
    audit: AuditLog,
}

impl GoLiveControlPlane {
    pub(crate) fn from_parts(
        config: ControlPlaneConfig,
        registry: Arc<CapabilityRegistry>,
        readiness: Arc<ReadinessEvaluator>,
        executor: PlanExecutor,
        audit: AuditLog,
    ) -> Self {
        Self {
            enabled: AtomicBool::new(config.enabled),
            simulator: RolloutSimulator::new(registry.clone()),
            config,
            registry,
            readiness,
            executor,
            audit,
        }
    }

    pub fn config(&self) -> &ControlPlaneConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Flip the environment-driven master switch.
    pub fn set_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(enabled, "Go-live control plane toggled");
        }
    }

    fn ensure_enabled(&self) -> Result<()> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(ControlPlaneError::Disabled)
        }
    }

    fn resolver(&self) -> DependencyResolver {
        DependencyResolver::from_snapshot(&self.registry.snapshot())
    }

    // ========== Registry Operations ==========

    /// Upsert capability definitions. Live flags of known ids are kept.
    #[instrument(skip(self, capabilities))]
    pub async fn register_capabilities(
        &self,
        capabilities: Vec<Capability>,
        actor: &str,
    ) -> Result<RegistrationSummary> {
        self.ensure_enabled()?;

        let summary = self.registry.register(capabilities);
        self.audit_registration(&summary, actor).await?;
        Ok(summary)
    }

    /// Discover from the registry's configured sources and register the result.
    #[instrument(skip(self))]
    pub async fn load_capabilities(&self, actor: &str) -> Result<RegistrationSummary> {
        self.ensure_enabled()?;

        let summary = self.registry.load_from_sources()?;
        self.audit_registration(&summary, actor).await?;
        Ok(summary)
    }

    async fn audit_registration(&self, summary: &RegistrationSummary, actor: &str) -> Result<()> {
        self.audit
            .log_audit_event(
                AuditAction::CapabilitiesRegistered,
                format!(
                    "{} capabilities registered ({} new, {} updated)",
                    summary.inserted + summary.updated,
                    summary.inserted,
                    summary.updated
                ),
                actor,
                true,
            )
            .await?;
        Ok(())
    }

    pub fn get_capability(&self, id: &CapabilityId) -> Result<Capability> {
        self.ensure_enabled()?;
        self.registry
            .get(id)
            .ok_or_else(|| ControlPlaneError::NotFound(format!("Capability {id}")))
    }

    pub fn list_capabilities(&self) -> Result<Vec<Capability>> {
        self.ensure_enabled()?;
        Ok(self.registry.get_all())
    }

    pub fn capabilities_by_domain(&self) -> Result<Vec<DomainGroup>> {
        self.ensure_enabled()?;
        Ok(self.registry.group_by_domain())
    }

    // ========== Dependency Operations ==========

    pub fn validate_dependencies(&self) -> Result<DependencyValidation> {
        self.ensure_enabled()?;
        Ok(self.resolver().validate_dependencies())
    }

    pub fn detect_invalid_states(&self) -> Result<InvalidStateReport> {
        self.ensure_enabled()?;
        Ok(self.resolver().detect_invalid_states())
    }

    pub fn safe_to_enable(&self) -> Result<Vec<CapabilityId>> {
        self.ensure_enabled()?;
        Ok(self.resolver().get_safe_to_enable())
    }

    pub fn blast_radius(&self, id: &CapabilityId) -> Result<BlastRadius> {
        self.ensure_enabled()?;
        Ok(self.resolver().calculate_blast_radius(id)?)
    }

    pub fn enable_order(&self, id: &CapabilityId) -> Result<Vec<CapabilityId>> {
        self.ensure_enabled()?;
        Ok(self.resolver().get_enable_order(id)?)
    }

    pub fn disable_order(&self, id: &CapabilityId) -> Result<Vec<CapabilityId>> {
        self.ensure_enabled()?;
        Ok(self.resolver().get_disable_order(id)?)
    }

    // ========== Simulation ==========

    /// Simulate one action. Infeasible results are returned, not raised.
    #[instrument(skip(self, action), fields(action = %action))]
    pub async fn simulate(&self, action: CapabilityAction, actor: &str) -> Result<SimulationResult> {
        self.ensure_enabled()?;
        let result = self.simulator.simulate(action);
        self.audit_simulation(&result, actor).await?;
        Ok(result)
    }

    /// Simulate several simultaneous actions.
    #[instrument(skip(self, actions), fields(actions = actions.len()))]
    pub async fn simulate_batch(
        &self,
        actions: &[CapabilityAction],
        actor: &str,
    ) -> Result<SimulationResult> {
        self.ensure_enabled()?;
        let result = self.simulator.simulate_batch(actions)?;
        self.audit_simulation(&result, actor).await?;
        Ok(result)
    }

    pub fn compare_states(&self, actions: &[CapabilityAction]) -> Result<StateComparison> {
        self.ensure_enabled()?;
        Ok(self.simulator.compare_states(actions)?)
    }

    async fn audit_simulation(&self, result: &SimulationResult, actor: &str) -> Result<()> {
        let actions: Vec<String> = result.actions.iter().map(ToString::to_string).collect();
        let description = if result.feasible {
            format!(
                "Simulated {}: feasible, {} steps, {} risk",
                actions.join(", "),
                result.step_count(),
                result.risk_level
            )
        } else {
            format!(
                "Simulated {}: infeasible ({} blockers)",
                actions.join(", "),
                result.blockers.len()
            )
        };

        self.audit
            .log_audit_event(AuditAction::SimulationRun, description, actor, result.feasible)
            .await?;
        Ok(())
    }

    // ========== Plans ==========

    /// Create a draft plan from a simulation.
    ///
    /// The simulation must still describe the current registry: it is
    /// replayed and its id compared before the plan is created.
    #[instrument(skip(self, simulation, name), fields(simulation_id = %simulation.id))]
    pub async fn create_plan(
        &self,
        simulation: &SimulationResult,
        name: &str,
        actor: &str,
    ) -> Result<ExecutionPlan> {
        self.ensure_enabled()?;

        let replay = RolloutSimulator::simulate_snapshot(&self.registry.snapshot(), &simulation.actions);
        if replay.id != simulation.id {
            warn!(current = %replay.id, "Simulation is stale");
            return Err(ControlPlaneError::validation(
                "stale_simulation",
                format!(
                    "simulation {} no longer matches the registry; simulate again",
                    simulation.id
                ),
            ));
        }

        Ok(self.executor.create_plan(simulation, name, actor).await?)
    }

    /// Simulate `actions` against the live registry and plan the result.
    pub async fn plan_actions(
        &self,
        actions: &[CapabilityAction],
        name: &str,
        actor: &str,
    ) -> Result<ExecutionPlan> {
        let simulation = self.simulate_batch(actions, actor).await?;
        Ok(self.executor.create_plan(&simulation, name, actor).await?)
    }

    pub async fn approve_plan(&self, plan_id: &PlanId, approver: &str) -> Result<ExecutionPlan> {
        self.ensure_enabled()?;
        Ok(self.executor.approve_plan(plan_id, approver).await?)
    }

    /// Execute an approved plan. A failed step is reported through
    /// `ExecutionResult::success`, not as an error.
    pub async fn execute_plan(
        &self,
        plan_id: &PlanId,
        options: ExecuteOptions,
    ) -> Result<ExecutionResult> {
        self.ensure_enabled()?;
        Ok(self.executor.execute(plan_id, options).await?)
    }

    pub fn get_plan(&self, plan_id: &PlanId) -> Result<ExecutionPlan> {
        self.ensure_enabled()?;
        Ok(self.executor.get_plan(plan_id)?)
    }

    pub fn list_plans(&self) -> Result<Vec<ExecutionPlan>> {
        self.ensure_enabled()?;
        Ok(self.executor.list_plans())
    }

    // ========== Checkpoints and Rollback ==========

    pub async fn get_checkpoint(&self, execution_id: &ExecutionId) -> Result<Checkpoint> {
        self.ensure_enabled()?;
        Ok(self.executor.get_checkpoint(execution_id).await?)
    }

    pub async fn list_checkpoints(&self, execution_id: &ExecutionId) -> Result<Vec<Checkpoint>> {
        self.ensure_enabled()?;
        Ok(self.executor.list_checkpoints(execution_id).await?)
    }

    pub async fn can_rollback(&self, execution_id: &ExecutionId) -> Result<bool> {
        self.ensure_enabled()?;
        Ok(self.executor.can_rollback(execution_id).await?)
    }

    /// Roll back to the latest checkpoint, or to `step_index` when given.
    pub async fn rollback(
        &self,
        execution_id: &ExecutionId,
        step_index: Option<usize>,
        actor: &str,
    ) -> Result<RollbackResult> {
        self.ensure_enabled()?;
        let result = match step_index {
            Some(step_index) => self.executor.rollback_to(execution_id, step_index, actor).await?,
            None => self.executor.rollback(execution_id, actor).await?,
        };
        Ok(result)
    }

    // ========== Readiness ==========

    /// Startup wiring goes through `GoLiveControlPlaneBuilder::with_probe`.
    pub fn register_probe(&self, probe: Arc<dyn Probe>) -> Result<()> {
        self.ensure_enabled()?;
        Ok(self.readiness.register_probe(probe)?)
    }

    pub fn probes_by_category(&self) -> Result<Vec<ProbeGroup>> {
        self.ensure_enabled()?;
        Ok(self.readiness.probes_by_category())
    }

    pub async fn evaluate_readiness(&self, use_cache: bool) -> Result<ReadinessSnapshot> {
        self.ensure_enabled()?;
        Ok(self.readiness.evaluate_readiness(use_cache).await)
    }

    pub async fn quick_health_check(&self) -> Result<ReadinessSnapshot> {
        self.ensure_enabled()?;
        Ok(self.readiness.quick_health_check().await)
    }

    pub async fn go_live_readiness(&self, use_cache: bool) -> Result<GoLiveReadiness> {
        self.ensure_enabled()?;
        Ok(self.readiness.get_go_live_readiness(use_cache).await)
    }

    // ========== Audit ==========

    /// Record an application-side event, typically a custom action.
    pub async fn log_audit_event(
        &self,
        action: AuditAction,
        description: &str,
        actor: &str,
        success: bool,
    ) -> Result<AuditEvent> {
        self.ensure_enabled()?;
        Ok(self
            .audit
            .log_audit_event(action, description, actor, success)
            .await?)
    }

    pub async fn audit_log(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        self.ensure_enabled()?;
        Ok(self.audit.get_audit_log(filter).await?)
    }

    pub async fn activity_summary(&self, window_hours: u32) -> Result<ActivitySummary> {
        self.ensure_enabled()?;
        Ok(self.audit.get_activity_summary(window_hours).await?)
    }

    // ========== Accessors ==========

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn readiness(&self) -> &Arc<ReadinessEvaluator> {
        &self.readiness
    }

    pub fn executor(&self) -> &PlanExecutor {
        &self.executor
    }
}
