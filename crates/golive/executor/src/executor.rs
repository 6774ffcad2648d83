//! Plan executor
//!
//! Drives a plan through `draft -> approved -> executing -> completed | failed`
//! and, optionally, `rolledback`. Each applied step is checkpointed before
//! the executor moves on; the registry flag change and its checkpoint either
//! both land or neither does.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use golive_audit::{AuditAction, AuditLog};
use golive_readiness::{ReadinessEvaluator, ReadinessStatus, Recommendation};
use golive_registry::CapabilityRegistry;
use golive_simulator::SimulationResult;
use golive_types::{
    ActionKind, Capability, CapabilityId, EnablementState, ExecutionId, PlanId, StateChange,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};
use crate::config::ExecutorConfig;
use crate::error::{ExecutionError, Result};
use crate::hook::{NoopStepHook, StepHook};
use crate::plan::{ExecutionPlan, PlanStatus, PlanStep};

/// Options for a single `execute` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecuteOptions {
    /// Validate and order every step without touching the registry.
    pub dry_run: bool,
    /// Recorded on every audit event the run writes.
    pub actor: String,
    /// Execute even when readiness says `DO_NOT_PROCEED`. Audited.
    pub force: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            actor: "system".to_string(),
            force: false,
        }
    }
}

impl ExecuteOptions {
    /// Dry run on behalf of `actor`.
    pub fn dry_run(actor: impl Into<String>) -> Self {
        Self {
            dry_run: true,
            actor: actor.into(),
            force: false,
        }
    }

    /// Real run on behalf of `actor`.
    pub fn by(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            ..Self::default()
        }
    }

    /// Bypass a `DO_NOT_PROCEED` readiness verdict.
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// What happened to one plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The registry was changed.
    Applied,
    /// Dry run only.
    Simulated,
    Failed,
}

/// One attempted plan step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Position in the plan, zero-based.
    pub index: usize,
    pub capability_id: CapabilityId,
    pub action: ActionKind,
    pub status: StepStatus,
    /// Enablement before the step.
    pub from: bool,
    /// Enablement the step targets.
    pub to: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepOutcome {
    fn new(step: &PlanStep, status: StepStatus, from: bool) -> Self {
        Self {
            index: step.index,
            capability_id: step.capability_id.clone(),
            action: step.action,
            status,
            from,
            to: step.action.target_state(),
            error: None,
        }
    }

    fn failed(step: &PlanStep, from: bool, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(step, StepStatus::Failed, from)
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}

/// Result of one execution. Real runs and dry runs share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: ExecutionId,
    pub plan_id: PlanId,
    /// Every step was applied, or validated in a dry run.
    pub success: bool,
    pub dry_run: bool,
    /// Every attempted step, the failed one last.
    pub steps: Vec<StepOutcome>,
    /// Index of the step that halted the run.
    pub failed_step: Option<usize>,
    /// Why the run failed, if it did.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Outcome of restoring a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackResult {
    pub execution_id: ExecutionId,
    pub plan_id: PlanId,
    /// Step index of the restored checkpoint.
    pub step_index: usize,
    /// Enablement changes the restore applied. Empty when nothing differed.
    pub changes: Vec<StateChange>,
    /// This checkpoint was the last one restored for the execution and the
    /// registry still matches it; nothing changed this time.
    pub already_rolled_back: bool,
}

/// Plan executor
pub struct PlanExecutor {
    registry: Arc<CapabilityRegistry>,
    readiness: Arc<ReadinessEvaluator>,
    audit: AuditLog,
    checkpoints: Arc<dyn CheckpointStore>,
    hook: Arc<dyn StepHook>,
    config: ExecutorConfig,
    plans: Arc<DashMap<PlanId, ExecutionPlan>>,
    in_flight: Arc<DashMap<PlanId, ExecutionId>>,
    executions: DashMap<ExecutionId, PlanId>,
    /// Executions share it, a rollback needs it exclusively.
    registry_lock: Arc<RwLock<()>>,
    /// Last checkpoint restored per execution.
    restored: DashMap<ExecutionId, usize>,
}

impl PlanExecutor {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        readiness: Arc<ReadinessEvaluator>,
        audit: AuditLog,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            readiness,
            audit,
            checkpoints: Arc::new(InMemoryCheckpointStore::new()),
            hook: Arc::new(NoopStepHook),
            config,
            plans: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            executions: DashMap::new(),
            registry_lock: Arc::new(RwLock::new(())),
            restored: DashMap::new(),
        }
    }

    /// Replace the default in-memory checkpoint store.
    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = store;
        self
    }

    /// Hook called before every applied step.
    pub fn with_step_hook(mut self, hook: Arc<dyn StepHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    // ========== Plans ==========

    /// Create a draft plan from a feasible simulation.
    #[instrument(skip(self, simulation, name), fields(simulation_id = %simulation.id))]
    pub async fn create_plan(
        &self,
        simulation: &SimulationResult,
        name: impl Into<String>,
        created_by: &str,
    ) -> Result<ExecutionPlan> {
        if !simulation.feasible {
            warn!(blockers = simulation.blockers.len(), "Refusing plan for infeasible simulation");
            return Err(ExecutionError::InfeasibleSimulation {
                blockers: simulation.blockers.clone(),
            });
        }
        if simulation.step_count() == 0 {
            return Err(ExecutionError::EmptyPlan);
        }

        let plan = ExecutionPlan::from_simulation(simulation, name, created_by);
        self.plans.insert(plan.id.clone(), plan.clone());

        self.audit
            .log_audit_event(
                AuditAction::PlanCreated,
                format!(
                    "Plan '{}' ({}) created from {} with {} steps",
                    plan.name,
                    plan.id,
                    plan.simulation_id,
                    plan.steps.len()
                ),
                created_by,
                true,
            )
            .await?;

        info!(plan_id = %plan.id, steps = plan.steps.len(), risk = %plan.risk_level, "Plan created");
        Ok(plan)
    }

    /// Approve a draft plan.
    #[instrument(skip(self, plan_id), fields(plan_id = %plan_id))]
    pub async fn approve_plan(&self, plan_id: &PlanId, approver: &str) -> Result<ExecutionPlan> {
        let approved = {
            let mut plan = self
                .plans
                .get_mut(plan_id)
                .ok_or_else(|| ExecutionError::PlanNotFound(plan_id.clone()))?;

            if plan.status != PlanStatus::Draft {
                return Err(ExecutionError::InvalidTransition {
                    plan_id: plan_id.clone(),
                    status: plan.status,
                    operation: "approve",
                });
            }
            if self.config.needs_distinct_approver(plan.risk_level) && plan.created_by == approver {
                warn!(approver, risk = %plan.risk_level, "Self-approval rejected");
                return Err(ExecutionError::SelfApproval {
                    plan_id: plan_id.clone(),
                    risk: plan.risk_level,
                    actor: approver.to_string(),
                });
            }

            plan.status = PlanStatus::Approved;
            plan.approved_by = Some(approver.to_string());
            plan.approved_at = Some(Utc::now());
            plan.clone()
        };

        self.audit
            .log_audit_event(
                AuditAction::PlanApproved,
                format!("Plan '{}' ({}) approved", approved.name, approved.id),
                approver,
                true,
            )
            .await?;

        info!(approver, "Plan approved");
        Ok(approved)
    }

    pub fn get_plan(&self, plan_id: &PlanId) -> Result<ExecutionPlan> {
        self.plans
            .get(plan_id)
            .map(|plan| plan.value().clone())
            .ok_or_else(|| ExecutionError::PlanNotFound(plan_id.clone()))
    }

    /// Every plan, oldest first. Terminal plans stay listed.
    pub fn list_plans(&self) -> Vec<ExecutionPlan> {
        let mut plans: Vec<ExecutionPlan> =
            self.plans.iter().map(|entry| entry.value().clone()).collect();
        plans.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        plans
    }

    /// Whether an execution of the plan is running right now.
    pub fn is_executing(&self, plan_id: &PlanId) -> bool {
        self.in_flight.contains_key(plan_id)
    }

    // ========== Execution ==========

    /// Execute an approved plan.
    ///
    /// A failing step halts the run and leaves the plan `failed` with its
    /// checkpoints in place; this is reported as `Ok` with `success: false`.
    /// Errors are reserved for refusals and infrastructure failures.
    #[instrument(skip_all, fields(plan_id = %plan_id, dry_run = options.dry_run, actor = %options.actor))]
    pub async fn execute(&self, plan_id: &PlanId, options: ExecuteOptions) -> Result<ExecutionResult> {
        // 1. Load plan and check its status
        let plan = self.get_plan(plan_id)?;
        Self::check_executable(&plan)?;

        if options.dry_run {
            self.readiness_gate(&plan, &options).await?;
            return self.dry_run(&plan, &options.actor).await;
        }

        // 2. Serialize per plan and against rollbacks
        let execution_id = ExecutionId::generate();
        let lease = Arc::clone(&self.registry_lock).read_owned().await;
        let mut guard = self.begin(&plan.id, &execution_id, lease)?;

        // 3. Readiness gate
        self.readiness_gate(&plan, &options).await?;

        // 4. Mark executing
        self.update_plan(&plan.id, |p| {
            p.status = PlanStatus::Executing;
            p.last_execution = Some(execution_id.clone());
        });
        self.executions.insert(execution_id.clone(), plan.id.clone());
        let started_at = Utc::now();

        self.audit
            .log_audit_event(
                AuditAction::ExecutionStarted,
                format!(
                    "Execution {} of plan '{}' ({}) started with {} steps",
                    execution_id,
                    plan.name,
                    plan.id,
                    plan.steps.len()
                ),
                &options.actor,
                true,
            )
            .await?;

        info!(execution_id = %execution_id, steps = plan.steps.len(), "Execution started");

        // 5. Baseline checkpoint
        self.checkpoints
            .save(Checkpoint::new(
                execution_id.clone(),
                plan.id.clone(),
                0,
                self.registry.enablement(),
            ))
            .await?;

        // 6. Apply steps in order, halting on the first failure
        let mut outcomes = Vec::with_capacity(plan.steps.len());
        for step in &plan.steps {
            let outcome = self
                .apply_step(&plan, step, &execution_id, &options.actor, &mut guard)
                .await?;
            let failed = outcome.is_failed();
            outcomes.push(outcome);
            if failed {
                break;
            }
        }

        // 7. Finalise
        let failure = outcomes
            .iter()
            .find(|o| o.is_failed())
            .map(|o| (o.index, o.error.clone().unwrap_or_default()));

        let result = ExecutionResult {
            execution_id: execution_id.clone(),
            plan_id: plan.id.clone(),
            success: failure.is_none(),
            dry_run: false,
            steps: outcomes,
            failed_step: failure.as_ref().map(|(index, _)| *index),
            error: failure.as_ref().map(|(_, error)| error.clone()),
            started_at,
            finished_at: Utc::now(),
        };

        match failure {
            None => {
                self.update_plan(&plan.id, |p| p.status = PlanStatus::Completed);
                guard.finish();
                self.checkpoints.discard(&execution_id).await?;

                self.audit
                    .log_audit_event(
                        AuditAction::ExecutionCompleted,
                        format!(
                            "Execution {} of plan '{}' completed {} steps",
                            execution_id,
                            plan.name,
                            result.steps.len()
                        ),
                        &options.actor,
                        true,
                    )
                    .await?;

                info!(execution_id = %execution_id, "Execution completed");
            }
            Some((index, error)) => {
                self.update_plan(&plan.id, |p| p.status = PlanStatus::Failed);
                guard.finish();

                self.audit
                    .log_audit_event(
                        AuditAction::ExecutionFailed,
                        format!(
                            "Execution {} of plan '{}' failed at step {}: {}",
                            execution_id, plan.name, index, error
                        ),
                        &options.actor,
                        false,
                    )
                    .await?;

                warn!(execution_id = %execution_id, step = index, error = %error, "Execution failed");
            }
        }

        Ok(result)
    }

    /// Refuse on `DO_NOT_PROCEED` unless forced. Only real runs record the
    /// override.
    async fn readiness_gate(&self, plan: &ExecutionPlan, options: &ExecuteOptions) -> Result<()> {
        if !self.config.readiness_gate {
            return Ok(());
        }

        let verdict = self.readiness.get_go_live_readiness(false).await;
        if verdict.recommendation != Recommendation::DoNotProceed {
            return Ok(());
        }

        if !options.force {
            warn!(reasons = ?verdict.blocking_reasons, "Execution blocked by readiness");
            return Err(ExecutionError::ReadinessBlocked {
                reasons: verdict.blocking_reasons,
            });
        }

        if options.dry_run {
            debug!(reasons = ?verdict.blocking_reasons, "Dry run would override readiness");
            return Ok(());
        }

        warn!(reasons = ?verdict.blocking_reasons, "Readiness overridden");
        self.audit
            .log_audit_event(
                AuditAction::ReadinessOverride,
                format!(
                    "Plan '{}' ({}) forced past readiness: {}",
                    plan.name,
                    plan.id,
                    verdict.blocking_reasons.join("; ")
                ),
                &options.actor,
                true,
            )
            .await?;
        Ok(())
    }

    fn check_executable(plan: &ExecutionPlan) -> Result<()> {
        match plan.status {
            PlanStatus::Approved => Ok(()),
            PlanStatus::Draft => Err(ExecutionError::PlanNotApproved(plan.id.clone())),
            PlanStatus::Executing => Err(ExecutionError::AlreadyExecuting(plan.id.clone())),
            status => Err(ExecutionError::InvalidTransition {
                plan_id: plan.id.clone(),
                status,
                operation: "execute",
            }),
        }
    }

    /// Claim the plan for one execution.
    fn begin(
        &self,
        plan_id: &PlanId,
        execution_id: &ExecutionId,
        lease: OwnedRwLockReadGuard<()>,
    ) -> Result<InFlightGuard> {
        match self.in_flight.entry(plan_id.clone()) {
            Entry::Occupied(_) => {
                warn!(plan_id = %plan_id, "Concurrent execution rejected");
                return Err(ExecutionError::AlreadyExecuting(plan_id.clone()));
            }
            Entry::Vacant(slot) => {
                slot.insert(execution_id.clone());
            }
        }

        let guard = InFlightGuard {
            plan_id: plan_id.clone(),
            plans: Arc::clone(&self.plans),
            in_flight: Arc::clone(&self.in_flight),
            registry: Arc::clone(&self.registry),
            pending: None,
            _lease: lease,
        };

        // Another execution may have finished between the status check and the claim
        Self::check_executable(&self.get_plan(plan_id)?)?;
        Ok(guard)
    }

    async fn apply_step(
        &self,
        plan: &ExecutionPlan,
        step: &PlanStep,
        execution_id: &ExecutionId,
        actor: &str,
        guard: &mut InFlightGuard,
    ) -> Result<StepOutcome> {
        if self.config.health_check_between_steps && step.index > 1 {
            let health = self.readiness.quick_health_check().await;
            if health.status == ReadinessStatus::Blocked {
                let failing: Vec<&str> = health
                    .blocking_failures()
                    .map(|r| r.probe_id.as_str())
                    .collect();
                return Ok(StepOutcome::failed(
                    step,
                    self.registry.enablement().is_enabled(&step.capability_id),
                    format!("health check blocked: {}", failing.join(", ")),
                ));
            }
        }

        let snapshot = self.registry.snapshot();
        let state = snapshot.enablement();
        let from = state.is_enabled(&step.capability_id);

        if let Err(reason) = check_step(&snapshot.capabilities, &state, step) {
            return Ok(StepOutcome::failed(step, from, reason));
        }

        if let Err(e) = self.hook.before_step(plan, step).await {
            return Ok(StepOutcome::failed(step, from, format!("step hook refused: {e}")));
        }

        // Flag change and checkpoint land together
        let previous = match self
            .registry
            .set_enabled(&step.capability_id, step.action.target_state())
        {
            Ok(previous) => previous,
            Err(e) => return Ok(StepOutcome::failed(step, from, e.to_string())),
        };
        guard.pending = Some((step.capability_id.clone(), previous));

        let checkpoint = Checkpoint::new(
            execution_id.clone(),
            plan.id.clone(),
            step.index,
            self.registry.enablement(),
        );
        let saved = self.checkpoints.save(checkpoint).await;
        guard.pending = None;

        if let Err(e) = saved {
            if let Err(revert) = self.registry.set_enabled(&step.capability_id, previous) {
                warn!(capability_id = %step.capability_id, error = %revert, "Failed to revert step");
            }
            return Ok(StepOutcome::failed(step, from, format!("checkpoint write failed: {e}")));
        }

        self.audit
            .log_audit_event(
                AuditAction::StepApplied,
                format!(
                    "Step {} of execution {}: {} {}",
                    step.index, execution_id, step.action, step.capability_id
                ),
                actor,
                true,
            )
            .await?;

        debug!(step = step.index, capability_id = %step.capability_id, action = %step.action, "Step applied");
        Ok(StepOutcome::new(step, StepStatus::Applied, previous))
    }

    /// Validate every step against a projected state. Nothing is persisted.
    async fn dry_run(&self, plan: &ExecutionPlan, actor: &str) -> Result<ExecutionResult> {
        let started_at = Utc::now();
        let snapshot = self.registry.snapshot();
        let mut state = snapshot.enablement();
        let mut outcomes = Vec::with_capacity(plan.steps.len());

        for step in &plan.steps {
            let from = state.is_enabled(&step.capability_id);
            if let Err(reason) = check_step(&snapshot.capabilities, &state, step) {
                outcomes.push(StepOutcome::failed(step, from, reason));
                break;
            }
            state.set(step.capability_id.clone(), step.action.target_state());
            outcomes.push(StepOutcome::new(step, StepStatus::Simulated, from));
        }

        let failure = outcomes.iter().find(|o| o.is_failed());
        let result = ExecutionResult {
            execution_id: ExecutionId::generate(),
            plan_id: plan.id.clone(),
            success: failure.is_none(),
            dry_run: true,
            failed_step: failure.map(|o| o.index),
            error: failure.and_then(|o| o.error.clone()),
            steps: outcomes.clone(),
            started_at,
            finished_at: Utc::now(),
        };

        self.audit
            .log_audit_event(
                AuditAction::ExecutionDryRun,
                format!(
                    "Dry run of plan '{}' ({}): {} of {} steps valid",
                    plan.name,
                    plan.id,
                    result.steps.iter().filter(|o| !o.is_failed()).count(),
                    plan.steps.len()
                ),
                actor,
                result.success,
            )
            .await?;

        info!(success = result.success, "Dry run finished");
        Ok(result)
    }

    fn update_plan(&self, plan_id: &PlanId, update: impl FnOnce(&mut ExecutionPlan)) {
        if let Some(mut plan) = self.plans.get_mut(plan_id) {
            update(&mut plan);
        }
    }

    // ========== Checkpoints and rollback ==========

    /// Capture the current registry enablement for an execution.
    pub async fn create_checkpoint(
        &self,
        execution_id: &ExecutionId,
        step_index: usize,
    ) -> Result<Checkpoint> {
        let plan_id = self.plan_of(execution_id)?;
        let checkpoint = Checkpoint::new(
            execution_id.clone(),
            plan_id,
            step_index,
            self.registry.enablement(),
        );
        self.checkpoints.save(checkpoint.clone()).await?;

        self.audit
            .log_audit_event(
                AuditAction::CheckpointCreated,
                format!("Checkpoint {step_index} recorded for execution {execution_id}"),
                "system",
                true,
            )
            .await?;

        Ok(checkpoint)
    }

    /// Latest checkpoint of an execution.
    pub async fn get_checkpoint(&self, execution_id: &ExecutionId) -> Result<Checkpoint> {
        self.checkpoints
            .latest(execution_id)
            .await?
            .ok_or_else(|| ExecutionError::NoCheckpoint(execution_id.clone()))
    }

    /// Every checkpoint of an execution, ascending by step.
    pub async fn list_checkpoints(&self, execution_id: &ExecutionId) -> Result<Vec<Checkpoint>> {
        self.checkpoints.list(execution_id).await
    }

    /// A checkpoint exists and no execution is running.
    pub async fn can_rollback(&self, execution_id: &ExecutionId) -> Result<bool> {
        if self.checkpoints.latest(execution_id).await?.is_none() {
            return Ok(false);
        }
        Ok(self.in_flight.is_empty())
    }

    /// Restore the latest checkpoint of an execution.
    pub async fn rollback(&self, execution_id: &ExecutionId, actor: &str) -> Result<RollbackResult> {
        let checkpoint = self.get_checkpoint(execution_id).await?;
        self.restore(checkpoint, actor).await
    }

    /// Restore a specific checkpoint of an execution.
    pub async fn rollback_to(
        &self,
        execution_id: &ExecutionId,
        step_index: usize,
        actor: &str,
    ) -> Result<RollbackResult> {
        let checkpoint = self
            .checkpoints
            .get(execution_id, step_index)
            .await?
            .ok_or_else(|| ExecutionError::CheckpointNotFound {
                execution_id: execution_id.clone(),
                step_index,
            })?;
        self.restore(checkpoint, actor).await
    }

    #[instrument(skip_all, fields(execution_id = %checkpoint.execution_id, step = checkpoint.step_index))]
    async fn restore(&self, checkpoint: Checkpoint, actor: &str) -> Result<RollbackResult> {
        let changes = {
            // Any running execution, of this plan or another, owns the registry
            let Ok(_exclusive) = self.registry_lock.try_write() else {
                let running = self
                    .in_flight
                    .iter()
                    .next()
                    .map(|entry| entry.key().clone())
                    .unwrap_or_else(|| checkpoint.plan_id.clone());
                warn!(running = %running, "Rollback refused while an execution is in flight");
                return Err(ExecutionError::AlreadyExecuting(running));
            };

            let last = self
                .restored
                .get(&checkpoint.execution_id)
                .map(|step| *step.value());
            if last == Some(checkpoint.step_index)
                && matches_state(&self.registry.enablement(), &checkpoint.captured_state)
            {
                debug!("Checkpoint already restored");
                return Ok(RollbackResult {
                    execution_id: checkpoint.execution_id.clone(),
                    plan_id: checkpoint.plan_id.clone(),
                    step_index: checkpoint.step_index,
                    changes: Vec::new(),
                    already_rolled_back: true,
                });
            }

            let changes = self.registry.restore_enablement(&checkpoint.captured_state);
            self.restored
                .insert(checkpoint.execution_id.clone(), checkpoint.step_index);
            changes
        };

        self.update_plan(&checkpoint.plan_id, |p| {
            if matches!(p.status, PlanStatus::Failed | PlanStatus::Completed) {
                p.status = PlanStatus::RolledBack;
            }
        });

        self.audit
            .log_audit_event(
                AuditAction::RollbackCompleted,
                format!(
                    "Execution {} rolled back to checkpoint {} ({} changes)",
                    checkpoint.execution_id,
                    checkpoint.step_index,
                    changes.len()
                ),
                actor,
                true,
            )
            .await?;

        info!(changes = changes.len(), "Rollback completed");
        Ok(RollbackResult {
            execution_id: checkpoint.execution_id,
            plan_id: checkpoint.plan_id,
            step_index: checkpoint.step_index,
            changes,
            already_rolled_back: false,
        })
    }

    fn plan_of(&self, execution_id: &ExecutionId) -> Result<PlanId> {
        self.executions
            .get(execution_id)
            .map(|plan_id| plan_id.value().clone())
            .ok_or_else(|| ExecutionError::ExecutionNotFound(execution_id.clone()))
    }
}

/// Holds the per-plan execution slot.
///
/// Dropping it mid-step (a cancelled execution) reverts an unconfirmed flag
/// change and marks a still-executing plan failed.
struct InFlightGuard {
    plan_id: PlanId,
    plans: Arc<DashMap<PlanId, ExecutionPlan>>,
    in_flight: Arc<DashMap<PlanId, ExecutionId>>,
    registry: Arc<CapabilityRegistry>,
    /// Flag changed but checkpoint not yet confirmed: (capability, previous).
    pending: Option<(CapabilityId, bool)>,
    /// Released after `drop` has reverted any pending change.
    _lease: OwnedRwLockReadGuard<()>,
}

impl InFlightGuard {
    fn finish(&mut self) {
        self.pending = None;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some((capability_id, previous)) = self.pending.take() {
            warn!(capability_id = %capability_id, "Reverting unconfirmed step");
            if let Err(e) = self.registry.set_enabled(&capability_id, previous) {
                warn!(capability_id = %capability_id, error = %e, "Failed to revert step");
            }
        }

        if let Some(mut plan) = self.plans.get_mut(&self.plan_id) {
            if plan.status == PlanStatus::Executing {
                warn!(plan_id = %self.plan_id, "Execution interrupted; plan marked failed");
                plan.status = PlanStatus::Failed;
            }
        }

        self.in_flight.remove(&self.plan_id);
    }
}

/// Every flag in `captured` that is still registered has its captured value.
fn matches_state(current: &EnablementState, captured: &EnablementState) -> bool {
    captured
        .iter()
        .all(|(id, enabled)| current.get(id).map_or(true, |now| now == enabled))
}

/// Check a step against the current definitions and enablement.
fn check_step(
    capabilities: &[Capability],
    state: &EnablementState,
    step: &PlanStep,
) -> std::result::Result<(), String> {
    let id = &step.capability_id;
    let capability = capabilities
        .iter()
        .find(|c| &c.id == id)
        .ok_or_else(|| format!("capability {id} is not registered"))?;

    match step.action {
        ActionKind::Enable => {
            if let Some(dep) = capability.depends_on.iter().find(|dep| !state.is_enabled(dep)) {
                return Err(format!("dependency {dep} of {id} is disabled"));
            }
            if let Some(other) = capabilities.iter().find(|other| {
                other.id != *id
                    && state.is_enabled(&other.id)
                    && (capability.excludes(&other.id) || other.excludes(id))
            }) {
                return Err(format!("{id} conflicts with enabled capability {}", other.id));
            }
        }
        ActionKind::Disable => {
            if let Some(dependent) = capabilities
                .iter()
                .find(|other| other.depends_on.contains(id) && state.is_enabled(&other.id))
            {
                return Err(format!("{} still depends on {id}", dependent.id));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::HookError;
    use golive_audit::AuditFilter;
    use golive_readiness::{FnProbe, ProbeCategory, ProbeOutcome, ReadinessConfig, ReadinessError};
    use golive_simulator::RolloutSimulator;
    use golive_types::{CapabilityAction, Domain, RiskLevel};
    use std::time::Duration;

    struct Harness {
        registry: Arc<CapabilityRegistry>,
        readiness: Arc<ReadinessEvaluator>,
        audit: AuditLog,
        simulator: RolloutSimulator,
    }

    impl Harness {
        /// d -> c -> b -> a, all disabled.
        fn chain() -> Self {
            let registry = Arc::new(CapabilityRegistry::new());
            registry.register(vec![
                Capability::new("a", "A", Domain::Content),
                Capability::new("b", "B", Domain::Content).depends_on(["a"]),
                Capability::new("c", "C", Domain::Content).depends_on(["b"]),
                Capability::new("d", "D", Domain::Content).depends_on(["c"]),
            ]);
            Self {
                simulator: RolloutSimulator::new(registry.clone()),
                registry,
                readiness: Arc::new(ReadinessEvaluator::new(ReadinessConfig::default())),
                audit: AuditLog::in_memory(),
            }
        }

        fn executor(&self, config: ExecutorConfig) -> PlanExecutor {
            PlanExecutor::new(
                self.registry.clone(),
                self.readiness.clone(),
                self.audit.clone(),
                config,
            )
        }

        async fn approved_plan(&self, executor: &PlanExecutor, target: &str) -> ExecutionPlan {
            let simulation = self.simulator.simulate(CapabilityAction::enable(target));
            let plan = executor.create_plan(&simulation, "rollout", "alice").await.unwrap();
            executor.approve_plan(&plan.id, "bob").await.unwrap()
        }

        fn enabled(&self, id: &str) -> bool {
            self.registry.enablement().is_enabled(&id.into())
        }
    }

    struct FailAt(usize);

    #[async_trait::async_trait]
    impl StepHook for FailAt {
        async fn before_step(&self, _plan: &ExecutionPlan, step: &PlanStep) -> std::result::Result<(), HookError> {
            if step.index == self.0 {
                return Err(HookError::new("actuator unavailable"));
            }
            Ok(())
        }
    }

    /// Never lets the step at the given index finish.
    struct StallAt(usize);

    #[async_trait::async_trait]
    impl StepHook for StallAt {
        async fn before_step(&self, _plan: &ExecutionPlan, step: &PlanStep) -> std::result::Result<(), HookError> {
            if step.index == self.0 {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    /// Fails on one capability and never finishes another.
    struct Scripted {
        fail_on: &'static str,
        stall_on: &'static str,
    }

    #[async_trait::async_trait]
    impl StepHook for Scripted {
        async fn before_step(&self, _plan: &ExecutionPlan, step: &PlanStep) -> std::result::Result<(), HookError> {
            if step.capability_id.as_str() == self.stall_on {
                std::future::pending::<()>().await;
            }
            if step.capability_id.as_str() == self.fail_on {
                return Err(HookError::new("actuator unavailable"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_infeasible_simulation_rejected() {
        let h = Harness::chain();
        h.registry.register(vec![
            Capability::new("x", "X", Domain::Content).conflicts_with(["y"]),
            Capability::new("y", "Y", Domain::Content).enabled(true),
        ]);
        let executor = h.executor(ExecutorConfig::permissive());

        let simulation = h.simulator.simulate(CapabilityAction::enable("x"));
        let err = executor.create_plan(&simulation, "x", "alice").await.unwrap_err();
        match err {
            ExecutionError::InfeasibleSimulation { blockers } => assert!(!blockers.is_empty()),
            other => panic!("unexpected error: {other}"),
        }
        assert!(executor.list_plans().is_empty());
    }

    #[tokio::test]
    async fn test_draft_plan_cannot_execute() {
        let h = Harness::chain();
        let executor = h.executor(ExecutorConfig::permissive());
        let simulation = h.simulator.simulate(CapabilityAction::enable("b"));
        let plan = executor.create_plan(&simulation, "b", "alice").await.unwrap();
        assert_eq!(plan.status, PlanStatus::Draft);
        assert_eq!(plan.steps.len(), 2);

        for options in [ExecuteOptions::by("alice"), ExecuteOptions::dry_run("alice")] {
            assert!(matches!(
                executor.execute(&plan.id, options).await,
                Err(ExecutionError::PlanNotApproved(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_self_approval_of_high_risk_plan_rejected() {
        let h = Harness::chain();
        h.registry
            .register(vec![Capability::new("pay", "Payments", Domain::Integration).with_risk(RiskLevel::High)]);
        let executor = h.executor(ExecutorConfig::default());

        let simulation = h.simulator.simulate(CapabilityAction::enable("pay"));
        let plan = executor.create_plan(&simulation, "pay", "alice").await.unwrap();

        assert!(matches!(
            executor.approve_plan(&plan.id, "alice").await,
            Err(ExecutionError::SelfApproval { .. })
        ));
        let approved = executor.approve_plan(&plan.id, "bob").await.unwrap();
        assert_eq!(approved.approved_by.as_deref(), Some("bob"));

        // Approval happens once
        assert!(matches!(
            executor.approve_plan(&plan.id, "carol").await,
            Err(ExecutionError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_execute_applies_steps_in_order() {
        let h = Harness::chain();
        let executor = h.executor(ExecutorConfig::permissive());
        let plan = h.approved_plan(&executor, "c").await;

        let result = executor.execute(&plan.id, ExecuteOptions::by("bob")).await.unwrap();
        assert!(result.success);
        let order: Vec<&str> = result.steps.iter().map(|s| s.capability_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(result.steps.iter().all(|s| s.status == StepStatus::Applied));

        assert!(h.enabled("a") && h.enabled("b") && h.enabled("c"));
        assert!(!h.enabled("d"));

        let plan = executor.get_plan(&plan.id).unwrap();
        assert_eq!(plan.status, PlanStatus::Completed);
        assert_eq!(plan.last_execution, Some(result.execution_id.clone()));

        // Successful executions drop their checkpoints
        assert!(executor.list_checkpoints(&result.execution_id).await.unwrap().is_empty());
        assert!(!executor.can_rollback(&result.execution_id).await.unwrap());

        // Terminal plans never run again
        assert!(matches!(
            executor.execute(&plan.id, ExecuteOptions::by("bob")).await,
            Err(ExecutionError::InvalidTransition { .. })
        ));

        let applied = h
            .audit
            .get_audit_log(&AuditFilter::action(AuditAction::StepApplied))
            .await
            .unwrap();
        assert_eq!(applied.len(), 3);
    }

    #[tokio::test]
    async fn test_dry_run_does_not_mutate() {
        let h = Harness::chain();
        let executor = h.executor(ExecutorConfig::permissive());
        let plan = h.approved_plan(&executor, "c").await;
        let before = h.registry.enablement();

        let result = executor.execute(&plan.id, ExecuteOptions::dry_run("bob")).await.unwrap();
        assert!(result.success);
        assert!(result.dry_run);
        assert_eq!(result.steps.len(), plan.steps.len());
        assert!(result.steps.iter().all(|s| s.status == StepStatus::Simulated));

        assert_eq!(h.registry.enablement(), before);
        assert_eq!(executor.get_plan(&plan.id).unwrap().status, PlanStatus::Approved);
        assert!(executor.list_checkpoints(&result.execution_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_step_leaves_checkpoints_for_rollback() {
        let h = Harness::chain();
        let executor = h
            .executor(ExecutorConfig::permissive())
            .with_step_hook(Arc::new(FailAt(3)));
        let plan = h.approved_plan(&executor, "d").await;
        assert_eq!(plan.steps.len(), 4);

        let result = executor.execute(&plan.id, ExecuteOptions::by("bob")).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.failed_step, Some(3));
        assert_eq!(result.steps.len(), 3);
        assert!(result.error.unwrap().contains("actuator unavailable"));

        assert_eq!(executor.get_plan(&plan.id).unwrap().status, PlanStatus::Failed);
        assert!(h.enabled("a") && h.enabled("b"));
        assert!(!h.enabled("c"));

        let steps: Vec<usize> = executor
            .list_checkpoints(&result.execution_id)
            .await
            .unwrap()
            .iter()
            .map(|c| c.step_index)
            .collect();
        assert_eq!(steps, vec![0, 1, 2]);
        assert!(executor.can_rollback(&result.execution_id).await.unwrap());

        // Latest checkpoint is the state after step 2, which is the live state
        let latest = executor.get_checkpoint(&result.execution_id).await.unwrap();
        assert_eq!(latest.step_index, 2);
        assert_eq!(latest.captured_state, h.registry.enablement());

        let failed = h
            .audit
            .get_audit_log(&AuditFilter::action(AuditAction::ExecutionFailed))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert!(!failed[0].success);
    }

    #[tokio::test]
    async fn test_rollback_is_idempotent() {
        let h = Harness::chain();
        let executor = h
            .executor(ExecutorConfig::permissive())
            .with_step_hook(Arc::new(FailAt(3)));
        let plan = h.approved_plan(&executor, "d").await;
        let baseline = h.registry.enablement();

        let result = executor.execute(&plan.id, ExecuteOptions::by("bob")).await.unwrap();

        let first = executor
            .rollback_to(&result.execution_id, 0, "bob")
            .await
            .unwrap();
        assert!(!first.already_rolled_back);
        assert_eq!(first.changes.len(), 2);
        assert_eq!(h.registry.enablement(), baseline);
        assert_eq!(executor.get_plan(&plan.id).unwrap().status, PlanStatus::RolledBack);

        let second = executor
            .rollback_to(&result.execution_id, 0, "bob")
            .await
            .unwrap();
        assert!(second.already_rolled_back);
        assert!(second.changes.is_empty());

        let rollbacks = h
            .audit
            .get_audit_log(&AuditFilter::action(AuditAction::RollbackCompleted))
            .await
            .unwrap();
        assert_eq!(rollbacks.len(), 1);

        assert!(matches!(
            executor.rollback_to(&result.execution_id, 7, "bob").await,
            Err(ExecutionError::CheckpointNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_rollback_restores_checkpoint_after_another_was_restored() {
        let h = Harness::chain();
        let executor = h
            .executor(ExecutorConfig::permissive())
            .with_step_hook(Arc::new(FailAt(3)));
        let plan = h.approved_plan(&executor, "d").await;
        let result = executor.execute(&plan.id, ExecuteOptions::by("bob")).await.unwrap();
        let latest = executor.get_checkpoint(&result.execution_id).await.unwrap();

        let first = executor.rollback(&result.execution_id, "bob").await.unwrap();
        assert!(!first.already_rolled_back);
        assert!(first.changes.is_empty());

        executor.rollback_to(&result.execution_id, 0, "bob").await.unwrap();
        assert!(!h.enabled("a") && !h.enabled("b"));

        // Back to the latest checkpoint: a different target than the last restore
        let again = executor.rollback(&result.execution_id, "bob").await.unwrap();
        assert!(!again.already_rolled_back);
        assert_eq!(again.changes.len(), 2);
        assert_eq!(h.registry.enablement(), latest.captured_state);

        let repeat = executor.rollback(&result.execution_id, "bob").await.unwrap();
        assert!(repeat.already_rolled_back);
        assert!(repeat.changes.is_empty());
    }

    #[tokio::test]
    async fn test_rollback_refused_while_another_plan_executes() {
        let h = Harness::chain();
        h.registry.register(vec![
            Capability::new("x", "X", Domain::Search),
            Capability::new("y", "Y", Domain::Search).depends_on(["x"]),
        ]);
        let executor = Arc::new(
            h.executor(ExecutorConfig::permissive())
                .with_step_hook(Arc::new(Scripted { fail_on: "c", stall_on: "y" })),
        );

        let failed_plan = h.approved_plan(&executor, "d").await;
        let failed = executor
            .execute(&failed_plan.id, ExecuteOptions::by("bob"))
            .await
            .unwrap();
        assert_eq!(failed.failed_step, Some(3));

        let running_plan = h.approved_plan(&executor, "y").await;
        let running = {
            let executor = executor.clone();
            let plan_id = running_plan.id.clone();
            tokio::spawn(async move { executor.execute(&plan_id, ExecuteOptions::by("bob")).await })
        };
        while !h.enabled("x") {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            executor.rollback_to(&failed.execution_id, 0, "bob").await,
            Err(ExecutionError::AlreadyExecuting(plan_id)) if plan_id == running_plan.id
        ));
        assert!(!executor.can_rollback(&failed.execution_id).await.unwrap());
        assert!(h.enabled("x"));
        assert!(h.enabled("a") && h.enabled("b"));

        running.abort();
        let _ = running.await;

        let restored = executor
            .rollback_to(&failed.execution_id, 0, "bob")
            .await
            .unwrap();
        assert!(!restored.already_rolled_back);
        assert!(!h.enabled("a") && !h.enabled("b"));
    }

    #[tokio::test]
    async fn test_dry_run_applies_readiness_gate() {
        let h = Harness::chain();
        h.readiness
            .register_probe(Arc::new(FnProbe::new("db", ProbeCategory::Database, || {
                std::future::ready(Ok::<_, ReadinessError>(ProbeOutcome::fail("connection refused")))
            })))
            .unwrap();
        let executor = h.executor(ExecutorConfig {
            require_distinct_approver_from: None,
            ..ExecutorConfig::default()
        });
        let plan = h.approved_plan(&executor, "a").await;

        assert!(matches!(
            executor.execute(&plan.id, ExecuteOptions::dry_run("bob")).await,
            Err(ExecutionError::ReadinessBlocked { .. })
        ));

        let result = executor
            .execute(&plan.id, ExecuteOptions::dry_run("bob").forced())
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.dry_run);
        assert!(!h.enabled("a"));
        assert_eq!(executor.get_plan(&plan.id).unwrap().status, PlanStatus::Approved);

        // Only real runs record an override
        let overrides = h
            .audit
            .get_audit_log(&AuditFilter::action(AuditAction::ReadinessOverride))
            .await
            .unwrap();
        assert!(overrides.is_empty());
    }

    #[tokio::test]
    async fn test_readiness_gate_and_override() {
        let h = Harness::chain();
        h.readiness
            .register_probe(Arc::new(FnProbe::new("db", ProbeCategory::Database, || {
                std::future::ready(Ok::<_, ReadinessError>(ProbeOutcome::fail("connection refused")))
            })))
            .unwrap();
        let executor = h.executor(ExecutorConfig {
            require_distinct_approver_from: None,
            ..ExecutorConfig::default()
        });
        let plan = h.approved_plan(&executor, "a").await;

        match executor.execute(&plan.id, ExecuteOptions::by("bob")).await {
            Err(ExecutionError::ReadinessBlocked { reasons }) => {
                assert_eq!(reasons, vec!["db: connection refused".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(executor.get_plan(&plan.id).unwrap().status, PlanStatus::Approved);
        assert!(!h.enabled("a"));

        let result = executor
            .execute(&plan.id, ExecuteOptions::by("bob").forced())
            .await
            .unwrap();
        assert!(result.success);
        assert!(h.enabled("a"));

        let overrides = h
            .audit
            .get_audit_log(&AuditFilter::action(AuditAction::ReadinessOverride))
            .await
            .unwrap();
        assert_eq!(overrides.len(), 1);
        assert!(overrides[0].description.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_health_check_between_steps_halts() {
        let h = Harness::chain();
        h.readiness
            .register_probe(Arc::new(
                FnProbe::new("queue", ProbeCategory::Queue, || {
                    std::future::ready(Ok::<_, ReadinessError>(ProbeOutcome::fail("backlog")))
                })
                .quick(),
            ))
            .unwrap();
        let executor = h.executor(ExecutorConfig {
            readiness_gate: false,
            health_check_between_steps: true,
            require_distinct_approver_from: None,
        });
        let plan = h.approved_plan(&executor, "b").await;

        let result = executor.execute(&plan.id, ExecuteOptions::by("bob")).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.failed_step, Some(2));
        assert!(h.enabled("a"));
        assert!(!h.enabled("b"));
    }

    #[tokio::test]
    async fn test_drifted_state_fails_step() {
        let h = Harness::chain();
        let executor = h.executor(ExecutorConfig::permissive());
        let simulation = h.simulator.simulate(CapabilityAction::enable("b"));
        let plan = executor.create_plan(&simulation, "b", "alice").await.unwrap();
        executor.approve_plan(&plan.id, "bob").await.unwrap();

        // The dependency disappears after planning
        h.registry.clear();
        h.registry.register(vec![Capability::new("b", "B", Domain::Content).depends_on(["a"])]);

        let result = executor.execute(&plan.id, ExecuteOptions::by("bob")).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.failed_step, Some(1));
        assert!(result.error.unwrap().contains("not registered"));
    }

    #[tokio::test]
    async fn test_concurrent_execution_rejected() {
        let h = Harness::chain();
        let executor = Arc::new(
            h.executor(ExecutorConfig::permissive())
                .with_step_hook(Arc::new(StallAt(2))),
        );
        let plan = h.approved_plan(&executor, "c").await;

        let running = {
            let executor = executor.clone();
            let plan_id = plan.id.clone();
            tokio::spawn(async move { executor.execute(&plan_id, ExecuteOptions::by("bob")).await })
        };
        while !executor.is_executing(&plan.id) {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            executor.execute(&plan.id, ExecuteOptions::by("carol")).await,
            Err(ExecutionError::AlreadyExecuting(_))
        ));
        running.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_execution_marks_plan_failed() {
        let h = Harness::chain();
        let executor = h
            .executor(ExecutorConfig::permissive())
            .with_step_hook(Arc::new(StallAt(2)));
        let plan = h.approved_plan(&executor, "c").await;

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            executor.execute(&plan.id, ExecuteOptions::by("bob")),
        )
        .await;
        assert!(outcome.is_err());

        let plan = executor.get_plan(&plan.id).unwrap();
        assert_eq!(plan.status, PlanStatus::Failed);
        assert!(!executor.is_executing(&plan.id));
        assert!(h.enabled("a"));
        assert!(!h.enabled("b"));

        let execution_id = plan.last_execution.unwrap();
        let latest = executor.get_checkpoint(&execution_id).await.unwrap();
        assert_eq!(latest.step_index, 1);
        assert!(executor.can_rollback(&execution_id).await.unwrap());
    }
}
