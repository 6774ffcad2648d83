//! Rollout simulator
//!
//! Composes the dependency resolver and the conflict detector into a
//! feasibility and impact report. Simulation works on a registry snapshot,
//! so it is pure: the same snapshot and actions always yield the same result,
//! and the live registry is never written.

use std::collections::BTreeSet;
use std::sync::Arc;

use golive_registry::{CapabilityRegistry, RegistrySnapshot};
use golive_resolver::{Conflict, ConflictDetector, DependencyResolver, ResolverError};
use golive_types::{
    ActionKind, Blocker, CapabilityAction, CapabilityId, EnablementState, RiskLevel,
    SimulationId, StateChange,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{Result, SimulationError};

/// Combined blast radius of every capability a simulation targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactSummary {
    /// Direct dependents of any target, excluding the targets themselves.
    pub direct_impact: Vec<CapabilityId>,
    /// Capabilities reached only through other dependents.
    pub transitive_impact: Vec<CapabilityId>,
    pub total_affected: usize,
    /// [`golive_resolver::blast_risk`] of the union.
    pub risk_level: RiskLevel,
}

/// Feasibility and impact report for a proposed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Digest of the registry definitions, enablement and actions.
    pub id: SimulationId,
    /// The requested actions, in request order.
    pub actions: Vec<CapabilityAction>,
    /// False when any blocker was found. Infeasible results cannot be planned.
    pub feasible: bool,
    /// Blast radius risk raised to the risk of every changed capability.
    pub risk_level: RiskLevel,
    /// Capabilities that would be switched on, dependencies first.
    pub enable_order: Vec<CapabilityId>,
    /// Capabilities that would be switched off, dependents first.
    pub disable_order: Vec<CapabilityId>,
    /// Conflicts detected in the projected state.
    pub conflicts: Vec<Conflict>,
    pub blast_radius: ImpactSummary,
    /// Non-empty exactly when `feasible` is false.
    pub blockers: Vec<Blocker>,
    /// Non-blocking conflicts and actions that would change nothing.
    pub warnings: Vec<String>,
}

impl SimulationResult {
    /// Ordered steps: every disable, then every enable.
    pub fn steps(&self) -> Vec<CapabilityAction> {
        self.disable_order
            .iter()
            .cloned()
            .map(CapabilityAction::disable)
            .chain(self.enable_order.iter().cloned().map(CapabilityAction::enable))
            .collect()
    }

    /// Number of steps a plan built from this result would run.
    pub fn step_count(&self) -> usize {
        self.disable_order.len() + self.enable_order.len()
    }
}

/// Registry enablement before and after a hypothetical change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateComparison {
    pub before: EnablementState,
    pub after: EnablementState,
    /// Only the capabilities whose enablement differs.
    pub delta: Vec<StateChange>,
}

/// Rollout simulator
pub struct RolloutSimulator {
    registry: Arc<CapabilityRegistry>,
}

impl RolloutSimulator {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self { registry }
    }

    /// Simulate one action against the live registry state.
    #[instrument(skip(self, action), fields(action = %action))]
    pub fn simulate(&self, action: CapabilityAction) -> SimulationResult {
        Self::simulate_snapshot(&self.registry.snapshot(), std::slice::from_ref(&action))
    }

    /// Simulate several simultaneous actions.
    #[instrument(skip(self, actions), fields(actions = actions.len()))]
    pub fn simulate_batch(&self, actions: &[CapabilityAction]) -> Result<SimulationResult> {
        if actions.is_empty() {
            return Err(SimulationError::NoActions);
        }
        Ok(Self::simulate_snapshot(&self.registry.snapshot(), actions))
    }

    /// Enablement before and after the actions, without applying them.
    pub fn compare_states(&self, actions: &[CapabilityAction]) -> Result<StateComparison> {
        if actions.is_empty() {
            return Err(SimulationError::NoActions);
        }

        let snapshot = self.registry.snapshot();
        let resolver = DependencyResolver::from_snapshot(&snapshot);
        let before = snapshot.enablement();
        let projection = Projection::compute(&resolver, &before, actions);
        let delta = before.diff(&projection.after);

        Ok(StateComparison {
            before,
            after: projection.after,
            delta,
        })
    }

    /// Simulate against an explicit snapshot.
    pub fn simulate_snapshot(
        snapshot: &RegistrySnapshot,
        actions: &[CapabilityAction],
    ) -> SimulationResult {
        let resolver = DependencyResolver::from_snapshot(snapshot);
        let detector = ConflictDetector::from_snapshot(snapshot);
        let current = snapshot.enablement();

        let mut blockers = Vec::new();
        let mut warnings = Vec::new();

        // 1. The whole graph must be valid before anything may change
        let validation = resolver.validate_dependencies();
        for missing in &validation.missing_dependencies {
            blockers.push(
                Blocker::new(
                    "missing_dependency",
                    format!("depends on unregistered capability {}", missing.missing),
                )
                .for_capability(missing.capability_id.clone()),
            );
        }
        for cycle in &validation.circular_dependencies {
            let error = ResolverError::CircularDependency {
                cycle: cycle.clone(),
            };
            blockers.push(Blocker::new("circular_dependency", error.to_string()));
        }

        // 2. Orders and projected end state
        let projection = Projection::compute(&resolver, &current, actions);
        if validation.valid {
            blockers.extend(projection.errors.iter().map(resolver_blocker));
        }

        // 3. Conflicts against the projected state only
        let conflicts = detector.detect_conflicts(actions, &projection.after);
        for conflict in &conflicts {
            if conflict.is_blocking() {
                blockers.push(
                    Blocker::new(conflict.kind.as_str(), conflict.reason.clone())
                        .for_capability(conflict.capability_id.clone()),
                );
            } else {
                warnings.push(conflict.reason.clone());
            }
        }

        for action in actions {
            if current.get(&action.capability_id) == Some(action.action.target_state()) {
                warnings.push(format!(
                    "{} is already {}",
                    action.capability_id,
                    if action.action.target_state() { "enabled" } else { "disabled" }
                ));
            }
        }

        // 4. Impact and risk
        let blast_radius = impact(&resolver, actions);
        let changed_risk = projection
            .enable_order
            .iter()
            .chain(projection.disable_order.iter())
            .chain(actions.iter().map(|a| &a.capability_id))
            .filter_map(|id| resolver.graph().index_of(id))
            .map(|i| resolver.graph().node(i).risk_level)
            .max()
            .unwrap_or_default();
        let risk_level = blast_radius.risk_level.max(changed_risk);

        let feasible = blockers.is_empty();

        let result = SimulationResult {
            id: simulation_id(snapshot, actions),
            actions: actions.to_vec(),
            feasible,
            risk_level,
            enable_order: projection.enable_order,
            disable_order: projection.disable_order,
            conflicts,
            blast_radius,
            blockers,
            warnings,
        };

        debug!(
            simulation_id = %result.id,
            feasible = result.feasible,
            risk = %result.risk_level,
            steps = result.step_count(),
            blockers = result.blockers.len(),
            "Simulation complete"
        );

        result
    }
}

/// Projected end state of a change and the capabilities that actually flip.
struct Projection {
    after: EnablementState,
    enable_order: Vec<CapabilityId>,
    disable_order: Vec<CapabilityId>,
    errors: Vec<ResolverError>,
}

impl Projection {
    /// Disables apply first, then enables, matching plan step order.
    fn compute(
        resolver: &DependencyResolver,
        current: &EnablementState,
        actions: &[CapabilityAction],
    ) -> Self {
        let targets = |kind: ActionKind| -> Vec<CapabilityId> {
            actions
                .iter()
                .filter(|a| a.action == kind)
                .map(|a| a.capability_id.clone())
                .filter(|id| resolver.graph().index_of(id).is_some())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        };
        let enable_targets = targets(ActionKind::Enable);
        let disable_targets = targets(ActionKind::Disable);

        let mut errors = Vec::new();
        let mut ordered = |result: std::result::Result<Vec<CapabilityId>, ResolverError>| {
            result.unwrap_or_else(|e| {
                errors.push(e);
                Vec::new()
            })
        };
        let full_disable = ordered(resolver.disable_order_for(&disable_targets));
        let full_enable = ordered(resolver.enable_order_for(&enable_targets));

        let mut after = current.clone();
        for id in &full_disable {
            after.set(id.clone(), false);
        }
        for id in &full_enable {
            after.set(id.clone(), true);
        }

        let disable_order = full_disable
            .into_iter()
            .filter(|id| current.is_enabled(id) && !after.is_enabled(id))
            .collect();
        let enable_order = full_enable
            .into_iter()
            .filter(|id| !current.is_enabled(id) && after.is_enabled(id))
            .collect();

        Self {
            after,
            enable_order,
            disable_order,
            errors,
        }
    }
}

fn resolver_blocker(error: &ResolverError) -> Blocker {
    match error {
        ResolverError::UnknownCapability(id) => {
            Blocker::new("unknown_capability", error.to_string()).for_capability(id.clone())
        }
        ResolverError::CircularDependency { .. } => {
            Blocker::new("circular_dependency", error.to_string())
        }
        ResolverError::MissingDependency { capability_id, .. } => {
            Blocker::new("missing_dependency", error.to_string())
                .for_capability(capability_id.clone())
        }
    }
}

/// Union of the targets' blast radii, excluding the targets themselves.
fn impact(resolver: &DependencyResolver, actions: &[CapabilityAction]) -> ImpactSummary {
    let targets: BTreeSet<&CapabilityId> = actions.iter().map(|a| &a.capability_id).collect();
    let radii: Vec<_> = targets
        .iter()
        .filter_map(|id| resolver.calculate_blast_radius(id).ok())
        .collect();

    let mut seen: BTreeSet<&CapabilityId> = targets.clone();
    let mut direct_impact = Vec::new();
    for id in radii.iter().flat_map(|r| r.direct_impact.iter()) {
        if seen.insert(id) {
            direct_impact.push(id.clone());
        }
    }
    let mut transitive_impact = Vec::new();
    for id in radii.iter().flat_map(|r| r.transitive_impact.iter()) {
        if seen.insert(id) {
            transitive_impact.push(id.clone());
        }
    }

    let total_affected = direct_impact.len() + transitive_impact.len();
    let inherited = radii.iter().map(|r| r.risk_level).max().unwrap_or_default();

    ImpactSummary {
        direct_impact,
        transitive_impact,
        total_affected,
        risk_level: golive_resolver::blast_risk(total_affected, inherited),
    }
}

/// BLAKE3 digest over length-prefixed canonical fields.
fn simulation_id(snapshot: &RegistrySnapshot, actions: &[CapabilityAction]) -> SimulationId {
    fn field(hasher: &mut blake3::Hasher, value: &str) {
        hasher.update(&(value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
    }

    let mut hasher = blake3::Hasher::new();
    hasher.update(&(snapshot.capabilities.len() as u64).to_le_bytes());
    for capability in &snapshot.capabilities {
        field(&mut hasher, capability.id.as_str());
        field(&mut hasher, &capability.name);
        field(&mut hasher, capability.domain.as_str());
        field(&mut hasher, capability.risk_level.as_str());
        for set in [&capability.depends_on, &capability.conflicts_with] {
            hasher.update(&(set.len() as u64).to_le_bytes());
            for id in set {
                field(&mut hasher, id.as_str());
            }
        }
        hasher.update(&[capability.enabled as u8]);
    }

    hasher.update(&(actions.len() as u64).to_le_bytes());
    for action in actions {
        field(&mut hasher, action.capability_id.as_str());
        hasher.update(&[action.action.target_state() as u8]);
    }

    SimulationId::new(hasher.finalize().to_hex().to_string())
}
