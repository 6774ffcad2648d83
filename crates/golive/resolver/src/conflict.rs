//! Conflict detection over a projected enablement state
//!
//! The detector holds capability definitions only. Enablement comes solely
//! from the caller-supplied projected state, never from the live registry.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use golive_registry::RegistrySnapshot;
use golive_types::{ActionKind, Capability, CapabilityAction, CapabilityId, EnablementState};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::DependencyGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Two capabilities that exclude each other would both be enabled.
    MutuallyExclusive,
    /// An enabled capability would depend on a disabled one.
    DependencyDisabled,
    /// The same capability is both enabled and disabled in one batch, or one
    /// action's closure undoes another action.
    ContradictoryActions,
    /// An action names a capability that is not registered.
    UnknownCapability,
    /// A live exclusion between capabilities the change does not touch.
    PreexistingExclusion,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::MutuallyExclusive => "mutually_exclusive",
            ConflictKind::DependencyDisabled => "dependency_disabled",
            ConflictKind::ContradictoryActions => "contradictory_actions",
            ConflictKind::UnknownCapability => "unknown_capability",
            ConflictKind::PreexistingExclusion => "preexisting_exclusion",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Warning,
    Blocking,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub capability_id: CapabilityId,
    pub conflicting_id: Option<CapabilityId>,
    pub kind: ConflictKind,
    pub severity: ConflictSeverity,
    pub reason: String,
}

impl Conflict {
    pub fn is_blocking(&self) -> bool {
        self.severity == ConflictSeverity::Blocking
    }
}

/// Whether any conflict prevents the change.
pub fn has_blocking_conflicts(conflicts: &[Conflict]) -> bool {
    conflicts.iter().any(Conflict::is_blocking)
}

/// Conflict detector
pub struct ConflictDetector {
    graph: DependencyGraph,
}

impl ConflictDetector {
    pub fn new(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            graph: DependencyGraph::build(capabilities),
        }
    }

    pub fn from_snapshot(snapshot: &RegistrySnapshot) -> Self {
        Self::new(snapshot.capabilities.iter().cloned())
    }

    /// Check `projected` (the state after applying `actions`) for conflicts.
    ///
    /// Problems involving a capability the actions touch are blocking. The
    /// same problems between untouched capabilities are reported as warnings,
    /// since the change neither causes nor fixes them. Output is sorted.
    pub fn detect_conflicts(
        &self,
        actions: &[CapabilityAction],
        projected: &EnablementState,
    ) -> Vec<Conflict> {
        let mut conflicts = Vec::new();

        let mut requested: BTreeMap<&CapabilityId, BTreeSet<ActionKind>> = BTreeMap::new();
        for action in actions {
            requested
                .entry(&action.capability_id)
                .or_default()
                .insert(action.action);
        }

        for (&id, kinds) in &requested {
            if self.graph.index_of(id).is_none() {
                conflicts.push(Conflict {
                    capability_id: id.clone(),
                    conflicting_id: None,
                    kind: ConflictKind::UnknownCapability,
                    severity: ConflictSeverity::Blocking,
                    reason: format!("{id} is not a registered capability"),
                });
            }

            // Both directions requested, or another action overrides this one
            let reason = if kinds.len() > 1 {
                Some(format!("{id} is both enabled and disabled in the same change"))
            } else {
                kinds
                    .iter()
                    .find(|kind| projected.get(id).is_some_and(|on| on != kind.target_state()))
                    .map(|kind| format!("{kind} {id} is undone by another action in the same change"))
            };
            if let Some(reason) = reason {
                conflicts.push(Conflict {
                    capability_id: id.clone(),
                    conflicting_id: None,
                    kind: ConflictKind::ContradictoryActions,
                    severity: ConflictSeverity::Blocking,
                    reason,
                });
            }
        }

        let touched = self.touched(actions);
        let is_touched = |id: &CapabilityId| touched.contains(id);

        self.check_exclusions(projected, &is_touched, &mut conflicts);
        self.check_dependencies(projected, &is_touched, &mut conflicts);

        conflicts.sort_by(|a, b| {
            (a.kind, &a.capability_id, &a.conflicting_id).cmp(&(b.kind, &b.capability_id, &b.conflicting_id))
        });

        debug!(
            actions = actions.len(),
            conflicts = conflicts.len(),
            blocking = has_blocking_conflicts(&conflicts),
            "Conflicts detected"
        );

        conflicts
    }

    /// Action targets plus the capabilities they drag along.
    fn touched(&self, actions: &[CapabilityAction]) -> BTreeSet<CapabilityId> {
        let mut touched = BTreeSet::new();

        for action in actions {
            touched.insert(action.capability_id.clone());
            let Some(index) = self.graph.index_of(&action.capability_id) else {
                continue;
            };
            let closure = match action.action {
                ActionKind::Enable => self.graph.dependency_closure(index),
                ActionKind::Disable => self.graph.dependent_closure(index),
            };
            touched.extend(self.graph.ids(closure));
        }

        touched
    }

    fn check_exclusions(
        &self,
        projected: &EnablementState,
        is_touched: &dyn Fn(&CapabilityId) -> bool,
        conflicts: &mut Vec<Conflict>,
    ) {
        let mut seen: BTreeSet<(CapabilityId, CapabilityId)> = BTreeSet::new();

        for capability in self.graph.nodes() {
            if !projected.is_enabled(&capability.id) {
                continue;
            }
            // Exclusion declared on either side counts
            let excluded = self
                .graph
                .nodes()
                .iter()
                .filter(|other| other.id != capability.id)
                .filter(|other| capability.excludes(&other.id) || other.excludes(&capability.id));

            for other in excluded {
                if !projected.is_enabled(&other.id) {
                    continue;
                }
                let pair = if capability.id < other.id {
                    (capability.id.clone(), other.id.clone())
                } else {
                    (other.id.clone(), capability.id.clone())
                };
                if !seen.insert(pair.clone()) {
                    continue;
                }

                let (first, second) = if is_touched(&pair.0) || !is_touched(&pair.1) {
                    pair
                } else {
                    (pair.1, pair.0)
                };

                let conflict = if is_touched(&first) {
                    Conflict {
                        reason: format!("{first} cannot be enabled together with {second}"),
                        capability_id: first,
                        conflicting_id: Some(second),
                        kind: ConflictKind::MutuallyExclusive,
                        severity: ConflictSeverity::Blocking,
                    }
                } else {
                    Conflict {
                        reason: format!("{first} and {second} are already enabled together"),
                        capability_id: first,
                        conflicting_id: Some(second),
                        kind: ConflictKind::PreexistingExclusion,
                        severity: ConflictSeverity::Warning,
                    }
                };
                conflicts.push(conflict);
            }
        }
    }

    fn check_dependencies(
        &self,
        projected: &EnablementState,
        is_touched: &dyn Fn(&CapabilityId) -> bool,
        conflicts: &mut Vec<Conflict>,
    ) {
        for capability in self.graph.nodes() {
            if !projected.is_enabled(&capability.id) {
                continue;
            }
            for dependency in &capability.depends_on {
                if projected.is_enabled(dependency) {
                    continue;
                }
                let severity = if is_touched(&capability.id) || is_touched(dependency) {
                    ConflictSeverity::Blocking
                } else {
                    ConflictSeverity::Warning
                };
                conflicts.push(Conflict {
                    capability_id: capability.id.clone(),
                    conflicting_id: Some(dependency.clone()),
                    kind: ConflictKind::DependencyDisabled,
                    severity,
                    reason: format!("{} requires {dependency}, which would be disabled", capability.id),
                });
            }
        }
    }
}
