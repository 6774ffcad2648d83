//! Dependency resolver
//!
//! Validates the capability graph and computes safe transition orders.
//! Every query reads an immutable [`DependencyGraph`] built from a registry
//! snapshot, so the resolver never blocks on or mutates the registry.

use std::collections::BTreeSet;

use golive_registry::RegistrySnapshot;
use golive_types::{Capability, CapabilityId, RiskLevel};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ResolverError, Result};
use crate::graph::{DependencyGraph, MissingDependency};

/// Outcome of [`DependencyResolver::validate_dependencies`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyValidation {
    /// True when there are no missing dependencies and no cycles.
    pub valid: bool,
    /// Declared dependencies that are not registered.
    pub missing_dependencies: Vec<MissingDependency>,
    /// Each cycle as a closed path, e.g. `[a, b, a]`.
    pub circular_dependencies: Vec<Vec<CapabilityId>>,
}

/// An enabled capability whose hard dependency is not enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidStateIssue {
    /// The enabled dependent.
    pub capability_id: CapabilityId,
    /// The dependency that is disabled or unregistered.
    pub dependency_id: CapabilityId,
    /// Human-readable description of the issue.
    pub reason: String,
}

/// Outcome of [`DependencyResolver::detect_invalid_states`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidStateReport {
    /// Same as `!issues.is_empty()`.
    pub has_invalid_states: bool,
    pub issues: Vec<InvalidStateIssue>,
}

/// Capabilities affected by changing one capability's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlastRadius {
    /// The capability whose state changes.
    pub capability_id: CapabilityId,
    /// Capabilities that directly depend on `capability_id`.
    pub direct_impact: Vec<CapabilityId>,
    /// Capabilities reached only through other dependents.
    pub transitive_impact: Vec<CapabilityId>,
    /// `direct_impact.len() + transitive_impact.len()`.
    pub total_affected: usize,
    /// See [`blast_risk`].
    pub risk_level: RiskLevel,
}

impl BlastRadius {
    /// Every affected capability, direct first.
    pub fn affected(&self) -> impl Iterator<Item = &CapabilityId> {
        self.direct_impact.iter().chain(self.transitive_impact.iter())
    }
}

/// Risk of a blast radius.
///
/// Size tier (0-2 low, 3-5 medium, 6-10 high, more critical) raised to the
/// highest risk level among affected capabilities. Monotonic in both inputs.
pub fn blast_risk(total_affected: usize, inherited: RiskLevel) -> RiskLevel {
    let by_size = match total_affected {
        0..=2 => RiskLevel::Low,
        3..=5 => RiskLevel::Medium,
        6..=10 => RiskLevel::High,
        _ => RiskLevel::Critical,
    };
    by_size.max(inherited)
}

/// Dependency resolver over one view of the capability graph.
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    graph: DependencyGraph,
}

impl DependencyResolver {
    /// Resolver over an explicit set of capabilities.
    pub fn new(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            graph: DependencyGraph::build(capabilities),
        }
    }

    /// Resolver over a registry snapshot.
    pub fn from_snapshot(snapshot: &RegistrySnapshot) -> Self {
        Self::new(snapshot.capabilities.iter().cloned())
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Check every `depends_on` target exists and the relation is acyclic.
    #[instrument(skip(self))]
    pub fn validate_dependencies(&self) -> DependencyValidation {
        let missing_dependencies = self.graph.missing_dependencies().to_vec();
        let circular_dependencies = self.graph.find_cycles();
        let valid = missing_dependencies.is_empty() && circular_dependencies.is_empty();

        debug!(
            valid,
            missing = missing_dependencies.len(),
            cycles = circular_dependencies.len(),
            "Dependency graph validated"
        );

        DependencyValidation {
            valid,
            missing_dependencies,
            circular_dependencies,
        }
    }

    /// Enabled capabilities whose dependencies are disabled or unregistered.
    pub fn detect_invalid_states(&self) -> InvalidStateReport {
        let mut issues = Vec::new();

        for capability in self.graph.nodes().iter().filter(|c| c.enabled) {
            for dependency in &capability.depends_on {
                let reason = match self.graph.index_of(dependency) {
                    None => "dependency is not registered",
                    Some(d) if !self.graph.node(d).enabled => "dependency is disabled",
                    Some(_) => continue,
                };
                issues.push(InvalidStateIssue {
                    capability_id: capability.id.clone(),
                    dependency_id: dependency.clone(),
                    reason: reason.to_string(),
                });
            }
        }

        InvalidStateReport {
            has_invalid_states: !issues.is_empty(),
            issues,
        }
    }

    /// Disabled capabilities whose every dependency is registered and enabled.
    pub fn get_safe_to_enable(&self) -> Vec<CapabilityId> {
        self.graph
            .nodes()
            .iter()
            .filter(|c| !c.enabled)
            .filter(|c| {
                c.depends_on.iter().all(|dep| {
                    self.graph
                        .index_of(dep)
                        .is_some_and(|d| self.graph.node(d).enabled)
                })
            })
            .map(|c| c.id.clone())
            .collect()
    }

    /// Direct and transitive dependents of `id`, with their risk.
    pub fn calculate_blast_radius(&self, id: &CapabilityId) -> Result<BlastRadius> {
        let index = self.index(id)?;

        let mut direct_impact = Vec::new();
        let mut transitive_impact = Vec::new();
        let mut inherited = RiskLevel::Low;

        for (node, distance) in self.graph.dependents_by_distance(index) {
            inherited = inherited.max(self.graph.node(node).risk_level);
            let id = self.graph.id(node).clone();
            if distance == 1 {
                direct_impact.push(id);
            } else {
                transitive_impact.push(id);
            }
        }

        let total_affected = direct_impact.len() + transitive_impact.len();
        Ok(BlastRadius {
            capability_id: id.clone(),
            direct_impact,
            transitive_impact,
            total_affected,
            risk_level: blast_risk(total_affected, inherited),
        })
    }

    /// `id` and its full dependency closure, dependencies first.
    pub fn get_enable_order(&self, id: &CapabilityId) -> Result<Vec<CapabilityId>> {
        self.enable_order_for(std::slice::from_ref(id))
    }

    /// `id` and everything that transitively depends on it, dependents first.
    pub fn get_disable_order(&self, id: &CapabilityId) -> Result<Vec<CapabilityId>> {
        self.disable_order_for(std::slice::from_ref(id))
    }

    /// Combined enable order for several capabilities.
    ///
    /// The result is one topological order of the union of closures, so it
    /// respects each capability's individual order.
    pub fn enable_order_for(&self, ids: &[CapabilityId]) -> Result<Vec<CapabilityId>> {
        let mut nodes = BTreeSet::new();
        for id in ids {
            nodes.extend(self.graph.dependency_closure(self.index(id)?));
        }

        if let Some(missing) = self
            .graph
            .missing_dependencies()
            .iter()
            .find(|m| self.graph.index_of(&m.capability_id).is_some_and(|i| nodes.contains(&i)))
        {
            return Err(ResolverError::MissingDependency {
                capability_id: missing.capability_id.clone(),
                missing: missing.missing.clone(),
            });
        }

        let order = self.order(&nodes)?;
        Ok(self.graph.ids(order))
    }

    /// Combined disable order for several capabilities.
    pub fn disable_order_for(&self, ids: &[CapabilityId]) -> Result<Vec<CapabilityId>> {
        let mut nodes = BTreeSet::new();
        for id in ids {
            nodes.extend(self.graph.dependent_closure(self.index(id)?));
        }

        let mut order = self.order(&nodes)?;
        order.reverse();
        Ok(self.graph.ids(order))
    }

    fn order(&self, nodes: &BTreeSet<usize>) -> Result<Vec<usize>> {
        self.graph.topological_order(nodes).map_err(|stuck| {
            let stuck: BTreeSet<CapabilityId> = self.graph.ids(stuck).into_iter().collect();
            let cycle = self
                .graph
                .find_cycles()
                .into_iter()
                .find(|cycle| cycle.iter().any(|id| stuck.contains(id)))
                .unwrap_or_else(|| stuck.into_iter().collect());
            ResolverError::CircularDependency { cycle }
        })
    }

    fn index(&self, id: &CapabilityId) -> Result<usize> {
        self.graph
            .index_of(id)
            .ok_or_else(|| ResolverError::UnknownCapability(id.clone()))
    }
}
