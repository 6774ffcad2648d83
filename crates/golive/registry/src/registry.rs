//! In-memory capability registry
//!
//! The registry owns capability definitions and their live enablement flags.
//! Definitions are upserted at startup; enablement flags change only through
//! the plan executor via [`CapabilityRegistry::set_enabled`] and
//! [`CapabilityRegistry::restore_enablement`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use golive_types::{Capability, CapabilityId, Domain, EnablementState, StateChange};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::discovery::{discover, CapabilitySource};
use crate::error::{RegistryError, Result};

/// Capabilities of one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainGroup {
    pub domain: Domain,
    pub capabilities: Vec<Capability>,
}

/// Point-in-time deep copy of the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub timestamp: DateTime<Utc>,
    pub capabilities: Vec<Capability>,
}

impl RegistrySnapshot {
    /// Enablement flags captured by this snapshot.
    pub fn enablement(&self) -> EnablementState {
        self.capabilities
            .iter()
            .map(|c| (c.id.clone(), c.enabled))
            .collect()
    }
}

/// Outcome of a [`CapabilityRegistry::register`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSummary {
    pub inserted: usize,
    pub updated: usize,
}

/// Capability registry
///
/// One instance is constructed per process (or per test) and shared by
/// handle with every component.
pub struct CapabilityRegistry {
    capabilities: RwLock<BTreeMap<CapabilityId, Capability>>,
    sources: Vec<Arc<dyn CapabilitySource>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: RwLock::new(BTreeMap::new()),
            sources: Vec::new(),
        }
    }

    /// Create a registry that discovers from the given sources.
    pub fn with_sources(sources: Vec<Arc<dyn CapabilitySource>>) -> Self {
        Self {
            capabilities: RwLock::new(BTreeMap::new()),
            sources,
        }
    }

    /// Read the configured sources. Does not touch the store.
    pub fn discover(&self) -> Result<Vec<Capability>> {
        let sources: Vec<&dyn CapabilitySource> = self.sources.iter().map(|s| s.as_ref()).collect();
        discover(&sources)
    }

    /// Upsert capabilities by id.
    ///
    /// An existing id gets the new definition but keeps its live `enabled`
    /// flag; a new id takes the flag from its definition.
    #[instrument(skip(self, capabilities))]
    pub fn register(&self, capabilities: impl IntoIterator<Item = Capability>) -> RegistrationSummary {
        let mut summary = RegistrationSummary::default();
        let mut store = self.capabilities.write();

        for mut capability in capabilities {
            match store.get(&capability.id) {
                Some(existing) => {
                    capability.enabled = existing.enabled;
                    summary.updated += 1;
                }
                None => summary.inserted += 1,
            }
            store.insert(capability.id.clone(), capability);
        }

        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            "Capabilities registered"
        );

        summary
    }

    /// Discover from the configured sources and register the result.
    pub fn load_from_sources(&self) -> Result<RegistrationSummary> {
        let discovered = self.discover()?;
        Ok(self.register(discovered))
    }

    pub fn get(&self, id: &CapabilityId) -> Option<Capability> {
        self.capabilities.read().get(id).cloned()
    }

    pub fn contains(&self, id: &CapabilityId) -> bool {
        self.capabilities.read().contains_key(id)
    }

    /// All capabilities, ordered by id.
    pub fn get_all(&self) -> Vec<Capability> {
        self.capabilities.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.read().is_empty()
    }

    /// Capabilities grouped by domain; empty domains are omitted.
    pub fn group_by_domain(&self) -> Vec<DomainGroup> {
        let mut groups: BTreeMap<Domain, Vec<Capability>> = BTreeMap::new();
        for capability in self.capabilities.read().values() {
            groups
                .entry(capability.domain)
                .or_default()
                .push(capability.clone());
        }

        groups
            .into_iter()
            .map(|(domain, capabilities)| DomainGroup {
                domain,
                capabilities,
            })
            .collect()
    }

    /// Deep copy of every definition and flag, taken under one read lock.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let store = self.capabilities.read();
        RegistrySnapshot {
            timestamp: Utc::now(),
            capabilities: store.values().cloned().collect(),
        }
    }

    /// Live enablement flags.
    pub fn enablement(&self) -> EnablementState {
        self.capabilities
            .read()
            .values()
            .map(|c| (c.id.clone(), c.enabled))
            .collect()
    }

    /// Set one capability's flag, returning the previous value.
    ///
    /// Reserved for the plan executor.
    pub fn set_enabled(&self, id: &CapabilityId, enabled: bool) -> Result<bool> {
        let mut store = self.capabilities.write();
        let capability = store
            .get_mut(id)
            .ok_or_else(|| RegistryError::CapabilityNotFound(id.clone()))?;

        let previous = capability.enabled;
        capability.enabled = enabled;
        debug!(capability_id = %id, previous, enabled, "Capability enablement changed");
        Ok(previous)
    }

    /// Restore flags from a captured state in one write.
    ///
    /// Ids in `state` that are no longer registered are skipped. Returns the
    /// changes actually made.
    pub fn restore_enablement(&self, state: &EnablementState) -> Vec<StateChange> {
        let mut store = self.capabilities.write();
        let mut changes = Vec::new();

        for (id, enabled) in state.iter() {
            if let Some(capability) = store.get_mut(id) {
                if capability.enabled != enabled {
                    changes.push(StateChange {
                        capability_id: id.clone(),
                        from: capability.enabled,
                        to: enabled,
                    });
                    capability.enabled = enabled;
                }
            }
        }

        if !changes.is_empty() {
            info!(changed = changes.len(), "Enablement state restored");
        }

        changes
    }

    /// Drop every capability. Test and reset use only.
    pub fn clear(&self) {
        self.capabilities.write().clear();
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::StaticSource;
    use golive_types::RiskLevel;

    fn registry_with(caps: Vec<Capability>) -> CapabilityRegistry {
        let registry = CapabilityRegistry::new();
        registry.register(caps);
        registry
    }

    #[test]
    fn test_register_and_get() {
        let registry = registry_with(vec![
            Capability::new("content.drafts", "Drafts", Domain::Content),
            Capability::new("search.index", "Index", Domain::Search),
        ]);

        assert_eq!(registry.len(), 2);
        assert!(registry.get(&"content.drafts".into()).is_some());
        assert!(registry.get(&"missing".into()).is_none());
    }

    #[test]
    fn test_reregister_keeps_enabled_flag() {
        let registry = registry_with(vec![Capability::new("a", "A", Domain::Platform)]);
        registry.set_enabled(&"a".into(), true).unwrap();

        let summary = registry.register(vec![Capability::new("a", "A v2", Domain::Platform)
            .with_risk(RiskLevel::High)
            .enabled(false)]);

        assert_eq!(summary, RegistrationSummary { inserted: 0, updated: 1 });
        let cap = registry.get(&"a".into()).unwrap();
        assert_eq!(cap.name, "A v2");
        assert_eq!(cap.risk_level, RiskLevel::High);
        assert!(cap.enabled);
    }

    #[test]
    fn test_register_is_idempotent() {
        let caps = vec![
            Capability::new("a", "A", Domain::Platform),
            Capability::new("b", "B", Domain::Platform).depends_on(["a"]),
        ];
        let registry = registry_with(caps.clone());
        let before = registry.get_all();
        registry.register(caps);
        assert_eq!(registry.get_all(), before);
    }

    #[test]
    fn test_group_by_domain() {
        let registry = registry_with(vec![
            Capability::new("search.index", "Index", Domain::Search),
            Capability::new("content.drafts", "Drafts", Domain::Content),
            Capability::new("content.versions", "Versions", Domain::Content),
        ]);

        let groups = registry.group_by_domain();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].domain, Domain::Content);
        assert_eq!(groups[0].capabilities.len(), 2);
        assert_eq!(groups[1].domain, Domain::Search);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = registry_with(vec![Capability::new("a", "A", Domain::Platform)]);
        let snapshot = registry.snapshot();

        registry.set_enabled(&"a".into(), true).unwrap();

        assert!(!snapshot.capabilities[0].enabled);
        assert!(registry.get(&"a".into()).unwrap().enabled);
    }

    #[test]
    fn test_set_enabled_unknown() {
        let registry = CapabilityRegistry::new();
        assert!(matches!(
            registry.set_enabled(&"ghost".into(), true),
            Err(RegistryError::CapabilityNotFound(_))
        ));
    }

    #[test]
    fn test_restore_enablement() {
        let registry = registry_with(vec![
            Capability::new("a", "A", Domain::Platform).enabled(true),
            Capability::new("b", "B", Domain::Platform),
        ]);
        let captured = registry.enablement();

        registry.set_enabled(&"a".into(), false).unwrap();
        registry.set_enabled(&"b".into(), true).unwrap();

        let changes = registry.restore_enablement(&captured);
        assert_eq!(changes.len(), 2);
        assert_eq!(registry.enablement(), captured);

        // Nothing left to change
        assert!(registry.restore_enablement(&captured).is_empty());
    }

    #[test]
    fn test_load_from_sources() {
        let source = Arc::new(StaticSource::new(
            "static",
            vec![Capability::new("a", "A", Domain::Platform)],
        ));
        let registry = CapabilityRegistry::with_sources(vec![source]);

        assert!(registry.is_empty());
        let discovered = registry.discover().unwrap();
        assert_eq!(discovered.len(), 1);
        assert!(registry.is_empty(), "discover must not register");

        registry.load_from_sources().unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clear() {
        let registry = registry_with(vec![Capability::new("a", "A", Domain::Platform)]);
        registry.clear();
        assert!(registry.is_empty());
    }
}
