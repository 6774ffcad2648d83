//! Proposed capability state changes and enablement state maps

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::CapabilityId;

/// Direction of a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Enable,
    Disable,
}

impl ActionKind {
    /// Enablement flag this action leads to.
    pub fn target_state(&self) -> bool {
        matches!(self, ActionKind::Enable)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Enable => write!(f, "enable"),
            ActionKind::Disable => write!(f, "disable"),
        }
    }
}

/// A single proposed change: enable or disable one capability.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CapabilityAction {
    pub capability_id: CapabilityId,
    pub action: ActionKind,
}

impl CapabilityAction {
    pub fn enable(id: impl Into<CapabilityId>) -> Self {
        Self {
            capability_id: id.into(),
            action: ActionKind::Enable,
        }
    }

    pub fn disable(id: impl Into<CapabilityId>) -> Self {
        Self {
            capability_id: id.into(),
            action: ActionKind::Disable,
        }
    }
}

impl fmt::Display for CapabilityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.capability_id)
    }
}

/// One capability flipping from one enablement flag to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub capability_id: CapabilityId,
    pub from: bool,
    pub to: bool,
}

/// Enablement flag per capability, ordered by id.
///
/// Used for registry snapshots, projected (hypothetical) states and
/// checkpoint payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnablementState(BTreeMap<CapabilityId, bool>);

impl EnablementState {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Whether the capability is enabled; unknown ids read as disabled.
    pub fn is_enabled(&self, id: &CapabilityId) -> bool {
        self.0.get(id).copied().unwrap_or(false)
    }

    pub fn get(&self, id: &CapabilityId) -> Option<bool> {
        self.0.get(id).copied()
    }

    pub fn contains(&self, id: &CapabilityId) -> bool {
        self.0.contains_key(id)
    }

    pub fn set(&mut self, id: CapabilityId, enabled: bool) {
        self.0.insert(id, enabled);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CapabilityId, bool)> {
        self.0.iter().map(|(id, enabled)| (id, *enabled))
    }

    pub fn enabled_ids(&self) -> impl Iterator<Item = &CapabilityId> {
        self.0.iter().filter(|(_, on)| **on).map(|(id, _)| id)
    }

    /// Changes needed to go from `self` to `target`, ordered by id.
    pub fn diff(&self, target: &EnablementState) -> Vec<StateChange> {
        target
            .0
            .iter()
            .filter_map(|(id, &to)| {
                let from = self.is_enabled(id);
                (from != to).then(|| StateChange {
                    capability_id: id.clone(),
                    from,
                    to,
                })
            })
            .collect()
    }
}

impl FromIterator<(CapabilityId, bool)> for EnablementState {
    fn from_iter<T: IntoIterator<Item = (CapabilityId, bool)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
