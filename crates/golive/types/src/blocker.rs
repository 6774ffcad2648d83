//! Machine-readable reasons a change cannot proceed

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::CapabilityId;

/// One reason a simulation, plan or execution is blocked.
///
/// `code` is stable and meant for programmatic handling; `detail` is for
/// operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blocker {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_id: Option<CapabilityId>,
    pub detail: String,
}

impl Blocker {
    pub fn new(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            capability_id: None,
            detail: detail.into(),
        }
    }

    pub fn for_capability(mut self, id: impl Into<CapabilityId>) -> Self {
        self.capability_id = Some(id.into());
        self
    }
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.capability_id {
            Some(id) => write!(f, "[{}] {}: {}", self.code, id, self.detail),
            None => write!(f, "[{}] {}", self.code, self.detail),
        }
    }
}
