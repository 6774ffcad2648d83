//! Capability definitions
//!
//! A capability is a toggleable unit of system behavior with declared
//! hard dependencies and mutual exclusions.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::ids::CapabilityId;

/// Functional area a capability belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Content authoring and modelling
    Content,
    /// Publishing and delivery workflows
    Publishing,
    /// Media library and asset processing
    Media,
    /// Search and indexing
    Search,
    /// Translation and locale management
    Localization,
    /// Users, roles and authentication
    Identity,
    /// Webhooks and third-party connectors
    Integration,
    /// Reporting and analytics
    Analytics,
    /// Cross-cutting platform services
    Platform,
}

impl Domain {
    pub const ALL: [Domain; 9] = [
        Domain::Content,
        Domain::Publishing,
        Domain::Media,
        Domain::Search,
        Domain::Localization,
        Domain::Identity,
        Domain::Integration,
        Domain::Analytics,
        Domain::Platform,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Content => "content",
            Domain::Publishing => "publishing",
            Domain::Media => "media",
            Domain::Search => "search",
            Domain::Localization => "localization",
            Domain::Identity => "identity",
            Domain::Integration => "integration",
            Domain::Analytics => "analytics",
            Domain::Platform => "platform",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .iter()
            .copied()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| TypeError::UnknownDomain(s.to_string()))
    }
}

/// Risk classification of a capability or a change
///
/// Variants are ordered so that `max()` yields the riskier level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(TypeError::UnknownRiskLevel(other.to_string())),
        }
    }
}

/// A registered capability and its live enablement flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub id: CapabilityId,
    pub name: String,
    pub domain: Domain,
    #[serde(default)]
    pub risk_level: RiskLevel,
    /// Hard dependencies: every entry must be enabled while this one is.
    #[serde(default)]
    pub depends_on: BTreeSet<CapabilityId>,
    /// Capabilities that must never be enabled together with this one.
    #[serde(default)]
    pub conflicts_with: BTreeSet<CapabilityId>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Capability {
    /// Create a disabled, low-risk capability without relations.
    pub fn new(id: impl Into<CapabilityId>, name: impl Into<String>, domain: Domain) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            domain,
            risk_level: RiskLevel::Low,
            depends_on: BTreeSet::new(),
            conflicts_with: BTreeSet::new(),
            enabled: false,
            description: None,
        }
    }

    pub fn with_risk(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    pub fn depends_on<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<CapabilityId>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn conflicts_with<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<CapabilityId>,
    {
        self.conflicts_with.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether `other` is declared as mutually exclusive by this capability.
    pub fn excludes(&self, other: &CapabilityId) -> bool {
        self.conflicts_with.contains(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::High < RiskLevel::Critical);
        assert_eq!(RiskLevel::Medium.max(RiskLevel::High), RiskLevel::High);
    }

    #[test]
    fn test_domain_from_str() {
        assert_eq!("Search".parse::<Domain>().unwrap(), Domain::Search);
        assert!("payments".parse::<Domain>().is_err());
    }

    #[test]
    fn test_builder() {
        let cap = Capability::new("publishing.scheduled", "Scheduled publishing", Domain::Publishing)
            .with_risk(RiskLevel::High)
            .depends_on(["content.drafts"])
            .conflicts_with(["publishing.instant-only"]);

        assert_eq!(cap.risk_level, RiskLevel::High);
        assert!(cap.depends_on.contains(&CapabilityId::from("content.drafts")));
        assert!(cap.excludes(&CapabilityId::from("publishing.instant-only")));
        assert!(!cap.enabled);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let cap: Capability = serde_json::from_str(
            r#"{"id":"search.index","name":"Search index","domain":"search"}"#,
        )
        .unwrap();
        assert_eq!(cap.risk_level, RiskLevel::Low);
        assert!(cap.depends_on.is_empty());
        assert!(!cap.enabled);
    }
}
