//! Capability discovery from configuration sources
//!
//! Discovery only reads sources; registering the result is a separate step.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use golive_types::{Capability, CapabilityId};
use serde::Deserialize;
use tracing::debug;

use crate::error::{RegistryError, Result};

/// A configuration source that yields capability definitions.
pub trait CapabilitySource: Send + Sync {
    /// Source name for logging and error reporting.
    fn name(&self) -> &str;

    /// Load capability definitions. Must not have side effects.
    fn load(&self) -> Result<Vec<Capability>>;
}

/// Capabilities defined in code.
pub struct StaticSource {
    name: String,
    capabilities: Vec<Capability>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, capabilities: Vec<Capability>) -> Self {
        Self {
            name: name.into(),
            capabilities,
        }
    }
}

impl CapabilitySource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Vec<Capability>> {
        Ok(self.capabilities.clone())
    }
}

/// TOML manifest layout: a list of `[[capability]]` tables.
#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default, rename = "capability")]
    capabilities: Vec<Capability>,
}

enum ManifestOrigin {
    Inline(String),
    File(PathBuf),
}

/// Capabilities read from a TOML manifest.
///
/// ```toml
/// [[capability]]
/// id = "publishing.scheduled"
/// name = "Scheduled publishing"
/// domain = "publishing"
/// risk_level = "high"
/// depends_on = ["content.drafts"]
/// ```
pub struct ManifestSource {
    name: String,
    origin: ManifestOrigin,
}

impl ManifestSource {
    /// Manifest held in memory.
    pub fn inline(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: ManifestOrigin::Inline(contents.into()),
        }
    }

    /// Manifest read from disk on every `load`.
    pub fn file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: path.display().to_string(),
            origin: ManifestOrigin::File(path),
        }
    }

    fn parse(contents: &str) -> Result<Vec<Capability>> {
        let manifest: Manifest = toml::from_str(contents)?;
        Ok(manifest.capabilities)
    }
}

impl CapabilitySource for ManifestSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Vec<Capability>> {
        match &self.origin {
            ManifestOrigin::Inline(contents) => Self::parse(contents),
            ManifestOrigin::File(path) => {
                let contents = std::fs::read_to_string(path)?;
                Self::parse(&contents)
            }
        }
    }
}

/// Read every source in order and merge the definitions.
///
/// A capability defined by several sources takes the definition of the last
/// one. The result is sorted by id.
pub fn discover(sources: &[&dyn CapabilitySource]) -> Result<Vec<Capability>> {
    let mut merged: BTreeMap<CapabilityId, Capability> = BTreeMap::new();

    for source in sources {
        let capabilities = source.load().map_err(|e| RegistryError::Source {
            source_name: source.name().to_string(),
            reason: e.to_string(),
        })?;

        debug!(source = source.name(), count = capabilities.len(), "Loaded capability source");

        for capability in capabilities {
            validate(&capability)?;
            merged.insert(capability.id.clone(), capability);
        }
    }

    Ok(merged.into_values().collect())
}

fn validate(capability: &Capability) -> Result<()> {
    if capability.id.as_str().trim().is_empty() {
        return Err(RegistryError::InvalidCapability {
            id: capability.id.clone(),
            reason: "id must not be empty".into(),
        });
    }
    if capability.depends_on.contains(&capability.id) {
        return Err(RegistryError::InvalidCapability {
            id: capability.id.clone(),
            reason: "capability depends on itself".into(),
        });
    }
    if capability.conflicts_with.contains(&capability.id) {
        return Err(RegistryError::InvalidCapability {
            id: capability.id.clone(),
            reason: "capability conflicts with itself".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use golive_types::{Domain, RiskLevel};

    const MANIFEST: &str = r#"
[[capability]]
id = "content.drafts"
name = "Drafts"
domain = "content"
enabled = true

[[capability]]
id = "publishing.scheduled"
name = "Scheduled publishing"
domain = "publishing"
risk_level = "high"
depends_on = ["content.drafts"]
conflicts_with = ["publishing.instant-only"]
"#;

    #[test]
    fn test_manifest_parse() {
        let source = ManifestSource::inline("inline", MANIFEST);
        let caps = source.load().unwrap();
        assert_eq!(caps.len(), 2);
        assert!(caps[0].enabled);
        assert_eq!(caps[1].risk_level, RiskLevel::High);
        assert!(caps[1]
            .depends_on
            .contains(&CapabilityId::from("content.drafts")));
    }

    #[test]
    fn test_last_source_wins() {
        let first = StaticSource::new(
            "first",
            vec![Capability::new("search.index", "Index v1", Domain::Search)],
        );
        let second = StaticSource::new(
            "second",
            vec![Capability::new("search.index", "Index v2", Domain::Search)
                .with_risk(RiskLevel::Medium)],
        );

        let caps = discover(&[&first, &second]).unwrap();
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].name, "Index v2");
        assert_eq!(caps[0].risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_invalid_manifest_names_source() {
        let broken = ManifestSource::inline("broken", "[[capability]]\nid = 3");
        let err = discover(&[&broken]).unwrap_err();
        match err {
            RegistryError::Source { source_name, .. } => assert_eq!(source_name, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency_rejected() {
        let source = StaticSource::new(
            "static",
            vec![Capability::new("a", "A", Domain::Platform).depends_on(["a"])],
        );
        assert!(matches!(
            discover(&[&source]),
            Err(RegistryError::InvalidCapability { .. })
        ));
    }

    #[test]
    fn test_missing_manifest_file() {
        let source = ManifestSource::file("/nonexistent/capabilities.toml");
        assert!(discover(&[&source]).is_err());
    }
}
