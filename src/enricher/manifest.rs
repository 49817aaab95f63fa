//! Descriptor-only enricher manifests
//!
//! A manifest lists enrichers by id, capability and dependency names so
//! orders and re-enrichment plans can be computed without loading the
//! enrichers themselves.
//!
//! ```yaml
//! - id: metadata
//!   capability: metadata
//! - id: preview
//!   capability: preview
//!   data_provider: true
//! - id: face
//!   capability: face
//!   depends_on: [preview, metadata]
//! ```

use super::{DependencyRef, DescriptorSet, EnricherDescriptor};
use crate::config::ConfigError;
use crate::enrichment::EnrichmentResult;
use crate::model::Capability;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One enricher as declared in a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub capability: Capability,
    #[serde(default)]
    pub data_provider: bool,
    /// Dependency names, matched case-insensitively
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl From<&ManifestEntry> for EnricherDescriptor {
    fn from(entry: &ManifestEntry) -> Self {
        Self {
            id: entry.id.as_str().into(),
            capability: entry.capability,
            data_provider: entry.data_provider,
            dependencies: entry
                .depends_on
                .iter()
                .map(|name| DependencyRef::name(name.as_str()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnricherManifest {
    pub entries: Vec<ManifestEntry>,
}

impl EnricherManifest {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Build and validate the descriptor set this manifest declares.
    pub fn descriptor_set(&self) -> EnrichmentResult<DescriptorSet> {
        DescriptorSet::new(self.entries.iter().map(EnricherDescriptor::from))
    }
}
