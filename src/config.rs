//! YAML configuration
//!
//! ```yaml
//! pipeline:
//!   continue_on_error: false
//!   log_timings: true
//!   max_parallelism: 4
//! active: [metadata, preview, face]
//! database: /var/lib/lumen/lumen.db
//! ```
//!
//! Every section is optional.

use crate::enrichment::PipelineOptions;
use crate::model::CapabilitySet;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LumenConfig {
    pub pipeline: PipelineOptions,
    /// Capability names to keep applied on every photo
    pub active: Vec<String>,
    pub database: Option<PathBuf>,
}

impl LumenConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document is an empty config, not an error.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.active_capabilities()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// The configured active capabilities. Unknown names are rejected.
    pub fn active_capabilities(&self) -> Result<CapabilitySet, ConfigError> {
        CapabilitySet::parse_names(&self.active).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Capability;

    #[test]
    fn test_full_document() {
        let config = LumenConfig::from_yaml_str(
            r#"
pipeline:
  continue_on_error: true
  log_timings: true
  max_parallelism: 4
active: [Metadata, face]
database: /tmp/lumen.db
"#,
        )
        .unwrap();

        assert!(config.pipeline.continue_on_error);
        assert!(config.pipeline.log_timings);
        assert_eq!(config.pipeline.max_parallelism, Some(4));
        assert_eq!(config.database, Some(PathBuf::from("/tmp/lumen.db")));

        let active = config.active_capabilities().unwrap();
        assert!(active.contains(Capability::Metadata));
        assert!(active.contains(Capability::Face));
        assert_eq!(active.len(), 2);
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config = LumenConfig::from_yaml_str("active: [tag]\n").unwrap();
        assert_eq!(config.pipeline, PipelineOptions::default());
        assert!(config.database.is_none());

        let empty = LumenConfig::from_yaml_str("").unwrap();
        assert!(empty.active.is_empty());
    }

    #[test]
    fn test_unknown_active_name_is_fatal() {
        let err = LumenConfig::from_yaml_str("active: [sparkle]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("sparkle")));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LumenConfig::from_path(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
