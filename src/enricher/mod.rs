//! The enricher contract
//!
//! An enricher attaches one kind of derived fact (its [`Capability`]) to a
//! photo. It declares which other enrichers must run before it, and whether
//! it only provides transient data for downstream steps.

mod descriptor;
mod manifest;

pub use descriptor::{DescriptorSet, EnricherCatalog, EnricherDescriptor};
pub use manifest::{EnricherManifest, ManifestEntry};

use crate::enrichment::{CancellationToken, ResourceScope};
use crate::model::{Capability, Photo, SourceData};
use crate::storage::StorageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable identity of an enricher (e.g. `"preview"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnricherId(String);

impl EnricherId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EnricherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EnricherId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EnricherId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A declared dependency on another enricher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DependencyRef {
    /// Exact identity match
    ById(EnricherId),
    /// Resolved case-insensitively against enricher ids
    ByName(String),
}

impl DependencyRef {
    pub fn id(id: impl Into<EnricherId>) -> Self {
        Self::ById(id.into())
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::ByName(name.into())
    }
}

impl fmt::Display for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ById(id) => write!(f, "{id}"),
            Self::ByName(name) => write!(f, "'{name}'"),
        }
    }
}

/// Errors an enricher reports from a single step
#[derive(Debug, Error)]
pub enum EnricherError {
    #[error("missing artifact: {0}")]
    MissingArtifact(String),
    #[error("enricher cancelled")]
    Cancelled,
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("enricher error: {0}")]
    Failed(String),
}

/// What a step can see of the run besides the photo and its source data.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub scope: &'a ResourceScope,
    pub cancel: &'a CancellationToken,
}

impl<'a> StepContext<'a> {
    pub fn new(scope: &'a ResourceScope, cancel: &'a CancellationToken) -> Self {
        Self { scope, cancel }
    }

    /// Fail with [`EnricherError::Cancelled`] if cancellation was requested.
    pub fn check_cancelled(&self) -> Result<(), EnricherError> {
        if self.cancel.is_cancelled() {
            Err(EnricherError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// The contract enrichers implement.
///
/// `dependencies()` and `is_data_provider()` are read once, when the
/// enricher joins a catalog. An enricher whose dependencies depend on its
/// configuration computes them from that configuration at that point.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Unique identifier for this enricher
    fn id(&self) -> &str;

    /// The fact kind this enricher produces
    fn capability(&self) -> Capability;

    /// Enrichers that must complete before this one
    fn dependencies(&self) -> Vec<DependencyRef> {
        Vec::new()
    }

    /// Data providers produce transient artifacts only and are re-run
    /// whenever a dependent needs them, even if already applied.
    fn is_data_provider(&self) -> bool {
        false
    }

    /// Mutate `photo` and `source` in place.
    async fn enrich(
        &self,
        photo: &mut Photo,
        source: &mut SourceData,
        ctx: &StepContext<'_>,
    ) -> Result<(), EnricherError>;
}
