//! Engine-level errors

use crate::enricher::{EnricherError, EnricherId};
use crate::model::{Capability, UnknownCapability};
use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur while planning or running enrichment
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("no enrichers are registered")]
    EmptyCatalog,

    #[error("unknown enricher: {0}")]
    UnknownEnricher(EnricherId),

    #[error("enricher {enricher} declares unknown dependency by name: '{name}'")]
    UnknownDependencyName { enricher: EnricherId, name: String },

    #[error("enricher {enricher} depends on {dependency}, which is not in the requested set")]
    UnregisteredDependency {
        enricher: EnricherId,
        dependency: EnricherId,
    },

    #[error("enricher {0} cannot depend on itself")]
    SelfDependency(EnricherId),

    #[error("dependency cycle detected among enrichers: {}", join_path(.path))]
    Cycle { path: Vec<EnricherId> },

    #[error("dependency cycle detected around {0}")]
    CycleAround(EnricherId),

    #[error(transparent)]
    UnknownCapability(#[from] UnknownCapability),

    #[error("no registered enricher produces capability {0}")]
    UnregisteredCapability(Capability),

    #[error("enricher {enricher} failed: {source}")]
    Step {
        enricher: EnricherId,
        source: EnricherError,
    },

    #[error("stop condition {condition} failed: {source}")]
    StopCondition {
        condition: String,
        source: EnricherError,
    },

    #[error("enrichment cancelled")]
    Cancelled,

    #[error("enrichment run panicked: {0}")]
    Panicked(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EnrichmentError {
    /// True when the run ended because cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

fn join_path(path: &[EnricherId]) -> String {
    path.iter()
        .map(EnricherId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Result type for enrichment operations
pub type EnrichmentResult<T> = Result<T, EnrichmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_path() {
        let err = EnrichmentError::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle detected among enrichers: a -> b -> a");
    }

    #[test]
    fn step_error_keeps_source() {
        let err = EnrichmentError::Step {
            enricher: "face".into(),
            source: EnricherError::Failed("model unavailable".into()),
        };
        assert_eq!(err.to_string(), "enricher face failed: enricher error: model unavailable");
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_cancelled());
        assert!(EnrichmentError::Cancelled.is_cancelled());
    }
}
