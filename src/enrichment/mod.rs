//! Enrichment orchestration
//!
//! Ordering, execution, stop conditions and re-enrichment planning for the
//! enrichers registered in an [`EnricherCatalog`](crate::enricher::EnricherCatalog).

mod active;
mod cancel;
mod context;
mod diff;
mod duplicate;
mod error;
pub mod graph;
mod pipeline;
mod reenrich;
mod scope;
mod stop;

pub use active::{ActiveCapabilityProvider, StaticActiveCapabilities, StoredActiveCapabilities};
pub use cancel::CancellationToken;
pub use context::RunContext;
pub use diff::DiffCalculator;
pub use duplicate::DuplicatePhotoStopCondition;
pub use error::{EnrichmentError, EnrichmentResult};
pub use pipeline::{
    BatchOutcome, EnrichmentPipeline, PipelineOptions, RunOutcome, RunResult, StepFailure,
    StepTiming,
};
pub use reenrich::ReEnrichmentOrchestrator;
pub use scope::{EmptyScopeFactory, ResourceScope, ScopeFactory};
pub use stop::{FnStopCondition, StopCondition};
