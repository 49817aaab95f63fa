//! Lumen: Enrichment Orchestration Engine
//!
//! Attaches derived facts (metadata, faces, tags, categories, NSFW scores)
//! to photos through pluggable enrichers, and decides in what order, how
//! often and under which failure conditions those enrichers run.
//!
//! # Core Concepts
//!
//! - **Enrichers**: units of work that each produce one [`Capability`]
//! - **Catalog**: the de-duplicated set of enrichers plus their cached descriptors
//! - **Pipeline**: dependency-ordered, sequential execution against one photo,
//!   with stop conditions and bounded-parallel batches
//! - **Re-enrichment**: diffing what a photo already has against what is
//!   wanted, then re-running the dependency-closed remainder
//!
//! # Example
//!
//! ```
//! use lumen::{Capability, CapabilitySet};
//!
//! let mut applied = CapabilitySet::empty();
//! applied.insert(Capability::Metadata);
//! assert!(applied.contains(Capability::Metadata));
//! ```

pub mod config;
pub mod enricher;
pub mod enrichment;
pub mod model;
pub mod storage;

pub use config::{ConfigError, LumenConfig};
pub use enricher::{
    DependencyRef, DescriptorSet, EnricherCatalog, EnricherDescriptor, EnricherError,
    EnricherId, EnricherManifest, Enricher, StepContext,
};
pub use enrichment::{
    ActiveCapabilityProvider, BatchOutcome, CancellationToken, DiffCalculator,
    DuplicatePhotoStopCondition, EmptyScopeFactory, EnrichmentError, EnrichmentPipeline, EnrichmentResult,
    FnStopCondition, PipelineOptions, ReEnrichmentOrchestrator, ResourceScope, RunContext,
    RunOutcome, RunResult, ScopeFactory, StaticActiveCapabilities, StepFailure, StepTiming,
    StopCondition, StoredActiveCapabilities,
};
pub use model::{Capability, CapabilitySet, Photo, PhotoFile, PhotoId, SourceData};
pub use storage::{
    EnricherSetting, InMemoryPhotoStore, PhotoSession, PhotoStore, PhotoSummary,
    SqlitePhotoStore, StorageError, StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
