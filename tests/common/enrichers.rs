//! Stub enrichers

use async_trait::async_trait;
use lumen::model::{CategoryAssignment, FaceRecord, TagAssignment};
use lumen::{
    Capability, DependencyRef, Enricher, EnricherCatalog, EnricherError, Photo, SourceData,
    StepContext,
};
use std::sync::{Arc, Mutex};

/// Renders the preview other steps read and hashes the picture.
///
/// Copies of one picture share a file stem prefix ("beach", "beach~copy")
/// and therefore a hash.
pub struct PreviewEnricher;

#[async_trait]
impl Enricher for PreviewEnricher {
    fn id(&self) -> &str {
        "preview"
    }

    fn capability(&self) -> Capability {
        Capability::Preview
    }

    fn is_data_provider(&self) -> bool {
        true
    }

    async fn enrich(&self, photo: &mut Photo, source: &mut SourceData, _ctx: &StepContext<'_>) -> Result<(), EnricherError> {
        let name = source
            .absolute_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = name.split('~').next().unwrap_or_default();
        photo.image_hash = Some(format!("hash-{stem}"));
        source.preview_image = Some(vec![0xff, 0xd8, 0xff]);
        Ok(())
    }
}

/// Reads dimensions from the preview.
pub struct MetadataEnricher;

#[async_trait]
impl Enricher for MetadataEnricher {
    fn id(&self) -> &str {
        "metadata"
    }

    fn capability(&self) -> Capability {
        Capability::Metadata
    }

    fn dependencies(&self) -> Vec<DependencyRef> {
        vec![DependencyRef::name("Preview")]
    }

    async fn enrich(&self, photo: &mut Photo, source: &mut SourceData, _ctx: &StepContext<'_>) -> Result<(), EnricherError> {
        if source.preview_image.is_none() {
            return Err(EnricherError::MissingArtifact("preview image".into()));
        }
        photo.width = Some(1024);
        photo.height = Some(768);
        Ok(())
    }
}

pub struct FaceEnricher;

#[async_trait]
impl Enricher for FaceEnricher {
    fn id(&self) -> &str {
        "face"
    }

    fn capability(&self) -> Capability {
        Capability::Face
    }

    fn dependencies(&self) -> Vec<DependencyRef> {
        vec![DependencyRef::id("preview"), DependencyRef::id("metadata")]
    }

    async fn enrich(&self, photo: &mut Photo, source: &mut SourceData, _ctx: &StepContext<'_>) -> Result<(), EnricherError> {
        if source.preview_image.is_none() {
            return Err(EnricherError::MissingArtifact("preview image".into()));
        }
        photo.faces.push(FaceRecord {
            bounds: (0, 0, 32, 32),
            person_id: None,
            confidence: 0.95,
        });
        Ok(())
    }
}

/// Fails for photos whose name starts with "broken".
pub struct TagEnricher;

#[async_trait]
impl Enricher for TagEnricher {
    fn id(&self) -> &str {
        "tag"
    }

    fn capability(&self) -> Capability {
        Capability::Tag
    }

    fn dependencies(&self) -> Vec<DependencyRef> {
        vec![DependencyRef::id("preview")]
    }

    async fn enrich(&self, photo: &mut Photo, _source: &mut SourceData, _ctx: &StepContext<'_>) -> Result<(), EnricherError> {
        if photo.name.starts_with("broken") {
            return Err(EnricherError::Failed(format!("cannot tag {}", photo.name)));
        }
        photo.tags.push(TagAssignment {
            name: "beach".into(),
            confidence: 0.9,
        });
        Ok(())
    }
}

pub struct CategoryEnricher;

#[async_trait]
impl Enricher for CategoryEnricher {
    fn id(&self) -> &str {
        "category"
    }

    fn capability(&self) -> Capability {
        Capability::Category
    }

    fn dependencies(&self) -> Vec<DependencyRef> {
        vec![DependencyRef::name("tag")]
    }

    async fn enrich(&self, photo: &mut Photo, _source: &mut SourceData, _ctx: &StepContext<'_>) -> Result<(), EnricherError> {
        photo.categories.push(CategoryAssignment {
            name: "outdoor".into(),
            confidence: 0.8,
        });
        Ok(())
    }
}

/// Appends its id to a shared log when it runs.
pub struct RecordingEnricher {
    id: String,
    capability: Capability,
    dependencies: Vec<DependencyRef>,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingEnricher {
    pub fn new(id: &str, capability: Capability, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            id: id.to_string(),
            capability,
            dependencies: Vec::new(),
            log: Arc::clone(log),
        }
    }

    pub fn after(mut self, dependency: &str) -> Self {
        self.dependencies.push(DependencyRef::id(dependency));
        self
    }
}

#[async_trait]
impl Enricher for RecordingEnricher {
    fn id(&self) -> &str {
        &self.id
    }

    fn capability(&self) -> Capability {
        self.capability
    }

    fn dependencies(&self) -> Vec<DependencyRef> {
        self.dependencies.clone()
    }

    async fn enrich(&self, _photo: &mut Photo, _source: &mut SourceData, _ctx: &StepContext<'_>) -> Result<(), EnricherError> {
        self.log.lock().unwrap().push(self.id.clone());
        Ok(())
    }
}

/// Catalog of the stub enrichers, registered in scrambled order.
pub fn catalog() -> Arc<EnricherCatalog> {
    let catalog = EnricherCatalog::new(vec![
        Arc::new(CategoryEnricher) as Arc<dyn Enricher>,
        Arc::new(FaceEnricher),
        Arc::new(TagEnricher),
        Arc::new(PreviewEnricher),
        Arc::new(MetadataEnricher),
    ])
    .expect("stub catalog is valid");
    Arc::new(catalog)
}
