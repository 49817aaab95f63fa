//! Re-enrichment against an in-memory store

mod common;

use common::{catalog, stored_photo};
use lumen::{
    ActiveCapabilityProvider, CancellationToken, Capability, CapabilitySet, DependencyRef,
    DescriptorSet, DiffCalculator, DuplicatePhotoStopCondition, EnricherDescriptor, EnricherId,
    EnrichmentPipeline, InMemoryPhotoStore, PhotoId, PhotoStore, PipelineOptions,
    ReEnrichmentOrchestrator, StaticActiveCapabilities, StopCondition, StoredActiveCapabilities,
};
use std::sync::Arc;

fn ids(names: &[&str]) -> Vec<EnricherId> {
    names.iter().map(|n| EnricherId::from(*n)).collect()
}

fn orchestrator(
    store: &Arc<InMemoryPhotoStore>,
    active: Arc<dyn ActiveCapabilityProvider>,
) -> ReEnrichmentOrchestrator {
    let pipeline = EnrichmentPipeline::new(
        catalog(),
        vec![Arc::new(DuplicatePhotoStopCondition::new(store.clone())) as Arc<dyn StopCondition>],
        PipelineOptions::default(),
    )
    .unwrap();
    ReEnrichmentOrchestrator::new(store.clone(), Arc::new(pipeline), active)
}

#[test]
fn test_preview_metadata_face_scenario() {
    let descriptors = DescriptorSet::new(vec![
        EnricherDescriptor::new("preview", Capability::Preview).as_data_provider(),
        EnricherDescriptor::new("metadata", Capability::Metadata).with_dependency(DependencyRef::id("preview")),
        EnricherDescriptor::new("face", Capability::Face)
            .with_dependency(DependencyRef::id("preview"))
            .with_dependency(DependencyRef::id("metadata")),
    ])
    .unwrap();
    let diff = DiffCalculator::new(&descriptors);
    let photo = stored_photo(1, "a.jpg")
        .with_applied([Capability::Metadata, Capability::Preview].into_iter().collect());

    let missing = diff.calculate_missing(&photo, &ids(&["face"])).unwrap();
    assert_eq!(missing, ids(&["preview", "face"]));

    let expanded = diff.expand_with_dependencies(&missing).unwrap();
    assert_eq!(expanded, ids(&["preview", "metadata", "face"]));
}

#[tokio::test]
async fn test_batch_failure_does_not_touch_other_photos() {
    let store = Arc::new(
        InMemoryPhotoStore::with_photos(vec![
            stored_photo(1, "one.jpg"),
            stored_photo(2, "broken.jpg"),
            stored_photo(3, "three.jpg"),
        ])
        .unwrap(),
    );
    let orchestrator = orchestrator(&store, Arc::new(StaticActiveCapabilities::default()));
    let photo_ids = [PhotoId::new(1), PhotoId::new(2), PhotoId::new(3)];

    let succeeded = orchestrator
        .reenrich_photos(&photo_ids, Capability::Tag.into(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(succeeded, 2);
    assert_eq!(store.load_photo(PhotoId::new(2)).unwrap().unwrap(), stored_photo(2, "broken.jpg"));
    for id in [PhotoId::new(1), PhotoId::new(3)] {
        let photo = store.load_photo(id).unwrap().unwrap();
        assert_eq!(photo.tags.len(), 1);
        assert!(photo.applied.contains(Capability::Tag));
        assert_eq!(photo.faces[0].person_id, Some(3));
    }
}

#[tokio::test]
async fn test_missing_enrichers_from_stored_settings() {
    let store = Arc::new(InMemoryPhotoStore::with_photos(vec![stored_photo(1, "one.jpg")]).unwrap());
    for name in ["metadata", "face", "tag", "category"] {
        store.set_enricher_active(name, true).unwrap();
    }
    store.set_enricher_active("adult", false).unwrap();
    let active = Arc::new(StoredActiveCapabilities::new(store.clone()));
    let orchestrator = orchestrator(&store, active);

    let ok = orchestrator
        .reenrich_missing(PhotoId::new(1), &CancellationToken::new())
        .await
        .unwrap();

    assert!(ok);
    let photo = store.load_photo(PhotoId::new(1)).unwrap().unwrap();
    let expected: CapabilitySet = [
        Capability::Metadata,
        Capability::Face,
        Capability::Preview,
        Capability::Tag,
        Capability::Category,
    ]
    .into_iter()
    .collect();
    assert_eq!(photo.applied, expected);
    // Applied enrichers kept their data
    assert_eq!(photo.width, Some(4000));
    assert_eq!(photo.faces.len(), 1);
    assert_eq!(photo.faces[0].person_id, Some(3));
    assert_eq!(photo.categories.len(), 1);

    let again = orchestrator
        .reenrich_missing_batch(&[PhotoId::new(1)], &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(again, 0);
}

#[tokio::test]
async fn test_duplicate_stop_discards_forced_rerun() {
    let mut original = stored_photo(1, "beach.jpg");
    original.image_hash = Some("hash-beach".into());
    let copy = stored_photo(2, "beach~copy.jpg");
    let store = Arc::new(InMemoryPhotoStore::with_photos(vec![original, copy.clone()]).unwrap());
    let orchestrator = orchestrator(&store, Arc::new(StaticActiveCapabilities::default()));

    let ok = orchestrator
        .reenrich_photo(PhotoId::new(2), Capability::Face.into(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(!ok);
    assert_eq!(store.load_photo(PhotoId::new(2)).unwrap().unwrap(), copy);
    assert!(orchestrator.session().tracked_ids().is_empty());
}

#[tokio::test]
async fn test_cancelled_batch_stops_before_first_photo() {
    let store = Arc::new(InMemoryPhotoStore::with_photos(vec![stored_photo(1, "one.jpg")]).unwrap());
    let orchestrator = orchestrator(&store, Arc::new(StaticActiveCapabilities::default()));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orchestrator
        .reenrich_photos(&[PhotoId::new(1)], Capability::Tag.into(), &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(store.load_photo(PhotoId::new(1)).unwrap().unwrap(), stored_photo(1, "one.jpg"));
}
