//! Shared helpers for lumen integration tests
//!
//! Stub enrichers that behave like the real ones closely enough to exercise
//! ordering, stop conditions and re-enrichment without touching image files.

#![allow(dead_code)]

pub mod enrichers;

pub use enrichers::{
    catalog, CategoryEnricher, FaceEnricher, MetadataEnricher, PreviewEnricher, RecordingEnricher,
    TagEnricher,
};

use lumen::{Capability, Photo};

/// A stored photo with one file, metadata and faces already applied.
pub fn stored_photo(id: i64, name: &str) -> Photo {
    let mut photo = Photo::new(name, "/library", "2024").with_id(id).with_file(name);
    photo.width = Some(4000);
    photo.image_hash = Some(format!("stored-{id}"));
    photo.faces.push(lumen::model::FaceRecord {
        bounds: (10, 10, 50, 50),
        person_id: Some(3),
        confidence: 0.7,
    });
    photo.applied = [Capability::Metadata, Capability::Face].into_iter().collect();
    photo
}
