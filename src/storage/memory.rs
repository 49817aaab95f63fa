//! In-memory photo store backed by DashMap

use super::traits::{EnricherSetting, PhotoStore, PhotoSummary, StorageError, StorageResult};
use crate::model::{Photo, PhotoId};
use dashmap::DashMap;

/// A concurrent in-memory store, useful for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryPhotoStore {
    photos: DashMap<PhotoId, Photo>,
    /// Keyed by lowercase name
    enrichers: DashMap<String, EnricherSetting>,
}

impl InMemoryPhotoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `photos`.
    pub fn with_photos(photos: impl IntoIterator<Item = Photo>) -> StorageResult<Self> {
        let store = Self::new();
        let photos: Vec<Photo> = photos.into_iter().collect();
        store.save_photos(&photos)?;
        Ok(store)
    }

    /// Number of stored photos
    pub fn photo_count(&self) -> usize {
        self.photos.len()
    }
}

impl PhotoStore for InMemoryPhotoStore {
    fn load_photo(&self, id: PhotoId) -> StorageResult<Option<Photo>> {
        Ok(self.photos.get(&id).map(|r| r.clone()))
    }

    fn save_photos(&self, photos: &[Photo]) -> StorageResult<()> {
        // Validate first so a bad entry leaves the store untouched.
        if photos.iter().any(|p| p.id.is_none()) {
            return Err(StorageError::MissingId);
        }
        for photo in photos {
            if let Some(id) = photo.id {
                self.photos.insert(id, photo.clone());
            }
        }
        Ok(())
    }

    fn find_by_image_hash(&self, hash: &str, exclude: Option<PhotoId>) -> StorageResult<Vec<PhotoSummary>> {
        let mut matches: Vec<PhotoSummary> = self
            .photos
            .iter()
            .filter(|r| Some(*r.key()) != exclude)
            .filter(|r| r.image_hash.as_deref() == Some(hash))
            .map(|r| PhotoSummary {
                id: *r.key(),
                storage_folder: r.storage_folder.clone(),
                relative_path: r.relative_path.clone(),
            })
            .collect();
        matches.sort_by_key(|s| s.id);
        Ok(matches)
    }

    fn list_photo_ids(&self) -> StorageResult<Vec<PhotoId>> {
        let mut ids: Vec<PhotoId> = self.photos.iter().map(|r| *r.key()).collect();
        ids.sort();
        Ok(ids)
    }

    fn enricher_settings(&self) -> StorageResult<Vec<EnricherSetting>> {
        let mut settings: Vec<EnricherSetting> = self.enrichers.iter().map(|r| r.value().clone()).collect();
        settings.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(settings)
    }

    fn set_enricher_active(&self, name: &str, is_active: bool) -> StorageResult<()> {
        self.enrichers
            .entry(name.to_lowercase())
            .and_modify(|s| s.is_active = is_active)
            .or_insert_with(|| EnricherSetting {
                name: name.to_string(),
                is_active,
            });
        Ok(())
    }
}
