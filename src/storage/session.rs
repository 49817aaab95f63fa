//! Tracked unit of work over a photo store

use super::traits::{PhotoStore, PhotoSummary, StorageError, StorageResult};
use crate::model::{Photo, PhotoId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A unit of work: photos are tracked in memory and written together.
///
/// Cloning yields another handle to the same tracked set, so a session can
/// be placed in a resource scope and reached by stop conditions while the
/// owner keeps its own handle.
#[derive(Clone)]
pub struct PhotoSession {
    store: Arc<dyn PhotoStore>,
    tracked: Arc<Mutex<BTreeMap<PhotoId, Photo>>>,
}

impl PhotoSession {
    pub fn new(store: Arc<dyn PhotoStore>) -> Self {
        Self {
            store,
            tracked: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    fn tracked(&self) -> MutexGuard<'_, BTreeMap<PhotoId, Photo>> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The backing store
    pub fn store(&self) -> &Arc<dyn PhotoStore> {
        &self.store
    }

    /// Load a photo, preferring the tracked copy. A freshly loaded photo
    /// becomes tracked.
    pub fn load(&self, id: PhotoId) -> StorageResult<Option<Photo>> {
        if let Some(photo) = self.tracked().get(&id) {
            return Ok(Some(photo.clone()));
        }
        let loaded = self.store.load_photo(id)?;
        if let Some(photo) = &loaded {
            self.tracked().insert(id, photo.clone());
        }
        Ok(loaded)
    }

    /// Track `photo`, replacing any earlier copy with the same id.
    pub fn track(&self, photo: Photo) -> StorageResult<()> {
        let id = photo.id.ok_or(StorageError::MissingId)?;
        self.tracked().insert(id, photo);
        Ok(())
    }

    /// Photos sharing `hash`, excluding `exclude`.
    ///
    /// Tracked copies override stored rows so pending edits are visible.
    pub fn find_by_image_hash(&self, hash: &str, exclude: Option<PhotoId>) -> StorageResult<Vec<PhotoSummary>> {
        let stored = self.store.find_by_image_hash(hash, exclude)?;
        let tracked = self.tracked();

        let mut matches: Vec<PhotoSummary> = stored
            .into_iter()
            .filter(|s| !tracked.contains_key(&s.id))
            .collect();
        matches.extend(
            tracked
                .iter()
                .filter(|(id, p)| Some(**id) != exclude && p.image_hash.as_deref() == Some(hash))
                .map(|(id, p)| PhotoSummary {
                    id: *id,
                    storage_folder: p.storage_folder.clone(),
                    relative_path: p.relative_path.clone(),
                }),
        );
        matches.sort_by_key(|s| s.id);
        Ok(matches)
    }

    /// Write every tracked photo in one atomic batch, then stop tracking them.
    ///
    /// On failure the tracked set is left intact so the caller can decide
    /// whether to retry or discard.
    pub fn save_changes(&self) -> StorageResult<usize> {
        let mut tracked = self.tracked();
        if tracked.is_empty() {
            return Ok(0);
        }
        let photos: Vec<Photo> = tracked.values().cloned().collect();
        self.store.save_photos(&photos)?;
        tracked.clear();
        Ok(photos.len())
    }

    /// Discard all tracked changes.
    pub fn clear(&self) {
        self.tracked().clear();
    }

    pub fn tracked_ids(&self) -> Vec<PhotoId> {
        self.tracked().keys().copied().collect()
    }
}

impl fmt::Debug for PhotoSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoSession")
            .field("tracked", &self.tracked_ids())
            .finish_non_exhaustive()
    }
}
