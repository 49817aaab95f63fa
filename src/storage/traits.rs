//! Storage trait definitions

use crate::model::{Photo, PhotoId};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Photo not found: {0}")]
    PhotoNotFound(PhotoId),

    #[error("Photo has no id and cannot be saved")]
    MissingId,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Lightweight view of a stored photo, used for duplicate reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoSummary {
    pub id: PhotoId,
    pub storage_folder: PathBuf,
    pub relative_path: PathBuf,
}

/// Whether a configured enricher is switched on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnricherSetting {
    pub name: String,
    pub is_active: bool,
}

/// Trait for photo storage backends
///
/// Implementations must be thread-safe (Send + Sync); batch runs and stop
/// conditions may query the store from several tasks at once.
pub trait PhotoStore: Send + Sync {
    // === Photo Operations ===

    /// Load a photo with every derived collection
    fn load_photo(&self, id: PhotoId) -> StorageResult<Option<Photo>>;

    /// Insert or update photos atomically: either all are written or none
    fn save_photos(&self, photos: &[Photo]) -> StorageResult<()>;

    /// Photos whose image hash equals `hash`, optionally excluding one id
    fn find_by_image_hash(&self, hash: &str, exclude: Option<PhotoId>) -> StorageResult<Vec<PhotoSummary>>;

    /// All stored photo ids in ascending order
    fn list_photo_ids(&self) -> StorageResult<Vec<PhotoId>>;

    // === Enricher Settings ===

    /// Configured enrichers and whether each one is active
    fn enricher_settings(&self) -> StorageResult<Vec<EnricherSetting>>;

    /// Switch an enricher on or off, creating the row if needed
    fn set_enricher_active(&self, name: &str, is_active: bool) -> StorageResult<()>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: PhotoStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
