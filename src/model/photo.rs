//! Photo: the subject enrichers mutate

use super::capability::{Capability, CapabilitySet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(i64);

impl PhotoId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for PhotoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PhotoId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A file backing a photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoFile {
    pub name: String,
}

/// A tag attached by the tag enricher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagAssignment {
    pub name: String,
    pub confidence: f64,
}

/// A category attached by the category enricher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAssignment {
    pub name: String,
    pub confidence: f64,
}

/// A detected face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    /// Bounding box as (left, top, width, height) in preview pixels
    pub bounds: (u32, u32, u32, u32),
    pub person_id: Option<i64>,
    pub confidence: f64,
}

/// A detected object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectProperty {
    pub label: String,
    pub confidence: f64,
}

/// Geographic location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A photo record and every fact derived from it.
///
/// `applied` records which capabilities previous runs have produced. The
/// pipeline unions a step's capability into it after the step succeeds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Photo {
    pub id: Option<PhotoId>,
    pub name: String,
    /// Root folder of the storage the photo lives in
    pub storage_folder: PathBuf,
    /// Path relative to the storage root
    pub relative_path: PathBuf,
    pub files: Vec<PhotoFile>,
    pub applied: CapabilitySet,

    // Metadata
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub orientation: Option<u8>,
    pub taken_date: Option<DateTime<Utc>>,
    pub location: Option<GeoPoint>,
    pub image_hash: Option<String>,

    // Derived collections
    pub captions: Vec<String>,
    pub tags: Vec<TagAssignment>,
    pub categories: Vec<CategoryAssignment>,
    pub faces: Vec<FaceRecord>,
    pub object_properties: Vec<ObjectProperty>,

    // Adult content
    pub is_adult_content: bool,
    pub adult_score: f64,
    pub is_racy_content: bool,
    pub racy_score: f64,

    // Color
    pub accent_color: Option<String>,
    pub dominant_color_background: Option<String>,
    pub dominant_color_foreground: Option<String>,
    pub dominant_colors: Option<String>,
    pub is_bw: bool,
}

impl Photo {
    /// Create an unsaved photo located at `storage_folder/relative_path`.
    pub fn new(name: impl Into<String>, storage_folder: impl Into<PathBuf>, relative_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            storage_folder: storage_folder.into(),
            relative_path: relative_path.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<PhotoId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_file(mut self, name: impl Into<String>) -> Self {
        self.files.push(PhotoFile { name: name.into() });
        self
    }

    pub fn with_applied(mut self, applied: CapabilitySet) -> Self {
        self.applied = applied;
        self
    }

    /// Absolute path of the first backing file, if the photo has one.
    pub fn absolute_path(&self) -> Option<PathBuf> {
        let file = self.files.first()?;
        Some(self.storage_folder.join(&self.relative_path).join(&file.name))
    }

    /// Reset the derived state each capability in `capabilities` populates
    /// and remove those capabilities from the applied record.
    ///
    /// Lists are emptied and scalars reset so a re-run does not accumulate
    /// duplicates or keep stale values.
    pub fn clear_derived(&mut self, capabilities: CapabilitySet) {
        for capability in capabilities.iter() {
            match capability {
                Capability::Caption => self.captions.clear(),
                Capability::Tag => self.tags.clear(),
                Capability::Category => self.categories.clear(),
                Capability::Face => self.faces.clear(),
                Capability::ObjectProperty => self.object_properties.clear(),
                Capability::Metadata => {
                    self.width = None;
                    self.height = None;
                    self.orientation = None;
                    self.taken_date = None;
                    self.location = None;
                    self.image_hash = None;
                }
                Capability::Adult => {
                    self.is_adult_content = false;
                    self.adult_score = 0.0;
                    self.is_racy_content = false;
                    self.racy_score = 0.0;
                }
                Capability::Color => {
                    self.accent_color = None;
                    self.dominant_color_background = None;
                    self.dominant_color_foreground = None;
                    self.dominant_colors = None;
                    self.is_bw = false;
                }
                // Artifacts only; nothing persisted on the photo itself.
                Capability::Thumbnail
                | Capability::Preview
                | Capability::Analyze
                | Capability::Duplicate
                | Capability::Nsfw => {}
            }
        }
        self.applied = self.applied.difference(capabilities);
    }
}
