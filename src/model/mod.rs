//! Subject-side data: capabilities, photos and per-run source data

mod capability;
mod photo;
mod source;

pub use capability::{Capability, CapabilitySet, UnknownCapability};
pub use photo::{
    CategoryAssignment, FaceRecord, GeoPoint, ObjectProperty, Photo, PhotoFile, PhotoId,
    TagAssignment,
};
pub use source::SourceData;
