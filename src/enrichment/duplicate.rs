//! Stop a run when the photo's image hash is already stored

use super::cancel::CancellationToken;
use super::context::RunContext;
use super::stop::StopCondition;
use crate::enricher::{DependencyRef, EnricherError};
use crate::storage::{PhotoSession, PhotoStore, PhotoSummary};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Checked after the preview enricher, which computes the image hash.
///
/// When the run's scope carries a [`PhotoSession`] the lookup goes through
/// it, so photos tracked but not yet saved count as well.
pub struct DuplicatePhotoStopCondition {
    store: Arc<dyn PhotoStore>,
}

impl DuplicatePhotoStopCondition {
    pub const ID: &'static str = "duplicate-photo";

    pub fn new(store: Arc<dyn PhotoStore>) -> Self {
        Self { store }
    }
}

fn summarize(matches: &[PhotoSummary]) -> String {
    matches
        .iter()
        .map(|m| {
            format!(
                "{} ({}/{})",
                m.id,
                m.storage_folder.display(),
                m.relative_path.display()
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl StopCondition for DuplicatePhotoStopCondition {
    fn id(&self) -> &str {
        Self::ID
    }

    fn applies_after(&self) -> Vec<DependencyRef> {
        vec![DependencyRef::name("preview")]
    }

    async fn stop_reason(
        &self,
        ctx: &RunContext<'_>,
        _cancel: &CancellationToken,
    ) -> Result<Option<String>, EnricherError> {
        let photo = ctx.photo();
        let hash = match photo.image_hash.as_deref().map(str::trim) {
            Some(hash) if !hash.is_empty() => hash,
            _ => {
                debug!(photo_id = ?photo.id, "skip duplicate check: image hash is missing");
                return Ok(None);
            }
        };

        let matches = match ctx.scope().get::<PhotoSession>() {
            Some(session) => session.find_by_image_hash(hash, photo.id)?,
            None => self.store.find_by_image_hash(hash, photo.id)?,
        };
        if matches.is_empty() {
            return Ok(None);
        }

        Ok(Some(format!(
            "Duplicate photo detected. Existing matches: {}",
            summarize(&matches)
        )))
    }
}
