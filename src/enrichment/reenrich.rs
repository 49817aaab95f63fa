//! Re-running enrichers on photos that were already processed
//!
//! Two modes: forced (re-run the enrichers producing the given
//! capabilities, plus their dependencies) and missing-only (run whatever
//! the active capabilities say is not yet applied). Either way the photo's
//! derived state for the re-run enrichers is cleared first, and after the
//! run every expected capability must be applied again or nothing is saved.

use super::active::ActiveCapabilityProvider;
use super::cancel::CancellationToken;
use super::diff::DiffCalculator;
use super::error::{EnrichmentError, EnrichmentResult};
use super::pipeline::EnrichmentPipeline;
use super::scope::ResourceScope;
use crate::enricher::EnricherId;
use crate::model::{CapabilitySet, Photo, PhotoId, SourceData};
use crate::storage::{PhotoSession, PhotoStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy)]
enum Plan {
    Forced(CapabilitySet),
    Missing,
}

/// What one photo's re-run will do
struct Work {
    photo: Photo,
    path: PathBuf,
    steps: Vec<EnricherId>,
    clear: CapabilitySet,
    expected: CapabilitySet,
}

/// Re-enriches stored photos through a pipeline and persists the result.
///
/// All operations share one [`PhotoSession`]; it is handed to the pipeline
/// in the run's scope so stop conditions see pending changes. Calls on one
/// orchestrator are meant to be sequential.
pub struct ReEnrichmentOrchestrator {
    session: PhotoSession,
    pipeline: Arc<EnrichmentPipeline>,
    active: Arc<dyn ActiveCapabilityProvider>,
}

impl ReEnrichmentOrchestrator {
    pub fn new(
        store: Arc<dyn PhotoStore>,
        pipeline: Arc<EnrichmentPipeline>,
        active: Arc<dyn ActiveCapabilityProvider>,
    ) -> Self {
        Self {
            session: PhotoSession::new(store),
            pipeline,
            active,
        }
    }

    pub fn session(&self) -> &PhotoSession {
        &self.session
    }

    /// Re-run the enrichers producing `targets`, and their dependencies,
    /// whether or not they were applied before.
    ///
    /// Returns `false` when there is nothing to do or when an expected
    /// capability is still missing after the run.
    pub async fn reenrich_photo(
        &self,
        id: PhotoId,
        targets: CapabilitySet,
        cancel: &CancellationToken,
    ) -> EnrichmentResult<bool> {
        self.reenrich(id, Plan::Forced(targets), cancel).await
    }

    /// Run only what the active capabilities say `id` is missing.
    pub async fn reenrich_missing(&self, id: PhotoId, cancel: &CancellationToken) -> EnrichmentResult<bool> {
        self.reenrich(id, Plan::Missing, cancel).await
    }

    /// [`Self::reenrich_photo`] for each id. Returns how many succeeded.
    pub async fn reenrich_photos(
        &self,
        ids: &[PhotoId],
        targets: CapabilitySet,
        cancel: &CancellationToken,
    ) -> EnrichmentResult<usize> {
        if targets.is_empty() {
            warn!("no capabilities specified for re-enrichment");
            return Ok(0);
        }
        self.reenrich_many(ids, Plan::Forced(targets), cancel).await
    }

    /// [`Self::reenrich_missing`] for each id. Returns how many succeeded.
    pub async fn reenrich_missing_batch(&self, ids: &[PhotoId], cancel: &CancellationToken) -> EnrichmentResult<usize> {
        self.reenrich_many(ids, Plan::Missing, cancel).await
    }

    async fn reenrich_many(&self, ids: &[PhotoId], plan: Plan, cancel: &CancellationToken) -> EnrichmentResult<usize> {
        if ids.is_empty() {
            warn!("no photo ids specified for re-enrichment");
            return Ok(0);
        }
        info!(photos = ids.len(), ?plan, "batch re-enrichment started");

        let mut succeeded = 0;
        for &id in ids {
            if cancel.is_cancelled() {
                return Err(EnrichmentError::Cancelled);
            }
            match self.reenrich(id, plan, cancel).await {
                Ok(true) => succeeded += 1,
                Ok(false) => {}
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    error!(photo_id = %id, error = %e, "re-enrichment failed, continuing with next photo");
                    self.session.clear();
                }
            }
        }

        info!(succeeded, photos = ids.len(), "batch re-enrichment completed");
        Ok(succeeded)
    }

    async fn reenrich(&self, id: PhotoId, plan: Plan, cancel: &CancellationToken) -> EnrichmentResult<bool> {
        let work = match self.prepare(id, plan) {
            Ok(Some(work)) => work,
            Ok(None) => {
                self.session.clear();
                return Ok(false);
            }
            Err(e) => {
                self.session.clear();
                return Err(e);
            }
        };
        let result = self.execute(id, work, cancel).await;
        if !matches!(result, Ok(true)) {
            self.session.clear();
        }
        result
    }

    /// Work out what to run, or `None` when there is nothing to do.
    fn prepare(&self, id: PhotoId, plan: Plan) -> EnrichmentResult<Option<Work>> {
        if let Plan::Forced(targets) = plan {
            if targets.is_empty() {
                warn!(photo_id = %id, "no capabilities specified for re-enrichment");
                return Ok(None);
            }
        }

        let Some(photo) = self.session.load(id)? else {
            warn!(photo_id = %id, "photo not found");
            return Ok(None);
        };
        let Some(path) = photo.absolute_path() else {
            warn!(photo_id = %id, "photo has no files");
            return Ok(None);
        };

        let descriptors = self.pipeline.catalog().descriptors();
        let diff = DiffCalculator::new(descriptors);

        let work = match plan {
            Plan::Forced(targets) => {
                let requested = descriptors.enrichers_for(targets)?;
                let steps = diff.expand_with_dependencies(&requested)?;
                let expected = descriptors.capabilities_of(&steps);
                info!(photo_id = %id, targets = %targets, steps = steps.len(), "force re-running enrichers");
                Work {
                    photo,
                    path,
                    steps,
                    clear: expected,
                    expected,
                }
            }
            Plan::Missing => {
                let active = self.active.active_capabilities()?;
                if active.is_empty() {
                    warn!(photo_id = %id, "no active capabilities configured");
                    return Ok(None);
                }
                let registered = active.intersection(descriptors.capabilities());
                let unregistered = active.difference(registered);
                if !unregistered.is_empty() {
                    debug!(photo_id = %id, skipped = %unregistered, "skipping capabilities without a registered enricher");
                }
                if registered.is_empty() {
                    warn!(photo_id = %id, "no registered enrichers among active capabilities");
                    return Ok(None);
                }

                let active_ids = descriptors.enrichers_for(registered)?;
                let missing = diff.calculate_missing(&photo, &active_ids)?;
                if missing.is_empty() {
                    debug!(photo_id = %id, "all active enrichers already applied");
                    return Ok(None);
                }
                let steps = diff.expand_with_dependencies(&missing)?;

                // Already-applied dependencies keep their data; they re-run
                // only so the order is complete.
                let to_clean: Vec<&EnricherId> = steps
                    .iter()
                    .filter(|step| {
                        missing.contains(step)
                            || descriptors
                                .get(step)
                                .is_some_and(|d| !photo.applied.contains(d.capability))
                    })
                    .collect();
                if to_clean.is_empty() {
                    debug!(photo_id = %id, "all required enrichers already applied");
                    return Ok(None);
                }

                info!(photo_id = %id, missing = missing.len(), steps = steps.len(), "re-enriching missing enrichers");
                Work {
                    clear: descriptors.capabilities_of(to_clean),
                    expected: descriptors.capabilities_of(&steps),
                    photo,
                    path,
                    steps,
                }
            }
        };
        Ok(Some(work))
    }

    async fn execute(&self, id: PhotoId, work: Work, cancel: &CancellationToken) -> EnrichmentResult<bool> {
        let Work {
            mut photo,
            path,
            steps,
            clear,
            expected,
        } = work;

        debug!(photo_id = %id, clearing = %clear, "clearing derived state");
        photo.clear_derived(clear);
        self.session.track(photo.clone())?;

        let mut source = SourceData::new(path);
        let scope = ResourceScope::new().with(self.session.clone());
        let run = self
            .pipeline
            .run_in_scope(&mut photo, &mut source, Some(&steps), &scope, cancel)
            .await
            .inspect_err(|e| error!(photo_id = %id, error = %e, "re-enrichment run failed, discarding changes"))?;

        let missing = expected.difference(photo.applied);
        if !missing.is_empty() {
            warn!(
                photo_id = %id,
                expected = %expected,
                actual = %photo.applied.intersection(expected),
                missing = %missing,
                stop_reason = ?run.stop_reason,
                "some enrichers did not apply, discarding changes"
            );
            return Ok(false);
        }

        self.session.track(photo)?;
        self.session.save_changes()?;
        info!(photo_id = %id, steps = steps.len(), "photo re-enriched");
        Ok(true)
    }
}
