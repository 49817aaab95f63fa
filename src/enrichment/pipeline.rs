//! The enrichment pipeline
//!
//! Runs a catalog's enrichers against one photo in dependency order, one
//! step at a time. After each step the stop conditions for that step are
//! asked whether the run should end early. Batches run many photos at once,
//! bounded by a semaphore, each with its own order, context and scope.

use super::cancel::CancellationToken;
use super::context::RunContext;
use super::error::{EnrichmentError, EnrichmentResult};
use super::graph;
use super::scope::{EmptyScopeFactory, ResourceScope, ScopeFactory};
use super::stop::{StopCondition, StopConditionSet};
use crate::enricher::{EnricherCatalog, EnricherError, EnricherId, StepContext};
use crate::model::{Photo, PhotoId, SourceData};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Pipeline behaviour switches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Record step failures and keep going instead of aborting the run
    pub continue_on_error: bool,
    /// Log each step's duration at info level instead of debug
    pub log_timings: bool,
    /// Concurrent photos in a batch; unset or 0 means available parallelism
    pub max_parallelism: Option<usize>,
}

impl PipelineOptions {
    /// Batch permits, capped at what a semaphore can hold.
    pub fn effective_parallelism(&self) -> usize {
        match self.max_parallelism {
            Some(n) if n > 0 => n.min(Semaphore::MAX_PERMITS),
            _ => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

/// How a run that did not fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    StoppedEarly,
}

/// Wall-clock time of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTiming {
    pub enricher: EnricherId,
    pub duration: Duration,
    pub succeeded: bool,
}

/// A step failure that was recorded instead of aborting the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFailure {
    pub enricher: EnricherId,
    pub message: String,
}

/// What happened during one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub stop_reason: Option<String>,
    /// One entry per executed step, in execution order
    pub step_timings: Vec<StepTiming>,
    pub failures: Vec<StepFailure>,
    pub total_duration: Duration,
}

impl RunResult {
    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    pub fn is_stopped_early(&self) -> bool {
        self.outcome == RunOutcome::StoppedEarly
    }

    /// Executed steps in order
    pub fn executed(&self) -> Vec<&EnricherId> {
        self.step_timings.iter().map(|t| &t.enricher).collect()
    }

    pub fn duration_of(&self, enricher: &str) -> Option<Duration> {
        self.step_timings
            .iter()
            .find(|t| t.enricher.as_str() == enricher)
            .map(|t| t.duration)
    }
}

/// One photo's result from a batch, with the photo and its source data
/// handed back for persistence.
#[derive(Debug)]
pub struct BatchOutcome {
    pub photo: Photo,
    pub source: SourceData,
    pub result: EnrichmentResult<RunResult>,
}

/// Logs the run's total duration when dropped, whichever way the run ends.
struct RunTimer {
    run_id: Uuid,
    photo_id: Option<PhotoId>,
    started: Instant,
    verbose: bool,
}

impl RunTimer {
    fn start(run_id: Uuid, photo_id: Option<PhotoId>, verbose: bool) -> Self {
        Self {
            run_id,
            photo_id,
            started: Instant::now(),
            verbose,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for RunTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        if self.verbose {
            info!(run_id = %self.run_id, photo_id = ?self.photo_id, elapsed_ms, "enrichment run finished");
        } else {
            debug!(run_id = %self.run_id, photo_id = ?self.photo_id, elapsed_ms, "enrichment run finished");
        }
    }
}

/// Executes enrichers in dependency order.
pub struct EnrichmentPipeline {
    catalog: Arc<EnricherCatalog>,
    order: Vec<EnricherId>,
    stop_conditions: StopConditionSet,
    options: PipelineOptions,
    scope_factory: Arc<dyn ScopeFactory>,
}

impl EnrichmentPipeline {
    /// Build a pipeline over every enricher in `catalog`.
    ///
    /// Fails when the catalog is empty, when its enrichers cannot be
    /// ordered, or when a stop condition names an unknown enricher.
    pub fn new(
        catalog: Arc<EnricherCatalog>,
        stop_conditions: Vec<Arc<dyn StopCondition>>,
        options: PipelineOptions,
    ) -> EnrichmentResult<Self> {
        if catalog.is_empty() {
            return Err(EnrichmentError::EmptyCatalog);
        }
        let order = graph::sort_all(catalog.descriptors())?;
        let stop_conditions = StopConditionSet::new(stop_conditions, catalog.descriptors())?;

        info!(
            count = order.len(),
            stop_conditions = stop_conditions.len(),
            order = %join_ids(&order),
            "enrichment pipeline initialized"
        );

        Ok(Self {
            catalog,
            order,
            stop_conditions,
            options,
            scope_factory: Arc::new(EmptyScopeFactory),
        })
    }

    /// Use `factory` to create the isolated scope of each run.
    pub fn with_scope_factory(mut self, factory: impl ScopeFactory + 'static) -> Self {
        self.scope_factory = Arc::new(factory);
        self
    }

    pub fn catalog(&self) -> &Arc<EnricherCatalog> {
        &self.catalog
    }

    /// The full execution order
    pub fn order(&self) -> &[EnricherId] {
        &self.order
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Order a subset of the catalog, or the whole catalog when `steps` is
    /// `None`.
    pub fn plan(&self, steps: Option<&[EnricherId]>) -> EnrichmentResult<Vec<EnricherId>> {
        match steps {
            Some(steps) => graph::sort(self.catalog.descriptors(), steps),
            None => Ok(self.order.clone()),
        }
    }

    /// Run every enricher in an isolated scope.
    pub async fn run(
        &self,
        photo: &mut Photo,
        source: &mut SourceData,
        cancel: &CancellationToken,
    ) -> EnrichmentResult<RunResult> {
        let scope = self.scope_factory.create_scope();
        self.execute(photo, source, &self.order, &scope, cancel).await
    }

    /// Run only `steps` (which must include their dependencies) in an
    /// isolated scope.
    pub async fn run_steps(
        &self,
        photo: &mut Photo,
        source: &mut SourceData,
        steps: &[EnricherId],
        cancel: &CancellationToken,
    ) -> EnrichmentResult<RunResult> {
        let order = self.plan(Some(steps))?;
        let scope = self.scope_factory.create_scope();
        self.execute(photo, source, &order, &scope, cancel).await
    }

    /// Run `steps` (or everything) in a scope owned by the caller.
    pub async fn run_in_scope(
        &self,
        photo: &mut Photo,
        source: &mut SourceData,
        steps: Option<&[EnricherId]>,
        scope: &ResourceScope,
        cancel: &CancellationToken,
    ) -> EnrichmentResult<RunResult> {
        let order = self.plan(steps)?;
        self.execute(photo, source, &order, scope, cancel).await
    }

    async fn execute(
        &self,
        photo: &mut Photo,
        source: &mut SourceData,
        order: &[EnricherId],
        scope: &ResourceScope,
        cancel: &CancellationToken,
    ) -> EnrichmentResult<RunResult> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let photo_id = photo.id;
        let timer = RunTimer::start(run_id, photo_id, self.options.log_timings);

        let mut ctx = RunContext::new(photo, source, scope);
        let mut step_timings = Vec::with_capacity(order.len());
        let mut failures = Vec::new();

        for id in order {
            if cancel.is_cancelled() {
                warn!(%run_id, photo_id = ?photo_id, enricher = %id, "enrichment cancelled before step");
                return Err(EnrichmentError::Cancelled);
            }

            let enricher = self
                .catalog
                .get(id)
                .ok_or_else(|| EnrichmentError::UnknownEnricher(id.clone()))?;
            let capability = enricher.capability();

            debug!(%run_id, enricher = %id, "starting enricher");
            let step_started = Instant::now();
            let result = {
                let (photo, source, scope) = ctx.parts_mut();
                enricher.enrich(photo, source, &StepContext::new(scope, cancel)).await
            };
            let duration = step_started.elapsed();

            match result {
                Ok(()) => {
                    ctx.parts_mut().0.applied.insert(capability);
                    step_timings.push(StepTiming {
                        enricher: id.clone(),
                        duration,
                        succeeded: true,
                    });
                    self.log_step(id, duration);
                }
                Err(EnricherError::Cancelled) => {
                    warn!(%run_id, photo_id = ?photo_id, enricher = %id, "enrichment cancelled during step");
                    return Err(EnrichmentError::Cancelled);
                }
                Err(err) => {
                    step_timings.push(StepTiming {
                        enricher: id.clone(),
                        duration,
                        succeeded: false,
                    });
                    error!(%run_id, photo_id = ?photo_id, enricher = %id, error = %err, "enricher failed");
                    if !self.options.continue_on_error {
                        return Err(EnrichmentError::Step {
                            enricher: id.clone(),
                            source: err,
                        });
                    }
                    failures.push(StepFailure {
                        enricher: id.clone(),
                        message: err.to_string(),
                    });
                }
            }

            if let Some(reason) = self.stop_conditions.evaluate(id, &ctx, cancel).await? {
                info!(%run_id, photo_id = ?photo_id, enricher = %id, %reason, "stop condition triggered");
                ctx.stop(reason);
                break;
            }
        }

        let stop_reason = ctx.take_stop_reason();
        Ok(RunResult {
            run_id,
            started_at,
            outcome: if stop_reason.is_some() {
                RunOutcome::StoppedEarly
            } else {
                RunOutcome::Completed
            },
            stop_reason,
            step_timings,
            failures,
            total_duration: timer.elapsed(),
        })
    }

    fn log_step(&self, id: &EnricherId, duration: Duration) {
        let elapsed_ms = duration.as_secs_f64() * 1000.0;
        if self.options.log_timings {
            info!(enricher = %id, elapsed_ms, "enricher completed");
        } else {
            debug!(enricher = %id, elapsed_ms, "enricher completed");
        }
    }

    /// Run every item through the full pipeline, at most
    /// `max_parallelism` at a time.
    ///
    /// Items are independent: a failure affects only its own outcome, and
    /// so does a panic, reported as [`EnrichmentError::Panicked`] with the
    /// photo as it was submitted. Items not yet started when `cancel` fires
    /// report [`EnrichmentError::Cancelled`]. Outcomes come back in input
    /// order.
    pub async fn run_batch(
        self: &Arc<Self>,
        items: Vec<(Photo, SourceData)>,
        cancel: &CancellationToken,
    ) -> Vec<BatchOutcome> {
        if items.is_empty() {
            return Vec::new();
        }

        let total = items.len();
        let parallelism = self.options.effective_parallelism();
        info!(items = total, parallelism, "batch pipeline started");

        let semaphore = Arc::new(Semaphore::new(parallelism));
        let mut tasks = JoinSet::new();
        let mut task_index = HashMap::with_capacity(total);
        // Submitted photos, handed back if their task dies
        let mut submitted = Vec::with_capacity(total);
        for (index, (photo, source)) in items.into_iter().enumerate() {
            submitted.push((photo.clone(), source.absolute_path.clone()));
            let pipeline = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let handle = tasks.spawn(async move {
                let mut photo = photo;
                let mut source = source;
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) if !cancel.is_cancelled() => {
                        pipeline.run(&mut photo, &mut source, &cancel).await
                    }
                    _ => Err(EnrichmentError::Cancelled),
                };
                (index, BatchOutcome { photo, source, result })
            });
            task_index.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<BatchOutcome>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => {
                    let Some(&index) = task_index.get(&e.id()) else {
                        error!(error = %e, "unknown batch task failed");
                        continue;
                    };
                    let result = if e.is_panic() {
                        let message = panic_message(e.into_panic());
                        error!(item = index, %message, "batch item panicked");
                        Err(EnrichmentError::Panicked(message))
                    } else {
                        error!(item = index, error = %e, "batch item did not finish");
                        Err(EnrichmentError::Cancelled)
                    };
                    let (photo, path) = submitted[index].clone();
                    slots[index] = Some(BatchOutcome {
                        photo,
                        source: SourceData::new(path),
                        result,
                    });
                }
            }
        }

        let outcomes: Vec<BatchOutcome> = slots.into_iter().flatten().collect();
        let succeeded = outcomes.iter().filter(|o| o.result.is_ok()).count();
        let cancelled = outcomes
            .iter()
            .filter(|o| matches!(&o.result, Err(e) if e.is_cancelled()))
            .count();
        info!(
            items = total,
            succeeded,
            cancelled,
            failed = outcomes.len() - succeeded - cancelled,
            "batch pipeline completed"
        );
        outcomes
    }
}

impl fmt::Debug for EnrichmentPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichmentPipeline")
            .field("order", &self.order)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn join_ids(ids: &[EnricherId]) -> String {
    ids.iter().map(EnricherId::as_str).collect::<Vec<_>>().join(", ")
}
