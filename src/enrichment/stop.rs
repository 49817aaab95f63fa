//! Stop conditions: predicates that end a run early
//!
//! A condition either applies after every step (no triggers) or only after
//! the enrichers it names. After each step the pipeline asks the global
//! conditions, then that step's conditions, in registration order; the
//! first reason returned ends the run.

use super::cancel::CancellationToken;
use super::context::RunContext;
use super::error::{EnrichmentError, EnrichmentResult};
use crate::enricher::{DependencyRef, DescriptorSet, EnricherError, EnricherId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[async_trait]
pub trait StopCondition: Send + Sync {
    /// Identifier used in logs and errors
    fn id(&self) -> &str;

    /// Enrichers after which this condition is checked. Empty means after
    /// every step.
    fn applies_after(&self) -> Vec<DependencyRef> {
        Vec::new()
    }

    /// `Some(reason)` to stop the run.
    async fn stop_reason(
        &self,
        ctx: &RunContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, EnricherError>;
}

type Predicate = dyn Fn(&RunContext<'_>) -> bool + Send + Sync;

/// A stop condition backed by a closure and a fixed reason.
pub struct FnStopCondition {
    id: String,
    reason: String,
    applies_after: Vec<DependencyRef>,
    predicate: Box<Predicate>,
}

impl FnStopCondition {
    pub fn new<F>(id: impl Into<String>, reason: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&RunContext<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            reason: reason.into(),
            applies_after: Vec::new(),
            predicate: Box::new(predicate),
        }
    }

    /// Only check this condition after `dependency` runs.
    pub fn after(mut self, dependency: DependencyRef) -> Self {
        self.applies_after.push(dependency);
        self
    }
}

impl fmt::Debug for FnStopCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStopCondition")
            .field("id", &self.id)
            .field("reason", &self.reason)
            .field("applies_after", &self.applies_after)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StopCondition for FnStopCondition {
    fn id(&self) -> &str {
        &self.id
    }

    fn applies_after(&self) -> Vec<DependencyRef> {
        self.applies_after.clone()
    }

    async fn stop_reason(
        &self,
        ctx: &RunContext<'_>,
        _cancel: &CancellationToken,
    ) -> Result<Option<String>, EnricherError> {
        Ok((self.predicate)(ctx).then(|| self.reason.clone()))
    }
}

/// Conditions partitioned by trigger, resolved once against a catalog.
#[derive(Default)]
pub(crate) struct StopConditionSet {
    global: Vec<Arc<dyn StopCondition>>,
    by_enricher: HashMap<EnricherId, Vec<Arc<dyn StopCondition>>>,
}

impl StopConditionSet {
    /// Resolve every trigger. A trigger naming an enricher outside
    /// `universe` is a configuration error.
    pub fn new(conditions: Vec<Arc<dyn StopCondition>>, universe: &DescriptorSet) -> EnrichmentResult<Self> {
        let mut set = Self::default();
        for condition in conditions {
            let triggers = condition.applies_after();
            if triggers.is_empty() {
                set.global.push(condition);
                continue;
            }
            let mut resolved: Vec<EnricherId> = Vec::with_capacity(triggers.len());
            for trigger in &triggers {
                let descriptor = match trigger {
                    DependencyRef::ById(id) => universe.get(id),
                    DependencyRef::ByName(name) => universe.find_by_name(name),
                };
                let id = descriptor.map(|d| d.id.clone()).ok_or_else(|| {
                    EnrichmentError::Config(format!(
                        "stop condition {} applies after unknown enricher {trigger}",
                        condition.id()
                    ))
                })?;
                if !resolved.contains(&id) {
                    resolved.push(id);
                }
            }
            for id in resolved {
                set.by_enricher.entry(id).or_default().push(Arc::clone(&condition));
            }
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.global.len() + self.by_enricher.values().map(Vec::len).sum::<usize>()
    }

    /// Ask the conditions that apply after `step`. The first reason wins.
    pub async fn evaluate(
        &self,
        step: &EnricherId,
        ctx: &RunContext<'_>,
        cancel: &CancellationToken,
    ) -> EnrichmentResult<Option<String>> {
        let scoped = self.by_enricher.get(step).map(Vec::as_slice).unwrap_or_default();
        for condition in self.global.iter().chain(scoped) {
            match condition.stop_reason(ctx, cancel).await {
                Ok(Some(reason)) => return Ok(Some(reason)),
                Ok(None) => {}
                Err(EnricherError::Cancelled) => return Err(EnrichmentError::Cancelled),
                Err(source) => {
                    return Err(EnrichmentError::StopCondition {
                        condition: condition.id().to_string(),
                        source,
                    })
                }
            }
        }
        Ok(None)
    }
}
