//! Which enrichers a photo still needs
//!
//! Planning a re-run is two passes. [`DiffCalculator::calculate_missing`]
//! finds the minimal set: enrichers whose capability is not yet applied,
//! plus data providers, which always re-run because their output is never
//! persisted. [`DiffCalculator::expand_with_dependencies`] then closes a set
//! over its dependencies so the pipeline can order it.

use super::error::{EnrichmentError, EnrichmentResult};
use crate::enricher::{DescriptorSet, EnricherDescriptor, EnricherId};
use crate::model::{CapabilitySet, Photo};
use std::collections::HashSet;

/// Walk state shared by both passes: the output in dependencies-first
/// order plus the current DFS path for cycle detection.
#[derive(Default)]
struct Walk {
    result: Vec<EnricherId>,
    included: HashSet<EnricherId>,
    visiting: HashSet<EnricherId>,
}

impl Walk {
    fn include(&mut self, id: &EnricherId) {
        if self.included.insert(id.clone()) {
            self.result.push(id.clone());
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiffCalculator<'a> {
    descriptors: &'a DescriptorSet,
}

impl<'a> DiffCalculator<'a> {
    pub fn new(descriptors: &'a DescriptorSet) -> Self {
        Self { descriptors }
    }

    fn descriptor(&self, id: &EnricherId) -> EnrichmentResult<&'a EnricherDescriptor> {
        self.descriptors
            .get(id)
            .ok_or_else(|| EnrichmentError::UnknownEnricher(id.clone()))
    }

    /// Enrichers among `active` (and their dependencies) that must run for
    /// `photo`, dependencies first.
    ///
    /// An enricher whose capability is already applied is skipped, along
    /// with its dependencies, unless it is a data provider.
    pub fn calculate_missing(&self, photo: &Photo, active: &[EnricherId]) -> EnrichmentResult<Vec<EnricherId>> {
        let mut walk = Walk::default();
        for id in active {
            self.visit_missing(id, photo.applied, &mut walk)?;
        }
        Ok(walk.result)
    }

    fn visit_missing(&self, id: &EnricherId, applied: CapabilitySet, walk: &mut Walk) -> EnrichmentResult<()> {
        let descriptor = self.descriptor(id)?;
        if !descriptor.data_provider && applied.contains(descriptor.capability) {
            return Ok(());
        }
        if walk.included.contains(id) {
            return Ok(());
        }
        if !walk.visiting.insert(id.clone()) {
            return Err(EnrichmentError::CycleAround(id.clone()));
        }
        for dependency in self.descriptors.dependency_ids(descriptor)? {
            self.visit_missing(&dependency, applied, walk)?;
        }
        walk.visiting.remove(id);
        walk.include(id);
        Ok(())
    }

    /// `steps` plus every transitive dependency, applied or not,
    /// dependencies first.
    pub fn expand_with_dependencies(&self, steps: &[EnricherId]) -> EnrichmentResult<Vec<EnricherId>> {
        let mut walk = Walk::default();
        for id in steps {
            self.visit_all(id, &mut walk)?;
        }
        Ok(walk.result)
    }

    fn visit_all(&self, id: &EnricherId, walk: &mut Walk) -> EnrichmentResult<()> {
        if walk.included.contains(id) {
            return Ok(());
        }
        if !walk.visiting.insert(id.clone()) {
            return Err(EnrichmentError::CycleAround(id.clone()));
        }
        let descriptor = self.descriptor(id)?;
        for dependency in self.descriptors.dependency_ids(descriptor)? {
            self.visit_all(&dependency, walk)?;
        }
        walk.visiting.remove(id);
        walk.include(id);
        Ok(())
    }

    /// Whether any enricher in `active` still has to run for `photo`.
    pub fn needs_enrichment(&self, photo: &Photo, active: &[EnricherId]) -> EnrichmentResult<bool> {
        Ok(!self.calculate_missing(photo, active)?.is_empty())
    }

    /// The members of `candidates` whose capability `photo` already has.
    /// Unknown ids are ignored.
    pub fn applied_enrichers(&self, photo: &Photo, candidates: &[EnricherId]) -> Vec<EnricherId> {
        candidates
            .iter()
            .filter(|id| {
                self.descriptors
                    .get(id)
                    .is_some_and(|d| photo.applied.contains(d.capability))
            })
            .cloned()
            .collect()
    }
}
