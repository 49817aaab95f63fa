//! Cached enricher descriptors and the enricher catalog

use super::{DependencyRef, Enricher, EnricherId};
use crate::enrichment::{EnrichmentError, EnrichmentResult};
use crate::model::{Capability, CapabilitySet};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Everything the engine needs to plan with an enricher, captured once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnricherDescriptor {
    pub id: EnricherId,
    pub capability: Capability,
    pub data_provider: bool,
    pub dependencies: Vec<DependencyRef>,
}

impl EnricherDescriptor {
    pub fn new(id: impl Into<EnricherId>, capability: Capability) -> Self {
        Self {
            id: id.into(),
            capability,
            data_provider: false,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: DependencyRef) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn as_data_provider(mut self) -> Self {
        self.data_provider = true;
        self
    }

    /// Snapshot an enricher's declarations.
    pub fn from_enricher(enricher: &dyn Enricher) -> Self {
        Self {
            id: EnricherId::new(enricher.id()),
            capability: enricher.capability(),
            data_provider: enricher.is_data_provider(),
            dependencies: enricher.dependencies(),
        }
    }
}

/// A validated, de-duplicated set of descriptors.
///
/// Insertion order is preserved; when two descriptors share an id the first
/// wins. Every `ByName` dependency resolves and no descriptor depends on
/// itself.
#[derive(Debug, Clone, Default)]
pub struct DescriptorSet {
    descriptors: Vec<EnricherDescriptor>,
    by_id: HashMap<EnricherId, usize>,
    by_name: HashMap<String, usize>,
    by_capability: HashMap<Capability, Vec<usize>>,
}

impl DescriptorSet {
    pub fn new(descriptors: impl IntoIterator<Item = EnricherDescriptor>) -> EnrichmentResult<Self> {
        let mut set = Self::default();
        for descriptor in descriptors {
            if set.by_id.contains_key(&descriptor.id) {
                continue;
            }
            let index = set.descriptors.len();
            set.by_id.insert(descriptor.id.clone(), index);
            set.by_name
                .entry(descriptor.id.as_str().to_lowercase())
                .or_insert(index);
            set.by_capability
                .entry(descriptor.capability)
                .or_default()
                .push(index);
            set.descriptors.push(descriptor);
        }
        set.validate()?;
        Ok(set)
    }

    fn validate(&self) -> EnrichmentResult<()> {
        for descriptor in &self.descriptors {
            for dependency in self.dependency_ids(descriptor)? {
                if dependency == descriptor.id {
                    return Err(EnrichmentError::SelfDependency(descriptor.id.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Descriptors in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &EnricherDescriptor> {
        self.descriptors.iter()
    }

    pub fn ids(&self) -> Vec<EnricherId> {
        self.descriptors.iter().map(|d| d.id.clone()).collect()
    }

    pub fn get(&self, id: &EnricherId) -> Option<&EnricherDescriptor> {
        self.by_id.get(id).map(|&i| &self.descriptors[i])
    }

    pub fn contains(&self, id: &EnricherId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Look up a descriptor by id, case-insensitively.
    pub fn find_by_name(&self, name: &str) -> Option<&EnricherDescriptor> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&i| &self.descriptors[i])
    }

    /// Resolve a dependency reference to the id it designates.
    ///
    /// `ById` references are returned as-is even if they name an enricher
    /// outside this set; callers decide whether that is an error.
    pub fn resolve(&self, owner: &EnricherId, dependency: &DependencyRef) -> EnrichmentResult<EnricherId> {
        match dependency {
            DependencyRef::ById(id) => Ok(id.clone()),
            DependencyRef::ByName(name) => self
                .find_by_name(name)
                .map(|d| d.id.clone())
                .ok_or_else(|| EnrichmentError::UnknownDependencyName {
                    enricher: owner.clone(),
                    name: name.clone(),
                }),
        }
    }

    /// Resolved dependency ids of `descriptor`, in declaration order,
    /// without duplicates.
    pub fn dependency_ids(&self, descriptor: &EnricherDescriptor) -> EnrichmentResult<Vec<EnricherId>> {
        let mut seen = HashSet::new();
        let mut ids = Vec::with_capacity(descriptor.dependencies.len());
        for dependency in &descriptor.dependencies {
            let id = self.resolve(&descriptor.id, dependency)?;
            if seen.insert(id.clone()) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Capabilities produced by at least one descriptor
    pub fn capabilities(&self) -> CapabilitySet {
        self.by_capability.keys().copied().collect()
    }

    /// Descriptors producing `capability`, in insertion order
    pub fn producers(&self, capability: Capability) -> Vec<&EnricherDescriptor> {
        self.by_capability
            .get(&capability)
            .map(|indices| indices.iter().map(|&i| &self.descriptors[i]).collect())
            .unwrap_or_default()
    }

    /// Every enricher producing a capability in `capabilities`, in
    /// insertion order. A capability nobody produces is an error.
    pub fn enrichers_for(&self, capabilities: CapabilitySet) -> EnrichmentResult<Vec<EnricherId>> {
        if let Some(missing) = capabilities.iter().find(|c| !self.by_capability.contains_key(c)) {
            return Err(EnrichmentError::UnregisteredCapability(missing));
        }
        Ok(self
            .descriptors
            .iter()
            .filter(|d| capabilities.contains(d.capability))
            .map(|d| d.id.clone())
            .collect())
    }

    /// Union of the capabilities of `ids`; ids outside the set are ignored.
    pub fn capabilities_of<'a>(&self, ids: impl IntoIterator<Item = &'a EnricherId>) -> CapabilitySet {
        ids.into_iter()
            .filter_map(|id| self.get(id))
            .map(|d| d.capability)
            .collect()
    }
}

/// The registry of executable enrichers and their cached descriptors.
///
/// Enrichers are de-duplicated by `id()`: registering the same id twice
/// keeps the first instance.
pub struct EnricherCatalog {
    descriptors: DescriptorSet,
    enrichers: HashMap<EnricherId, Arc<dyn Enricher>>,
}

impl EnricherCatalog {
    pub fn new(enrichers: Vec<Arc<dyn Enricher>>) -> EnrichmentResult<Self> {
        let mut seen = HashSet::new();
        let deduped: Vec<_> = enrichers
            .into_iter()
            .filter(|e| seen.insert(e.id().to_string()))
            .collect();

        let descriptors = DescriptorSet::new(
            deduped
                .iter()
                .map(|e| EnricherDescriptor::from_enricher(e.as_ref())),
        )?;
        let enrichers = deduped
            .into_iter()
            .map(|e| (EnricherId::new(e.id()), e))
            .collect();

        Ok(Self {
            descriptors,
            enrichers,
        })
    }

    pub fn descriptors(&self) -> &DescriptorSet {
        &self.descriptors
    }

    pub fn get(&self, id: &EnricherId) -> Option<&Arc<dyn Enricher>> {
        self.enrichers.get(id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl fmt::Debug for EnricherCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnricherCatalog")
            .field("enrichers", &self.descriptors.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enricher::{EnricherError, StepContext};
    use crate::model::{Photo, SourceData};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEnricher {
        id: &'static str,
        capability: Capability,
        dependency_reads: AtomicUsize,
    }

    #[async_trait]
    impl Enricher for CountingEnricher {
        fn id(&self) -> &str {
            self.id
        }
        fn capability(&self) -> Capability {
            self.capability
        }
        fn dependencies(&self) -> Vec<DependencyRef> {
            self.dependency_reads.fetch_add(1, Ordering::SeqCst);
            Vec::new()
        }
        async fn enrich(&self, _: &mut Photo, _: &mut SourceData, _: &StepContext<'_>) -> Result<(), EnricherError> {
            Ok(())
        }
    }

    fn counting(id: &'static str, capability: Capability) -> Arc<CountingEnricher> {
        Arc::new(CountingEnricher {
            id,
            capability,
            dependency_reads: AtomicUsize::new(0),
        })
    }

    #[test]
    fn first_registration_wins() {
        let set = DescriptorSet::new(vec![
            EnricherDescriptor::new("meta", Capability::Metadata),
            EnricherDescriptor::new("meta", Capability::Tag),
        ])
        .unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&"meta".into()).unwrap().capability, Capability::Metadata);
    }

    #[test]
    fn by_name_resolves_case_insensitively() {
        let set = DescriptorSet::new(vec![
            EnricherDescriptor::new("Preview", Capability::Preview),
            EnricherDescriptor::new("face", Capability::Face).with_dependency(DependencyRef::name("PREVIEW")),
        ])
        .unwrap();

        let face = set.get(&"face".into()).unwrap();
        assert_eq!(set.dependency_ids(face).unwrap(), vec![EnricherId::from("Preview")]);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = DescriptorSet::new(vec![
            EnricherDescriptor::new("face", Capability::Face).with_dependency(DependencyRef::name("ghost")),
        ])
        .unwrap_err();

        assert_eq!(err.to_string(), "enricher face declares unknown dependency by name: 'ghost'");
    }

    #[test]
    fn self_dependency_is_rejected() {
        let err = DescriptorSet::new(vec![
            EnricherDescriptor::new("tag", Capability::Tag).with_dependency(DependencyRef::name("TAG")),
        ])
        .unwrap_err();

        assert_eq!(err.to_string(), "enricher tag cannot depend on itself");
    }

    #[test]
    fn enrichers_for_maps_capabilities() {
        let set = DescriptorSet::new(vec![
            EnricherDescriptor::new("meta", Capability::Metadata),
            EnricherDescriptor::new("face", Capability::Face),
        ])
        .unwrap();

        let ids = set.enrichers_for(CapabilitySet::from(Capability::Face)).unwrap();
        assert_eq!(ids, vec![EnricherId::from("face")]);

        let err = set.enrichers_for(CapabilitySet::from(Capability::Nsfw)).unwrap_err();
        assert!(matches!(err, EnrichmentError::UnregisteredCapability(Capability::Nsfw)));
    }

    #[test]
    fn catalog_reads_dependencies_once() {
        let meta = counting("meta", Capability::Metadata);
        let duplicate = counting("meta", Capability::Metadata);
        let catalog = EnricherCatalog::new(vec![
            meta.clone() as Arc<dyn Enricher>,
            duplicate.clone() as Arc<dyn Enricher>,
        ])
        .unwrap();

        assert_eq!(catalog.len(), 1);
        assert_eq!(meta.dependency_reads.load(Ordering::SeqCst), 1);
        assert_eq!(duplicate.dependency_reads.load(Ordering::SeqCst), 0);

        let _ = catalog.descriptors().get(&"meta".into());
        assert_eq!(meta.dependency_reads.load(Ordering::SeqCst), 1);
    }
}
