//! Which capabilities every photo should end up with

use super::error::EnrichmentResult;
use crate::config::LumenConfig;
use crate::model::{Capability, CapabilitySet};
use crate::storage::PhotoStore;
use std::sync::Arc;

/// Source of the capabilities that are switched on.
pub trait ActiveCapabilityProvider: Send + Sync {
    fn active_capabilities(&self) -> EnrichmentResult<CapabilitySet>;
}

/// A fixed set, typically read from configuration at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticActiveCapabilities(CapabilitySet);

impl StaticActiveCapabilities {
    pub fn new(capabilities: CapabilitySet) -> Self {
        Self(capabilities)
    }

    /// Parse capability names; an unknown name is an error.
    pub fn from_names<I, S>(names: I) -> EnrichmentResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self(CapabilitySet::parse_names(names)?))
    }

    pub fn from_config(config: &LumenConfig) -> EnrichmentResult<Self> {
        Self::from_names(&config.active)
    }
}

impl ActiveCapabilityProvider for StaticActiveCapabilities {
    fn active_capabilities(&self) -> EnrichmentResult<CapabilitySet> {
        Ok(self.0)
    }
}

/// Reads the store's enricher settings on every call, so switching an
/// enricher on or off takes effect without a restart.
pub struct StoredActiveCapabilities {
    store: Arc<dyn PhotoStore>,
}

impl StoredActiveCapabilities {
    pub fn new(store: Arc<dyn PhotoStore>) -> Self {
        Self { store }
    }
}

impl ActiveCapabilityProvider for StoredActiveCapabilities {
    /// Active rows only. An active row whose name is not a capability is
    /// an error naming it.
    fn active_capabilities(&self) -> EnrichmentResult<CapabilitySet> {
        let mut active = CapabilitySet::empty();
        for setting in self.store.enricher_settings()? {
            if setting.is_active {
                active.insert(setting.name.parse::<Capability>()?);
            }
        }
        Ok(active)
    }
}
