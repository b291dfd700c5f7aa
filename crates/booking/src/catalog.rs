use std::collections::HashMap;

use serde::Serialize;
use slotgate_common::{CatalogEntryConfig, SlotgateError, SlotgateResult};

use crate::model::{ProviderId, ServiceId};

/// A bookable individual service (haircut, massage, ...) and its provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub id: ServiceId,
    pub provider_id: ProviderId,
    pub name: String,
    pub duration_minutes: u32,
}

/// Read-only lookup from individual service id to the provider performing it.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    entries: HashMap<ServiceId, CatalogEntry>,
}

impl ServiceCatalog {
    pub fn new(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.id, e)).collect(),
        }
    }

    pub fn from_config(entries: &[CatalogEntryConfig]) -> Self {
        let catalog = Self::new(entries.iter().map(|e| CatalogEntry {
            id: e.id,
            provider_id: e.provider_id,
            name: e.name.clone(),
            duration_minutes: e.duration_minutes,
        }));
        tracing::info!(services = catalog.len(), "loaded service catalog");
        catalog
    }

    pub fn get(&self, id: ServiceId) -> SlotgateResult<&CatalogEntry> {
        self.entries.get(&id).ok_or_else(|| {
            tracing::warn!(service_id = id, "service not found");
            SlotgateError::NotFound(format!("service {} not found", id))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
