use chrono::{DateTime, Utc};
use common::{CatalogRecord, DeviceRecord, EntityKind, Result, ServiceRecord};
use serde_json::Value;
use uuid::Uuid;

use super::store::{CatalogStore, ListFilter};

/// The catalog boundary: both per-kind stores behind one operation set that
/// the external API layer and the dashboard consume. Operations dispatch on
/// [`EntityKind`] and speak canonical records.
pub struct Catalog {
    instance_id: Uuid,
    started_at: DateTime<Utc>,
    devices: CatalogStore<DeviceRecord>,
    services: CatalogStore<ServiceRecord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            started_at: Utc::now(),
            devices: CatalogStore::new(),
            services: CatalogStore::new(),
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn devices(&self) -> &CatalogStore<DeviceRecord> {
        &self.devices
    }

    pub fn services(&self) -> &CatalogStore<ServiceRecord> {
        &self.services
    }

    pub fn register(&self, kind: EntityKind, payload: Value) -> Result<Value> {
        match kind {
            EntityKind::Device => register_in(&self.devices, payload),
            EntityKind::Service => register_in(&self.services, payload),
        }
    }

    pub fn heartbeat(&self, kind: EntityKind, id: &str, partial: Value) -> Result<Value> {
        match kind {
            EntityKind::Device => heartbeat_in(&self.devices, id, partial),
            EntityKind::Service => heartbeat_in(&self.services, id, partial),
        }
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> Result<Value> {
        match kind {
            EntityKind::Device => self.devices.get(id)?.to_record(),
            EntityKind::Service => self.services.get(id)?.to_record(),
        }
    }

    pub fn list(&self, kind: EntityKind, filter: &ListFilter) -> Result<Vec<Value>> {
        match kind {
            EntityKind::Device => list_in(&self.devices, filter),
            EntityKind::Service => list_in(&self.services, filter),
        }
    }

    pub fn deregister(&self, kind: EntityKind, id: &str) -> Result<()> {
        match kind {
            EntityKind::Device => self.devices.deregister(id),
            EntityKind::Service => self.services.deregister(id),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

fn register_in<R: CatalogRecord>(store: &CatalogStore<R>, payload: Value) -> Result<Value> {
    let payload = R::validate_payload(payload)?;
    store.register(payload)?.to_record()
}

fn heartbeat_in<R: CatalogRecord>(store: &CatalogStore<R>, id: &str, partial: Value) -> Result<Value> {
    let patch = R::validate_patch(partial)?;
    store.heartbeat(id, patch)?.to_record()
}

fn list_in<R: CatalogRecord>(store: &CatalogStore<R>, filter: &ListFilter) -> Result<Vec<Value>> {
    store
        .list(filter)
        .iter()
        .map(CatalogRecord::to_record)
        .collect()
}
