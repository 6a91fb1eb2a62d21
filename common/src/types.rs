use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CatalogError, Result};

/// Display rendering used for the derived `last_update_formatted` field.
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Online,
    Stale,
    Offline,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Online => "online",
            EntityStatus::Stale => "stale",
            EntityStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityStatus {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "online" => Ok(EntityStatus::Online),
            "stale" => Ok(EntityStatus::Stale),
            "offline" => Ok(EntityStatus::Offline),
            other => Err(CatalogError::ValidationError(format!(
                "unknown status '{}', expected 'online', 'stale' or 'offline'",
                other
            ))),
        }
    }
}

/// The two entity namespaces the catalog tracks. An id may coincide across
/// kinds without conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Device,
    Service,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Device => "device",
            EntityKind::Service => "service",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "device" => Ok(EntityKind::Device),
            "service" => Ok(EntityKind::Service),
            other => Err(CatalogError::ValidationError(format!(
                "unknown entity kind '{}', expected 'device' or 'service'",
                other
            ))),
        }
    }
}

/// Common shape shared by every catalog entity: identity, an open type tag,
/// liveness status and the registration/update timestamps. The store and the
/// liveness monitor are written against this trait once and specialized per
/// kind; only validation and the opaque field names differ between kinds.
pub trait CatalogRecord: Clone + Send + Sync + Serialize + 'static {
    /// Validated registration payload for this kind.
    type Payload: Send;
    /// Validated heartbeat patch for this kind.
    type Patch: Default + Send;

    const KIND: EntityKind;

    fn validate_payload(payload: Value) -> Result<Self::Payload>;
    fn validate_patch(partial: Value) -> Result<Self::Patch>;

    /// Builds a fresh record from a validated payload. Both timestamps are set
    /// to `now` and the status starts online.
    fn create(payload: Self::Payload, now: DateTime<Utc>) -> Self;

    /// Parses a canonical record, re-checking the record invariants. The
    /// derived display timestamp is recomputed, never read back.
    fn from_record(record: Value) -> Result<Self>;

    /// Serializes to the canonical mapping: every stored field plus the
    /// derived `last_update_formatted` display string.
    fn to_record(&self) -> Result<Value>;

    fn id(&self) -> &str;
    fn type_tag(&self) -> &str;
    fn status(&self) -> EntityStatus;
    fn set_status(&mut self, status: EntityStatus);
    fn registration_timestamp(&self) -> DateTime<Utc>;
    fn set_registration_timestamp(&mut self, instant: DateTime<Utc>);
    fn last_update(&self) -> DateTime<Utc>;

    /// Records a liveness signal: refreshes `last_update` and resets the
    /// status to online regardless of prior state.
    fn touch(&mut self, now: DateTime<Utc>);

    /// Merges optional heartbeat fields in. Mapping fields merge key-wise,
    /// other fields are replaced when present; nothing is ever removed.
    fn apply_patch(&mut self, patch: Self::Patch);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub device_type: String,
    #[serde(default)]
    pub endpoints: Map<String, Value>,
    #[serde(default = "empty_list")]
    pub sensors: Value,
    #[serde(default = "empty_list")]
    pub actuators: Value,
    pub status: EntityStatus,
    pub registration_timestamp: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevicePayload {
    pub device_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub device_type: String,
    #[serde(default)]
    pub endpoints: Option<Value>,
    #[serde(default)]
    pub sensors: Option<Value>,
    #[serde(default)]
    pub actuators: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DevicePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub endpoints: Option<Value>,
    #[serde(default)]
    pub sensors: Option<Value>,
    #[serde(default)]
    pub actuators: Option<Value>,
}

impl CatalogRecord for DeviceRecord {
    type Payload = DevicePayload;
    type Patch = DevicePatch;

    const KIND: EntityKind = EntityKind::Device;

    fn validate_payload(payload: Value) -> Result<DevicePayload> {
        let payload: DevicePayload = serde_json::from_value(payload).map_err(|e| {
            CatalogError::ValidationError(format!("invalid device registration payload: {}", e))
        })?;
        require_non_empty("device_id", &payload.device_id)?;
        require_non_empty("device_type", &payload.device_type)?;
        require_mapping("endpoints", &payload.endpoints)?;
        require_container("sensors", &payload.sensors)?;
        require_container("actuators", &payload.actuators)?;
        Ok(payload)
    }

    fn validate_patch(partial: Value) -> Result<DevicePatch> {
        if partial.is_null() {
            return Ok(DevicePatch::default());
        }
        let patch: DevicePatch = serde_json::from_value(partial).map_err(|e| {
            CatalogError::ValidationError(format!("invalid device heartbeat payload: {}", e))
        })?;
        require_mapping("endpoints", &patch.endpoints)?;
        require_container("sensors", &patch.sensors)?;
        require_container("actuators", &patch.actuators)?;
        Ok(patch)
    }

    fn create(payload: DevicePayload, now: DateTime<Utc>) -> Self {
        Self {
            device_id: payload.device_id,
            name: payload.name,
            description: payload.description,
            device_type: payload.device_type,
            endpoints: into_endpoint_map(payload.endpoints),
            sensors: into_container(payload.sensors),
            actuators: into_container(payload.actuators),
            status: EntityStatus::Online,
            registration_timestamp: now,
            last_update: now,
        }
    }

    fn from_record(record: Value) -> Result<Self> {
        let record: DeviceRecord = serde_json::from_value(record)
            .map_err(|e| CatalogError::ValidationError(format!("invalid device record: {}", e)))?;
        require_non_empty("device_id", &record.device_id)?;
        require_non_empty("device_type", &record.device_type)?;
        require_container("sensors", &Some(record.sensors.clone()))?;
        require_container("actuators", &Some(record.actuators.clone()))?;
        check_timestamp_order(record.registration_timestamp, record.last_update)?;
        Ok(record)
    }

    fn to_record(&self) -> Result<Value> {
        render_record(self, self.last_update)
    }

    fn id(&self) -> &str {
        &self.device_id
    }

    fn type_tag(&self) -> &str {
        &self.device_type
    }

    fn status(&self) -> EntityStatus {
        self.status
    }

    fn set_status(&mut self, status: EntityStatus) {
        self.status = status;
    }

    fn registration_timestamp(&self) -> DateTime<Utc> {
        self.registration_timestamp
    }

    fn set_registration_timestamp(&mut self, instant: DateTime<Utc>) {
        self.registration_timestamp = instant;
    }

    fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update = now;
        self.status = EntityStatus::Online;
    }

    fn apply_patch(&mut self, patch: DevicePatch) {
        if let Some(name) = patch.name {
            self.name = Some(name);
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        merge_endpoints(&mut self.endpoints, patch.endpoints);
        if let Some(sensors) = patch.sensors {
            self.sensors = sensors;
        }
        if let Some(actuators) = patch.actuators {
            self.actuators = actuators;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub service_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Map<String, Value>,
    #[serde(default = "empty_list")]
    pub required_inputs: Value,
    #[serde(default = "empty_list")]
    pub provided_outputs: Value,
    pub status: EntityStatus,
    pub registration_timestamp: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicePayload {
    pub service_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Option<Value>,
    #[serde(default)]
    pub required_inputs: Option<Value>,
    #[serde(default)]
    pub provided_outputs: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub endpoints: Option<Value>,
    #[serde(default)]
    pub required_inputs: Option<Value>,
    #[serde(default)]
    pub provided_outputs: Option<Value>,
}

impl CatalogRecord for ServiceRecord {
    type Payload = ServicePayload;
    type Patch = ServicePatch;

    const KIND: EntityKind = EntityKind::Service;

    fn validate_payload(payload: Value) -> Result<ServicePayload> {
        let payload: ServicePayload = serde_json::from_value(payload).map_err(|e| {
            CatalogError::ValidationError(format!("invalid service registration payload: {}", e))
        })?;
        require_non_empty("service_id", &payload.service_id)?;
        require_non_empty("service_type", &payload.service_type)?;
        require_mapping("endpoints", &payload.endpoints)?;
        require_container("required_inputs", &payload.required_inputs)?;
        require_container("provided_outputs", &payload.provided_outputs)?;
        Ok(payload)
    }

    fn validate_patch(partial: Value) -> Result<ServicePatch> {
        if partial.is_null() {
            return Ok(ServicePatch::default());
        }
        let patch: ServicePatch = serde_json::from_value(partial).map_err(|e| {
            CatalogError::ValidationError(format!("invalid service heartbeat payload: {}", e))
        })?;
        require_mapping("endpoints", &patch.endpoints)?;
        require_container("required_inputs", &patch.required_inputs)?;
        require_container("provided_outputs", &patch.provided_outputs)?;
        Ok(patch)
    }

    fn create(payload: ServicePayload, now: DateTime<Utc>) -> Self {
        Self {
            service_id: payload.service_id,
            name: payload.name,
            description: payload.description,
            service_type: payload.service_type,
            endpoints: into_endpoint_map(payload.endpoints),
            required_inputs: into_container(payload.required_inputs),
            provided_outputs: into_container(payload.provided_outputs),
            status: EntityStatus::Online,
            registration_timestamp: now,
            last_update: now,
        }
    }

    fn from_record(record: Value) -> Result<Self> {
        let record: ServiceRecord = serde_json::from_value(record)
            .map_err(|e| CatalogError::ValidationError(format!("invalid service record: {}", e)))?;
        require_non_empty("service_id", &record.service_id)?;
        require_non_empty("service_type", &record.service_type)?;
        require_container("required_inputs", &Some(record.required_inputs.clone()))?;
        require_container("provided_outputs", &Some(record.provided_outputs.clone()))?;
        check_timestamp_order(record.registration_timestamp, record.last_update)?;
        Ok(record)
    }

    fn to_record(&self) -> Result<Value> {
        render_record(self, self.last_update)
    }

    fn id(&self) -> &str {
        &self.service_id
    }

    fn type_tag(&self) -> &str {
        &self.service_type
    }

    fn status(&self) -> EntityStatus {
        self.status
    }

    fn set_status(&mut self, status: EntityStatus) {
        self.status = status;
    }

    fn registration_timestamp(&self) -> DateTime<Utc> {
        self.registration_timestamp
    }

    fn set_registration_timestamp(&mut self, instant: DateTime<Utc>) {
        self.registration_timestamp = instant;
    }

    fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update = now;
        self.status = EntityStatus::Online;
    }

    fn apply_patch(&mut self, patch: ServicePatch) {
        if let Some(name) = patch.name {
            self.name = Some(name);
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        merge_endpoints(&mut self.endpoints, patch.endpoints);
        if let Some(required_inputs) = patch.required_inputs {
            self.required_inputs = required_inputs;
        }
        if let Some(provided_outputs) = patch.provided_outputs {
            self.provided_outputs = provided_outputs;
        }
    }
}

fn empty_list() -> Value {
    Value::Array(Vec::new())
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CatalogError::ValidationError(format!(
            "field '{}' must be a non-empty string",
            field
        )));
    }
    Ok(())
}

fn require_mapping(field: &str, value: &Option<Value>) -> Result<()> {
    match value {
        None | Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(CatalogError::ValidationError(format!(
            "field '{}' must be a mapping",
            field
        ))),
    }
}

fn require_container(field: &str, value: &Option<Value>) -> Result<()> {
    match value {
        None | Some(Value::Object(_)) | Some(Value::Array(_)) => Ok(()),
        Some(_) => Err(CatalogError::ValidationError(format!(
            "field '{}' must be a mapping or a sequence",
            field
        ))),
    }
}

fn check_timestamp_order(registered: DateTime<Utc>, updated: DateTime<Utc>) -> Result<()> {
    if registered > updated {
        return Err(CatalogError::ValidationError(
            "registration_timestamp must not exceed last_update".to_string(),
        ));
    }
    Ok(())
}

fn into_endpoint_map(value: Option<Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn into_container(value: Option<Value>) -> Value {
    match value {
        Some(v @ Value::Object(_)) | Some(v @ Value::Array(_)) => v,
        _ => empty_list(),
    }
}

fn merge_endpoints(target: &mut Map<String, Value>, update: Option<Value>) {
    if let Some(Value::Object(update)) = update {
        for (protocol, address) in update {
            target.insert(protocol, address);
        }
    }
}

fn render_record<R: Serialize>(record: &R, last_update: DateTime<Utc>) -> Result<Value> {
    let mut value = serde_json::to_value(record)
        .map_err(|e| CatalogError::InternalError(format!("record serialization failed: {}", e)))?;
    if let Value::Object(ref mut map) = value {
        map.insert(
            "last_update_formatted".to_string(),
            Value::String(last_update.format(DISPLAY_TIME_FORMAT).to_string()),
        );
    }
    Ok(value)
}
