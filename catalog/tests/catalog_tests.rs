use std::sync::Arc;
use std::time::Duration;

use catalog_server::{Catalog, ListFilter, LivenessMonitor};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use common::{CatalogConfig, CatalogError, DevicePatch, EntityKind, EntityStatus};
use serde_json::{json, Value};

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::new())
}

fn instant(value: &Value) -> DateTime<Utc> {
    serde_json::from_value(value.clone()).unwrap()
}

fn monitor_config() -> CatalogConfig {
    CatalogConfig {
        stale_after: Duration::from_secs(30),
        offline_after: Duration::from_secs(90),
        ..CatalogConfig::default()
    }
}

fn device_payload(id: &str, device_type: &str) -> Value {
    json!({ "device_id": id, "device_type": device_type })
}

// Registering a bare device yields an online record whose timestamps
// coincide and whose opaque fields default to empty containers.
#[test]
fn registration_yields_fresh_online_record() {
    let catalog = catalog();
    let record = catalog
        .register(EntityKind::Device, device_payload("dev-1", "valve"))
        .unwrap();

    assert_eq!(record["device_id"], json!("dev-1"));
    assert_eq!(record["device_type"], json!("valve"));
    assert_eq!(record["status"], json!("online"));
    assert_eq!(record["last_update"], record["registration_timestamp"]);
    assert_eq!(record["endpoints"], json!({}));
    assert_eq!(record["sensors"], json!([]));
    assert!(record["last_update_formatted"].is_string());
}

#[test]
fn registration_rejects_malformed_payloads() {
    let catalog = catalog();

    let err = catalog
        .register(EntityKind::Device, json!({ "device_type": "valve" }))
        .unwrap_err();
    assert!(matches!(err, CatalogError::ValidationError(_)));

    let err = catalog
        .register(
            EntityKind::Device,
            json!({ "device_id": "dev-1", "device_type": "valve", "endpoints": "mqtt" }),
        )
        .unwrap_err();
    assert!(matches!(err, CatalogError::ValidationError(_)));

    // nothing was stored
    assert!(catalog.devices().is_empty());
}

#[test]
fn reregistration_with_mismatched_type_is_rejected() {
    let catalog = catalog();
    catalog
        .register(
            EntityKind::Service,
            json!({ "service_id": "svc-1", "service_type": "telemetry" }),
        )
        .unwrap();

    let err = catalog
        .register(
            EntityKind::Service,
            json!({ "service_id": "svc-1", "service_type": "control" }),
        )
        .unwrap_err();
    assert!(matches!(err, CatalogError::ConflictError(_)));

    let stored = catalog.get(EntityKind::Service, "svc-1").unwrap();
    assert_eq!(stored["service_type"], json!("telemetry"));
}

#[test]
fn reregistration_replaces_metadata_and_keeps_registration_instant() {
    let catalog = catalog();
    let first = catalog
        .register(EntityKind::Device, device_payload("dev-1", "valve"))
        .unwrap();

    std::thread::sleep(Duration::from_millis(5));
    let second = catalog
        .register(
            EntityKind::Device,
            json!({
                "device_id": "dev-1",
                "device_type": "valve",
                "name": "replacement unit"
            }),
        )
        .unwrap();

    assert_eq!(second["registration_timestamp"], first["registration_timestamp"]);
    assert_ne!(second["last_update"], first["last_update"]);
    assert_eq!(second["name"], json!("replacement unit"));
    assert_eq!(catalog.devices().len(), 1);
}

#[test]
fn ids_do_not_conflict_across_kinds() {
    let catalog = catalog();
    catalog
        .register(EntityKind::Device, device_payload("node-1", "gateway"))
        .unwrap();
    catalog
        .register(
            EntityKind::Service,
            json!({ "service_id": "node-1", "service_type": "control" }),
        )
        .unwrap();

    assert!(catalog.get(EntityKind::Device, "node-1").is_ok());
    assert!(catalog.get(EntityKind::Service, "node-1").is_ok());
}

#[test]
fn heartbeat_revives_and_merges_partial_fields() {
    let catalog = catalog();
    let registered = catalog
        .register(
            EntityKind::Device,
            json!({
                "device_id": "dev-1",
                "device_type": "valve",
                "endpoints": { "mqtt": "iot/devices/dev-1" }
            }),
        )
        .unwrap();

    // age the device into offline, then let a heartbeat bring it back
    let monitor = LivenessMonitor::new(Arc::clone(&catalog), monitor_config());
    let last_update = catalog.devices().get("dev-1").unwrap().last_update;
    monitor.scan_once(last_update + ChronoDuration::seconds(91));
    assert_eq!(
        catalog.get(EntityKind::Device, "dev-1").unwrap()["status"],
        json!("offline")
    );

    let updated = catalog
        .heartbeat(
            EntityKind::Device,
            "dev-1",
            json!({ "endpoints": { "http": "http://10.0.0.9" } }),
        )
        .unwrap();

    assert_eq!(updated["status"], json!("online"));
    assert_eq!(updated["registration_timestamp"], registered["registration_timestamp"]);
    assert_eq!(updated["endpoints"]["mqtt"], json!("iot/devices/dev-1"));
    assert_eq!(updated["endpoints"]["http"], json!("http://10.0.0.9"));
}

#[test]
fn heartbeat_for_unknown_id_is_not_found() {
    let catalog = catalog();
    let err = catalog
        .heartbeat(EntityKind::Device, "ghost", Value::Null)
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotFound(_)));
}

// Scenario: only the devices that are currently stale show up, in
// registration order.
#[test]
fn listing_filters_by_kind_and_status() {
    let catalog = catalog();
    catalog
        .register(EntityKind::Device, device_payload("dev-b", "valve"))
        .unwrap();
    std::thread::sleep(Duration::from_millis(5));
    catalog
        .register(EntityKind::Device, device_payload("dev-a", "pump"))
        .unwrap();
    catalog
        .register(
            EntityKind::Service,
            json!({ "service_id": "svc-1", "service_type": "telemetry" }),
        )
        .unwrap();

    let monitor = LivenessMonitor::new(Arc::clone(&catalog), monitor_config());
    let last_update = catalog.devices().get("dev-a").unwrap().last_update;
    monitor.scan_once(last_update + ChronoDuration::seconds(31));

    // dev-a heartbeats back to online; dev-b stays stale
    catalog
        .devices()
        .heartbeat("dev-a", DevicePatch::default())
        .unwrap();

    let stale = catalog
        .list(
            EntityKind::Device,
            &ListFilter {
                type_tag: None,
                status: Some(EntityStatus::Stale),
            },
        )
        .unwrap();
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0]["device_id"], json!("dev-b"));

    // registration order, not id order
    let all = catalog.list(EntityKind::Device, &ListFilter::default()).unwrap();
    let ids: Vec<&str> = all.iter().filter_map(|r| r["device_id"].as_str()).collect();
    assert_eq!(ids, vec!["dev-b", "dev-a"]);
}

#[test]
fn listing_is_idempotent() {
    let catalog = catalog();
    catalog
        .register(EntityKind::Device, device_payload("dev-1", "valve"))
        .unwrap();
    catalog
        .register(EntityKind::Device, device_payload("dev-2", "pump"))
        .unwrap();

    let first = catalog.list(EntityKind::Device, &ListFilter::default()).unwrap();
    let second = catalog.list(EntityKind::Device, &ListFilter::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn deregistration_is_permanent() {
    let catalog = catalog();
    catalog
        .register(EntityKind::Device, device_payload("dev-1", "valve"))
        .unwrap();

    catalog.deregister(EntityKind::Device, "dev-1").unwrap();
    assert!(matches!(
        catalog.get(EntityKind::Device, "dev-1"),
        Err(CatalogError::NotFound(_))
    ));
    assert!(matches!(
        catalog.deregister(EntityKind::Device, "dev-1"),
        Err(CatalogError::NotFound(_))
    ));
}

#[test]
fn timestamps_stay_monotonic_through_every_operation() {
    let catalog = catalog();
    catalog
        .register(EntityKind::Device, device_payload("dev-1", "valve"))
        .unwrap();

    for _ in 0..5 {
        let record = catalog
            .heartbeat(EntityKind::Device, "dev-1", Value::Null)
            .unwrap();
        assert!(instant(&record["registration_timestamp"]) <= instant(&record["last_update"]));
    }
}

#[test]
fn concurrent_callers_never_corrupt_the_store() {
    let catalog = catalog();
    let mut handles = Vec::new();

    for worker in 0..8 {
        let catalog = Arc::clone(&catalog);
        handles.push(std::thread::spawn(move || {
            for i in 0..25 {
                let id = format!("dev-{}-{}", worker, i);
                catalog
                    .register(EntityKind::Device, device_payload(&id, "sensor"))
                    .unwrap();
                catalog.heartbeat(EntityKind::Device, &id, Value::Null).unwrap();
                let listed = catalog
                    .list(EntityKind::Device, &ListFilter::default())
                    .unwrap();
                for record in listed {
                    assert!(
                        instant(&record["registration_timestamp"]) <= instant(&record["last_update"])
                    );
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(catalog.devices().len(), 8 * 25);
}
