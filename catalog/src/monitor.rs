//! Background liveness scanning.
//!
//! On a fixed interval the monitor snapshots the catalog and ages every
//! entity through the status state machine: online entities past
//! `stale_after` go stale, entities past `offline_after` go offline, and
//! (when eviction is enabled) offline entities past `evict_after` are
//! removed entirely. Transitions back to online only ever happen through a
//! register or heartbeat, never here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{CatalogConfig, CatalogError, CatalogRecord, EntityKind, EntityStatus, Result};
use log::{debug, error, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::registry::{Catalog, CatalogStore, ScanOutcome, StatusDecision};

/// Hook invoked with `(kind, id, old_status, new_status)` after every
/// committed transition; external subscribers build alerting on top.
pub type StatusObserver = Arc<dyn Fn(EntityKind, &str, EntityStatus, EntityStatus) + Send + Sync>;

pub struct LivenessMonitor {
    catalog: Arc<Catalog>,
    config: CatalogConfig,
    observer: Option<StatusObserver>,
}

/// Handle to a spawned monitor task.
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signals the scan task and awaits its clean exit. The task finishes or
    /// abandons its current tick and performs no further writes.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Liveness monitor task did not shut down cleanly: {}", e);
        }
    }
}

impl LivenessMonitor {
    pub fn new(catalog: Arc<Catalog>, config: CatalogConfig) -> Self {
        Self {
            catalog,
            config,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: StatusObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Starts the recurring scan task. Dropping the returned handle without
    /// calling [`MonitorHandle::shutdown`] also stops the task.
    pub fn spawn(self) -> MonitorHandle {
        let (shutdown, mut signal) = watch::channel(false);
        info!(
            "Liveness monitor starting (scan interval {:?}, stale after {:?}, offline after {:?}, eviction {})",
            self.config.scan_interval,
            self.config.stale_after,
            self.config.offline_after,
            match self.config.evict_after {
                Some(after) => format!("after {:?}", after),
                None => "disabled".to_string(),
            }
        );
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.scan_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.scan_once(Utc::now()),
                    _ = signal.changed() => {
                        info!("Liveness monitor shutting down");
                        break;
                    }
                }
            }
        });
        MonitorHandle { shutdown, task }
    }

    /// One full pass over both namespaces, evaluating ages against `now`.
    pub fn scan_once(&self, now: DateTime<Utc>) {
        self.scan_store(self.catalog.devices(), now);
        self.scan_store(self.catalog.services(), now);
    }

    fn scan_store<R: CatalogRecord>(&self, store: &CatalogStore<R>, now: DateTime<Utc>) {
        let snapshot = store.snapshot();
        let assessed = snapshot.len();
        for record in snapshot {
            let id = record.id().to_string();
            match store.update_status(&id, |current| self.assess(current, now)) {
                Ok(ScanOutcome::Unchanged) => {}
                Ok(ScanOutcome::Transitioned { from, to }) => {
                    info!("{} '{}' transitioned {} -> {}", R::KIND, id, from, to);
                    if let Some(observer) = &self.observer {
                        observer(R::KIND, &id, from, to);
                    }
                }
                Ok(ScanOutcome::Evicted { last_status }) => {
                    info!(
                        "Evicted {} '{}' (was {}, silent past the eviction window)",
                        R::KIND,
                        id,
                        last_status
                    );
                }
                // one bad record must not abort the rest of the scan
                Err(e) => error!("Skipping {} '{}' during liveness scan: {}", R::KIND, id, e),
            }
        }
        debug!("Liveness scan assessed {} {} record(s)", assessed, R::KIND);
    }

    fn assess<R: CatalogRecord>(&self, record: &R, now: DateTime<Utc>) -> Result<StatusDecision> {
        if record.registration_timestamp() > record.last_update() {
            return Err(CatalogError::InternalError(format!(
                "{} '{}' has registration_timestamp after last_update",
                R::KIND,
                record.id()
            )));
        }
        // negative age: the record was refreshed after this scan began
        let Ok(age) = (now - record.last_update()).to_std() else {
            return Ok(StatusDecision::Keep);
        };
        let status = record.status();
        if let (Some(evict_after), EntityStatus::Offline) = (self.config.evict_after, status) {
            if age > evict_after {
                return Ok(StatusDecision::Evict);
            }
        }
        match status {
            EntityStatus::Offline => Ok(StatusDecision::Keep),
            EntityStatus::Online | EntityStatus::Stale if age > self.config.offline_after => {
                Ok(StatusDecision::Transition(EntityStatus::Offline))
            }
            EntityStatus::Online if age > self.config.stale_after => {
                Ok(StatusDecision::Transition(EntityStatus::Stale))
            }
            _ => Ok(StatusDecision::Keep),
        }
    }
}
