use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::Utc;
use common::{CatalogError, CatalogRecord, EntityStatus, Result};
use log::{debug, info};
use parking_lot::RwLock;

/// Filters accepted by [`CatalogStore::list`]. Both are optional and combine
/// conjunctively.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub type_tag: Option<String>,
    pub status: Option<EntityStatus>,
}

/// Verdict produced by a liveness judgement over a single record.
#[derive(Debug)]
pub(crate) enum StatusDecision {
    Keep,
    Transition(EntityStatus),
    Evict,
}

/// What actually happened to a record during a status update.
pub(crate) enum ScanOutcome {
    Unchanged,
    Transitioned { from: EntityStatus, to: EntityStatus },
    Evicted { last_status: EntityStatus },
}

/// Authoritative id -> record mapping for one entity kind.
///
/// All mutations run under the write lock, so concurrent readers never
/// observe a partially applied update; reads hand out snapshot clones that
/// are detached from stored state.
pub struct CatalogStore<R> {
    entries: RwLock<HashMap<String, R>>,
}

impl<R: CatalogRecord> CatalogStore<R> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert-or-update, idempotent by id.
    ///
    /// A fresh id is stamped with `registration_timestamp = last_update = now`
    /// and starts online. Re-registering an existing id must keep the same
    /// type tag (mismatch leaves the original untouched and fails with a
    /// conflict); metadata is replaced wholesale, the original
    /// `registration_timestamp` is preserved, `last_update` is refreshed and
    /// the status resets to online.
    pub fn register(&self, payload: R::Payload) -> Result<R> {
        let record = R::create(payload, Utc::now());
        let mut entries = self.entries.write();
        match entries.entry(record.id().to_string()) {
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                if existing.type_tag() != record.type_tag() {
                    return Err(CatalogError::ConflictError(format!(
                        "{} '{}' is registered with type '{}' and cannot be re-registered as '{}'",
                        R::KIND,
                        record.id(),
                        existing.type_tag(),
                        record.type_tag()
                    )));
                }
                let registered_at = existing.registration_timestamp();
                let mut updated = record;
                updated.set_registration_timestamp(registered_at);
                *existing = updated;
                info!("Re-registered {} '{}'", R::KIND, existing.id());
                Ok(existing.clone())
            }
            Entry::Vacant(slot) => {
                info!("Registered {} '{}'", R::KIND, record.id());
                Ok(slot.insert(record).clone())
            }
        }
    }

    /// Records a liveness signal: refreshes `last_update`, resets the status
    /// to online and merges any optional patch fields in.
    pub fn heartbeat(&self, id: &str, patch: R::Patch) -> Result<R> {
        let mut entries = self.entries.write();
        let record = entries.get_mut(id).ok_or_else(|| not_found::<R>(id))?;
        record.apply_patch(patch);
        record.touch(Utc::now());
        debug!("Heartbeat from {} '{}'", R::KIND, id);
        Ok(record.clone())
    }

    pub fn get(&self, id: &str) -> Result<R> {
        self.entries
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found::<R>(id))
    }

    /// Snapshot of matching records, ordered by `registration_timestamp`
    /// ascending with ties broken by id ascending.
    pub fn list(&self, filter: &ListFilter) -> Vec<R> {
        let mut records: Vec<R> = self
            .entries
            .read()
            .values()
            .filter(|r| filter.type_tag.as_deref().map_or(true, |t| r.type_tag() == t))
            .filter(|r| filter.status.map_or(true, |s| r.status() == s))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.registration_timestamp()
                .cmp(&b.registration_timestamp())
                .then_with(|| a.id().cmp(b.id()))
        });
        records
    }

    /// Permanent removal; there is no soft-delete.
    pub fn deregister(&self, id: &str) -> Result<()> {
        match self.entries.write().remove(id) {
            Some(_) => {
                info!("Deregistered {} '{}'", R::KIND, id);
                Ok(())
            }
            None => Err(not_found::<R>(id)),
        }
    }

    /// Reloads a previously serialized record verbatim, e.g. handed back by
    /// an external persistence collaborator. Timestamps and status are kept
    /// as-is; only the record invariants are re-checked.
    pub fn restore(&self, record: R) -> Result<()> {
        if record.id().trim().is_empty() {
            return Err(CatalogError::ValidationError(format!(
                "cannot restore {} with an empty id",
                R::KIND
            )));
        }
        if record.registration_timestamp() > record.last_update() {
            return Err(CatalogError::ValidationError(format!(
                "cannot restore {} '{}': registration_timestamp exceeds last_update",
                R::KIND,
                record.id()
            )));
        }
        self.entries.write().insert(record.id().to_string(), record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub(crate) fn snapshot(&self) -> Vec<R> {
        self.entries.read().values().cloned().collect()
    }

    /// Applies a liveness judgement to one record under the write lock.
    ///
    /// `judge` sees the record as currently stored, not the scan snapshot, so
    /// a heartbeat committed after the snapshot was taken wins over the scan.
    /// A missing id (deregistered mid-scan) is not an error.
    pub(crate) fn update_status(
        &self,
        id: &str,
        judge: impl FnOnce(&R) -> Result<StatusDecision>,
    ) -> Result<ScanOutcome> {
        let mut entries = self.entries.write();
        let Some(record) = entries.get_mut(id) else {
            return Ok(ScanOutcome::Unchanged);
        };
        match judge(record)? {
            StatusDecision::Keep => Ok(ScanOutcome::Unchanged),
            StatusDecision::Transition(to) => {
                let from = record.status();
                if from == to {
                    return Ok(ScanOutcome::Unchanged);
                }
                record.set_status(to);
                Ok(ScanOutcome::Transitioned { from, to })
            }
            StatusDecision::Evict => {
                let last_status = record.status();
                entries.remove(id);
                Ok(ScanOutcome::Evicted { last_status })
            }
        }
    }
}

impl<R: CatalogRecord> Default for CatalogStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found<R: CatalogRecord>(id: &str) -> CatalogError {
    CatalogError::NotFound(format!("{} '{}'", R::KIND, id))
}
