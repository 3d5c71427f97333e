use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::debug;

use crate::error::StoreError;
use crate::pagination::{recompute_after_insertion, recompute_after_removal, Pagination};
use crate::types::{temp_id, Entity};

/// The mutation kinds a collection tracks, plus `Fetch` for list loads.
/// Loading flags are scoped per operation so one in-flight request never
/// blocks unrelated actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Fetch,
    Create,
    Update,
    StatusChange,
    Delete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingFlags {
    pub fetching: bool,
    pub creating: bool,
    pub updating: bool,
    pub changing_status: bool,
    pub deleting: bool,
}

impl LoadingFlags {
    fn set(&mut self, operation: Operation, on: bool) {
        match operation {
            Operation::Fetch => self.fetching = on,
            Operation::Create => self.creating = on,
            Operation::Update => self.updating = on,
            Operation::StatusChange => self.changing_status = on,
            Operation::Delete => self.deleting = on,
        }
    }
}

/// One in-flight optimistic mutation. At most one record exists per
/// entity; a second mutation on the same entity supersedes the patch but
/// keeps the snapshot captured at the first apply, so rollback always
/// restores the true pre-mutation state.
#[derive(Debug, Clone)]
struct OperationRecord<T> {
    key: String,
    kind: Operation,
    snapshot: Option<T>,
    /// Index in `items` at apply time, for positional restore.
    position: usize,
    /// False when the entity was only loaded in the detail view.
    in_list: bool,
    /// The optimistic patch pushed the entity out of this filtered view.
    evicted: bool,
    summary_deltas: Vec<(String, f64)>,
    #[allow(dead_code)]
    applied_at: DateTime<Utc>,
}

type ViewPredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// A paginated, filterable collection of one entity type with optimistic
/// mutation tracking.
///
/// List view and detail view are dual-written: an optimistic patch is
/// never visible in one but not the other. All pagination changes go
/// through the pure recompute helpers in [`crate::pagination`].
pub struct CollectionState<T: Entity> {
    pub items: Vec<T>,
    pub pagination: Pagination,
    /// Last-applied query parameters, reused on refetch.
    pub filters: HashMap<String, String>,
    /// Currently opened entity, if any.
    pub detail: Option<T>,
    /// Derived aggregates reported by the list endpoint (e.g. an
    /// instructor's available balance on the payout list).
    pub summary: HashMap<String, f64>,
    pub loading: LoadingFlags,
    /// Last mutation error, cleared when the next attempt starts.
    pub error: Option<String>,
    view: Option<ViewPredicate<T>>,
    pending: Vec<OperationRecord<T>>,
}

impl<T: Entity> Default for CollectionState<T> {
    fn default() -> Self {
        Self::new(20)
    }
}

impl<T: Entity> CollectionState<T> {
    pub fn new(limit: u32) -> Self {
        Self {
            items: Vec::new(),
            pagination: Pagination::empty(limit),
            filters: HashMap::new(),
            detail: None,
            summary: HashMap::new(),
            loading: LoadingFlags::default(),
            error: None,
            view: None,
            pending: Vec::new(),
        }
    }

    /// Restrict this collection to a filtered view (e.g. "pending review
    /// only"). Entities whose optimistic or authoritative state stops
    /// matching are evicted; rollback restores them.
    pub fn with_view<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.view = Some(Arc::new(predicate));
        self
    }

    /// Like [`Self::with_view`] for an already-constructed slice.
    pub fn set_view<F>(&mut self, predicate: F)
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.view = Some(Arc::new(predicate));
    }

    fn rejects(&self, entity: &T) -> bool {
        self.view.as_ref().is_some_and(|view| !view(entity))
    }

    fn detail_matches(&self, id: &str) -> bool {
        self.detail.as_ref().is_some_and(|d| d.id() == id)
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|e| e.id() == id)
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|e| e.id() == id)
    }

    pub fn has_pending(&self, key: &str) -> bool {
        self.pending.iter().any(|op| op.key == key)
    }

    pub fn set_loading(&mut self, operation: Operation, on: bool) {
        self.loading.set(operation, on);
        if on {
            self.error = None;
        }
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn set_detail(&mut self, entity: T) {
        self.detail = Some(entity);
    }

    pub fn clear_detail(&mut self) {
        self.detail = None;
    }

    /// Install an authoritative page from a list fetch. This is a resync
    /// point: outstanding optimistic records refer to positions that no
    /// longer exist, so they are dropped (their late resolutions become
    /// no-ops).
    pub fn apply_page(
        &mut self,
        items: Vec<T>,
        pagination: Pagination,
        filters: HashMap<String, String>,
    ) {
        self.items = items;
        self.pagination = pagination;
        self.filters = filters;
        self.pending.clear();
        self.error = None;
        self.loading.fetching = false;
    }

    /// Clear everything, e.g. when the consumer navigates away. Late
    /// resolutions and rollbacks against the cleared state are no-ops.
    pub fn reset(&mut self) {
        let limit = self.pagination.limit;
        self.items.clear();
        self.pagination = Pagination::empty(limit);
        self.filters.clear();
        self.detail = None;
        self.summary.clear();
        self.loading = LoadingFlags::default();
        self.error = None;
        self.pending.clear();
    }

    fn track(
        &mut self,
        key: String,
        kind: Operation,
        snapshot: Option<T>,
        position: usize,
        in_list: bool,
        evicted: bool,
        applied_at: DateTime<Utc>,
    ) {
        if let Some(existing) = self.pending.iter_mut().find(|op| op.key == key) {
            // Supersede the operation, keep the first snapshot.
            existing.kind = kind;
            existing.evicted = existing.evicted || evicted;
        } else {
            self.pending.push(OperationRecord {
                key,
                kind,
                snapshot,
                position,
                in_list,
                evicted,
                summary_deltas: Vec::new(),
                applied_at,
            });
        }
    }

    /// Insert a provisional entity at the head of the list and track it
    /// under a synthesized temp id, returned to the caller for the later
    /// resolve or rollback.
    pub fn begin_create(&mut self, mut entity: T) -> String {
        self.error = None;
        let now = Utc::now();
        let id = temp_id();
        entity.set_id(id.clone());
        entity.touch(now);
        self.items.insert(0, entity);
        self.pagination = recompute_after_insertion(&self.pagination, 1);
        self.track(id.clone(), Operation::Create, None, 0, true, false, now);
        id
    }

    /// Apply an optimistic patch to the entity with `id`, capturing a
    /// snapshot for rollback. The same patch is mirrored into the detail
    /// view when it shows this entity.
    pub fn begin_update<F>(&mut self, id: &str, patch: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut T),
    {
        self.begin_mutation(id, Operation::Update, patch)
    }

    /// Same mechanics as [`Self::begin_update`], tracked as a status
    /// change so its loading flag is independent.
    pub fn begin_status_change<F>(&mut self, id: &str, patch: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut T),
    {
        self.begin_mutation(id, Operation::StatusChange, patch)
    }

    fn begin_mutation<F>(&mut self, id: &str, kind: Operation, patch: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut T),
    {
        self.error = None;
        let now = Utc::now();
        if let Some(position) = self.position_of(id) {
            let snapshot = self.items[position].clone();
            let item = &mut self.items[position];
            patch(item);
            item.touch(now);
            let updated = item.clone();
            if self.detail_matches(id) {
                self.detail = Some(updated.clone());
            }
            let mut evicted = false;
            if self.rejects(&updated) {
                self.items.remove(position);
                self.pagination = recompute_after_removal(&self.pagination, 1);
                evicted = true;
            }
            self.track(
                id.to_string(),
                kind,
                Some(snapshot),
                position,
                true,
                evicted,
                now,
            );
            Ok(())
        } else if self.detail_matches(id) {
            // Detail-only entity (opened directly, not part of the page).
            let snapshot = self.detail.clone();
            let detail = self.detail.as_mut().ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            patch(detail);
            detail.touch(now);
            self.track(id.to_string(), kind, snapshot, 0, false, false, now);
            Ok(())
        } else {
            Err(StoreError::NotFound(id.to_string()))
        }
    }

    /// Remove the entity optimistically; the full entity is kept as the
    /// snapshot so rollback can restore it in place.
    pub fn begin_delete(&mut self, id: &str) -> Result<(), StoreError> {
        self.error = None;
        let now = Utc::now();
        let position = self
            .position_of(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let snapshot = self.items.remove(position);
        self.pagination = recompute_after_removal(&self.pagination, 1);
        if self.detail_matches(id) {
            self.detail = None;
        }
        self.track(
            id.to_string(),
            Operation::Delete,
            Some(snapshot),
            position,
            true,
            false,
            now,
        );
        Ok(())
    }

    /// Apply a derived-aggregate effect tied to the in-flight mutation
    /// under `key`. The exact amount is recorded so rollback un-applies
    /// it verbatim instead of recomputing.
    pub fn record_summary_delta(
        &mut self,
        key: &str,
        field: &str,
        delta: f64,
    ) -> Result<(), StoreError> {
        let op = self
            .pending
            .iter_mut()
            .find(|op| op.key == key)
            .ok_or_else(|| StoreError::NoPendingOperation(key.to_string()))?;
        op.summary_deltas.push((field.to_string(), delta));
        *self.summary.entry(field.to_string()).or_insert(0.0) += delta;
        Ok(())
    }

    /// Replace the tracked provisional state with the authoritative
    /// entity. Resolving a key whose record was already cleared is a
    /// no-op.
    pub fn resolve(&mut self, key: &str, authoritative: T) {
        let Some(index) = self.pending.iter().position(|op| op.key == key) else {
            debug!("resolve for {key} ignored, no tracked operation");
            return;
        };
        let op = self.pending.remove(index);
        match op.kind {
            Operation::Create => {
                // A push event may have inserted the confirmed entity
                // before this resolution arrived.
                let duplicate = self
                    .items
                    .iter()
                    .any(|e| e.id() == authoritative.id() && e.id() != key);
                if let Some(position) = self.position_of(key) {
                    if duplicate {
                        self.items.remove(position);
                        self.pagination = recompute_after_removal(&self.pagination, 1);
                    } else if self.rejects(&authoritative) {
                        // The only place removal-on-success happens: the
                        // confirmed entity no longer belongs to this view.
                        self.items.remove(position);
                        self.pagination = recompute_after_removal(&self.pagination, 1);
                    } else {
                        self.items[position] = authoritative.clone();
                    }
                } else if !duplicate && !self.rejects(&authoritative) {
                    let position = op.position.min(self.items.len());
                    self.items.insert(position, authoritative.clone());
                    self.pagination = recompute_after_insertion(&self.pagination, 1);
                }
                if self.detail_matches(key) {
                    self.detail = Some(authoritative);
                }
            }
            Operation::Update | Operation::StatusChange => {
                if let Some(position) = self.position_of(key) {
                    if self.rejects(&authoritative) {
                        self.items.remove(position);
                        self.pagination = recompute_after_removal(&self.pagination, 1);
                    } else {
                        self.items[position] = authoritative.clone();
                    }
                } else if op.in_list && op.evicted && !self.rejects(&authoritative) {
                    // Speculatively evicted but the server kept it in
                    // this view after all.
                    let position = op.position.min(self.items.len());
                    self.items.insert(position, authoritative.clone());
                    self.pagination = recompute_after_insertion(&self.pagination, 1);
                }
                if self.detail_matches(key) {
                    self.detail = Some(authoritative);
                }
            }
            Operation::Delete | Operation::Fetch => {}
        }
    }

    /// Confirm an optimistic delete: the entity is already gone from
    /// local state, so only the tracking record is cleared.
    pub fn resolve_delete(&mut self, key: &str) {
        if let Some(index) = self.pending.iter().position(|op| op.key == key) {
            self.pending.remove(index);
        } else {
            debug!("delete resolution for {key} ignored, no tracked operation");
        }
    }

    /// Restore the snapshot captured when the operation was applied.
    /// Rolling back a key whose record was already cleared is a no-op.
    pub fn rollback(&mut self, key: &str) {
        let Some(index) = self.pending.iter().position(|op| op.key == key) else {
            debug!("rollback for {key} ignored, no tracked operation");
            return;
        };
        let op = self.pending.remove(index);
        for (field, delta) in &op.summary_deltas {
            *self.summary.entry(field.clone()).or_insert(0.0) -= delta;
        }
        match op.kind {
            Operation::Create => {
                if let Some(position) = self.position_of(key) {
                    self.items.remove(position);
                    self.pagination = recompute_after_removal(&self.pagination, 1);
                }
                if self.detail_matches(key) {
                    self.detail = None;
                }
            }
            Operation::Update | Operation::StatusChange => {
                if let Some(snapshot) = op.snapshot {
                    if let Some(position) = self.position_of(key) {
                        self.items[position] = snapshot.clone();
                    } else if op.in_list {
                        let position = op.position.min(self.items.len());
                        self.items.insert(position, snapshot.clone());
                        self.pagination = recompute_after_insertion(&self.pagination, 1);
                    }
                    if self.detail_matches(key) {
                        self.detail = Some(snapshot);
                    }
                }
            }
            Operation::Delete => {
                if let Some(snapshot) = op.snapshot {
                    if self.position_of(key).is_none() {
                        let position = op.position.min(self.items.len());
                        self.items.insert(position, snapshot);
                        self.pagination = recompute_after_insertion(&self.pagination, 1);
                    }
                }
            }
            Operation::Fetch => {}
        }
    }

    /// Insert an entity delivered by a push event. Idempotent: an entity
    /// already present (e.g. inserted by an earlier delivery of the same
    /// event, or by a resolved create) is overwritten, never duplicated.
    pub fn insert_from_event(&mut self, entity: T) {
        if self.detail_matches(entity.id()) {
            self.detail = Some(entity.clone());
        }
        if let Some(position) = self.position_of(entity.id()) {
            self.items[position] = entity;
        } else if !self.rejects(&entity) {
            self.items.insert(0, entity);
            self.pagination = recompute_after_insertion(&self.pagination, 1);
        }
    }

    /// Merge an updated entity delivered by a push event into list and
    /// detail views. Entities not currently loaded are skipped.
    pub fn update_from_event(&mut self, entity: T) {
        if self.detail_matches(entity.id()) {
            self.detail = Some(entity.clone());
        }
        if let Some(position) = self.position_of(entity.id()) {
            if self.rejects(&entity) {
                self.items.remove(position);
                self.pagination = recompute_after_removal(&self.pagination, 1);
            } else {
                self.items[position] = entity;
            }
        }
    }

    /// Patch only derived fields on a loaded entity (stat ticks). Skips
    /// silently when the entity is not loaded; safe to call repeatedly.
    pub fn patch_from_event<F>(&mut self, id: &str, patch: F)
    where
        F: FnOnce(&mut T),
    {
        if let Some(position) = self.position_of(id) {
            patch(&mut self.items[position]);
            if self.detail_matches(id) {
                self.detail = Some(self.items[position].clone());
            }
        } else if self.detail_matches(id) {
            if let Some(detail) = self.detail.as_mut() {
                patch(detail);
            }
        }
    }

    /// Remove an entity deleted server-side. Any tracked operation on it
    /// is dropped so a late rollback cannot resurrect it.
    pub fn remove_from_event(&mut self, id: &str) {
        if let Some(position) = self.position_of(id) {
            self.items.remove(position);
            self.pagination = recompute_after_removal(&self.pagination, 1);
        }
        if self.detail_matches(id) {
            self.detail = None;
        }
        self.pending.retain(|op| op.key != id);
    }
}
