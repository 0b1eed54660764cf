//! Window manager
//!
//! An `EventWindow` owns a bounded, ordered, deduplicated sequence of store keys
//! and the `EventEntry` of every key it knows (visible or pending). Mutations happen
//! on the UI loop only; each one is reported on the change channel after the
//! sequence already reflects it.

pub mod ordering;

use std::collections::HashMap;
use std::ops::Range;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::cache::{Annotation, EventEntry, LoadOutcome};
use crate::config::WindowConfig;
use crate::constants::LOAD_NEWER_MIN_QUERY;
use crate::error::{StoreError, WindowError};
use crate::events::{EntryChange, ListChange, WindowEvent};
use crate::models::{
    AuthorProfile, EventId, PubKey, RawRecord, RecordKey, ThreadInfo, ThreadRefs, WindowQuery,
};
use crate::store::{with_read, QueryHit, StoreGateway};
use ordering::{thread_info_for, thread_position, timeline_position, Placed};

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub struct EventWindow<G: StoreGateway> {
    store: Arc<G>,
    config: WindowConfig,
    query: WindowQuery,
    /// Visible sequence, in mode order
    sequence: Vec<RecordKey>,
    /// Every known identity: visible or pending
    entries: HashMap<RecordKey, EventEntry>,
    /// Live arrivals held back while not anchored, in arrival order
    pending: IndexMap<RecordKey, ()>,
    /// Thread placement, kept apart from entry payloads
    threads: HashMap<RecordKey, ThreadInfo>,
    by_event_id: HashMap<EventId, RecordKey>,
    /// Live keys that arrived while the store was busy
    parked: Vec<RecordKey>,
    anchored: bool,
    visible: Option<Range<usize>>,
    events_tx: Sender<WindowEvent>,
    events_rx: Option<Receiver<WindowEvent>>,
}

impl<G: StoreGateway> EventWindow<G> {
    pub fn new(store: Arc<G>, config: WindowConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            store,
            config,
            query: WindowQuery::global(),
            sequence: Vec::new(),
            entries: HashMap::new(),
            pending: IndexMap::new(),
            threads: HashMap::new(),
            by_event_id: HashMap::new(),
            parked: Vec::new(),
            anchored: true,
            visible: None,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    pub fn with_query(store: Arc<G>, config: WindowConfig, query: WindowQuery) -> Self {
        let mut window = Self::new(store, config);
        window.query = query;
        window
    }

    /// Change channel. Can be taken once.
    pub fn take_events(&mut self) -> Option<Receiver<WindowEvent>> {
        self.events_rx.take()
    }

    pub fn store(&self) -> &Arc<G> {
        &self.store
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    pub fn query(&self) -> &WindowQuery {
        &self.query
    }

    // ===== Observable collection =====

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn item_at(&self, index: usize) -> Option<RecordKey> {
        self.sequence.get(index).copied()
    }

    pub fn keys(&self) -> &[RecordKey] {
        &self.sequence
    }

    pub fn entry(&self, key: RecordKey) -> Option<&EventEntry> {
        self.entries.get(&key)
    }

    pub fn entry_at(&self, index: usize) -> Option<&EventEntry> {
        self.item_at(index).and_then(|key| self.entries.get(&key))
    }

    pub fn position_of(&self, key: RecordKey) -> Option<usize> {
        self.sequence.iter().position(|k| *k == key)
    }

    pub fn contains(&self, key: RecordKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn thread_info(&self, key: RecordKey) -> Option<ThreadInfo> {
        self.threads.get(&key).copied()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_keys(&self) -> impl Iterator<Item = RecordKey> + '_ {
        self.pending.keys().copied()
    }

    pub fn parked_count(&self) -> usize {
        self.parked.len()
    }

    /// Oldest creation time in the window, 0 when empty.
    pub fn oldest_timestamp(&self) -> u64 {
        self.sequence.iter().map(|k| self.time_of(*k)).min().unwrap_or(0)
    }

    /// Newest creation time in the window, 0 when empty.
    pub fn newest_timestamp(&self) -> u64 {
        self.sequence.iter().map(|k| self.time_of(*k)).max().unwrap_or(0)
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    // ===== Viewer state =====

    /// Record whether the viewer sits at the newest edge. Becoming anchored flushes the pending buffer.
    pub fn set_anchored(&mut self, anchored: bool) {
        let was_anchored = self.anchored;
        self.anchored = anchored;
        if anchored && !was_anchored {
            self.flush_pending();
        }
    }

    /// Rows currently on screen. Live inserts outside it skip their insert animation.
    pub fn set_visible_range(&mut self, start: usize, end: usize) {
        self.visible = Some(start..end.max(start));
    }

    // ===== Query =====

    /// Replace the descriptor. A different descriptor clears the window; nothing is pulled.
    pub fn set_query(&mut self, query: WindowQuery) {
        if query == self.query {
            return;
        }
        debug!("window query changed, clearing {} entries", self.sequence.len());
        self.clear();
        self.query = query;
    }

    /// Effective cap on the visible sequence. Thread views are never capped.
    fn cap(&self) -> Option<usize> {
        if self.query.is_thread() {
            None
        } else {
            Some(self.config.cap_for(self.query.limit))
        }
    }

    /// Pull the newest results of the descriptor into the window.
    /// Known identities are ignored. On failure the window is unchanged.
    /// Parked live keys are retried only after the query succeeded.
    pub fn refresh(&mut self) -> Result<usize, WindowError> {
        let query = self.query.clone();
        let limit = self.cap().unwrap_or(query.limit);
        match self.pull(&query, limit, PullOrder::AsReturned) {
            Ok(added) => {
                if !self.parked.is_empty() {
                    self.push_live_batch(&[]);
                }
                self.enforce_cap();
                debug!("refresh added {} entries, window has {}", added, self.sequence.len());
                Ok(added)
            }
            Err(err) => {
                warn!("window refresh failed: {}", err);
                Err(err)
            }
        }
    }

    /// Page past the oldest entry. Not capped.
    ///
    /// The bound is inclusive so unseen notes sharing the oldest timestamp are not
    /// skipped; the known ones at that timestamp are fetched again and deduped.
    pub fn load_older(&mut self, count: usize) -> Result<usize, WindowError> {
        if self.sequence.is_empty() {
            return self.refresh();
        }
        let oldest = self.oldest_timestamp();
        let mut query = self.query.clone();
        query.until = Some(query.until.map_or(oldest, |u| u.min(oldest)));
        let fetch = count.saturating_add(self.known_at(oldest));
        self.pull(&query, fetch, PullOrder::Newest(count))
    }

    /// Page past the newest entry, taking the results adjacent to the current newest edge. Not capped.
    pub fn load_newer(&mut self, count: usize) -> Result<usize, WindowError> {
        if self.sequence.is_empty() {
            return self.refresh();
        }
        let newest = self.newest_timestamp();
        let mut query = self.query.clone();
        query.since = Some(query.since.map_or(newest, |s| s.max(newest)));
        let fetch = count
            .saturating_mul(4)
            .max(LOAD_NEWER_MIN_QUERY)
            .saturating_add(self.known_at(newest));
        self.pull(&query, fetch, PullOrder::ClosestOldest(count))
    }

    /// Identities already in the window at exactly `created_at`.
    fn known_at(&self, created_at: u64) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.created_at() == created_at)
            .count()
    }

    fn pull(&mut self, query: &WindowQuery, limit: usize, order: PullOrder) -> Result<usize, WindowError> {
        let thread_mode = self.query.is_thread();
        let entries = &self.entries;

        let batch = with_read(&*self.store, |scope| -> Result<Vec<(QueryHit, Option<RawRecord>)>, StoreError> {
            let mut hits: Vec<QueryHit> = scope
                .query(query, limit)?
                .into_iter()
                .filter(|hit| !entries.contains_key(&hit.key))
                .collect();
            match order {
                PullOrder::AsReturned => {}
                PullOrder::Newest(count) => hits.truncate(count),
                PullOrder::ClosestOldest(count) => {
                    // Results are newest first; the ones nearest the edge are at the end
                    let skip = hits.len().saturating_sub(count);
                    hits.drain(..skip);
                }
            }
            // Thread placement needs the tags now; timeline entries load lazily
            Ok(hits
                .into_iter()
                .map(|hit| {
                    let record = if thread_mode { scope.lookup(hit.key) } else { None };
                    (hit, record)
                })
                .collect())
        })??;

        Ok(self.ingest_pulled(batch))
    }

    fn ingest_pulled(&mut self, mut batch: Vec<(QueryHit, Option<RawRecord>)>) -> usize {
        let thread_mode = self.query.is_thread();
        if thread_mode {
            // Parents before replies
            batch.sort_by_key(|(hit, _)| (hit.created_at, hit.key));
        }

        let was_empty = self.sequence.is_empty();
        let now = unix_now();
        let mut added = 0;

        for (hit, record) in batch {
            if self.entries.contains_key(&hit.key) {
                continue;
            }
            let mut entry = EventEntry::new(hit.key, Some(hit.created_at));
            if let Some(record) = &record {
                entry.populate(record);
                if entry.is_expired(now) {
                    continue;
                }
            } else if thread_mode {
                trace!("skipping thread hit {} without a record", hit.key);
                continue;
            }

            let index = self.place(entry, record.as_ref());
            added += 1;
            if !was_empty {
                self.emit(WindowEvent::ItemsChanged(ListChange::insert(index, 1)));
            }
        }

        if was_empty && added > 0 {
            self.emit(WindowEvent::ItemsChanged(ListChange::insert(0, added)));
        }
        added
    }

    /// Register an entry and insert it into the sequence at its mode position.
    /// Returns the index. Emits nothing.
    fn place(&mut self, mut entry: EventEntry, record: Option<&RawRecord>) -> usize {
        let key = entry.key();
        let created_at = entry.created_at();

        let index = match (self.query.thread_root(), record) {
            (Some(root), Some(record)) => {
                let parent_index = parent_of(record, root)
                    .and_then(|parent| self.by_event_id.get(&parent))
                    .and_then(|parent_key| self.position_of(*parent_key));
                let parent_depth = parent_index
                    .and_then(|i| self.threads.get(&self.sequence[i]))
                    .map(|info| info.depth);

                let info = thread_info_for(record, root, parent_depth, self.config.max_thread_depth);
                let index = thread_position(&self.sequence, &info, created_at, parent_index, |k| Placed {
                    created_at: self.time_of(k),
                    depth: self.threads.get(&k).map_or(0, |t| t.depth),
                });
                self.threads.insert(key, info);
                entry.set_annotation(Annotation::Thread(info));
                index
            }
            _ => timeline_position(&self.sequence, created_at, |k| self.time_of(k)),
        };

        if let Some(payload) = entry.loaded() {
            self.by_event_id.insert(payload.id, key);
        }
        self.entries.insert(key, entry);
        self.sequence.insert(index, key);
        index
    }

    fn time_of(&self, key: RecordKey) -> u64 {
        self.entries.get(&key).map_or(0, EventEntry::created_at)
    }

    // ===== Live arrivals =====

    /// Single-key form of `push_live_batch`.
    pub fn push_live(&mut self, key: RecordKey) {
        self.push_live_batch(&[key]);
    }

    /// Hand a subscription batch to the window. One read transaction covers the batch;
    /// when the store is busy the keys are parked until the next batch or refresh.
    pub fn push_live_batch(&mut self, keys: &[RecordKey]) {
        let mut batch = std::mem::take(&mut self.parked);
        for key in keys {
            if !batch.contains(key) {
                batch.push(*key);
            }
        }
        batch.retain(|k| !self.entries.contains_key(k));
        if batch.is_empty() {
            return;
        }

        let mut records = match with_read(&*self.store, |scope| {
            batch
                .iter()
                .filter_map(|key| scope.lookup(*key).map(|record| (*key, record)))
                .collect::<Vec<_>>()
        }) {
            Ok(records) => records,
            Err(err) => {
                debug!("parking {} live keys: {}", batch.len(), err);
                self.parked = batch;
                return;
            }
        };

        if self.query.is_thread() {
            records.sort_by_key(|(key, record)| (record.created_at, *key));
        }
        let now = unix_now();
        for (key, record) in records {
            self.accept_live(key, record, now);
        }
    }

    fn accept_live(&mut self, key: RecordKey, record: RawRecord, now: u64) {
        if self.entries.contains_key(&key) || !self.query.matches(&record) {
            return;
        }
        let mut entry = EventEntry::new(key, Some(record.created_at));
        entry.populate(&record);
        if entry.is_expired(now) {
            trace!("ignoring expired live event {}", key);
            return;
        }

        // Thread views never defer
        if self.anchored || self.query.is_thread() {
            let index = self.place(entry, Some(&record));
            let outside_view = self.visible.as_ref().is_some_and(|range| !range.contains(&index));
            if outside_view {
                if let Some(entry) = self.entries.get_mut(&key) {
                    entry.set_annotation(Annotation::SkipAnimation(true));
                }
            }
            self.emit(WindowEvent::ItemsChanged(ListChange::insert(index, 1)));
            self.enforce_cap();
            return;
        }

        self.by_event_id.insert(record.id, key);
        self.entries.insert(key, entry);
        self.pending.insert(key, ());
        while self.pending.len() > self.config.pending_max {
            if let Some((dropped, ())) = self.pending.shift_remove_index(0) {
                self.forget(dropped);
                trace!("pending buffer full, dropped {}", dropped);
            }
        }
        self.emit(WindowEvent::PendingChanged {
            count: self.pending.len(),
        });
    }

    /// Merge every pending identity into the sequence with one aggregate notification.
    pub fn flush_pending(&mut self) -> usize {
        if self.pending.is_empty() {
            return 0;
        }

        let old_len = self.sequence.len();
        let mut keys: Vec<RecordKey> = self.pending.drain(..).map(|(k, ())| k).collect();
        keys.sort_by_key(|k| std::cmp::Reverse(self.time_of(*k)));

        let mut first_affected = old_len;
        for key in &keys {
            let index = timeline_position(&self.sequence, self.time_of(*key), |k| self.time_of(k));
            self.sequence.insert(index, *key);
            first_affected = first_affected.min(index);
            if let Some(entry) = self.entries.get_mut(key) {
                entry.set_annotation(Annotation::Revealing(true));
            }
        }

        // Trim to the cap before notifying so the flush stays one change
        if let Some(cap) = self.cap() {
            if self.sequence.len() > cap {
                let evicted: Vec<RecordKey> = self.sequence.drain(cap..).collect();
                debug!("flush trimmed {} older entries", evicted.len());
                for key in evicted {
                    self.forget(key);
                }
            }
        }

        let final_len = self.sequence.len();
        let start = first_affected.min(final_len);
        debug!("flushed {} pending entries", keys.len());
        if old_len > start || final_len > start {
            self.emit(WindowEvent::ItemsChanged(ListChange {
                start,
                removed: old_len - start,
                added: final_len - start,
            }));
        }
        self.emit(WindowEvent::PendingChanged { count: 0 });
        keys.len()
    }

    // ===== Eviction =====

    /// Evict from the head (newest side) until `keep_n` remain.
    pub fn trim_newer(&mut self, keep_n: usize) -> usize {
        let len = self.sequence.len();
        if keep_n >= len {
            return 0;
        }
        let removed = len - keep_n;
        let evicted: Vec<RecordKey> = self.sequence.drain(..removed).collect();
        for key in evicted {
            self.forget(key);
        }
        debug!("trimmed {} newer entries", removed);
        self.emit(WindowEvent::ItemsChanged(ListChange::remove(0, removed)));
        removed
    }

    /// Evict from the tail (oldest side) until `keep_n` remain.
    pub fn trim_older(&mut self, keep_n: usize) -> usize {
        let len = self.sequence.len();
        if keep_n >= len {
            return 0;
        }
        let removed = len - keep_n;
        let evicted: Vec<RecordKey> = self.sequence.drain(keep_n..).collect();
        for key in evicted {
            self.forget(key);
        }
        debug!("trimmed {} older entries", removed);
        self.emit(WindowEvent::ItemsChanged(ListChange::remove(keep_n, removed)));
        removed
    }

    fn enforce_cap(&mut self) {
        if let Some(cap) = self.cap() {
            self.trim_older(cap);
        }
    }

    /// Evict one identity, visible or pending. Authorization is the caller's concern.
    pub fn remove(&mut self, key: RecordKey) -> bool {
        if let Some(index) = self.position_of(key) {
            self.sequence.remove(index);
            self.forget(key);
            self.emit(WindowEvent::ItemsChanged(ListChange::remove(index, 1)));
            return true;
        }
        if self.pending.shift_remove(&key).is_some() {
            self.forget(key);
            self.emit(WindowEvent::PendingChanged {
                count: self.pending.len(),
            });
            return true;
        }
        false
    }

    /// Empty everything in one step.
    pub fn clear(&mut self) {
        let prior_len = self.sequence.len();
        let had_pending = !self.pending.is_empty();

        self.sequence.clear();
        self.entries.clear();
        self.pending.clear();
        self.threads.clear();
        self.by_event_id.clear();
        self.parked.clear();

        if prior_len > 0 {
            self.emit(WindowEvent::ItemsChanged(ListChange::remove(0, prior_len)));
        }
        if had_pending {
            self.emit(WindowEvent::PendingChanged { count: 0 });
        }
    }

    fn forget(&mut self, key: RecordKey) {
        if let Some(entry) = self.entries.remove(&key) {
            if let Some(payload) = entry.loaded() {
                if self.by_event_id.get(&payload.id) == Some(&key) {
                    self.by_event_id.remove(&payload.id);
                }
            }
        }
        self.threads.remove(&key);
    }

    // ===== Entries =====

    /// Single-attempt payload load on a window-owned entry.
    ///
    /// A payload that turns out to be expired (NIP-40) evicts the entry and yields `None`,
    /// the same as a key the window no longer holds.
    pub fn load_payload(&mut self, key: RecordKey) -> Option<LoadOutcome> {
        let entry = self.entries.get_mut(&key)?;
        let outcome = entry.load(&*self.store);
        if outcome == LoadOutcome::Loaded {
            if entry.is_expired(unix_now()) {
                debug!("evicting expired entry {}", key);
                self.remove(key);
                return None;
            }
            if let Some(payload) = entry.loaded() {
                self.by_event_id.insert(payload.id, key);
            }
            self.emit(WindowEvent::EntryChanged {
                key,
                change: EntryChange::PayloadLoaded,
            });
        }
        Some(outcome)
    }

    /// Route a collaborator annotation to an entry. Returns whether anything changed.
    pub fn annotate(&mut self, key: RecordKey, annotation: Annotation) -> bool {
        let Some(entry) = self.entries.get_mut(&key) else {
            return false;
        };
        if let Annotation::Thread(info) = &annotation {
            self.threads.insert(key, *info);
        }
        match entry.set_annotation(annotation) {
            Some(change) => {
                self.emit(WindowEvent::EntryChanged { key, change });
                true
            }
            None => false,
        }
    }

    /// Annotate by event id, for collaborators that only know the id.
    pub fn annotate_event(&mut self, id: &EventId, annotation: Annotation) -> bool {
        match self.by_event_id.get(id).copied() {
            Some(key) => self.annotate(key, annotation),
            None => false,
        }
    }

    /// Attach a profile to every loaded entry by `pubkey`. Returns the number of entries changed.
    pub fn apply_profile(&mut self, pubkey: &PubKey, profile: Arc<AuthorProfile>) -> usize {
        let keys: Vec<RecordKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.loaded().is_some_and(|p| p.pubkey == *pubkey))
            .map(|(key, _)| *key)
            .collect();

        keys.into_iter()
            .filter(|key| self.annotate(*key, Annotation::Profile(profile.clone())))
            .count()
    }

    /// Look up the author profile of a loaded entry and attach it to every entry by that author.
    pub fn resolve_profile(&mut self, key: RecordKey) -> Result<bool, StoreError> {
        let Some(pubkey) = self.entries.get(&key).and_then(|e| e.loaded()).map(|p| p.pubkey) else {
            return Ok(false);
        };
        let profile = with_read(&*self.store, |scope| scope.profile(&pubkey))?;
        match profile {
            Some(profile) => Ok(self.apply_profile(&pubkey, Arc::new(profile)) > 0),
            None => Ok(false),
        }
    }

    /// Recount social metadata for the loaded visible entries in one transaction.
    pub fn refresh_counts(&mut self) -> Result<usize, WindowError> {
        let targets: Vec<(RecordKey, EventId)> = self
            .sequence
            .iter()
            .filter_map(|key| self.entries.get(key).and_then(|e| e.loaded()).map(|p| (*key, p.id)))
            .collect();
        if targets.is_empty() {
            return Ok(0);
        }

        let ids: Vec<EventId> = targets.iter().map(|(_, id)| *id).collect();
        let counts = with_read(&*self.store, |scope| scope.batch_counts(&ids))?;

        Ok(targets
            .into_iter()
            .filter(|(key, id)| {
                let counts = counts.get(id).copied().unwrap_or_default();
                self.annotate(*key, Annotation::Counts(counts))
            })
            .count())
    }

    fn emit(&self, event: WindowEvent) {
        let _ = self.events_tx.send(event);
    }
}

#[derive(Debug, Clone, Copy)]
enum PullOrder {
    AsReturned,
    /// Keep only the `n` newest results
    Newest(usize),
    /// Keep only the `n` oldest results
    ClosestOldest(usize),
}

fn parent_of(record: &RawRecord, root: EventId) -> Option<EventId> {
    if record.id == root {
        return None;
    }
    ThreadRefs::from_record(record).parent().or(Some(root))
}

#[cfg(test)]
mod tests;
