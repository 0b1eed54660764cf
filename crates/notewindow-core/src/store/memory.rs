//! In-memory store gateway for tests and demos

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::gateway::{QueryHit, StoreGateway};
use crate::error::StoreError;
use crate::models::{AuthorProfile, EventId, PubKey, RawRecord, RecordKey, SocialCounts, WindowQuery};

#[derive(Default)]
struct Records {
    by_key: BTreeMap<RecordKey, RawRecord>,
    by_id: HashMap<EventId, RecordKey>,
}

/// Thread-safe store gateway backed by a map.
///
/// `set_busy(true)` makes every `begin_read` fail with `StoreError::Busy`, the way a
/// contended store behaves. `set_failing_queries(true)` lets transactions open but makes
/// `query` fail with a backend error. Transaction counters let tests assert the read discipline.
#[derive(Default)]
pub struct MemoryGateway {
    records: RwLock<Records>,
    profiles: RwLock<HashMap<PubKey, AuthorProfile>>,
    next_key: AtomicU64,
    busy: AtomicBool,
    failing_queries: AtomicBool,
    opened: AtomicUsize,
    open: AtomicUsize,
}

/// Read token of a `MemoryGateway`.
pub struct MemoryTxn<'a> {
    gateway: &'a MemoryGateway,
}

impl Drop for MemoryTxn<'_> {
    fn drop(&mut self) {
        self.gateway.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record, returning its key. Re-inserting an id returns the existing key.
    pub fn insert(&self, record: RawRecord) -> RecordKey {
        let mut records = self.records.write();
        if let Some(key) = records.by_id.get(&record.id) {
            return *key;
        }
        let key = RecordKey::new(self.next_key.fetch_add(1, Ordering::SeqCst) + 1);
        records.by_id.insert(record.id, key);
        records.by_key.insert(key, record);
        key
    }

    pub fn set_profile(&self, pubkey: PubKey, profile: AuthorProfile) {
        self.profiles.write().insert(pubkey, profile);
    }

    pub fn key_for(&self, id: &EventId) -> Option<RecordKey> {
        self.records.read().by_id.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.records.read().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    pub fn set_failing_queries(&self, failing: bool) {
        self.failing_queries.store(failing, Ordering::SeqCst);
    }

    /// Transactions opened since creation.
    pub fn transactions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Transactions currently open.
    pub fn open_transactions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

fn references(record: &RawRecord, id_hex: &str) -> bool {
    record
        .tags_named("e")
        .any(|t| t.get(1).is_some_and(|v| v == id_hex))
}

impl StoreGateway for MemoryGateway {
    type Txn<'a> = MemoryTxn<'a>;

    fn begin_read(&self) -> Result<MemoryTxn<'_>, StoreError> {
        if self.busy.load(Ordering::SeqCst) {
            return Err(StoreError::Busy);
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryTxn { gateway: self })
    }

    fn lookup_by_key(&self, _txn: &MemoryTxn<'_>, key: RecordKey) -> Option<RawRecord> {
        self.records.read().by_key.get(&key).cloned()
    }

    fn query(
        &self,
        _txn: &MemoryTxn<'_>,
        query: &WindowQuery,
        limit: usize,
    ) -> Result<Vec<QueryHit>, StoreError> {
        if self.failing_queries.load(Ordering::SeqCst) {
            return Err(StoreError::backend("query rejected"));
        }
        let records = self.records.read();
        let mut hits: Vec<QueryHit> = records
            .by_key
            .iter()
            .filter(|(_, record)| query.matches(record))
            .map(|(key, record)| QueryHit {
                key: *key,
                created_at: record.created_at,
            })
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.key.cmp(&a.key)));
        hits.truncate(limit);
        Ok(hits)
    }

    fn batch_counts(&self, _txn: &MemoryTxn<'_>, ids: &[EventId]) -> HashMap<EventId, SocialCounts> {
        let records = self.records.read();
        let mut result = HashMap::new();
        for id in ids {
            let id_hex = id.to_hex();
            let mut counts = SocialCounts::default();
            for record in records.by_key.values().filter(|r| references(r, &id_hex)) {
                counts.tally(record);
            }
            if !counts.is_empty() {
                result.insert(*id, counts);
            }
        }
        result
    }

    fn lookup_profile(&self, _txn: &MemoryTxn<'_>, pubkey: &PubKey) -> Option<AuthorProfile> {
        self.profiles.read().get(pubkey).cloned()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::store::txn::with_read;

    #[test]
    fn test_insert_dedups_by_id() {
        let store = MemoryGateway::new();
        let a = store.insert(note(1, 10));
        let b = store.insert(note(1, 10));
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_query_newest_first_and_limited() {
        let store = MemoryGateway::new();
        for i in 0..10 {
            store.insert(note(i, 100 + i));
        }
        let hits = with_read(&store, |scope| scope.query(&WindowQuery::global(), 3))
            .unwrap()
            .unwrap();
        let times: Vec<u64> = hits.iter().map(|h| h.created_at).collect();
        assert_eq!(times, vec![109, 108, 107]);
    }

    #[test]
    fn test_batch_counts() {
        let store = MemoryGateway::new();
        let target = note(1, 10);
        let target_id = target.id;
        store.insert(target);
        store.insert(reaction(2, target_id));
        store.insert(reaction(3, target_id));
        store.insert(reply(4, 20, target_id, target_id));

        let counts = with_read(&store, |scope| scope.batch_counts(&[target_id, event_id(99)])).unwrap();
        let c = counts.get(&target_id).copied().unwrap();
        assert_eq!(c.likes, 2);
        assert_eq!(c.replies, 1);
        assert!(!counts.contains_key(&event_id(99)));
    }
}
