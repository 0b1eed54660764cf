use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::{FutureExt, StreamExt};
use nostrdb::{Filter, Ndb, SubscriptionStream, Transaction};
use tracing::{debug, warn};

use super::gateway::{QueryHit, StoreGateway};
use crate::config::CoreConfig;
use crate::constants::kinds;
use crate::error::StoreError;
use crate::models::{
    AuthorProfile, EventId, PubKey, RawRecord, RecordKey, SocialCounts, ViewMode, WindowQuery,
};

/// Upper bound on referencing notes counted per event by `batch_counts`
const COUNT_QUERY_LIMIT: i32 = 5000;

/// Store gateway over nostrdb (memory-mapped LMDB).
#[derive(Clone)]
pub struct NdbGateway {
    ndb: Arc<Ndb>,
}

impl NdbGateway {
    /// Open (or create) the nostrdb store in `config.data_dir`.
    pub fn open(config: &CoreConfig) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&config.data_dir).map_err(StoreError::backend)?;
        let path = config
            .data_dir
            .to_str()
            .ok_or_else(|| StoreError::backend("data directory is not valid UTF-8"))?;

        let ndb = Ndb::new(path, &nostrdb::Config::new()).map_err(StoreError::backend)?;
        debug!("opened nostrdb at {}", path);
        Ok(Self::with_ndb(Arc::new(ndb)))
    }

    /// Share an already-open nostrdb instance
    pub fn with_ndb(ndb: Arc<Ndb>) -> Self {
        Self { ndb }
    }

    pub fn ndb(&self) -> &Arc<Ndb> {
        &self.ndb
    }

    /// Live feed of newly ingested notes matching `query`.
    pub fn subscribe(&self, query: &WindowQuery) -> Result<LiveFeed, StoreError> {
        let filters = live_filters(query);
        let subscription = self.ndb.subscribe(&filters).map_err(StoreError::backend)?;
        let stream = SubscriptionStream::new((*self.ndb).clone(), subscription);
        Ok(LiveFeed { stream })
    }
}

fn timeline_filter(query: &WindowQuery, limit: Option<usize>) -> Filter {
    let mut builder = Filter::new();
    if !query.kinds.is_empty() {
        builder = builder.kinds(query.kinds.iter().map(|k| *k as u64));
    }
    if !query.authors.is_empty() {
        builder = builder.authors(query.authors.iter().map(PubKey::as_bytes));
    }
    if let Some(since) = query.since {
        builder = builder.since(since);
    }
    if let Some(until) = query.until {
        builder = builder.until(until);
    }
    if let Some(limit) = limit {
        builder = builder.limit(limit as u64);
    }
    builder.build()
}

/// Replies are every note whose `#e` references the root.
fn replies_filter(query: &WindowQuery, root: &EventId, limit: Option<usize>) -> Filter {
    let mut builder = Filter::new().event(root.as_bytes());
    if !query.kinds.is_empty() {
        builder = builder.kinds(query.kinds.iter().map(|k| *k as u64));
    }
    if let Some(since) = query.since {
        builder = builder.since(since);
    }
    if let Some(until) = query.until {
        builder = builder.until(until);
    }
    if let Some(limit) = limit {
        builder = builder.limit(limit as u64);
    }
    builder.build()
}

fn root_filter(root: &EventId) -> Filter {
    Filter::new().ids([root.as_bytes()]).limit(1).build()
}

fn live_filters(query: &WindowQuery) -> Vec<Filter> {
    match query.mode {
        ViewMode::Timeline => vec![timeline_filter(query, None)],
        ViewMode::Thread { root } => vec![root_filter(&root), replies_filter(query, &root, None)],
    }
}

impl NdbGateway {
    fn run_query(
        &self,
        txn: &Transaction,
        filter: Filter,
        limit: usize,
        hits: &mut Vec<QueryHit>,
    ) -> Result<(), StoreError> {
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);
        let results = self
            .ndb
            .query(txn, std::slice::from_ref(&filter), limit)
            .map_err(StoreError::backend)?;
        hits.extend(results.iter().map(|r| QueryHit {
            key: r.note_key.into(),
            created_at: r.note.created_at(),
        }));
        Ok(())
    }
}

impl StoreGateway for NdbGateway {
    type Txn<'a> = Transaction;

    fn begin_read(&self) -> Result<Transaction, StoreError> {
        Transaction::new(&self.ndb).map_err(|err| {
            warn!("failed to open read transaction: {}", err);
            StoreError::Busy
        })
    }

    fn lookup_by_key(&self, txn: &Transaction, key: RecordKey) -> Option<RawRecord> {
        let note = self.ndb.get_note_by_key(txn, key.into()).ok()?;
        Some(RawRecord::from_note(&note))
    }

    fn query(
        &self,
        txn: &Transaction,
        query: &WindowQuery,
        limit: usize,
    ) -> Result<Vec<QueryHit>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut hits = Vec::new();
        match query.mode {
            ViewMode::Timeline => {
                self.run_query(txn, timeline_filter(query, Some(limit)), limit, &mut hits)?;
            }
            ViewMode::Thread { root } => {
                // The root is always part of its thread, however old it is
                self.run_query(txn, root_filter(&root), 1, &mut hits)?;
                self.run_query(txn, replies_filter(query, &root, Some(limit)), limit, &mut hits)?;
            }
        }

        let mut seen = HashSet::new();
        hits.retain(|hit| seen.insert(hit.key));
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.key.cmp(&a.key)));
        if !query.is_thread() {
            hits.truncate(limit);
        }
        Ok(hits)
    }

    fn batch_counts(&self, txn: &Transaction, ids: &[EventId]) -> HashMap<EventId, SocialCounts> {
        let counted_kinds = [
            kinds::REACTION as u64,
            kinds::REPOST as u64,
            kinds::TEXT_NOTE as u64,
            kinds::COMMENT as u64,
            kinds::ZAP_RECEIPT as u64,
        ];

        let mut result = HashMap::new();
        for id in ids {
            let filter = Filter::new()
                .kinds(counted_kinds)
                .event(id.as_bytes())
                .build();
            let results = match self.ndb.query(txn, &[filter], COUNT_QUERY_LIMIT) {
                Ok(results) => results,
                Err(err) => {
                    debug!("count query failed for {}: {}", id.short_hex(16), err);
                    continue;
                }
            };

            let mut counts = SocialCounts::default();
            for r in &results {
                counts.tally(&RawRecord::from_note(&r.note));
            }
            if !counts.is_empty() {
                result.insert(*id, counts);
            }
        }
        result
    }

    fn lookup_profile(&self, txn: &Transaction, pubkey: &PubKey) -> Option<AuthorProfile> {
        let profile = self.ndb.get_profile_by_pubkey(txn, pubkey.as_bytes()).ok()?;
        let record = profile.record();
        let data = record.profile()?;
        let owned = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_string);
        Some(AuthorProfile {
            display_name: owned(data.display_name()),
            name: owned(data.name()),
            picture: owned(data.picture()),
            nip05: owned(data.nip05()),
        })
    }
}

/// Subscription on newly ingested notes. Polled without blocking from the UI loop;
/// each batch goes to `EventWindow::push_live_batch`.
pub struct LiveFeed {
    stream: SubscriptionStream,
}

impl LiveFeed {
    /// Next batch of keys if one is ready, `None` otherwise.
    pub fn poll_keys(&mut self) -> Option<Vec<RecordKey>> {
        let keys = self.stream.next().now_or_never().flatten()?;
        Some(keys.into_iter().map(RecordKey::from).collect())
    }

    /// Wait for the next batch (off the UI loop).
    pub async fn next_keys(&mut self) -> Option<Vec<RecordKey>> {
        let keys = self.stream.next().await?;
        Some(keys.into_iter().map(RecordKey::from).collect())
    }
}
