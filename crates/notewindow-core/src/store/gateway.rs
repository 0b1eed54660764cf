use std::collections::HashMap;

use crate::error::StoreError;
use crate::models::{AuthorProfile, EventId, PubKey, RawRecord, RecordKey, SocialCounts, WindowQuery};

/// One query result: the store key plus the sort key, so a window can place the
/// identity without loading the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryHit {
    pub key: RecordKey,
    pub created_at: u64,
}

/// Read access to the embedded event store.
///
/// Every call takes an open read transaction. Callers go through `store::txn`
/// so that no transaction outlives a single synchronous call chain.
pub trait StoreGateway {
    type Txn<'a>
    where
        Self: 'a;

    /// Single non-blocking attempt. `StoreError::Busy` when no transaction is available.
    fn begin_read(&self) -> Result<Self::Txn<'_>, StoreError>;

    fn end_read(&self, txn: Self::Txn<'_>) {
        drop(txn);
    }

    fn lookup_by_key(&self, txn: &Self::Txn<'_>, key: RecordKey) -> Option<RawRecord>;

    /// Identities matching the descriptor, newest first, at most `limit`.
    fn query(
        &self,
        txn: &Self::Txn<'_>,
        query: &WindowQuery,
        limit: usize,
    ) -> Result<Vec<QueryHit>, StoreError>;

    /// Reaction, repost, reply and zap counters for each id. Ids with nothing are omitted.
    fn batch_counts(&self, txn: &Self::Txn<'_>, ids: &[EventId]) -> HashMap<EventId, SocialCounts>;

    /// Author metadata, if the store holds any.
    fn lookup_profile(&self, _txn: &Self::Txn<'_>, _pubkey: &PubKey) -> Option<AuthorProfile> {
        None
    }
}
