//! Read transaction discipline
//!
//! All store reads from the window and the entries go through a `ReadScope`: one
//! non-blocking `begin_read` attempt, then `end_read` when the scope drops. A scope
//! never escapes the call that opened it.

use std::collections::HashMap;

use tracing::trace;

use super::gateway::{QueryHit, StoreGateway};
use crate::error::StoreError;
use crate::models::{AuthorProfile, EventId, PubKey, RawRecord, RecordKey, SocialCounts, WindowQuery};

/// An open read transaction, closed on drop.
pub struct ReadScope<'s, G: StoreGateway> {
    store: &'s G,
    txn: Option<G::Txn<'s>>,
}

impl<'s, G: StoreGateway> ReadScope<'s, G> {
    /// Single attempt; a busy store is reported, never waited on.
    pub fn begin(store: &'s G) -> Result<Self, StoreError> {
        let txn = store.begin_read()?;
        Ok(Self {
            store,
            txn: Some(txn),
        })
    }

    pub fn lookup(&self, key: RecordKey) -> Option<RawRecord> {
        let txn = self.txn.as_ref()?;
        self.store.lookup_by_key(txn, key)
    }

    pub fn query(&self, query: &WindowQuery, limit: usize) -> Result<Vec<QueryHit>, StoreError> {
        let txn = self.txn.as_ref().ok_or(StoreError::Busy)?;
        self.store.query(txn, query, limit)
    }

    pub fn batch_counts(&self, ids: &[EventId]) -> HashMap<EventId, SocialCounts> {
        match self.txn.as_ref() {
            Some(txn) => self.store.batch_counts(txn, ids),
            None => HashMap::new(),
        }
    }

    pub fn profile(&self, pubkey: &PubKey) -> Option<AuthorProfile> {
        let txn = self.txn.as_ref()?;
        self.store.lookup_profile(txn, pubkey)
    }
}

impl<G: StoreGateway> Drop for ReadScope<'_, G> {
    fn drop(&mut self) {
        if let Some(txn) = self.txn.take() {
            self.store.end_read(txn);
        }
    }
}

/// Run `f` inside exactly one begin/end pair.
pub fn with_read<'s, G, R>(
    store: &'s G,
    f: impl FnOnce(&ReadScope<'s, G>) -> R,
) -> Result<R, StoreError>
where
    G: StoreGateway,
{
    let scope = ReadScope::begin(store).inspect_err(|err| {
        if err.is_busy() {
            trace!("read transaction unavailable");
        }
    })?;
    Ok(f(&scope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryGateway;

    #[test]
    fn test_scope_closes_transaction() {
        let store = MemoryGateway::new();
        {
            let scope = ReadScope::begin(&store).unwrap();
            assert_eq!(store.open_transactions(), 1);
            assert!(scope.lookup(RecordKey::new(1)).is_none());
        }
        assert_eq!(store.open_transactions(), 0);
        assert_eq!(store.transactions_opened(), 1);
    }

    #[test]
    fn test_with_read_reports_busy() {
        let store = MemoryGateway::new();
        store.set_busy(true);
        let result = with_read(&store, |_| 1);
        assert_eq!(result, Err(StoreError::Busy));
        assert_eq!(store.transactions_opened(), 0);

        store.set_busy(false);
        assert_eq!(with_read(&store, |_| 1), Ok(1));
        assert_eq!(store.open_transactions(), 0);
    }
}
