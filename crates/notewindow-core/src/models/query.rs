use serde::{Deserialize, Serialize};

use super::ids::{EventId, PubKey};
use super::record::RawRecord;
use crate::constants::{kinds, DEFAULT_QUERY_LIMIT};

/// How a window orders its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViewMode {
    /// Newest first
    #[default]
    Timeline,
    /// Root first, then replies nested under their parents by time
    Thread { root: EventId },
}

/// Query descriptor of a window: kind filter, author filter, time bounds and size cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowQuery {
    /// Empty means any kind
    pub kinds: Vec<u32>,
    /// Empty means any author
    pub authors: Vec<PubKey>,
    pub since: Option<u64>,
    pub until: Option<u64>,
    pub limit: usize,
    pub mode: ViewMode,
}

impl Default for WindowQuery {
    fn default() -> Self {
        Self::global()
    }
}

impl WindowQuery {
    /// Global timeline of notes and reposts.
    pub fn global() -> Self {
        Self {
            kinds: kinds::TIMELINE.to_vec(),
            authors: Vec::new(),
            since: None,
            until: None,
            limit: DEFAULT_QUERY_LIMIT,
            mode: ViewMode::Timeline,
        }
    }

    pub fn for_author(pubkey: PubKey) -> Self {
        Self {
            authors: vec![pubkey],
            ..Self::global()
        }
    }

    /// Root note plus every reply that references it.
    pub fn thread(root: EventId) -> Self {
        Self {
            kinds: kinds::REPLIES.to_vec(),
            mode: ViewMode::Thread { root },
            ..Self::global()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = u32>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    pub fn with_since(mut self, since: u64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: u64) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_thread(&self) -> bool {
        matches!(self.mode, ViewMode::Thread { .. })
    }

    pub fn thread_root(&self) -> Option<EventId> {
        match self.mode {
            ViewMode::Thread { root } => Some(root),
            ViewMode::Timeline => None,
        }
    }

    /// Whether a record belongs in a window with this descriptor.
    /// Applied to live arrivals, which are not pre-filtered by the store.
    pub fn matches(&self, record: &RawRecord) -> bool {
        if let ViewMode::Thread { root } = self.mode {
            if record.id == root {
                return true;
            }
            let root_hex = root.to_hex();
            let references_root = record
                .tags_named("e")
                .any(|t| t.get(1).is_some_and(|v| *v == root_hex));
            if !references_root {
                return false;
            }
        }

        if !self.kinds.is_empty() && !self.kinds.contains(&record.kind) {
            return false;
        }
        if !self.authors.is_empty() && !self.authors.contains(&record.pubkey) {
            return false;
        }
        if self.since.is_some_and(|since| record.created_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| record.created_at > until) {
            return false;
        }
        true
    }
}
