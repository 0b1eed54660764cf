use crate::cache::Annotation;
use crate::models::RecordKey;

/// One contiguous replacement in the visible sequence: `removed` items at `start`
/// were replaced by `added` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListChange {
    pub start: usize,
    pub removed: usize,
    pub added: usize,
}

impl ListChange {
    pub fn insert(start: usize, added: usize) -> Self {
        Self { start, removed: 0, added }
    }

    pub fn remove(start: usize, removed: usize) -> Self {
        Self { start, removed, added: 0 }
    }
}

/// Typed change on a single entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryChange {
    /// The payload went from unloaded to loaded
    PayloadLoaded,
    Annotated(Annotation),
}

/// Notifications emitted by a window, in mutation order.
/// The window's length already reflects a change when its event is received.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    ItemsChanged(ListChange),
    PendingChanged { count: usize },
    EntryChanged { key: RecordKey, change: EntryChange },
}
