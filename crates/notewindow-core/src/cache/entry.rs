use std::sync::Arc;

use tracing::trace;

use crate::events::EntryChange;
use crate::models::{AuthorProfile, Payload, RawRecord, RecordKey, SocialCounts, ThreadInfo};
use crate::store::{with_read, StoreGateway};

/// Collaborator-provided state on an entry. Never loaded from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Thread(ThreadInfo),
    Counts(SocialCounts),
    Liked(bool),
    Muted(bool),
    /// Inserted outside the visible range: render without an insert animation
    SkipAnimation(bool),
    /// Moved in by a pending flush: render with a reveal transition
    Revealing(bool),
    Profile(Arc<AuthorProfile>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    pub thread: Option<ThreadInfo>,
    pub counts: SocialCounts,
    pub liked: bool,
    pub muted: bool,
    pub skip_animation: bool,
    pub revealing: bool,
    pub profile: Option<Arc<AuthorProfile>>,
}

/// Result of one payload load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    AlreadyLoaded,
    /// Loaded by this call
    Loaded,
    /// No read transaction was available; try again on a later bind
    Busy,
    /// The store has no record for this key
    Missing,
}

impl LoadOutcome {
    pub fn is_loaded(self) -> bool {
        matches!(self, Self::AlreadyLoaded | Self::Loaded)
    }
}

/// One lazily loaded event, identified by its store key.
///
/// The payload goes from unloaded to loaded once and is never replaced afterwards.
/// Annotations change freely and report what changed.
#[derive(Debug, Clone)]
pub struct EventEntry {
    key: RecordKey,
    created_at_hint: Option<u64>,
    payload: Option<Payload>,
    annotations: Annotations,
}

impl EventEntry {
    /// Never touches the store. `created_at_hint` lets the entry be ordered before it loads.
    pub fn new(key: RecordKey, created_at_hint: Option<u64>) -> Self {
        Self {
            key,
            created_at_hint,
            payload: None,
            annotations: Annotations::default(),
        }
    }

    pub fn key(&self) -> RecordKey {
        self.key
    }

    /// Sort key: payload time when loaded, the creation hint otherwise, 0 if neither.
    pub fn created_at(&self) -> u64 {
        match &self.payload {
            Some(payload) => payload.created_at,
            None => self.created_at_hint.unwrap_or(0),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.payload.is_some()
    }

    /// The payload if already resident. Never touches the store.
    pub fn loaded(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Single non-blocking load attempt: one read transaction, no retry, no sleep.
    pub fn load<G: StoreGateway>(&mut self, store: &G) -> LoadOutcome {
        if self.payload.is_some() {
            return LoadOutcome::AlreadyLoaded;
        }

        let key = self.key;
        match with_read(store, |scope| scope.lookup(key)) {
            Ok(Some(record)) => {
                self.populate(&record);
                LoadOutcome::Loaded
            }
            Ok(None) => LoadOutcome::Missing,
            Err(err) => {
                trace!("payload for {} not loaded: {}", key, err);
                LoadOutcome::Busy
            }
        }
    }

    /// The payload, loading it with a single attempt if needed. `None` means still unloaded.
    pub fn payload<G: StoreGateway>(&mut self, store: &G) -> Option<&Payload> {
        self.load(store);
        self.payload.as_ref()
    }

    /// Fill the payload from a record read in a caller-owned transaction.
    /// Returns false, and leaves the entry untouched, if it was already loaded.
    pub fn populate(&mut self, record: &RawRecord) -> bool {
        if self.payload.is_some() {
            return false;
        }
        self.payload = Some(Payload::from_record(record));
        true
    }

    /// NIP-40. Unloaded entries are not considered expired.
    pub fn is_expired(&self, now: u64) -> bool {
        self.payload.as_ref().is_some_and(|p| p.is_expired(now))
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// In-memory only. Returns the change when the value actually differed.
    pub fn set_annotation(&mut self, annotation: Annotation) -> Option<EntryChange> {
        let a = &mut self.annotations;
        let changed = match &annotation {
            Annotation::Thread(info) => replace(&mut a.thread, Some(*info)),
            Annotation::Counts(counts) => replace(&mut a.counts, *counts),
            Annotation::Liked(v) => replace(&mut a.liked, *v),
            Annotation::Muted(v) => replace(&mut a.muted, *v),
            Annotation::SkipAnimation(v) => replace(&mut a.skip_animation, *v),
            Annotation::Revealing(v) => replace(&mut a.revealing, *v),
            Annotation::Profile(profile) => replace(&mut a.profile, Some(profile.clone())),
        };
        changed.then_some(EntryChange::Annotated(annotation))
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
