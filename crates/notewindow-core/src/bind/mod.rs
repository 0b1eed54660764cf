//! Tiered bind controller
//!
//! Tier 1 runs while a row is recycled and only reads what is already in memory.
//! Tier 2 runs once the row has settled on screen; that is the only place a payload
//! load, a profile lookup or an avatar fetch can start. A Tier 2 result is applied
//! only if the row is still bound to the identity it was scheduled for.

pub mod row;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::cache::{ImageLookup, LoadOutcome, TextureCache, TextureHandle};
use crate::events::WindowEvent;
use crate::models::RecordKey;
use crate::store::StoreGateway;
use crate::window::EventWindow;
pub use row::{format_age, AvatarState, RowModel, PLACEHOLDER_BODY};

/// Identity of a recycled list row widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier2State {
    Scheduled,
    Done,
    Cancelled,
}

/// Handed out by `bind_tier1`; identifies one scheduled Tier 2 pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier2Ticket {
    pub row: RowId,
    pub key: RecordKey,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier2Outcome {
    Applied,
    /// The row was unbound or rebound since the ticket was issued; nothing written
    Stale,
    /// The store was busy; the row stays scheduled and a later call retries
    PayloadUnavailable,
}

#[derive(Debug)]
struct RowBinding {
    key: Option<RecordKey>,
    generation: u64,
    tier2: Tier2State,
    model: RowModel,
}

pub struct BindController {
    rows: HashMap<RowId, RowBinding>,
    textures: Arc<TextureCache>,
    /// Rows waiting on an avatar fetch, by URL
    waiting: HashMap<String, Vec<RowId>>,
}

impl BindController {
    pub fn new(textures: Arc<TextureCache>) -> Self {
        Self {
            rows: HashMap::new(),
            textures,
            waiting: HashMap::new(),
        }
    }

    pub fn row(&self, row: RowId) -> Option<&RowModel> {
        self.rows.get(&row).filter(|b| b.key.is_some()).map(|b| &b.model)
    }

    pub fn bound_key(&self, row: RowId) -> Option<RecordKey> {
        self.rows.get(&row).and_then(|b| b.key)
    }

    pub fn tier2_state(&self, row: RowId) -> Option<Tier2State> {
        self.rows.get(&row).map(|b| b.tier2)
    }

    /// Synchronous bind during row recycling. Reads only resident data.
    pub fn bind_tier1<G: StoreGateway>(&mut self, window: &EventWindow<G>, row: RowId, key: RecordKey) -> Tier2Ticket {
        self.detach_waiting(row);

        let binding = self.rows.entry(row).or_insert_with(|| RowBinding {
            key: None,
            generation: 0,
            tier2: Tier2State::Cancelled,
            model: RowModel::default(),
        });
        binding.generation += 1;
        binding.key = Some(key);
        binding.tier2 = Tier2State::Scheduled;
        binding
            .model
            .fill_resident(key, window.entry(key), window.thread_info(key));

        Tier2Ticket {
            row,
            key,
            generation: binding.generation,
        }
    }

    /// Deferred bind for a row that is actually visible.
    pub fn bind_tier2<G: StoreGateway>(&mut self, window: &mut EventWindow<G>, ticket: Tier2Ticket) -> Tier2Outcome {
        if !self.is_current(&ticket) {
            trace!("discarding stale tier 2 for row {:?}", ticket.row);
            return Tier2Outcome::Stale;
        }

        match window.load_payload(ticket.key) {
            None => {
                // Evicted from the window meanwhile
                return Tier2Outcome::Stale;
            }
            Some(LoadOutcome::Busy) | Some(LoadOutcome::Missing) => {
                trace!("tier 2 payload unavailable for {}", ticket.key);
                return Tier2Outcome::PayloadUnavailable;
            }
            Some(LoadOutcome::Loaded) | Some(LoadOutcome::AlreadyLoaded) => {}
        }

        let has_profile = window
            .entry(ticket.key)
            .is_some_and(|e| e.annotations().profile.is_some());
        if !has_profile {
            if let Err(err) = window.resolve_profile(ticket.key) {
                trace!("profile lookup for {} skipped: {}", ticket.key, err);
            }
        }

        let avatar_url = window
            .entry(ticket.key)
            .and_then(|entry| {
                self.rows
                    .get(&ticket.row)
                    .and_then(|b| b.model.avatar_url(entry))
            })
            .map(str::to_string);

        let avatar = match avatar_url {
            Some(url) => match self.textures.lookup(&url) {
                ImageLookup::Ready(handle) => AvatarState::Ready(handle),
                ImageLookup::Pending => {
                    self.waiting.entry(url.clone()).or_default().push(ticket.row);
                    AvatarState::Loading(url)
                }
            },
            None => AvatarState::None,
        };

        let Some(binding) = self.rows.get_mut(&ticket.row) else {
            return Tier2Outcome::Stale;
        };
        binding
            .model
            .fill_resident(ticket.key, window.entry(ticket.key), window.thread_info(ticket.key));
        binding.model.avatar = avatar;
        binding.tier2 = Tier2State::Done;
        Tier2Outcome::Applied
    }

    /// Cancel pending Tier 2 work and detach the row from change routing.
    /// Safe on rows that were never bound or never reached Tier 2.
    pub fn unbind(&mut self, row: RowId) {
        self.detach_waiting(row);
        if let Some(binding) = self.rows.get_mut(&row) {
            binding.key = None;
            binding.tier2 = Tier2State::Cancelled;
            binding.model = RowModel::default();
        }
    }

    /// Refresh the resident fields of rows bound to a changed entry.
    /// Returns the rows that were updated.
    pub fn apply_event<G: StoreGateway>(&mut self, window: &EventWindow<G>, event: &WindowEvent) -> Vec<RowId> {
        let WindowEvent::EntryChanged { key, .. } = event else {
            return Vec::new();
        };

        let mut updated = Vec::new();
        for (row, binding) in self.rows.iter_mut() {
            if binding.key != Some(*key) {
                continue;
            }
            binding
                .model
                .fill_resident(*key, window.entry(*key), window.thread_info(*key));
            updated.push(*row);
        }
        updated.sort();
        updated
    }

    /// A texture fetch finished: fill every row still waiting on that URL.
    pub fn on_texture_ready(&mut self, url: &str, handle: TextureHandle) -> Vec<RowId> {
        self.textures.complete(url, handle);

        let Some(rows) = self.waiting.remove(url) else {
            return Vec::new();
        };
        let mut filled = Vec::new();
        for row in rows {
            let Some(binding) = self.rows.get_mut(&row) else {
                continue;
            };
            if binding.key.is_some() && binding.model.avatar == AvatarState::Loading(url.to_string()) {
                binding.model.avatar = AvatarState::Ready(handle);
                filled.push(row);
            }
        }
        filled
    }

    fn is_current(&self, ticket: &Tier2Ticket) -> bool {
        self.rows.get(&ticket.row).is_some_and(|b| {
            b.key == Some(ticket.key)
                && b.generation == ticket.generation
                && b.tier2 != Tier2State::Cancelled
        })
    }

    fn detach_waiting(&mut self, row: RowId) {
        for rows in self.waiting.values_mut() {
            rows.retain(|r| *r != row);
        }
        self.waiting.retain(|_, rows| !rows.is_empty());
    }
}

#[cfg(test)]
mod tests;
