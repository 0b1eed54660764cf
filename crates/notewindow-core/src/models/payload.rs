use super::ids::{EventId, PubKey};
use super::record::RawRecord;
use super::tag_utils::{extract_expiration, extract_hashtags, first_event_ref};
use crate::constants::kinds;

/// Canonical fields of a loaded event. Built once from a `RawRecord` and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub id: EventId,
    pub pubkey: PubKey,
    pub kind: u32,
    pub created_at: u64,
    pub content: String,
    /// Display hashtags (`t` tags), bounded and deduplicated
    pub hashtags: Vec<String>,
    /// NIP-40 expiration timestamp
    pub expiration: Option<u64>,
    /// For kind 6 reposts: the reposted event
    pub reposted_id: Option<EventId>,
}

impl Payload {
    pub fn from_record(record: &RawRecord) -> Self {
        let reposted_id = if record.kind == kinds::REPOST {
            first_event_ref(record)
        } else {
            None
        };

        Self {
            id: record.id,
            pubkey: record.pubkey,
            kind: record.kind,
            created_at: record.created_at,
            content: record.content.clone(),
            hashtags: extract_hashtags(record),
            expiration: extract_expiration(record),
            reposted_id,
        }
    }

    pub fn is_repost(&self) -> bool {
        self.kind == kinds::REPOST
    }

    /// An event without an expiration never expires.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expiration.is_some_and(|exp| exp <= now)
    }
}
