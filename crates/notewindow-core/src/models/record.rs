use nostrdb::{NdbStrVariant, Note};

use super::ids::{EventId, PubKey};
use crate::constants::limits::{MAX_TAGS_SCANNED, MAX_TAG_ARITY};

/// Owned snapshot of one stored note, copied out while a read transaction is open.
///
/// Tags are copied verbatim up to a bound; `tags_truncated` is set when the note
/// carried more than `MAX_TAGS_SCANNED` tags so derived-tag extraction can refuse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub id: EventId,
    pub pubkey: PubKey,
    pub kind: u32,
    pub created_at: u64,
    pub content: String,
    pub tags: Vec<Vec<String>>,
    pub tags_truncated: bool,
}

impl RawRecord {
    /// Copy the canonical fields out of a nostrdb note.
    /// nostrdb stores 64-char hex strings as the `Id` variant, so both variants are rendered as text.
    pub fn from_note(note: &Note) -> Self {
        let mut tags = Vec::new();
        let mut tags_truncated = false;

        for tag in note.tags() {
            if tags.len() == MAX_TAGS_SCANNED {
                tags_truncated = true;
                break;
            }
            let count = (tag.count() as usize).min(MAX_TAG_ARITY);
            let mut values = Vec::with_capacity(count);
            for i in 0..count {
                let Some(elem) = tag.get(i as u16) else {
                    break;
                };
                match elem.variant() {
                    NdbStrVariant::Str(s) => values.push(s.to_string()),
                    NdbStrVariant::Id(bytes) => values.push(hex::encode(bytes)),
                }
            }
            tags.push(values);
        }

        Self {
            id: EventId::from_bytes(*note.id()),
            pubkey: PubKey::from_bytes(*note.pubkey()),
            kind: note.kind(),
            created_at: note.created_at(),
            content: note.content().to_string(),
            tags,
            tags_truncated,
        }
    }

    /// Tags whose first element equals `name`.
    pub fn tags_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a [String]> + 'a {
        self.tags
            .iter()
            .filter(move |t| t.first().map(String::as_str) == Some(name))
            .map(Vec::as_slice)
    }
}
