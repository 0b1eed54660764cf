use serde::{Deserialize, Serialize};

use super::ids::EventId;
use super::record::RawRecord;
use crate::constants::limits::MAX_TAGS_SCANNED;

/// Reply-chain references carried by a note's `e` tags (NIP-10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreadRefs {
    pub root: Option<EventId>,
    pub reply: Option<EventId>,
}

impl ThreadRefs {
    /// Parse NIP-10 `e` tags.
    ///
    /// Explicit `root`/`reply` markers win. `mention` tags are not part of the chain.
    /// Unmarked tags use the positional form: first is the root, last is the reply
    /// when it differs from the first.
    pub fn from_record(record: &RawRecord) -> Self {
        let mut refs = Self::default();
        if record.tags_truncated || record.tags.len() > MAX_TAGS_SCANNED {
            return refs;
        }

        let mut first_unmarked: Option<EventId> = None;
        let mut last_unmarked: Option<EventId> = None;

        for tag in record.tags_named("e") {
            let Some(id) = tag.get(1).and_then(|v| EventId::from_hex(v)) else {
                continue;
            };
            match tag.get(3).map(String::as_str) {
                Some("root") => refs.root = Some(id),
                Some("reply") => refs.reply = Some(id),
                Some("mention") => continue,
                _ => {
                    first_unmarked.get_or_insert(id);
                    last_unmarked = Some(id);
                }
            }
        }

        if refs.root.is_none() {
            refs.root = first_unmarked;
        }
        if refs.reply.is_none() && last_unmarked != first_unmarked {
            refs.reply = last_unmarked;
        }
        refs
    }

    /// The event this note directly answers.
    pub fn parent(&self) -> Option<EventId> {
        self.reply.or(self.root)
    }
}

/// Thread placement of an entry inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub root: Option<EventId>,
    pub parent: Option<EventId>,
    /// 0 for the root (or a top-level note), parent depth + 1 otherwise
    pub depth: u32,
}

impl ThreadInfo {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_reply(&self) -> bool {
        self.parent.is_some()
    }
}
