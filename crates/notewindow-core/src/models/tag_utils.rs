//! Tag extraction utilities for raw records
//!
//! Tags come straight off the wire and are untrusted. Everything derived here is
//! best-effort: a malformed or oversized tag structure degrades to "nothing
//! derived" instead of failing the record.

use thiserror::Error;
use tracing::debug;

use super::ids::EventId;
use super::record::RawRecord;
use crate::constants::limits::{MAX_HASHTAGS, MAX_HASHTAG_LEN, MAX_TAGS_SCANNED};

/// Why derived tag data was refused for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MalformedTags {
    #[error("record carries more than {MAX_TAGS_SCANNED} tags")]
    Oversized,
}

/// Extract a single string value from a tag by name.
/// Returns the first occurrence if multiple tags exist.
pub fn extract_tag_str<'a>(record: &'a RawRecord, tag_name: &'a str) -> Option<&'a str> {
    record
        .tags_named(tag_name)
        .find_map(|t| t.get(1))
        .map(String::as_str)
}

/// Extract all string values for a given tag name.
pub fn extract_all_tag_values(record: &RawRecord, tag_name: &str) -> Vec<String> {
    record
        .tags_named(tag_name)
        .filter_map(|t| t.get(1).cloned())
        .collect()
}

/// Check if a record has a specific tag (regardless of value).
pub fn has_tag(record: &RawRecord, tag_name: &str) -> bool {
    record.tags_named(tag_name).next().is_some()
}

fn check_shape(record: &RawRecord) -> Result<(), MalformedTags> {
    if record.tags_truncated || record.tags.len() > MAX_TAGS_SCANNED {
        return Err(MalformedTags::Oversized);
    }
    Ok(())
}

fn clean_hashtag(raw: &str) -> Option<&str> {
    let value = raw.trim().trim_start_matches('#');
    if value.is_empty() || value.len() > MAX_HASHTAG_LEN {
        return None;
    }
    if value.chars().any(char::is_control) {
        return None;
    }
    Some(value)
}

/// Bounded `t` tag extraction.
fn try_hashtags(record: &RawRecord) -> Result<Vec<String>, MalformedTags> {
    check_shape(record)?;

    let mut hashtags: Vec<String> = Vec::new();
    for tag in record.tags_named("t") {
        let Some(value) = tag.get(1).and_then(|v| clean_hashtag(v)) else {
            continue;
        };
        if hashtags.iter().any(|h| h.eq_ignore_ascii_case(value)) {
            continue;
        }
        hashtags.push(value.to_string());
        if hashtags.len() == MAX_HASHTAGS {
            break;
        }
    }
    Ok(hashtags)
}

/// Hashtags (`t` tags) for display. Oversized tag arrays yield no hashtags.
pub fn extract_hashtags(record: &RawRecord) -> Vec<String> {
    try_hashtags(record).unwrap_or_else(|err| {
        debug!("dropping hashtags for {}: {}", record.id.short_hex(16), err);
        Vec::new()
    })
}

/// NIP-40 expiration timestamp. Unparseable values mean "no expiration".
pub fn extract_expiration(record: &RawRecord) -> Option<u64> {
    check_shape(record).ok()?;
    extract_tag_str(record, "expiration")?.trim().parse::<u64>().ok()
}

/// First `e` tag holding a well-formed event id (the reposted note of a kind 6).
pub fn first_event_ref(record: &RawRecord) -> Option<EventId> {
    check_shape(record).ok()?;
    record
        .tags_named("e")
        .find_map(|t| t.get(1).and_then(|v| EventId::from_hex(v)))
}
