use serde::{Deserialize, Serialize};

use super::record::RawRecord;
use super::tag_utils::extract_tag_str;
use crate::constants::kinds;

/// Social counters attached to an entry by `batch_counts` or collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SocialCounts {
    pub likes: u32,
    pub reposts: u32,
    pub replies: u32,
    pub zap_count: u32,
    pub zap_total_msat: u64,
}

impl SocialCounts {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Count one record that references the counted event.
    /// Kinds that carry no social signal are ignored.
    pub fn tally(&mut self, record: &RawRecord) {
        match record.kind {
            kinds::REACTION => {
                // NIP-25: "-" is a downvote
                if record.content.trim() != "-" {
                    self.likes += 1;
                }
            }
            kinds::REPOST => self.reposts += 1,
            kinds::TEXT_NOTE | kinds::COMMENT => self.replies += 1,
            kinds::ZAP_RECEIPT => {
                self.zap_count += 1;
                self.zap_total_msat = self.zap_total_msat.saturating_add(zap_amount_msat(record));
            }
            _ => {}
        }
    }
}

/// The zap request embedded in a receipt's `description` tag (NIP-57).
#[derive(Debug, Deserialize)]
struct ZapRequest {
    #[serde(default)]
    tags: Vec<Vec<String>>,
}

/// Amount of a zap receipt, read from the `amount` tag of the embedded zap request.
/// Malformed requests count as zero.
pub fn zap_amount_msat(receipt: &RawRecord) -> u64 {
    let Some(description) = extract_tag_str(receipt, "description") else {
        return 0;
    };
    let Ok(request) = serde_json::from_str::<ZapRequest>(description) else {
        return 0;
    };
    request
        .tags
        .iter()
        .find(|t| t.first().map(String::as_str) == Some("amount"))
        .and_then(|t| t.get(1))
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ids::{EventId, PubKey};

    fn record(kind: u32, content: &str, tags: Vec<Vec<String>>) -> RawRecord {
        RawRecord {
            id: EventId::from_bytes([1; 32]),
            pubkey: PubKey::from_bytes([2; 32]),
            kind,
            created_at: 0,
            content: content.to_string(),
            tags,
            tags_truncated: false,
        }
    }

    fn receipt(description: &str) -> RawRecord {
        record(
            9735,
            "",
            vec![vec!["description".to_string(), description.to_string()]],
        )
    }

    #[test]
    fn test_tally_by_kind() {
        let mut counts = SocialCounts::default();
        counts.tally(&record(7, "+", vec![]));
        counts.tally(&record(7, "-", vec![]));
        counts.tally(&record(6, "", vec![]));
        counts.tally(&record(1, "reply", vec![]));
        counts.tally(&record(1111, "comment", vec![]));
        counts.tally(&record(30023, "article", vec![]));
        assert_eq!(counts.likes, 1);
        assert_eq!(counts.reposts, 1);
        assert_eq!(counts.replies, 2);
        assert_eq!(counts.zap_count, 0);
    }

    #[test]
    fn test_zap_amounts() {
        let mut counts = SocialCounts::default();
        counts.tally(&receipt(r#"{"kind":9734,"tags":[["amount","21000"],["p","ab"]]}"#));
        counts.tally(&receipt("not json"));
        counts.tally(&receipt(r#"{"kind":9734,"tags":[["amount","lots"]]}"#));
        assert_eq!(counts.zap_count, 3);
        assert_eq!(counts.zap_total_msat, 21_000);
    }
}
