use serde::{Deserialize, Serialize};

use super::ids::PubKey;
use crate::constants::FALLBACK_LABEL_HEX_CHARS;

/// Author metadata (kind 0) as far as a row needs it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub display_name: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub nip05: Option<String>,
}

impl AuthorProfile {
    /// Display name, then name. Empty strings count as missing.
    pub fn label(&self) -> Option<&str> {
        [self.display_name.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
    }

    pub fn picture_url(&self) -> Option<&str> {
        self.picture.as_deref().filter(|s| !s.is_empty())
    }
}

/// Label shown before any profile is known: `abcdef01...`
pub fn fallback_label(pubkey: &PubKey) -> String {
    format!("{}...", pubkey.short_hex(FALLBACK_LABEL_HEX_CHARS))
}
