use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque store key assigned by nostrdb when a note is ingested.
/// Stable for the lifetime of the database; this is the identity a window tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey(u64);

impl RecordKey {
    pub const fn new(key: u64) -> Self {
        Self(key)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<nostrdb::NoteKey> for RecordKey {
    fn from(key: nostrdb::NoteKey) -> Self {
        Self(key.as_u64())
    }
}

impl From<RecordKey> for nostrdb::NoteKey {
    fn from(key: RecordKey) -> Self {
        nostrdb::NoteKey::new(key.0)
    }
}

macro_rules! hash32 {
    ($name:ident, $what:literal) => {
        #[doc = concat!("32-byte ", $what, ", rendered as lowercase hex.")]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Parse a 64-char hex string. Anything else is rejected.
            pub fn from_hex(hex_str: &str) -> Option<Self> {
                if hex_str.len() != 64 {
                    return None;
                }
                let bytes: [u8; 32] = hex::decode(hex_str).ok()?.try_into().ok()?;
                Some(Self(bytes))
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// First `n` hex characters, used for compact labels.
            pub fn short_hex(&self, n: usize) -> String {
                let mut hex = self.to_hex();
                hex.truncate(n.min(64));
                hex
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.short_hex(16))
            }
        }
    };
}

hash32!(EventId, "event id (sha256 of the serialized event)");
hash32!(PubKey, "author public key");
