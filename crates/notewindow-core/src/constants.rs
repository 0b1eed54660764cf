//! Application-wide constants
//!
//! Centralized location for protocol kinds, window sizing and the bounds
//! applied when deriving data from untrusted tags.

/// Default directory for the nostrdb data files
pub const DEFAULT_DATA_DIR: &str = "notewindow_data";

// Window sizing
/// Hard cap on visible entries in a timeline window
pub const DEFAULT_WINDOW_MAX_ITEMS: usize = 100;
/// Live arrivals held while the viewer is scrolled away from the newest edge
pub const DEFAULT_PENDING_MAX: usize = 200;
/// Default result-size cap of a query descriptor
pub const DEFAULT_QUERY_LIMIT: usize = 50;
/// Deepest nesting level reported for thread replies
pub const DEFAULT_MAX_THREAD_DEPTH: u32 = 10;
/// Decoded avatar textures kept resident
pub const DEFAULT_TEXTURE_CACHE_CAPACITY: usize = 500;
/// `load_newer` over-fetches so it can take the results adjacent to the current edge
pub const LOAD_NEWER_MIN_QUERY: usize = 100;

/// Hex characters shown when an author has no profile yet
pub const FALLBACK_LABEL_HEX_CHARS: usize = 8;

// Tag bounds
pub mod limits {
    /// Records carrying more tags than this are treated as oversized: no derived tags
    pub const MAX_TAGS_SCANNED: usize = 1024;
    /// Elements copied per tag; markers never sit past index 3
    pub const MAX_TAG_ARITY: usize = 8;
    pub const MAX_HASHTAGS: usize = 64;
    pub const MAX_HASHTAG_LEN: usize = 128;
}

// Nostr event kinds the window cares about
pub mod kinds {
    /// Text note
    pub const TEXT_NOTE: u32 = 1;
    /// NIP-09 deletion request
    pub const DELETION: u32 = 5;
    /// NIP-18 repost
    pub const REPOST: u32 = 6;
    /// NIP-25 reaction
    pub const REACTION: u32 = 7;
    /// NIP-22 comment
    pub const COMMENT: u32 = 1111;
    /// NIP-57 zap receipt
    pub const ZAP_RECEIPT: u32 = 9735;

    /// Kinds shown by the default global timeline
    pub const TIMELINE: [u32; 2] = [TEXT_NOTE, REPOST];
    /// Kinds that count as replies in a thread
    pub const REPLIES: [u32; 2] = [TEXT_NOTE, COMMENT];
}
