use crate::cache::{EventEntry, TextureHandle};
use crate::models::{fallback_label, EventId, PubKey, RecordKey, SocialCounts, ThreadInfo};

/// Body shown while a row's payload is not resident
pub const PLACEHOLDER_BODY: &str = "Loading…";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AvatarState {
    #[default]
    None,
    /// Waiting on the texture cache for this URL
    Loading(String),
    Ready(TextureHandle),
}

/// What a list row renders. Filled by the bind controller, read by the widget layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RowModel {
    pub key: Option<RecordKey>,
    pub author_label: String,
    pub body: String,
    pub created_at: Option<u64>,
    pub event_id: Option<EventId>,
    pub pubkey: Option<PubKey>,
    pub hashtags: Vec<String>,
    pub is_repost: bool,
    /// Payload not resident yet
    pub placeholder: bool,
    pub thread: Option<ThreadInfo>,
    pub depth: u32,
    pub counts: SocialCounts,
    pub liked: bool,
    pub muted: bool,
    pub skip_animation: bool,
    pub revealing: bool,
    pub avatar: AvatarState,
}

impl RowModel {
    /// Fill every field that is already in memory. Never touches the store.
    pub fn fill_resident(&mut self, key: RecordKey, entry: Option<&EventEntry>, thread: Option<ThreadInfo>) {
        // An avatar survives a refresh of the same identity, never a rebind
        let avatar = if self.key == Some(key) {
            std::mem::take(&mut self.avatar)
        } else {
            AvatarState::None
        };
        *self = Self {
            key: Some(key),
            thread,
            depth: thread.map_or(0, |t| t.depth),
            ..Self::default()
        };

        let Some(entry) = entry else {
            self.author_label = format!("note:{}", key);
            self.body = PLACEHOLDER_BODY.to_string();
            self.placeholder = true;
            return;
        };

        let annotations = entry.annotations();
        self.counts = annotations.counts;
        self.liked = annotations.liked;
        self.muted = annotations.muted;
        self.skip_animation = annotations.skip_animation;
        self.revealing = annotations.revealing;
        if self.thread.is_none() {
            self.thread = annotations.thread;
            self.depth = annotations.thread.map_or(0, |t| t.depth);
        }

        match entry.loaded() {
            Some(payload) => {
                self.author_label = annotations
                    .profile
                    .as_ref()
                    .and_then(|p| p.label())
                    .map(str::to_string)
                    .unwrap_or_else(|| fallback_label(&payload.pubkey));
                self.body = payload.content.clone();
                self.created_at = Some(payload.created_at);
                self.event_id = Some(payload.id);
                self.pubkey = Some(payload.pubkey);
                self.hashtags = payload.hashtags.clone();
                self.is_repost = payload.is_repost();
                self.avatar = avatar;
            }
            None => {
                self.author_label = format!("note:{}", key);
                self.body = PLACEHOLDER_BODY.to_string();
                self.created_at = Some(entry.created_at()).filter(|t| *t > 0);
                self.placeholder = true;
            }
        }
    }

    /// Avatar URL of the bound author, if a profile with a picture is attached.
    pub fn avatar_url<'a>(&self, entry: &'a EventEntry) -> Option<&'a str> {
        entry.annotations().profile.as_ref()?.picture_url()
    }
}

/// Compact age label: `now`, `5m`, `3h`, `2d`.
pub fn format_age(created_at: u64, now: u64) -> String {
    let secs = now.saturating_sub(created_at);
    match secs {
        0..=59 => "now".to_string(),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86_399 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86_400),
    }
}
