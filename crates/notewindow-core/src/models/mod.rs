pub mod counts;
pub mod ids;
pub mod payload;
pub mod profile;
pub mod query;
pub mod record;
pub mod tag_utils;
pub mod thread;

pub use counts::SocialCounts;
pub use ids::{EventId, PubKey, RecordKey};
pub use payload::Payload;
pub use profile::{fallback_label, AuthorProfile};
pub use query::{ViewMode, WindowQuery};
pub use record::RawRecord;
pub use thread::{ThreadInfo, ThreadRefs};
