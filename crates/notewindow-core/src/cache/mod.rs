pub mod entry;
pub mod lru;
pub mod texture;

pub use entry::{Annotation, Annotations, EventEntry, LoadOutcome};
pub use lru::LruCache;
pub use texture::{ImageLookup, ImageSource, NullImageSource, TextureCache, TextureHandle};
