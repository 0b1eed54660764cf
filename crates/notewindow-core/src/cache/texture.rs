use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::lru::LruCache;

/// Opaque handle to a decoded texture owned by the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLookup {
    Ready(TextureHandle),
    /// A fetch is in flight; completion arrives through `TextureCache::complete`
    Pending,
}

/// Fetch-and-decode backend for avatars. `request` must return immediately;
/// the decoded result is handed back later on the UI loop.
pub trait ImageSource: Send + Sync {
    fn request(&self, url: &str);
}

/// Source that never fetches anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullImageSource;

impl ImageSource for NullImageSource {
    fn request(&self, _url: &str) {}
}

/// Process-wide decoded texture cache, bounded by LRU.
///
/// Constructed once and shared by handle (`Arc<TextureCache>`) with every bind controller.
pub struct TextureCache {
    textures: Mutex<LruCache<String, TextureHandle>>,
    in_flight: Mutex<HashSet<String>>,
    source: Arc<dyn ImageSource>,
}

impl TextureCache {
    pub fn new(capacity: usize, source: Arc<dyn ImageSource>) -> Self {
        Self {
            textures: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashSet::new()),
            source,
        }
    }

    /// Cached handle, or a fetch is started (once per URL) and `Pending` returned.
    pub fn lookup(&self, url: &str) -> ImageLookup {
        if let Some(handle) = self.textures.lock().get(url) {
            return ImageLookup::Ready(*handle);
        }

        let first_request = self.in_flight.lock().insert(url.to_string());
        if first_request {
            trace!("requesting texture {}", url);
            self.source.request(url);
        }
        ImageLookup::Pending
    }

    /// Record a finished fetch.
    pub fn complete(&self, url: &str, handle: TextureHandle) {
        self.in_flight.lock().remove(url);
        if let Some((evicted, _)) = self.textures.lock().put(url.to_string(), handle) {
            trace!("evicted texture {}", evicted);
        }
    }

    /// Forget a failed fetch so a later lookup can try again.
    pub fn fail(&self, url: &str) {
        self.in_flight.lock().remove(url);
    }

    pub fn len(&self) -> usize {
        self.textures.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
