use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_MAX_THREAD_DEPTH, DEFAULT_PENDING_MAX,
    DEFAULT_TEXTURE_CACHE_CAPACITY, DEFAULT_WINDOW_MAX_ITEMS,
};

#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Defaults, with the data directory overridable through `NOTEWINDOW_DATA_DIR`.
    pub fn from_env() -> Self {
        match std::env::var("NOTEWINDOW_DATA_DIR") {
            Ok(dir) if !dir.is_empty() => Self::new(dir),
            _ => Self::default(),
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

/// Sizing of a window and the services bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    /// Hard cap on visible timeline entries; the effective cap is `min(max_items, query.limit)`
    pub max_items: usize,
    /// Live arrivals held while not anchored; earliest arrivals are dropped beyond this
    pub pending_max: usize,
    pub max_thread_depth: u32,
    pub texture_cache_capacity: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_WINDOW_MAX_ITEMS,
            pending_max: DEFAULT_PENDING_MAX,
            max_thread_depth: DEFAULT_MAX_THREAD_DEPTH,
            texture_cache_capacity: DEFAULT_TEXTURE_CACHE_CAPACITY,
        }
    }
}

impl WindowConfig {
    /// Defaults, with `max_items` overridable through `NOTEWINDOW_MAX_ITEMS`.
    /// Unparseable or zero values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(max_items) = std::env::var("NOTEWINDOW_MAX_ITEMS")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
        {
            config.max_items = max_items;
        }
        config
    }

    /// Effective cap for a query limit.
    pub fn cap_for(&self, query_limit: usize) -> usize {
        self.max_items.min(query_limit)
    }
}
