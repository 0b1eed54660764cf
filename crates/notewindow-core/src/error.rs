/// Failures reported by a store gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No read transaction could be opened right now. Never retried synchronously.
    #[error("store busy: read transaction unavailable")]
    Busy,
    #[error("store error: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend {
            message: err.to_string(),
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// Failures surfaced by window operations. The window is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("query failed: {0}")]
    QueryFailed(#[from] StoreError),
}
