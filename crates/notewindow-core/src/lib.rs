pub mod bind;
pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod models;
pub mod store;
pub mod tracing_setup;
pub mod window;

// Re-export the main types at crate root for convenience
pub use bind::{BindController, RowId, RowModel, Tier2Outcome, Tier2Ticket};
pub use cache::{Annotation, EventEntry, TextureCache};
pub use config::{CoreConfig, WindowConfig};
pub use error::{StoreError, WindowError};
pub use events::{EntryChange, ListChange, WindowEvent};
pub use store::{MemoryGateway, NdbGateway, StoreGateway};
pub use window::EventWindow;
