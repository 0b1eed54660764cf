pub mod gateway;
pub mod ingest;
pub mod memory;
pub mod ndb;
pub mod txn;

pub use gateway::{QueryHit, StoreGateway};
pub use ingest::ingest_events;
pub use memory::MemoryGateway;
pub use ndb::{LiveFeed, NdbGateway};
pub use txn::{with_read, ReadScope};
