//! Serialized record store: string-keyed, synchronous, JSON-valued.

mod backend;
mod store;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use store::RecordStore;
