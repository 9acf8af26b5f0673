mod adapter;
mod entries;
mod kv;
mod schema;
mod types;

pub use adapter::{Persistence, StorageKey, DEFAULT_NAMESPACE};
pub use kv::{KeyValueStore, MemoryStore};
pub use schema::Database;
pub use types::{PersistedReadState, StateExport, StorageError};

#[cfg(test)]
pub(crate) use adapter::tests::UnavailableStore;
