//! String-keyed storage backends.
//!
//! The reading-state engine only ever needs three primitives: read one key,
//! write one key, and enumerate a key prefix (for export). Everything typed
//! lives one layer up in [`super::adapter::Persistence`].
use std::cell::RefCell;
use std::collections::BTreeMap;

use super::types::StorageError;

/// Minimal key-value contract the engine persists through.
pub trait KeyValueStore {
    /// Read a single value. `Ok(None)` when the key was never written.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write (insert or replace) a single value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// All `(key, value)` pairs whose key starts with `prefix`, ordered by key.
    fn entries(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn entries(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError> {
        (**self).entries(prefix)
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-process store for tests and embedding hosts that bring their own
/// persistence. Not `Sync`: the engine has exactly one thread of control.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, e.g. with a payload written by an earlier session.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            map: RefCell::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.map.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.map
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn entries(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError> {
        Ok(self
            .map
            .borrow()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
