//! Typed, best-effort persistence over a [`KeyValueStore`].
//!
//! Every failure mode (missing key, undecodable JSON, shape mismatch, store
//! error) collapses to "absent" on load and to a logged no-op on save. Losing
//! persistence must never break interactive use: the in-memory state stays
//! authoritative for the rest of the session.
use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::kv::KeyValueStore;
use super::types::{StateExport, StorageError};

/// Default key namespace, matching the browser reader's `localStorage` keys.
pub const DEFAULT_NAMESPACE: &str = "reader";

/// Logical keys written by the engine. Rendered as `<namespace>-<suffix>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKey<'a> {
    /// Per-channel read state, namespaced by the stable channel id (not the slug).
    Channel(&'a str),
    Starred,
    ActiveView,
    TagsExpanded,
}

impl StorageKey<'_> {
    /// Suffixes owned by the global keys.
    pub const RESERVED_SUFFIXES: [&'static str; 3] = ["starred", "active-view", "tags-expanded"];

    /// Whether a channel keyed by `channel_id` shares its storage key with
    /// one of the global keys. Both would write the same entry.
    pub fn is_reserved_channel_id(channel_id: &str) -> bool {
        Self::RESERVED_SUFFIXES.contains(&channel_id)
    }
}

impl fmt::Display for StorageKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKey::Channel(id) => f.write_str(id),
            StorageKey::Starred => f.write_str("starred"),
            StorageKey::ActiveView => f.write_str("active-view"),
            StorageKey::TagsExpanded => f.write_str("tags-expanded"),
        }
    }
}

/// Namespaced persistence adapter.
#[derive(Debug)]
pub struct Persistence<S> {
    store: S,
    namespace: String,
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(store: S, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Full storage key, e.g. `reader-1001` or `reader-starred`.
    pub fn key(&self, key: StorageKey<'_>) -> String {
        format!("{}-{}", self.namespace, key)
    }

    /// Load and decode a JSON value. `None` on any failure.
    pub fn load<T: DeserializeOwned>(&self, key: StorageKey<'_>) -> Option<T> {
        let full_key = self.key(key);
        let raw = self.read(&full_key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "Malformed persisted value, using defaults");
                None
            }
        }
    }

    /// Encode and store a JSON value. Failures are logged and dropped.
    pub fn save<T: Serialize + ?Sized>(&self, key: StorageKey<'_>, value: &T) {
        let full_key = self.key(key);
        match serde_json::to_string(value) {
            Ok(json) => self.write(&full_key, &json),
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "Failed to encode value, not persisted");
            }
        }
    }

    /// Load a raw string value (view id, "0"/"1" flags).
    pub fn load_text(&self, key: StorageKey<'_>) -> Option<String> {
        self.read(&self.key(key))
    }

    /// Store a raw string value, best-effort.
    pub fn save_text(&self, key: StorageKey<'_>, value: &str) {
        self.write(&self.key(key), value);
    }

    /// Dump every key in this namespace.
    ///
    /// Unlike `load`, this surfaces storage errors: exporting is an explicit
    /// user action and a silent empty export would be mistaken for real data.
    pub fn export(&self) -> Result<StateExport, StorageError> {
        let prefix = format!("{}-", self.namespace);
        let entries = self.store.entries(&prefix)?.into_iter().collect();
        Ok(StateExport {
            exported_at: chrono::Utc::now(),
            namespace: self.namespace.clone(),
            entries,
        })
    }

    /// Write back an export. Keys outside this namespace are skipped.
    ///
    /// Returns the number of entries written.
    pub fn import(&self, export: &StateExport) -> Result<usize, StorageError> {
        let prefix = format!("{}-", self.namespace);
        let mut written = 0;
        for (key, value) in &export.entries {
            if !key.starts_with(&prefix) {
                tracing::warn!(key = %key, namespace = %self.namespace, "Skipping entry outside namespace");
                continue;
            }
            self.store.set(key, value)?;
            written += 1;
        }
        tracing::info!(written, namespace = %self.namespace, "Imported reading state");
        Ok(written)
    }

    fn read(&self, full_key: &str) -> Option<String> {
        match self.store.get(full_key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "Storage read failed, using defaults");
                None
            }
        }
    }

    fn write(&self, full_key: &str, value: &str) {
        if let Err(e) = self.store.set(full_key, value) {
            tracing::warn!(key = %full_key, error = %e, "Storage write failed, change kept in memory only");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::{MemoryStore, PersistedReadState};
    use pretty_assertions::assert_eq;

    /// Store that fails every operation, like a browser with storage disabled.
    pub(crate) struct UnavailableStore;

    impl KeyValueStore for UnavailableStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("storage disabled".to_string()))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }

        fn entries(&self, _prefix: &str) -> Result<Vec<(String, String)>, StorageError> {
            Err(StorageError::Unavailable("storage disabled".to_string()))
        }
    }

    #[test]
    fn test_key_layout() {
        let p = Persistence::new(MemoryStore::new(), DEFAULT_NAMESPACE);
        assert_eq!(p.key(StorageKey::Channel("1001")), "reader-1001");
        assert_eq!(p.key(StorageKey::Starred), "reader-starred");
        assert_eq!(p.key(StorageKey::ActiveView), "reader-active-view");
        assert_eq!(p.key(StorageKey::TagsExpanded), "reader-tags-expanded");
    }

    #[test]
    fn test_reserved_channel_ids() {
        for suffix in StorageKey::RESERVED_SUFFIXES {
            assert!(StorageKey::is_reserved_channel_id(suffix));
        }
        assert!(!StorageKey::is_reserved_channel_id("1001"));
        assert!(!StorageKey::is_reserved_channel_id("Starred"));

        // The collision is real: both keys render identically
        let p = Persistence::new(MemoryStore::new(), DEFAULT_NAMESPACE);
        assert_eq!(p.key(StorageKey::Channel("starred")), p.key(StorageKey::Starred));
    }

    #[test]
    fn test_save_then_load() {
        let p = Persistence::new(MemoryStore::new(), DEFAULT_NAMESPACE);
        let state = PersistedReadState {
            read_posts: vec![3, 1],
            last_sync_max_id: 7,
        };
        p.save(StorageKey::Channel("42"), &state);

        let raw = p.store().get("reader-42").unwrap().unwrap();
        assert_eq!(raw, r#"{"readPosts":[3,1],"lastSyncMaxId":7}"#);

        let loaded: Option<PersistedReadState> = p.load(StorageKey::Channel("42"));
        assert_eq!(loaded, Some(state));
    }

    #[test]
    fn test_load_missing_is_none() {
        let p = Persistence::new(MemoryStore::new(), DEFAULT_NAMESPACE);
        let loaded: Option<PersistedReadState> = p.load(StorageKey::Channel("42"));
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_invalid_json_is_none() {
        let store = MemoryStore::with_entries([("reader-42", "not json {{")]);
        let p = Persistence::new(store, DEFAULT_NAMESPACE);
        let loaded: Option<PersistedReadState> = p.load(StorageKey::Channel("42"));
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_shape_mismatch_is_none() {
        let store = MemoryStore::with_entries([("reader-42", r#"{"readPosts":"oops"}"#)]);
        let p = Persistence::new(store, DEFAULT_NAMESPACE);
        let loaded: Option<PersistedReadState> = p.load(StorageKey::Channel("42"));
        assert!(loaded.is_none());
    }

    #[test]
    fn test_unavailable_store_is_swallowed() {
        let p = Persistence::new(UnavailableStore, DEFAULT_NAMESPACE);
        p.save(StorageKey::Starred, &vec![1, 2, 3]);
        p.save_text(StorageKey::ActiveView, "latest");
        let loaded: Option<Vec<i64>> = p.load(StorageKey::Starred);
        assert!(loaded.is_none());
        assert!(p.load_text(StorageKey::ActiveView).is_none());
    }

    #[test]
    fn test_export_import_round_trip() {
        let source = Persistence::new(MemoryStore::new(), DEFAULT_NAMESPACE);
        source.save_text(StorageKey::ActiveView, "starred");
        source.save_text(StorageKey::TagsExpanded, "1");
        source.store().set("unrelated", "x").unwrap();

        let export = source.export().unwrap();
        assert_eq!(export.entries.len(), 2);

        let target = Persistence::new(MemoryStore::new(), DEFAULT_NAMESPACE);
        assert_eq!(target.import(&export).unwrap(), 2);
        assert_eq!(
            target.load_text(StorageKey::ActiveView).as_deref(),
            Some("starred")
        );
    }

    #[test]
    fn test_import_skips_foreign_namespace() {
        let source = Persistence::new(MemoryStore::new(), "other");
        source.save_text(StorageKey::ActiveView, "latest");
        let export = source.export().unwrap();

        let target = Persistence::new(MemoryStore::new(), DEFAULT_NAMESPACE);
        assert_eq!(target.import(&export).unwrap(), 0);
        assert!(target.store().is_empty());
    }

    #[test]
    fn test_export_surfaces_storage_error() {
        let p = Persistence::new(UnavailableStore, DEFAULT_NAMESPACE);
        assert!(matches!(p.export(), Err(StorageError::Unavailable(_))));
    }
}
