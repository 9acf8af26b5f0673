//! Global starred-post registry.
//!
//! Stars are cross-channel bookmarks keyed by `(slug, post_id)`, independent
//! of read state and of any channel's lifecycle. Persisted as a JSON object
//! `{"<slug>:<postId>": true}`; un-starring removes the key.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::Value;

use crate::storage::{KeyValueStore, Persistence, StorageKey};

/// Composite registry key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StarKey {
    pub slug: String,
    pub post_id: i64,
}

impl StarKey {
    pub fn new(slug: impl Into<String>, post_id: i64) -> Self {
        Self {
            slug: slug.into(),
            post_id,
        }
    }

    /// Parse `"<slug>:<postId>"`. The id follows the last colon, so slugs may
    /// themselves contain colons.
    pub fn parse(raw: &str) -> Option<Self> {
        let (slug, id) = raw.rsplit_once(':')?;
        if slug.is_empty() {
            return None;
        }
        let post_id = id.parse().ok()?;
        Some(Self::new(slug, post_id))
    }
}

impl fmt::Display for StarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.slug, self.post_id)
    }
}

/// Starred post ids grouped by channel slug. A slug with no stars left is
/// removed, so `starred` never holds empty sets.
#[derive(Debug, Clone, Default)]
pub struct StarRegistry {
    starred: BTreeMap<String, BTreeSet<i64>>,
}

impl StarRegistry {
    /// Load the registry. Missing or malformed payloads yield an empty registry;
    /// individual entries with unparseable keys or non-`true` values are skipped.
    pub fn hydrate<S: KeyValueStore>(persistence: &Persistence<S>) -> Self {
        let Some(raw) = persistence.load::<BTreeMap<String, Value>>(StorageKey::Starred) else {
            return Self::default();
        };

        let mut registry = Self::default();
        let mut skipped = 0usize;
        for (key, value) in raw {
            let parsed = match value {
                Value::Bool(true) => StarKey::parse(&key),
                _ => None,
            };
            match parsed {
                Some(StarKey { slug, post_id }) => {
                    registry.starred.entry(slug).or_default().insert(post_id);
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, "Ignored malformed starred entries");
        }
        tracing::debug!(count = registry.count(), "Hydrated star registry");

        registry
    }

    pub fn is_starred(&self, slug: &str, post_id: i64) -> bool {
        self.starred
            .get(slug)
            .is_some_and(|ids| ids.contains(&post_id))
    }

    /// Flip membership and persist. Returns the new starred state.
    pub fn toggle<S: KeyValueStore>(
        &mut self,
        slug: &str,
        post_id: i64,
        persistence: &Persistence<S>,
    ) -> bool {
        let ids = self.starred.entry(slug.to_string()).or_default();
        let starred = if ids.remove(&post_id) {
            false
        } else {
            ids.insert(post_id)
        };
        if ids.is_empty() {
            self.starred.remove(slug);
        }
        self.persist(persistence);
        tracing::debug!(slug = %slug, post_id, starred, "Toggled star");
        starred
    }

    /// Total starred across all channels.
    pub fn count(&self) -> usize {
        self.starred.values().map(BTreeSet::len).sum()
    }

    /// Every starred post, ordered by slug then id.
    pub fn iter(&self) -> impl Iterator<Item = StarKey> + '_ {
        self.starred
            .iter()
            .flat_map(|(slug, ids)| ids.iter().map(|&id| StarKey::new(slug.as_str(), id)))
    }

    fn persist<S: KeyValueStore>(&self, persistence: &Persistence<S>) {
        let map: BTreeMap<String, bool> = self.iter().map(|key| (key.to_string(), true)).collect();
        persistence.save(StorageKey::Starred, &map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, UnavailableStore, DEFAULT_NAMESPACE};

    fn persistence() -> Persistence<MemoryStore> {
        Persistence::new(MemoryStore::new(), DEFAULT_NAMESPACE)
    }

    #[test]
    fn test_empty_by_default() {
        let registry = StarRegistry::hydrate(&persistence());
        assert_eq!(registry.count(), 0);
        assert!(!registry.is_starred("news", 5));
    }

    #[test]
    fn test_toggle_round_trip_through_storage() {
        let p = persistence();
        let mut registry = StarRegistry::hydrate(&p);
        assert!(registry.toggle("news", 5, &p));

        let reloaded = StarRegistry::hydrate(&p);
        assert!(reloaded.is_starred("news", 5));
        assert_eq!(reloaded.count(), 1);
    }

    #[test]
    fn test_toggle_twice_removes_key() {
        let p = persistence();
        let mut registry = StarRegistry::hydrate(&p);
        registry.toggle("news", 5, &p);
        assert!(!registry.toggle("news", 5, &p));

        assert!(!registry.is_starred("news", 5));
        let raw = p.store().get("reader-starred").unwrap().unwrap();
        assert_eq!(raw, "{}");

        let reloaded = StarRegistry::hydrate(&p);
        assert!(!reloaded.is_starred("news", 5));
    }

    #[test]
    fn test_persisted_layout() {
        let p = persistence();
        let mut registry = StarRegistry::hydrate(&p);
        registry.toggle("tech", 2, &p);
        registry.toggle("news", 10, &p);

        let raw = p.store().get("reader-starred").unwrap().unwrap();
        assert_eq!(raw, r#"{"news:10":true,"tech:2":true}"#);
    }

    #[test]
    fn test_same_id_different_channels() {
        let p = persistence();
        let mut registry = StarRegistry::hydrate(&p);
        registry.toggle("news", 1, &p);

        assert!(registry.is_starred("news", 1));
        assert!(!registry.is_starred("tech", 1));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_malformed_payload_is_empty() {
        let store = MemoryStore::with_entries([("reader-starred", "[1,2,3]")]);
        let registry = StarRegistry::hydrate(&Persistence::new(store, DEFAULT_NAMESPACE));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let store = MemoryStore::with_entries([(
            "reader-starred",
            r#"{"news:1":true,"news:2":false,"bogus":true,"news:x":true,"a:b:3":true}"#,
        )]);
        let registry = StarRegistry::hydrate(&Persistence::new(store, DEFAULT_NAMESPACE));

        assert_eq!(registry.count(), 2);
        assert!(registry.is_starred("news", 1));
        assert!(registry.is_starred("a:b", 3));
        assert!(!registry.is_starred("news", 2));
    }

    #[test]
    fn test_star_key_parse() {
        assert_eq!(StarKey::parse("news:5"), Some(StarKey::new("news", 5)));
        assert_eq!(StarKey::parse(":5"), None);
        assert_eq!(StarKey::parse("news"), None);
        assert_eq!(StarKey::new("news", 5).to_string(), "news:5");
    }

    #[test]
    fn test_unstarring_last_post_drops_channel_entry() {
        let p = persistence();
        let mut registry = StarRegistry::hydrate(&p);
        registry.toggle("news", 1, &p);
        registry.toggle("news", 2, &p);
        registry.toggle("tech", 7, &p);
        registry.toggle("news", 1, &p);
        registry.toggle("news", 2, &p);

        assert_eq!(registry.count(), 1);
        assert!(!registry.is_starred("news", 1));
        let keys: Vec<StarKey> = registry.iter().collect();
        assert_eq!(keys, vec![StarKey::new("tech", 7)]);

        // Star again after the channel entry was dropped
        assert!(registry.toggle("news", 2, &p));
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_storage_unavailable() {
        let p = Persistence::new(UnavailableStore, DEFAULT_NAMESPACE);
        let mut registry = StarRegistry::hydrate(&p);
        assert!(registry.toggle("news", 1, &p));
        assert!(registry.is_starred("news", 1));
    }
}
