//! UI-only preferences that live next to the reading state.
//!
//! Currently just the tag-menu collapse flag, stored as `"0"` / `"1"` under
//! `<namespace>-tags-expanded`. No invariant depends on it.
use crate::storage::{KeyValueStore, Persistence, StorageKey};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Preferences {
    tags_expanded: bool,
}

impl Preferences {
    /// Load stored preferences. Anything other than `"1"` means collapsed.
    pub fn load<S: KeyValueStore>(persistence: &Persistence<S>) -> Self {
        let tags_expanded = persistence
            .load_text(StorageKey::TagsExpanded)
            .is_some_and(|v| v == "1");
        Self { tags_expanded }
    }

    pub fn tags_expanded(&self) -> bool {
        self.tags_expanded
    }

    pub fn set_tags_expanded<S: KeyValueStore>(
        &mut self,
        expanded: bool,
        persistence: &Persistence<S>,
    ) {
        self.tags_expanded = expanded;
        persistence.save_text(StorageKey::TagsExpanded, if expanded { "1" } else { "0" });
    }
}
