//! Active-view state machine.
//!
//! States are `latest` (every channel merged), `starred` (the latest
//! collection with star-only forced on), and one state per channel slug.
//! Switching views resets every filter axis and recomputes the tag menu.
use std::fmt;

use serde::{Serialize, Serializer};

use super::filter::{tag_menu, FilterState, TagCount};
use crate::feed::{Channel, Feed, Post};
use crate::storage::{KeyValueStore, Persistence, StorageKey};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum View {
    Latest,
    Starred,
    Channel(String),
}

impl View {
    pub const LATEST: &'static str = "latest";
    pub const STARRED: &'static str = "starred";

    pub fn as_str(&self) -> &str {
        match self {
            View::Latest => Self::LATEST,
            View::Starred => Self::STARRED,
            View::Channel(slug) => slug,
        }
    }

    /// Parse a view identifier against the channel directory.
    ///
    /// `None` when the identifier names neither a known channel nor one of
    /// the reserved views. Reserved names win over same-named slugs.
    pub fn parse(raw: &str, feed: &Feed) -> Option<View> {
        match raw {
            Self::LATEST => Some(View::Latest),
            Self::STARRED => Some(View::Starred),
            slug if feed.has_channel(slug) => Some(View::Channel(slug.to_string())),
            _ => None,
        }
    }

    /// Like [`View::parse`], coercing unknown identifiers to `latest`.
    pub fn resolve(raw: &str, feed: &Feed) -> View {
        View::parse(raw, feed).unwrap_or_else(|| {
            tracing::debug!(view = %raw, "Unknown view, falling back to latest");
            View::Latest
        })
    }

    /// `latest` and `starred` both span every channel.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, View::Latest | View::Starred)
    }

    /// Underlying post collection, before filters. `starred` resolves to the
    /// aggregate collection; the star-only axis does the narrowing.
    pub fn collection<'a>(&self, feed: &'a Feed) -> Vec<&'a Post> {
        match self {
            View::Latest | View::Starred => feed.posts().iter().collect(),
            View::Channel(slug) => feed.channel_posts(slug).collect(),
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for View {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// ViewController
// ============================================================================

#[derive(Debug, Clone)]
pub struct ViewController {
    active: View,
    filter: FilterState,
    tag_menu: Vec<TagCount>,
}

impl ViewController {
    /// Cold start: restore the persisted view if it is still valid, else
    /// `fallback` (itself coerced to `latest` when unknown).
    pub fn hydrate<S: KeyValueStore>(
        feed: &Feed,
        fallback: &str,
        persistence: &Persistence<S>,
    ) -> Self {
        let active = persistence
            .load_text(StorageKey::ActiveView)
            .and_then(|raw| View::parse(&raw, feed))
            .unwrap_or_else(|| View::resolve(fallback, feed));

        let mut controller = Self {
            active: View::Latest,
            filter: FilterState::default(),
            tag_menu: Vec::new(),
        };
        controller.enter(active, feed, persistence);
        tracing::debug!(view = %controller.active, "Restored active view");
        controller
    }

    pub fn active(&self) -> &View {
        &self.active
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn tag_menu(&self) -> &[TagCount] {
        &self.tag_menu
    }

    /// Switch to `target`. A no-op when `target` is already active, so
    /// re-selecting the current view keeps its filters.
    ///
    /// A channel target missing from the directory is coerced to `latest`.
    /// Returns whether the view changed.
    pub fn switch_view<S: KeyValueStore>(
        &mut self,
        target: View,
        feed: &Feed,
        persistence: &Persistence<S>,
    ) -> bool {
        let target = match target {
            View::Channel(slug) if !feed.has_channel(&slug) => {
                tracing::debug!(view = %slug, "Unknown channel view, falling back to latest");
                View::Latest
            }
            other => other,
        };
        if target == self.active {
            return false;
        }
        self.enter(target, feed, persistence);
        true
    }

    pub fn set_search_query(&mut self, raw: &str) {
        self.filter.set_search_query(raw);
    }

    pub fn set_tag(&mut self, tag: Option<&str>) {
        self.filter.set_tag(tag);
    }

    /// Flip the star-only axis. Returns the new value.
    pub fn toggle_star_only(&mut self) -> bool {
        let star_only = !self.filter.star_only();
        self.filter.set_star_only(star_only);
        star_only
    }

    /// Channels a "mark all read" affects in the active view: every channel
    /// for `latest`/`starred`, regardless of the visible subset.
    pub fn mark_all_read_scope<'a>(&self, feed: &'a Feed) -> Vec<&'a Channel> {
        match &self.active {
            View::Latest | View::Starred => feed.channels().iter().collect(),
            View::Channel(slug) => feed.channel(slug).into_iter().collect(),
        }
    }

    fn enter<S: KeyValueStore>(&mut self, target: View, feed: &Feed, persistence: &Persistence<S>) {
        self.filter.clear();
        if target == View::Starred {
            self.filter.set_star_only(true);
        }
        self.tag_menu = tag_menu(target.collection(feed));
        persistence.save_text(StorageKey::ActiveView, target.as_str());
        tracing::debug!(from = %self.active, to = %target, "Switched view");
        self.active = target;
    }
}
