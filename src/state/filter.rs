//! Composable post filter and tag-menu aggregation.
//!
//! A post is visible iff it passes every active axis: star-only, tag, and
//! search text. Axes are checked cheapest first and short-circuit per post.
use std::collections::HashMap;

use serde::Serialize;

use super::stars::StarRegistry;
use crate::feed::Post;
use crate::util::normalize_query;

/// Transient per-view filter. Fully reset on view switch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    /// Normalized (trimmed, lowercase) query; empty matches everything.
    search_query: String,
    active_tag: Option<String>,
    star_only: bool,
}

impl FilterState {
    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn active_tag(&self) -> Option<&str> {
        self.active_tag.as_deref()
    }

    pub fn star_only(&self) -> bool {
        self.star_only
    }

    pub fn set_search_query(&mut self, raw: &str) {
        self.search_query = normalize_query(raw);
    }

    /// Set or clear the tag axis. An empty tag clears it; any other value is
    /// compared verbatim.
    pub fn set_tag(&mut self, tag: Option<&str>) {
        self.active_tag = tag.filter(|t| !t.is_empty()).map(str::to_string);
    }

    pub fn set_star_only(&mut self, star_only: bool) {
        self.star_only = star_only;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// True when no axis restricts the collection.
    pub fn is_empty(&self) -> bool {
        self.search_query.is_empty() && self.active_tag.is_none() && !self.star_only
    }

    /// Evaluate all three axes for one post.
    pub fn matches(&self, post: &Post, stars: &StarRegistry) -> bool {
        if self.star_only && !stars.is_starred(&post.slug, post.id) {
            return false;
        }
        if let Some(tag) = &self.active_tag {
            if !post.has_tag(tag) {
                return false;
            }
        }
        self.search_query.is_empty() || post.search_text().contains(self.search_query.as_str())
    }
}

/// Visible subset of `posts` under `filter`, preserving order.
pub fn visible_posts<'a, I>(posts: I, filter: &FilterState, stars: &StarRegistry) -> Vec<&'a Post>
where
    I: IntoIterator<Item = &'a Post>,
{
    posts
        .into_iter()
        .filter(|post| filter.matches(post, stars))
        .collect()
}

/// One entry of the tag menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Count tag occurrences over `posts` (unfiltered scope of a view).
///
/// Sorted by count descending; ties keep first-seen order in `posts`, so the
/// result is reproducible for identical input order.
pub fn tag_menu<'a, I>(posts: I) -> Vec<TagCount>
where
    I: IntoIterator<Item = &'a Post>,
{
    let mut menu: Vec<TagCount> = Vec::new();
    let mut slots: HashMap<&'a str, usize> = HashMap::new();

    for post in posts {
        for tag in post.tags() {
            match slots.get(tag.as_str()) {
                Some(&slot) => menu[slot].count += 1,
                None => {
                    slots.insert(tag.as_str(), menu.len());
                    menu.push(TagCount {
                        tag: tag.clone(),
                        count: 1,
                    });
                }
            }
        }
    }

    // sort_by is stable: equal counts stay in first-seen order
    menu.sort_by(|a, b| b.count.cmp(&a.count));
    menu
}
