//! Host-supplied channel directory and post collections.
//!
//! The engine never fetches or parses markup: the host hands over a fixed,
//! already-materialized list of posts, and this module indexes it.
//!
//! - [`Channel`] / [`ChannelId`] - channel directory entries
//! - [`Post`] - read-only post record with a precomputed tag set
//! - [`Feed`] - directory + aggregate post order + per-channel index
//! - [`load_bundle`] / [`parse_bundle`] - JSON loader for the host input document

mod bundle;

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::util::fold_search_text;

pub use bundle::{load_bundle, parse_bundle, BundleError};

// ============================================================================
// Channel
// ============================================================================

/// Stable storage namespace for a channel. May differ from the slug.
///
/// Accepted from input as either a JSON string or an integer, since channel
/// directories exported from chat platforms carry numeric ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ChannelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => ChannelId(s),
            Raw::Number(n) => ChannelId(n.to_string()),
        })
    }
}

/// One entry of the channel directory. Immutable for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub slug: String,
    pub channel_id: ChannelId,
    /// Highest post id known when the page was rendered.
    pub max_id: i64,
    pub name: String,
}

impl Channel {
    pub fn new(slug: impl Into<String>, channel_id: impl Into<String>, max_id: i64) -> Self {
        let slug = slug.into();
        Self {
            name: slug.clone(),
            slug,
            channel_id: ChannelId::new(channel_id),
            max_id,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

// ============================================================================
// Post
// ============================================================================

/// Wire shape of a post in the host bundle.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostRecord {
    id: i64,
    slug: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    search_text: String,
    #[serde(default)]
    date: Option<i64>,
}

impl From<PostRecord> for Post {
    fn from(record: PostRecord) -> Self {
        let post = Post::new(record.id, record.slug, record.tags, &record.search_text);
        match record.date {
            Some(date) => post.with_date(date),
            None => post,
        }
    }
}

/// A post as supplied by the host. The engine never mutates it.
///
/// `tags` keeps first-occurrence order (tag menu aggregation depends on it);
/// `tag_set` gives O(1) membership for the tag filter.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "PostRecord")]
pub struct Post {
    pub id: i64,
    pub slug: String,
    /// Unix seconds, display only.
    pub date: Option<i64>,
    tags: Vec<String>,
    tag_set: HashSet<String>,
    search_text: String,
}

impl Post {
    pub fn new<I, T>(id: i64, slug: impl Into<String>, tags: I, search_text: &str) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut tag_set = HashSet::new();
        for tag in tags {
            let tag: String = tag.into();
            if tag.is_empty() {
                continue;
            }
            if tag_set.insert(tag.clone()) {
                ordered.push(tag);
            }
        }

        Self {
            id,
            slug: slug.into(),
            date: None,
            tags: ordered,
            tag_set,
            search_text: fold_search_text(search_text).into_owned(),
        }
    }

    pub fn with_date(mut self, date: i64) -> Self {
        self.date = Some(date);
        self
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag_set.contains(tag)
    }

    /// Lowercase haystack for substring search.
    pub fn search_text(&self) -> &str {
        &self.search_text
    }
}

// ============================================================================
// Feed
// ============================================================================

/// Channel directory plus every post, in aggregate ("latest") order.
#[derive(Debug, Clone, Default)]
pub struct Feed {
    channels: Vec<Channel>,
    posts: Vec<Post>,
    /// slug -> indices into `posts`, in aggregate order
    by_channel: HashMap<String, Vec<usize>>,
}

impl Feed {
    /// Build a feed, dropping posts whose slug is not in the directory and
    /// repeated `(slug, id)` pairs (first occurrence wins).
    pub fn new(channels: Vec<Channel>, posts: Vec<Post>) -> Self {
        let mut by_channel: HashMap<String, Vec<usize>> = channels
            .iter()
            .map(|c| (c.slug.clone(), Vec::new()))
            .collect();
        let mut seen: HashSet<(String, i64)> = HashSet::new();
        let mut kept = Vec::with_capacity(posts.len());

        for post in posts {
            let Some(indices) = by_channel.get_mut(&post.slug) else {
                tracing::warn!(slug = %post.slug, post_id = post.id, "Post references unknown channel, dropping");
                continue;
            };
            if !seen.insert((post.slug.clone(), post.id)) {
                tracing::debug!(slug = %post.slug, post_id = post.id, "Duplicate post, keeping first");
                continue;
            }
            indices.push(kept.len());
            kept.push(post);
        }

        Self {
            channels,
            posts: kept,
            by_channel,
        }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, slug: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.slug == slug)
    }

    pub fn has_channel(&self, slug: &str) -> bool {
        self.by_channel.contains_key(slug)
    }

    /// Every post, in aggregate order.
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// One channel's posts, in aggregate order. Empty for unknown slugs.
    pub fn channel_posts<'a>(&'a self, slug: &str) -> impl Iterator<Item = &'a Post> + 'a {
        self.by_channel
            .get(slug)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .map(move |&i| &self.posts[i])
    }

    pub fn post_ids(&self, slug: &str) -> Vec<i64> {
        self.channel_posts(slug).map(|p| p.id).collect()
    }
}
