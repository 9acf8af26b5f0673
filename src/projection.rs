//! Observable indicators derived from the stores.
//!
//! A [`Projection`] is what a rendering layer reflects: read/new/starred
//! flags and visibility per post in the active view, unread badges, the
//! starred total, and the `read / total` counter. It is recomputed from
//! scratch after every command; nothing here is stored.
use std::fmt;

use serde::Serialize;

use crate::feed::Feed;
use crate::state::{FilterState, ReadStates, StarRegistry, TagCount, View, ViewController};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRow {
    pub slug: String,
    pub id: i64,
    pub read: bool,
    pub new: bool,
    pub starred: bool,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelBadge {
    pub slug: String,
    pub name: String,
    pub unread: usize,
}

/// Progress over the visible posts only; hidden posts count in neither part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadCounter {
    pub read: usize,
    pub total: usize,
}

impl fmt::Display for ReadCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.read, self.total)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub active_view: View,
    pub filter: FilterState,
    pub tag_menu: Vec<TagCount>,
    /// Rows of the active view's collection, in display order.
    pub posts: Vec<PostRow>,
    pub channels: Vec<ChannelBadge>,
    pub unread_total: usize,
    pub starred_total: usize,
    pub counter: ReadCounter,
    pub tags_expanded: bool,
}

impl Projection {
    pub fn build(
        feed: &Feed,
        states: &ReadStates,
        stars: &StarRegistry,
        controller: &ViewController,
        tags_expanded: bool,
    ) -> Self {
        let filter = controller.filter();
        let mut counter = ReadCounter::default();

        let posts: Vec<PostRow> = controller
            .active()
            .collection(feed)
            .into_iter()
            .map(|post| {
                let read = states.is_read(&post.slug, post.id);
                let visible = filter.matches(post, stars);
                if visible {
                    counter.total += 1;
                    if read {
                        counter.read += 1;
                    }
                }
                PostRow {
                    slug: post.slug.clone(),
                    id: post.id,
                    read,
                    new: states.is_new(&post.slug, post.id),
                    starred: stars.is_starred(&post.slug, post.id),
                    visible,
                }
            })
            .collect();

        let channels = states
            .iter()
            .map(|state| ChannelBadge {
                slug: state.channel().slug.clone(),
                name: state.channel().name.clone(),
                unread: state.unread_count(),
            })
            .collect();

        Self {
            active_view: controller.active().clone(),
            filter: filter.clone(),
            tag_menu: controller.tag_menu().to_vec(),
            posts,
            channels,
            unread_total: states.total_unread(),
            starred_total: stars.count(),
            counter,
            tags_expanded,
        }
    }

    /// Sidebar badge for a view: unread for a channel, aggregate unread for
    /// `latest`, starred total for `starred`.
    pub fn badge(&self, view: &View) -> usize {
        match view {
            View::Latest => self.unread_total,
            View::Starred => self.starred_total,
            View::Channel(slug) => self
                .channels
                .iter()
                .find(|c| &c.slug == slug)
                .map_or(0, |c| c.unread),
        }
    }

    pub fn row(&self, slug: &str, id: i64) -> Option<&PostRow> {
        self.posts.iter().find(|r| r.slug == slug && r.id == id)
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = &PostRow> {
        self.posts.iter().filter(|r| r.visible)
    }
}
