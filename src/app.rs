use crate::config::Config;
use crate::feed::Feed;
use crate::preferences::Preferences;
use crate::projection::Projection;
use crate::state::{ReadStates, SearchDebouncer, StarRegistry, View, ViewController};
use crate::storage::{KeyValueStore, Persistence};
use tokio::time::Instant;

// ============================================================================
// Reader Engine
// ============================================================================

/// Reading-state engine for one feed bundle.
///
/// Every user action is an explicit command that mutates the stores, persists
/// through the adapter, and returns the freshly derived [`Projection`]. The
/// rendering layer only ever reads projections.
#[derive(Debug)]
pub struct Reader<S> {
    persistence: Persistence<S>,
    feed: Feed,
    states: ReadStates,
    stars: StarRegistry,
    views: ViewController,
    search: SearchDebouncer,
    preferences: Preferences,
}

impl<S: KeyValueStore> Reader<S> {
    /// Hydrate every store from persistence.
    ///
    /// Never fails: unreadable or malformed state degrades to defaults.
    pub fn new(feed: Feed, persistence: Persistence<S>, config: &Config) -> Self {
        let states = ReadStates::hydrate(&feed, &persistence);
        let stars = StarRegistry::hydrate(&persistence);
        let views = ViewController::hydrate(&feed, &config.default_view, &persistence);
        let preferences = Preferences::load(&persistence);

        tracing::info!(
            channels = feed.channels().len(),
            posts = feed.posts().len(),
            starred = stars.count(),
            view = %views.active(),
            "Reader initialized"
        );

        Self {
            persistence,
            feed,
            states,
            stars,
            views,
            search: SearchDebouncer::new(config.search_debounce()),
            preferences,
        }
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    pub fn persistence(&self) -> &Persistence<S> {
        &self.persistence
    }

    pub fn read_states(&self) -> &ReadStates {
        &self.states
    }

    pub fn stars(&self) -> &StarRegistry {
        &self.stars
    }

    pub fn active_view(&self) -> &View {
        self.views.active()
    }

    pub fn tags_expanded(&self) -> bool {
        self.preferences.tags_expanded()
    }

    pub fn search_pending(&self) -> bool {
        self.search.is_pending()
    }

    /// Current derived state, for hosts that poll.
    pub fn projection(&self) -> Projection {
        Projection::build(
            &self.feed,
            &self.states,
            &self.stars,
            &self.views,
            self.preferences.tags_expanded(),
        )
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Open a post, marking it read. Unknown channels are ignored.
    pub fn open_post(&mut self, slug: &str, post_id: i64) -> Projection {
        match self.states.get_mut(slug) {
            Some(state) => {
                state.mark_read(post_id, &self.persistence);
            }
            None => tracing::debug!(slug = %slug, post_id, "Open on unknown channel ignored"),
        }
        self.projection()
    }

    pub fn toggle_star(&mut self, slug: &str, post_id: i64) -> Projection {
        self.stars.toggle(slug, post_id, &self.persistence);
        self.projection()
    }

    /// Switch the active view by name. Unknown names land on `latest`.
    ///
    /// A pending debounced search belongs to the view being left and is
    /// dropped along with the other filters.
    pub fn switch_view(&mut self, target: &str) -> Projection {
        let target = View::resolve(target, &self.feed);
        if self.views.switch_view(target, &self.feed, &self.persistence) && self.search.cancel() {
            tracing::debug!("Dropped pending search on view switch");
        }
        self.projection()
    }

    /// Set or clear (`None` or empty) the active tag.
    pub fn set_tag(&mut self, tag: Option<&str>) -> Projection {
        self.views.set_tag(tag);
        self.projection()
    }

    pub fn toggle_star_filter(&mut self) -> Projection {
        let star_only = self.views.toggle_star_only();
        tracing::debug!(star_only, "Toggled star filter");
        self.projection()
    }

    /// Apply a search query immediately, superseding any pending keystroke.
    pub fn set_search(&mut self, query: &str) -> Projection {
        self.search.cancel();
        self.views.set_search_query(query);
        self.projection()
    }

    /// Record a search keystroke. The query is applied by a later `tick`
    /// once the debounce delay has passed without further input.
    pub fn type_search(&mut self, query: &str, now: Instant) -> Projection {
        self.search.schedule(query, now);
        self.projection()
    }

    /// Drive the debouncer. Returns a projection only if a search was applied.
    pub fn tick(&mut self, now: Instant) -> Option<Projection> {
        let query = self.search.poll(now)?;
        self.views.set_search_query(&query);
        tracing::debug!(query = %self.views.filter().search_query(), "Applied debounced search");
        Some(self.projection())
    }

    /// Mark every post in the active view's scope read and advance the
    /// watermarks. In `latest` and `starred` that is every channel, whatever
    /// the filters currently show.
    pub fn mark_all_read(&mut self) -> Projection {
        let scope: Vec<String> = self
            .views
            .mark_all_read_scope(&self.feed)
            .into_iter()
            .map(|channel| channel.slug.clone())
            .collect();

        let mut marked = 0;
        for slug in &scope {
            let ids = self.feed.post_ids(slug);
            if let Some(state) = self.states.get_mut(slug) {
                marked += state.mark_all_read(ids, &self.persistence);
            }
        }
        tracing::info!(
            view = %self.views.active(),
            channels = scope.len(),
            marked,
            "Marked all read"
        );
        self.projection()
    }

    pub fn set_tags_expanded(&mut self, expanded: bool) -> Projection {
        self.preferences
            .set_tags_expanded(expanded, &self.persistence);
        self.projection()
    }
}

// ============================================================================
// Tests
// ============================================================================
