//! Per-channel read tracking and new-post detection.
//!
//! Each channel keeps an append-only read history (`read_posts`), an index
//! over it (`read_set`, always equal to set-of(`read_posts`)), and the
//! `last_sync_max_id` watermark. Posts at or below the watermark are never
//! "new"; only a bulk mark-all-read advances it.
use std::collections::{HashMap, HashSet};

use crate::feed::{Channel, Feed};
use crate::storage::{KeyValueStore, PersistedReadState, Persistence, StorageKey};

// ============================================================================
// ChannelReadState
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChannelReadState {
    channel: Channel,
    known: HashSet<i64>,
    read_posts: Vec<i64>,
    read_set: HashSet<i64>,
    last_sync_max_id: i64,
    /// True iff no usable persisted state existed at load. Never persisted.
    is_first_visit: bool,
}

impl ChannelReadState {
    /// Load a channel's state from `<namespace>-<channelId>`.
    ///
    /// Absent or malformed state yields an empty history with the watermark at
    /// `channel.max_id` and `is_first_visit = true`. Persisted ids that are not
    /// among `known_post_ids` are dropped, as are repeats.
    pub fn hydrate<S, I>(channel: &Channel, known_post_ids: I, persistence: &Persistence<S>) -> Self
    where
        S: KeyValueStore,
        I: IntoIterator<Item = i64>,
    {
        let known: HashSet<i64> = known_post_ids.into_iter().collect();
        let persisted: Option<PersistedReadState> =
            persistence.load(StorageKey::Channel(channel.channel_id.as_str()));

        let (persisted, is_first_visit) = match persisted {
            Some(state) => (state, false),
            None => (
                PersistedReadState {
                    read_posts: Vec::new(),
                    last_sync_max_id: channel.max_id,
                },
                true,
            ),
        };

        let mut read_posts = Vec::with_capacity(persisted.read_posts.len());
        let mut read_set = HashSet::with_capacity(persisted.read_posts.len());
        let mut stale = 0usize;
        for id in persisted.read_posts {
            if !known.contains(&id) {
                stale += 1;
                continue;
            }
            if read_set.insert(id) {
                read_posts.push(id);
            }
        }
        if stale > 0 {
            tracing::debug!(slug = %channel.slug, stale, "Dropped read ids no longer in the channel");
        }

        tracing::debug!(
            slug = %channel.slug,
            read = read_posts.len(),
            watermark = persisted.last_sync_max_id,
            first_visit = is_first_visit,
            "Hydrated channel read state"
        );

        Self {
            channel: channel.clone(),
            known,
            read_posts,
            read_set,
            last_sync_max_id: persisted.last_sync_max_id,
            is_first_visit,
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn is_read(&self, post_id: i64) -> bool {
        self.read_set.contains(&post_id)
    }

    /// Mark one post read and persist immediately.
    ///
    /// Idempotent. Ids outside the channel's known posts are ignored.
    /// Returns whether the post was newly marked.
    pub fn mark_read<S: KeyValueStore>(&mut self, post_id: i64, persistence: &Persistence<S>) -> bool {
        let inserted = self.insert(post_id);
        if inserted {
            self.persist(persistence);
        }
        inserted
    }

    /// `true` iff this is not the first visit, the id is above the watermark,
    /// and the post has not been read.
    pub fn is_new(&self, post_id: i64) -> bool {
        !self.is_first_visit && post_id > self.last_sync_max_id && !self.is_read(post_id)
    }

    /// Mark every id read, then advance the watermark to `channel.max_id`.
    ///
    /// The watermark moves only after all ids are recorded so that
    /// `read_posts` captures posts between the old and new watermark. It never
    /// moves backwards, even if persisted state is ahead of the directory.
    /// Persists once, at the end. Returns how many posts were newly marked.
    pub fn mark_all_read<S, I>(&mut self, post_ids: I, persistence: &Persistence<S>) -> usize
    where
        S: KeyValueStore,
        I: IntoIterator<Item = i64>,
    {
        let marked = post_ids.into_iter().filter(|&id| self.insert(id)).count();
        self.last_sync_max_id = self.last_sync_max_id.max(self.channel.max_id);
        self.persist(persistence);
        tracing::debug!(
            slug = %self.channel.slug,
            marked,
            watermark = self.last_sync_max_id,
            "Marked channel read"
        );
        marked
    }

    /// Known posts not yet read.
    pub fn unread_count(&self) -> usize {
        self.known.len() - self.read_set.len()
    }

    /// Read ids in read order.
    pub fn read_posts(&self) -> &[i64] {
        &self.read_posts
    }

    pub fn last_sync_max_id(&self) -> i64 {
        self.last_sync_max_id
    }

    pub fn is_first_visit(&self) -> bool {
        self.is_first_visit
    }

    fn insert(&mut self, post_id: i64) -> bool {
        if !self.known.contains(&post_id) {
            tracing::debug!(slug = %self.channel.slug, post_id, "Ignoring mark-read for unknown post");
            return false;
        }
        if !self.read_set.insert(post_id) {
            return false;
        }
        self.read_posts.push(post_id);
        true
    }

    fn persist<S: KeyValueStore>(&self, persistence: &Persistence<S>) {
        let state = PersistedReadState {
            read_posts: self.read_posts.clone(),
            last_sync_max_id: self.last_sync_max_id,
        };
        persistence.save(StorageKey::Channel(self.channel.channel_id.as_str()), &state);
    }
}

// ============================================================================
// ReadStates
// ============================================================================

/// Read state for every channel in the directory, in directory order.
#[derive(Debug, Clone, Default)]
pub struct ReadStates {
    states: Vec<ChannelReadState>,
    index: HashMap<String, usize>,
}

impl ReadStates {
    pub fn hydrate<S: KeyValueStore>(feed: &Feed, persistence: &Persistence<S>) -> Self {
        for channel in feed.channels() {
            if StorageKey::is_reserved_channel_id(channel.channel_id.as_str()) {
                tracing::warn!(
                    slug = %channel.slug,
                    channel_id = %channel.channel_id,
                    key = %persistence.key(StorageKey::Channel(channel.channel_id.as_str())),
                    "Channel id collides with a reserved storage key; its read state will overwrite it"
                );
            }
        }

        let states: Vec<ChannelReadState> = feed
            .channels()
            .iter()
            .map(|channel| {
                ChannelReadState::hydrate(channel, feed.post_ids(&channel.slug), persistence)
            })
            .collect();
        let index = states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.channel.slug.clone(), i))
            .collect();
        Self { states, index }
    }

    pub fn get(&self, slug: &str) -> Option<&ChannelReadState> {
        self.index.get(slug).map(|&i| &self.states[i])
    }

    pub fn get_mut(&mut self, slug: &str) -> Option<&mut ChannelReadState> {
        self.index.get(slug).map(|&i| &mut self.states[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelReadState> {
        self.states.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ChannelReadState> {
        self.states.iter_mut()
    }

    pub fn is_read(&self, slug: &str, post_id: i64) -> bool {
        self.get(slug).is_some_and(|s| s.is_read(post_id))
    }

    pub fn is_new(&self, slug: &str, post_id: i64) -> bool {
        self.get(slug).is_some_and(|s| s.is_new(post_id))
    }

    /// Unread posts across every channel.
    pub fn total_unread(&self) -> usize {
        self.states.iter().map(ChannelReadState::unread_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Post;
    use crate::storage::{MemoryStore, UnavailableStore, DEFAULT_NAMESPACE};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn news() -> Channel {
        Channel::new("news", "1001", 3)
    }

    fn persistence() -> Persistence<MemoryStore> {
        Persistence::new(MemoryStore::new(), DEFAULT_NAMESPACE)
    }

    /// Persistence seeded with a prior visit for channel 1001.
    fn returning_visit(read_posts: &[i64], watermark: i64) -> Persistence<MemoryStore> {
        let p = persistence();
        p.save(
            StorageKey::Channel("1001"),
            &PersistedReadState {
                read_posts: read_posts.to_vec(),
                last_sync_max_id: watermark,
            },
        );
        p
    }

    #[test]
    fn test_first_visit_defaults() {
        let p = persistence();
        let state = ChannelReadState::hydrate(&news(), [1, 2, 3], &p);

        assert!(state.is_first_visit());
        assert!(state.read_posts().is_empty());
        assert_eq!(state.last_sync_max_id(), 3);
        assert_eq!(state.unread_count(), 3);
    }

    #[test]
    fn test_first_visit_never_new() {
        let p = persistence();
        let channel = Channel::new("news", "1001", 100);
        let state = ChannelReadState::hydrate(&channel, [50, 100, 101, 500], &p);

        for id in [50, 100, 101, 500] {
            assert!(!state.is_new(id), "post {} flagged new on first visit", id);
        }
    }

    #[test]
    fn test_new_post_rule_on_return_visit() {
        let p = returning_visit(&[], 100);
        let channel = Channel::new("news", "1001", 101);
        let mut state = ChannelReadState::hydrate(&channel, [100, 101], &p);

        assert!(!state.is_first_visit());
        assert!(state.is_new(101));
        assert!(!state.is_new(100));

        state.mark_read(101, &p);
        assert!(!state.is_new(101));
        assert!(!state.is_new(100));
    }

    #[test]
    fn test_storage_key_uses_channel_id_not_slug() {
        let p = persistence();
        let mut state = ChannelReadState::hydrate(&news(), [1, 2, 3], &p);
        state.mark_read(2, &p);

        assert!(p.store().get("reader-1001").unwrap().is_some());
        assert!(p.store().get("reader-news").unwrap().is_none());
    }

    #[test]
    fn test_mark_read_persists_immediately() {
        let p = persistence();
        let mut state = ChannelReadState::hydrate(&news(), [1, 2, 3], &p);
        assert!(state.mark_read(2, &p));

        let reloaded = ChannelReadState::hydrate(&news(), [1, 2, 3], &p);
        assert!(!reloaded.is_first_visit());
        assert!(reloaded.is_read(2));
        assert_eq!(reloaded.read_posts(), &[2]);
    }

    #[test]
    fn test_mark_read_idempotent() {
        let p = persistence();
        let mut state = ChannelReadState::hydrate(&news(), [1, 2, 3], &p);
        assert!(state.mark_read(1, &p));
        let once = state.read_posts().to_vec();
        assert!(!state.mark_read(1, &p));

        assert_eq!(state.read_posts(), once.as_slice());
        assert_eq!(state.unread_count(), 2);
    }

    #[test]
    fn test_mark_read_unknown_post_ignored() {
        let p = persistence();
        let mut state = ChannelReadState::hydrate(&news(), [1, 2, 3], &p);
        assert!(!state.mark_read(99, &p));
        assert!(state.read_posts().is_empty());
        assert!(p.store().is_empty());
    }

    #[test]
    fn test_read_order_preserved() {
        let p = persistence();
        let mut state = ChannelReadState::hydrate(&news(), [1, 2, 3], &p);
        state.mark_read(3, &p);
        state.mark_read(1, &p);
        state.mark_read(2, &p);
        assert_eq!(state.read_posts(), &[3, 1, 2]);
    }

    #[test]
    fn test_mark_all_read_scenario() {
        let p = persistence();
        let mut state = ChannelReadState::hydrate(&news(), [1, 2, 3], &p);
        let marked = state.mark_all_read([1, 2, 3], &p);

        assert_eq!(marked, 3);
        let read: HashSet<i64> = state.read_posts().iter().copied().collect();
        assert_eq!(read, HashSet::from([1, 2, 3]));
        assert_eq!(state.last_sync_max_id(), 3);
        assert_eq!(state.unread_count(), 0);

        let stored: PersistedReadState = p.load(StorageKey::Channel("1001")).unwrap();
        assert_eq!(stored.last_sync_max_id, 3);
        assert_eq!(stored.read_posts.len(), 3);
    }

    #[test]
    fn test_mark_all_read_advances_watermark() {
        let p = returning_visit(&[], 1);
        let channel = Channel::new("news", "1001", 5);
        let mut state = ChannelReadState::hydrate(&channel, [1, 2, 3, 4, 5], &p);
        assert!(state.is_new(4));

        state.mark_all_read([1, 2, 3, 4, 5], &p);
        assert_eq!(state.last_sync_max_id(), 5);
        assert!(!state.is_new(4));
    }

    #[test]
    fn test_watermark_never_decreases() {
        // Persisted state is ahead of the directory (stale server data)
        let p = returning_visit(&[], 10);
        let mut state = ChannelReadState::hydrate(&news(), [1, 2, 3], &p);
        state.mark_all_read([1, 2, 3], &p);
        assert_eq!(state.last_sync_max_id(), 10);
    }

    #[test]
    fn test_malformed_state_treated_as_first_visit() {
        let store = MemoryStore::with_entries([("reader-1001", r#"{"readPosts": 5}"#)]);
        let p = Persistence::new(store, DEFAULT_NAMESPACE);
        let state = ChannelReadState::hydrate(&news(), [1, 2, 3], &p);

        assert!(state.is_first_visit());
        assert_eq!(state.last_sync_max_id(), 3);
        assert!(state.read_posts().is_empty());
    }

    #[test]
    fn test_stale_and_duplicate_ids_pruned() {
        let p = returning_visit(&[2, 42, 2, 1], 3);
        let state = ChannelReadState::hydrate(&news(), [1, 2, 3], &p);

        assert_eq!(state.read_posts(), &[2, 1]);
        assert_eq!(state.unread_count(), 1);
    }

    #[test]
    fn test_storage_unavailable_keeps_memory_state() {
        let p = Persistence::new(UnavailableStore, DEFAULT_NAMESPACE);
        let mut state = ChannelReadState::hydrate(&news(), [1, 2, 3], &p);
        assert!(state.is_first_visit());

        assert!(state.mark_read(1, &p));
        assert!(state.is_read(1));
        state.mark_all_read([1, 2, 3], &p);
        assert_eq!(state.unread_count(), 0);
    }

    #[test]
    fn test_read_states_aggregate_unread() {
        let feed = Feed::new(
            vec![Channel::new("news", "1001", 2), Channel::new("tech", "1002", 1)],
            vec![
                Post::new(2, "news", ["x"], "b"),
                Post::new(1, "tech", ["y"], "a"),
                Post::new(1, "news", ["x"], "c"),
            ],
        );
        let p = persistence();
        let mut states = ReadStates::hydrate(&feed, &p);
        assert_eq!(states.total_unread(), 3);

        states.get_mut("news").unwrap().mark_read(1, &p);
        assert!(states.is_read("news", 1));
        assert!(!states.is_read("tech", 1));
        assert!(!states.is_read("ghost", 1));
        assert_eq!(states.get("news").unwrap().unread_count(), 1);
        assert_eq!(states.total_unread(), 2);
    }

    #[test]
    fn test_reserved_channel_id_still_hydrates() {
        // "starred" shares its key with the star registry; a registry payload
        // there is not a read state, so the channel starts as a first visit.
        let store = MemoryStore::with_entries([("reader-starred", r#"{"news:1":true}"#)]);
        let p = Persistence::new(store, DEFAULT_NAMESPACE);
        let feed = Feed::new(
            vec![Channel::new("odd", "starred", 1)],
            vec![Post::new(1, "odd", ["x"], "a")],
        );

        let mut states = ReadStates::hydrate(&feed, &p);
        let odd = states.get("odd").unwrap();
        assert!(odd.is_first_visit());
        assert!(StorageKey::is_reserved_channel_id(odd.channel().channel_id.as_str()));

        states.get_mut("odd").unwrap().mark_read(1, &p);
        assert!(states.is_read("odd", 1));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Read(i64),
        ReadAll,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![(0i64..12).prop_map(Op::Read), Just(Op::ReadAll)]
    }

    proptest! {
        #[test]
        fn prop_read_set_matches_history(ops in proptest::collection::vec(op(), 0..40)) {
            let p = persistence();
            let channel = Channel::new("news", "1001", 10);
            let ids: Vec<i64> = (1..=10).collect();
            let mut state = ChannelReadState::hydrate(&channel, ids.clone(), &p);

            for op in ops {
                match op {
                    Op::Read(id) => { state.mark_read(id, &p); }
                    Op::ReadAll => { state.mark_all_read(ids.clone(), &p); }
                }
                let history: HashSet<i64> = state.read_posts().iter().copied().collect();
                prop_assert_eq!(history.len(), state.read_posts().len());
                for id in 0..12 {
                    prop_assert_eq!(state.is_read(id), history.contains(&id));
                }
            }
        }

        #[test]
        fn prop_watermark_monotonic(start in 0i64..20, ops in proptest::collection::vec(op(), 0..40)) {
            let p = returning_visit(&[], start);
            let channel = Channel::new("news", "1001", 10);
            let ids: Vec<i64> = (1..=10).collect();
            let mut state = ChannelReadState::hydrate(&channel, ids.clone(), &p);

            let mut previous = state.last_sync_max_id();
            for op in ops {
                match op {
                    Op::Read(id) => { state.mark_read(id, &p); }
                    Op::ReadAll => { state.mark_all_read(ids.clone(), &p); }
                }
                prop_assert!(state.last_sync_max_id() >= previous);
                previous = state.last_sync_max_id();
            }
        }
    }
}
