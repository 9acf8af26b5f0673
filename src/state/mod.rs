//! Reading-state stores and the derivations over them.
//!
//! - [`channel`] - per-channel read history, read index, and new-post watermark
//! - [`stars`] - global cross-channel star registry
//! - [`filter`] - search/tag/star-only composition and tag-menu aggregation
//! - [`view`] - active-view state machine
//! - [`search`] - debounced search input
//!
//! Stores receive the persistence adapter as an argument on every mutation;
//! none of them hold global or shared handles.

pub mod channel;
pub mod filter;
pub mod search;
pub mod stars;
pub mod view;

pub use channel::{ChannelReadState, ReadStates};
pub use filter::{tag_menu, visible_posts, FilterState, TagCount};
pub use search::{SearchDebouncer, DEFAULT_SEARCH_DEBOUNCE};
pub use stars::{StarKey, StarRegistry};
pub use view::{View, ViewController};
