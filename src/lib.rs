//! Client-side reading state for a multi-channel feed viewer.
//!
//! Tracks which posts are read or new per channel, a global star registry,
//! and the active view with its search/tag/star filters. All state is kept in
//! memory and persisted best-effort through a namespaced key-value store.

pub mod app;
pub mod config;
pub mod feed;
pub mod preferences;
pub mod projection;
pub mod state;
pub mod storage;
pub mod util;

pub use app::Reader;
pub use config::Config;
pub use projection::Projection;
