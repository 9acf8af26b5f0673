//! Text helpers shared by the filter composer and the search debouncer.

mod text;

pub use text::{fold_search_text, normalize_query};
