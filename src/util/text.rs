use std::borrow::Cow;

/// Normalize a raw search box value into the form matched against post text.
///
/// Trims surrounding whitespace and lowercases. The query is never shortened:
/// a post matches only if it contains the whole query.
///
/// # Examples
///
/// ```
/// use chanread::util::normalize_query;
///
/// assert_eq!(normalize_query("  Rust News "), "rust news");
/// assert_eq!(normalize_query("   "), "");
/// ```
pub fn normalize_query(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Lowercase a search haystack, borrowing when it is already lowercase.
///
/// Hosts are expected to hand over lowercase text; this is the fast path.
pub fn fold_search_text(text: &str) -> Cow<'_, str> {
    if text.chars().any(char::is_uppercase) {
        Cow::Owned(text.to_lowercase())
    } else {
        Cow::Borrowed(text)
    }
}
