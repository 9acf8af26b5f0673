use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::{Channel, ChannelId, Feed, Post};

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Failed to read feed bundle: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid feed bundle JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelRecord {
    channel_id: ChannelId,
    #[serde(default)]
    max_id: Option<i64>,
    #[serde(default)]
    name: Option<String>,
}

/// Host input document:
///
/// ```json
/// {
///   "channels": { "news": { "channelId": 1001, "maxId": 3, "name": "News" } },
///   "posts": [ { "id": 3, "slug": "news", "tags": ["x"], "searchText": "..." } ]
/// }
/// ```
///
/// `posts` is in aggregate display order. Channels are ordered by slug.
#[derive(Deserialize)]
struct BundleFile {
    channels: BTreeMap<String, ChannelRecord>,
    #[serde(default)]
    posts: Vec<Post>,
}

/// Parse a bundle from JSON text.
///
/// A channel without `maxId` gets the highest id among its posts (0 if none).
pub fn parse_bundle(json: &str) -> Result<Feed, BundleError> {
    let file: BundleFile = serde_json::from_str(json)?;

    let channels = file
        .channels
        .into_iter()
        .map(|(slug, record)| {
            let max_id = record.max_id.unwrap_or_else(|| {
                file.posts
                    .iter()
                    .filter(|p| p.slug == slug)
                    .map(|p| p.id)
                    .max()
                    .unwrap_or(0)
            });
            let name = record.name.unwrap_or_else(|| slug.clone());
            Channel {
                slug,
                channel_id: record.channel_id,
                max_id,
                name,
            }
        })
        .collect();

    Ok(Feed::new(channels, file.posts))
}

/// Read and parse a bundle file.
pub fn load_bundle(path: &Path) -> Result<Feed, BundleError> {
    let content = std::fs::read_to_string(path)?;
    let feed = parse_bundle(&content)?;
    tracing::info!(
        path = %path.display(),
        channels = feed.channels().len(),
        posts = feed.posts().len(),
        "Loaded feed bundle"
    );
    Ok(feed)
}
