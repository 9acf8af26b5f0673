use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage-layer errors.
///
/// These never reach the reading-state engine: the persistence adapter logs
/// and swallows them. Only the CLI edges (open, export, import) surface them.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Another instance of the application has locked the database
    #[error("Another instance of chanread appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// The backing store refused the operation (disabled, quota, runtime failure)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StorageError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return StorageError::InstanceLocked;
        }

        StorageError::Other(err)
    }
}

/// SQLite lock-related error messages:
/// SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14).
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Persisted Shapes
// ============================================================================

/// Per-channel record stored under `<namespace>-<channelId>`.
///
/// Field names match the layout written by the browser reader, so state
/// exported from either side loads in the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedReadState {
    pub read_posts: Vec<i64>,
    pub last_sync_max_id: i64,
}

/// Portable dump of every key in one storage namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateExport {
    pub exported_at: DateTime<Utc>,
    pub namespace: String,
    /// Raw stored values keyed by full storage key.
    pub entries: BTreeMap<String, String>,
}
