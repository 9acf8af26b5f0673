use super::kv::KeyValueStore;
use super::schema::Database;
use super::types::StorageError;

impl Database {
    // ========================================================================
    // Reader State Operations
    // ========================================================================

    /// Get a single stored value by key.
    ///
    /// # Returns
    ///
    /// The raw value if the key exists, or `None` if not set.
    pub async fn get_entry(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM reader_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a value (UPSERT).
    ///
    /// Inserts the key-value pair if it doesn't exist, or updates the value and
    /// timestamp if the key already exists.
    pub async fn set_entry(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO reader_state (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get all entries whose key starts with `prefix`, ordered by key.
    ///
    /// Compares with `substr` rather than `LIKE` so `_` and `%` in a
    /// namespace are matched literally.
    pub async fn get_entries_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, String)>, sqlx::Error> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT key, value FROM reader_state WHERE substr(key, 1, length(?)) = ? ORDER BY key",
        )
        .bind(prefix)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.block_on(self.get_entry(key))
            .map_err(StorageError::from_sqlx)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.block_on(self.set_entry(key, value))
            .map_err(StorageError::from_sqlx)
    }

    fn entries(&self, prefix: &str) -> Result<Vec<(String, String)>, StorageError> {
        self.block_on(self.get_entries_by_prefix(prefix))
            .map_err(StorageError::from_sqlx)
    }
}
