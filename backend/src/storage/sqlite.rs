use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use super::traits::BlobStore;

pub const DATABASE_FILE_NAME: &str = "chore_board.db";

/// Blob store backed by a single SQLite `key_values` table
#[derive(Clone)]
pub struct SqliteBlobStore {
    pool: Arc<SqlitePool>,
}

impl SqliteBlobStore {
    /// Open (creating if needed) the database file inside a data directory
    pub async fn open<P: AsRef<Path>>(data_directory: P) -> Result<Self> {
        let data_directory = data_directory.as_ref();
        if !data_directory.exists() {
            std::fs::create_dir_all(data_directory)?;
            info!("Created data directory: {:?}", data_directory);
        }

        let db_path = data_directory.join(DATABASE_FILE_NAME);
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        Self::setup_schema(&pool).await?;
        info!("Opened state database at {:?}", db_path);

        Ok(Self { pool: Arc::new(pool) })
    }

    /// Private in-memory database, gone once the store is dropped
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // One long-lived connection keeps the in-memory database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::setup_schema(&pool).await?;
        Ok(Self { pool: Arc::new(pool) })
    }

    async fn setup_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS key_values (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM key_values WHERE key = ?")
            .bind(key)
            .fetch_optional(&*self.pool)
            .await?;

        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO key_values (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&*self.pool)
            .await?;
        debug!("Stored {} bytes under '{}'", value.len(), key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup_test() -> SqliteBlobStore {
        SqliteBlobStore::open_in_memory()
            .await
            .expect("Failed to create test database")
    }

    #[tokio::test]
    async fn test_get_nonexistent_value() {
        let store = setup_test().await;
        let result = store.get("nonexistent_key").await.expect("Query failed");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_set_replaces_value() {
        let store = setup_test().await;

        store.set("same_key", "initial_value").await.expect("Failed to put initial value");
        store.set("same_key", "updated_value").await.expect("Failed to update value");

        let result = store.get("same_key").await.expect("Failed to get value");
        assert_eq!(result.as_deref(), Some("updated_value"));
    }

    #[tokio::test]
    async fn test_file_database_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("nested");

        {
            let store = SqliteBlobStore::open(&data_dir).await.unwrap();
            store.set("state", r#"{"pin":"1234"}"#).await.unwrap();
        }

        let reopened = SqliteBlobStore::open(&data_dir).await.unwrap();
        assert_eq!(
            reopened.get("state").await.unwrap().as_deref(),
            Some(r#"{"pin":"1234"}"#)
        );
        assert!(data_dir.join(DATABASE_FILE_NAME).exists());
    }
}
