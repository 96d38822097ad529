//! # JSON File Blob Store
//!
//! Stores each key as `<key>.json` directly inside the data directory:
//!
//! ```text
//! data/
//! ├── chore_board.yaml
//! └── chore_board_state_v1.json    ← one file per key
//! ```
//!
//! Writes go to a temp file first and are renamed into place, so a crash never
//! leaves a half-written document behind.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::traits::BlobStore;

#[derive(Clone)]
pub struct JsonFileStore {
    base_directory: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `base_directory`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Result<Self> {
        let base_directory = base_directory.as_ref().to_path_buf();
        if !base_directory.exists() {
            std::fs::create_dir_all(&base_directory)?;
            info!("Created data directory: {:?}", base_directory);
        }
        Ok(Self { base_directory })
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Path of the file backing `key`
    pub fn blob_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(anyhow!("Invalid storage key: '{}'", key));
        }
        Ok(self.base_directory.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl BlobStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.blob_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                debug!("Read {} bytes from {:?}", content.len(), path);
                Ok(Some(content))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.blob_path(key)?;
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, value).await?;
        tokio::fs::rename(&temp_path, &path).await?;
        debug!("Wrote {} bytes to {:?}", value.len(), path);
        Ok(())
    }
}
