use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::traits::BlobStore;

/// In-process blob store. Nothing survives the process; used for tests and
/// throwaway sessions.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with an existing blob
    pub fn with_blob(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.insert(key, value);
        store
    }

    fn insert(&self, key: &str, value: &str) {
        let mut blobs = self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        blobs.insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let blobs = self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(blobs.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.insert(key, value);
        Ok(())
    }
}
