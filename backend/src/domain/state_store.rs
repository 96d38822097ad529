//! # State Store
//!
//! Owns the single in-memory [`AppState`] and its persistence.
//!
//! Every mutation goes through [`StateStore::update`] or
//! [`StateStore::try_update`]: the latest state is cloned, the patch is applied
//! to the clone, the whole document is written to the blob store, and only then
//! does the clone replace the current state. The state lock is held for the
//! whole sequence, so timer ticks and user actions are strictly serialized.
//!
//! Storage problems never surface to callers. An unreadable document means
//! starting from the defaults; a failed write is logged and the in-memory state
//! still advances.

use anyhow::Result;
use shared::AppState;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::defaults::default_state;
use crate::storage::codec::{decode_state, encode_state};
use crate::storage::traits::BlobStore;

#[derive(Clone)]
pub struct StateStore {
    blob_store: Arc<dyn BlobStore>,
    key: String,
    state: Arc<Mutex<AppState>>,
}

impl StateStore {
    /// Load the document stored under `key`, falling back to the defaults when
    /// it is absent, unreadable or the store itself fails. The loaded state is
    /// written back so the stored document is always in canonical shape.
    pub async fn load(blob_store: Arc<dyn BlobStore>, key: &str, clock: &dyn Clock) -> Self {
        let defaults = default_state(clock.now());

        let state = match blob_store.get(key).await {
            Ok(Some(raw)) => match decode_state(&raw, &defaults) {
                Some(state) => {
                    info!(
                        "Loaded state '{}' with {} children and {} recorded days",
                        key,
                        state.children.len(),
                        state.daily_records.len()
                    );
                    state
                }
                None => {
                    warn!("Stored state '{}' is unreadable, starting from defaults", key);
                    defaults
                }
            },
            Ok(None) => {
                info!("No stored state '{}', starting from defaults", key);
                defaults
            }
            Err(e) => {
                warn!("Failed to read stored state '{}': {}. Starting from defaults", key, e);
                defaults
            }
        };

        let store = Self {
            blob_store,
            key: key.to_string(),
            state: Arc::new(Mutex::new(state.clone())),
        };
        store.persist(&state).await;
        store
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> AppState {
        self.state.lock().await.clone()
    }

    /// Read from the current state without cloning it
    pub async fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        let state = self.state.lock().await;
        f(&state)
    }

    /// Apply a patch, persist, and return the new state
    pub async fn update(&self, patch: impl FnOnce(&mut AppState)) -> AppState {
        let mut current = self.state.lock().await;
        let mut next = current.clone();
        patch(&mut next);

        self.persist(&next).await;
        *current = next.clone();
        next
    }

    /// Apply a fallible patch. On error nothing is persisted and the current
    /// state is left untouched.
    pub async fn try_update<R>(&self, patch: impl FnOnce(&mut AppState) -> Result<R>) -> Result<R> {
        let mut current = self.state.lock().await;
        let mut next = current.clone();
        let result = patch(&mut next)?;

        self.persist(&next).await;
        *current = next;
        Ok(result)
    }

    /// Apply a patch that may decline. `None` leaves the state untouched and
    /// skips the write.
    pub async fn update_if<R>(&self, patch: impl FnOnce(&mut AppState) -> Option<R>) -> Option<R> {
        let mut current = self.state.lock().await;
        let mut next = current.clone();
        let result = patch(&mut next)?;

        self.persist(&next).await;
        *current = next;
        Some(result)
    }

    async fn persist(&self, state: &AppState) {
        let encoded = match encode_state(state) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Failed to encode state '{}': {}", self.key, e);
                return;
            }
        };

        match self.blob_store.set(&self.key, &encoded).await {
            Ok(()) => debug!("Persisted state '{}' ({} bytes)", self.key, encoded.len()),
            Err(e) => warn!("Failed to persist state '{}': {}", self.key, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ManualClock;
    use crate::storage::memory::MemoryBlobStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use shared::Phase;

    const KEY: &str = "chore_board_state_v1";

    fn clock() -> ManualClock {
        ManualClock::on(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
    }

    /// Store whose reads and writes always fail
    struct BrokenStore;

    #[async_trait]
    impl BlobStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(anyhow!("disk on fire"))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("disk on fire"))
        }
    }

    #[tokio::test]
    async fn test_first_load_persists_defaults() {
        let blobs = MemoryBlobStore::new();
        let store = StateStore::load(Arc::new(blobs.clone()), KEY, &clock()).await;

        let state = store.snapshot().await;
        assert_eq!(state.pin, "1234");
        assert_eq!(state.children.len(), 2);

        let raw = blobs.get(KEY).await.unwrap().expect("defaults should be written");
        assert!(raw.contains("\"currentPhase\":\"Phase2\""));
    }

    #[tokio::test]
    async fn test_unparseable_document_falls_back_to_defaults() {
        let blobs = MemoryBlobStore::with_blob(KEY, "{{{ definitely not json");
        let store = StateStore::load(Arc::new(blobs), KEY, &clock()).await;

        let state = store.snapshot().await;
        assert_eq!(state.pin, "1234");
        assert_eq!(state.current_phase, Phase::Phase2);
    }

    #[tokio::test]
    async fn test_read_failure_falls_back_and_updates_still_apply() {
        let store = StateStore::load(Arc::new(BrokenStore), KEY, &clock()).await;
        assert_eq!(store.snapshot().await.pin, "1234");

        let next = store.update(|state| state.pin = "9999".to_string()).await;
        assert_eq!(next.pin, "9999");
        assert_eq!(store.snapshot().await.pin, "9999");
    }

    #[tokio::test]
    async fn test_update_persists_whole_document() {
        let blobs = MemoryBlobStore::new();
        let store = StateStore::load(Arc::new(blobs.clone()), KEY, &clock()).await;

        store.update(|state| state.current_phase = Phase::Phase3).await;

        let reloaded = StateStore::load(Arc::new(blobs), KEY, &clock()).await;
        assert_eq!(reloaded.snapshot().await.current_phase, Phase::Phase3);
    }

    #[tokio::test]
    async fn test_failed_patch_changes_nothing() {
        let blobs = MemoryBlobStore::new();
        let store = StateStore::load(Arc::new(blobs.clone()), KEY, &clock()).await;
        let before = blobs.get(KEY).await.unwrap();

        let result: Result<()> = store
            .try_update(|state| {
                state.pin = "0000".to_string();
                Err(anyhow!("rejected"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.snapshot().await.pin, "1234");
        assert_eq!(blobs.get(KEY).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_declined_patch_skips_write() {
        let blobs = MemoryBlobStore::new();
        let store = StateStore::load(Arc::new(blobs.clone()), KEY, &clock()).await;
        let before = blobs.get(KEY).await.unwrap();

        let declined: Option<()> = store
            .update_if(|state| {
                state.pin = "0000".to_string();
                None
            })
            .await;
        assert!(declined.is_none());
        assert_eq!(store.snapshot().await.pin, "1234");
        assert_eq!(blobs.get(KEY).await.unwrap(), before);

        let applied = store
            .update_if(|state| {
                state.pin = "4321".to_string();
                Some(state.pin.len())
            })
            .await;
        assert_eq!(applied, Some(4));
        assert!(blobs.get(KEY).await.unwrap().unwrap().contains("\"pin\":\"4321\""));
    }

    #[tokio::test]
    async fn test_read_borrows_current_state() {
        let store = StateStore::load(Arc::new(MemoryBlobStore::new()), KEY, &clock()).await;
        let names: Vec<String> = store
            .read(|state| state.children.iter().map(|c| c.name.clone()).collect())
            .await;
        assert_eq!(names, vec!["Bauti", "Oli"]);
    }
}
