//! # Storage Traits
//!
//! The board persists a single document under a single key, so the only
//! abstraction the domain needs is an opaque string blob store.

use anyhow::Result;
use async_trait::async_trait;

/// Key-value store of string blobs.
///
/// No transactionality is expected: `set` overwrites whatever was stored.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Retrieve the blob stored under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any existing blob
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}
