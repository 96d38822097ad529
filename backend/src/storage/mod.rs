//! # Storage Module
//!
//! The board persists a single JSON document under one key. Anything that can
//! get and set a string by key can hold it:
//!
//! - [`SqliteBlobStore`]: a `key_values` table in `chore_board.db` (default)
//! - [`JsonFileStore`]: one `<key>.json` file per key, written atomically
//! - [`MemoryBlobStore`]: in-process only, for tests and throwaway sessions
//!
//! [`codec`] sits between the raw string and the typed [`shared::AppState`] and
//! is the only place that deals with malformed documents.

pub mod codec;
pub mod file;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use file::JsonFileStore;
pub use memory::MemoryBlobStore;
pub use sqlite::SqliteBlobStore;
pub use traits::BlobStore;
