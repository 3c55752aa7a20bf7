//! Key-value persistence
//!
//! The core persists exactly one value (the last reminder id), so the store
//! contract is a plain string get/set. `SqliteStore` backs production runs,
//! `MemoryStore` backs tests.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to create store directory '{path}': {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt value for key '{key}': {value}")]
    Corrupt { key: String, value: String },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// String key-value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set(key, value).await
    }
}
