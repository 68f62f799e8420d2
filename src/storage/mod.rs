use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::StoreError;

pub mod memory;
#[cfg(feature = "storage-redis")]
pub mod redis;

pub use memory::InMemoryStore;
#[cfg(feature = "storage-redis")]
pub use self::redis::RedisStore;

/// Key-value record store keyed by correlation id.
///
/// `upsert` overwrites any previous value for the key. Backends must be safe
/// for concurrent upserts and scans without external locking.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn upsert(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;
    async fn scan_all(&self) -> Result<HashMap<String, Vec<u8>>, StoreError>;
}
