//! Key-value registry adapter
//!
//! The registry is the store of record for every object. The object store
//! only needs three operations from it, all of which must be safe to call
//! concurrently and must give read-after-write consistency per key.

pub mod fs;
pub mod memory;

pub use fs::FsRegistry;
pub use memory::MemoryRegistry;

use crate::error::Result;
use async_trait::async_trait;

/// A stored key and its raw value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
}

/// Narrow interface over a strongly consistent key-value store
#[async_trait]
pub trait Registry: Send + Sync {
    /// All entries whose key starts with `prefix`, ordered by key
    async fn get_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>>;

    /// The value stored at `key`, if any
    async fn get_key(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` at `key`, replacing any previous value
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;
}
