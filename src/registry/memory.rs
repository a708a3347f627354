//! In-memory registry for development and testing

use super::{KeyValue, Registry};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Ordered key-value map behind an async lock
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    entries: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the registry holds no keys
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn get_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>> {
        let entries = self.entries.read().await;

        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| KeyValue {
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }

    async fn get_key(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let registry = MemoryRegistry::new();
        registry.put("/registry/pods/web", b"{}".to_vec()).await.unwrap();

        let value = registry.get_key("/registry/pods/web").await.unwrap();
        assert_eq!(value, Some(b"{}".to_vec()));
        assert_eq!(registry.get_key("/registry/pods/db").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_prefix_scan_is_ordered_and_scoped() {
        let registry = MemoryRegistry::new();
        registry.put("/registry/pods/b", b"2".to_vec()).await.unwrap();
        registry.put("/registry/pods/a", b"1".to_vec()).await.unwrap();
        registry.put("/registry/nodes/a", b"n".to_vec()).await.unwrap();
        registry.put("/registry/podsx/a", b"x".to_vec()).await.unwrap();

        let pods = registry.get_prefix("/registry/pods/").await.unwrap();
        let keys: Vec<&str> = pods.iter().map(|kv| kv.key.as_str()).collect();

        assert_eq!(keys, vec!["/registry/pods/a", "/registry/pods/b"]);
        assert_eq!(registry.len().await, 4);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let registry = MemoryRegistry::new();
        registry.put("k", b"old".to_vec()).await.unwrap();
        registry.put("k", b"new".to_vec()).await.unwrap();

        assert_eq!(registry.get_key("k").await.unwrap(), Some(b"new".to_vec()));
    }
}
