//! Declarative object store
//!
//! One generic controller serves every resource kind. Objects live under
//! `<prefix>/<route>/<name>` in the registry; every call round-trips to the
//! registry and nothing is cached in process.
//!
//! Read-modify-write operations (`patch`, `patch_status`) carry no version
//! token. Two concurrent patches to the same name race and the last write
//! wins.

pub mod merge;

pub use merge::{merge_override, overlay};

use crate::api::{is_valid_name, FieldSelector, Resource, REGISTRY_PREFIX};
use crate::error::{Result, RudderError};
use crate::registry::Registry;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Generic REST controller for one resource kind
pub struct ObjectStore<T: Resource> {
    registry: Arc<dyn Registry>,
    prefix: String,
    _kind: PhantomData<fn() -> T>,
}

impl<T: Resource> Clone for ObjectStore<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            prefix: self.prefix.clone(),
            _kind: PhantomData,
        }
    }
}

impl<T: Resource> ObjectStore<T> {
    /// Create a store rooted at the default registry prefix
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self::with_prefix(registry, REGISTRY_PREFIX)
    }

    /// Create a store rooted at a custom registry prefix
    pub fn with_prefix(registry: Arc<dyn Registry>, prefix: &str) -> Self {
        Self {
            registry,
            prefix: prefix.trim_end_matches('/').to_string(),
            _kind: PhantomData,
        }
    }

    /// Registry prefix shared by every object of this kind
    pub fn kind_prefix(&self) -> String {
        format!("{}/{}/", self.prefix, T::ROUTE)
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.kind_prefix(), name)
    }

    /// List objects, optionally filtered by a field selector.
    ///
    /// Any stored value that fails to decode aborts the whole list.
    pub async fn list(&self, selector: Option<&FieldSelector>) -> Result<Vec<T>> {
        if let Some(selector) = selector {
            T::check_field(selector.field())?;
        }

        let entries = self.registry.get_prefix(&self.kind_prefix()).await?;
        let mut objects = Vec::with_capacity(entries.len());

        for entry in entries {
            let object: T = decode(&entry.key, &entry.value)?;
            if selector.map_or(true, |s| object.matches_field(s)) {
                objects.push(object);
            }
        }

        Ok(objects)
    }

    /// Get one object by name
    pub async fn get(&self, name: &str) -> Result<T> {
        let key = self.key(name);
        match self.registry.get_key(&key).await? {
            Some(value) => decode(&key, &value),
            None => Err(RudderError::not_found(T::KIND, name)),
        }
    }

    /// Store a new object under a fresh identifier.
    ///
    /// Any client-supplied identifier is replaced. An existing object with
    /// the same name is overwritten.
    pub async fn create(&self, mut object: T) -> Result<T> {
        let name = object.name().to_string();
        if !is_valid_name(&name) {
            return Err(RudderError::InvalidObject(format!(
                "{} name {:?} must be a lowercase DNS-1123 subdomain",
                T::KIND,
                name
            )));
        }

        object.set_uid(Uuid::new_v4().to_string());
        self.put(&name, &object).await?;

        debug!(kind = T::KIND, name = %name, uid = %object.uid(), "Created object");
        Ok(object)
    }

    /// Merge a partial object onto the stored one.
    ///
    /// Non-empty fields of `partial` override, recursively; everything else
    /// is preserved. Identity (name and uid) never changes through a patch.
    pub async fn patch(&self, name: &str, partial: T) -> Result<T> {
        let existing = self.get(name).await?;
        let uid = existing.uid().to_string();

        let mut merged = serde_json::to_value(&existing)?;
        merge_override(&mut merged, serde_json::to_value(&partial)?);

        let mut object: T = serde_json::from_value(merged)
            .map_err(|e| RudderError::Decode(format!("merged {} {}: {}", T::KIND, name, e)))?;
        object.metadata_mut().name = name.to_string();
        object.set_uid(uid);

        self.put(name, &object).await?;

        debug!(kind = T::KIND, name = %name, "Patched object");
        Ok(object)
    }

    /// Overlay a partial status onto the stored object's status
    pub async fn patch_status(&self, name: &str, partial: Value) -> Result<T> {
        let mut object = self.get(name).await?;

        let status = object
            .status_subresource()
            .ok_or(RudderError::UnsupportedStatus(T::KIND))?;
        let mut current = status.status_value()?;
        overlay(&mut current, partial)?;
        status.set_status_value(current)?;

        self.put(name, &object).await?;

        debug!(kind = T::KIND, name = %name, "Patched status");
        Ok(object)
    }

    async fn put(&self, name: &str, object: &T) -> Result<()> {
        let value = serde_json::to_vec(object)?;
        self.registry.put(&self.key(name), value).await
    }
}

fn decode<T: Resource>(key: &str, value: &[u8]) -> Result<T> {
    serde_json::from_slice(value).map_err(|e| RudderError::Decode(format!("{}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{HasMetadata, Node, ObjectMeta, Pod};
    use crate::registry::MemoryRegistry;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::collections::HashSet;

    fn pods(registry: &Arc<MemoryRegistry>) -> ObjectStore<Pod> {
        ObjectStore::new(registry.clone())
    }

    fn scheduled(name: &str, node: &str) -> Pod {
        let mut pod = Pod::new(name).container("app", "nginx");
        pod.spec.node_name = node.to_string();
        pod
    }

    #[tokio::test]
    async fn test_create_assigns_fresh_uid() {
        let registry = Arc::new(MemoryRegistry::new());
        let store = pods(&registry);

        let mut pod = Pod::new("web");
        pod.metadata.uid = "client-chosen".to_string();

        let first = store.create(pod.clone()).await.unwrap();
        let second = store.create(Pod::new("db")).await.unwrap();

        assert!(!first.uid().is_empty());
        assert_ne!(first.uid(), "client-chosen");
        assert_ne!(first.uid(), second.uid());
        assert_eq!(store.get("web").await.unwrap().uid(), first.uid());
    }

    #[tokio::test]
    async fn test_create_uses_registry_layout() {
        let registry = Arc::new(MemoryRegistry::new());
        pods(&registry).create(Pod::new("web")).await.unwrap();

        assert!(registry.get_key("/registry/pods/web").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_overwrites_existing_name() {
        let registry = Arc::new(MemoryRegistry::new());
        let store = pods(&registry);

        store.create(Pod::new("web").container("a", "nginx")).await.unwrap();
        let replaced = store.create(Pod::new("web")).await.unwrap();

        let stored = store.get("web").await.unwrap();
        assert_eq!(stored.uid(), replaced.uid());
        assert!(stored.spec.containers.is_empty());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_name() {
        let registry = Arc::new(MemoryRegistry::new());
        let result = pods(&registry).create(Pod::new("Bad/Name")).await;

        assert!(matches!(result, Err(RudderError::InvalidObject(_))));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_filters_by_node() {
        let registry = Arc::new(MemoryRegistry::new());
        let store = pods(&registry);

        store.create(scheduled("a", "worker-1")).await.unwrap();
        store.create(scheduled("b", "worker-2")).await.unwrap();
        store.create(scheduled("c", "worker-1")).await.unwrap();
        store.create(Pod::new("d")).await.unwrap();

        let selector = FieldSelector::new("spec.nodeName", "worker-1");
        let names: Vec<String> = store
            .list(Some(&selector))
            .await
            .unwrap()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "c"]);

        let unscheduled = FieldSelector::new("spec.nodeName", "");
        assert_eq!(store.list(Some(&unscheduled)).await.unwrap().len(), 1);
        assert_eq!(store.list(None).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_pod_field() {
        let registry = Arc::new(MemoryRegistry::new());
        let store = pods(&registry);
        store.create(Pod::new("web")).await.unwrap();

        let selector = FieldSelector::new("status.podIp", "10.0.0.1");
        assert!(matches!(
            store.list(Some(&selector)).await,
            Err(RudderError::UnsupportedFilter { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_ignores_selector_for_nodes() {
        let registry = Arc::new(MemoryRegistry::new());
        let store: ObjectStore<Node> = ObjectStore::new(registry.clone());
        store.create(Node::new("worker-1")).await.unwrap();

        let selector = FieldSelector::new("anything", "at-all");
        assert_eq!(store.list(Some(&selector)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_aborts_on_corrupt_value() {
        let registry = Arc::new(MemoryRegistry::new());
        let store = pods(&registry);

        store.create(Pod::new("web")).await.unwrap();
        registry
            .put("/registry/pods/broken", b"not json".to_vec())
            .await
            .unwrap();

        assert!(matches!(store.list(None).await, Err(RudderError::Decode(_))));
    }

    #[tokio::test]
    async fn test_patch_overrides_and_preserves() {
        let registry = Arc::new(MemoryRegistry::new());
        let store = pods(&registry);
        let created = store.create(scheduled("web", "a")).await.unwrap();

        let patched = store.patch("web", Pod::node_assignment("b")).await.unwrap();

        assert_eq!(patched.spec.node_name, "b");
        assert_eq!(patched.spec.containers, created.spec.containers);
        assert_eq!(patched.uid(), created.uid());
        assert_eq!(store.get("web").await.unwrap(), patched);
    }

    #[tokio::test]
    async fn test_patch_keeps_identity() {
        let registry = Arc::new(MemoryRegistry::new());
        let store = pods(&registry);
        let created = store.create(Pod::new("web")).await.unwrap();

        let mut partial = Pod::node_assignment("worker-1");
        partial.metadata.uid = "forged".to_string();
        partial.metadata.name = "other".to_string();

        let patched = store.patch("web", partial).await.unwrap();
        assert_eq!(patched.uid(), created.uid());
        assert_eq!(patched.name(), "web");
        assert!(registry.get_key("/registry/pods/other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_patch_missing_is_not_found() {
        let registry = Arc::new(MemoryRegistry::new());
        let result = pods(&registry).patch("ghost", Pod::node_assignment("a")).await;

        assert!(matches!(result, Err(RudderError::NotFound { kind: "Pod", .. })));
    }

    #[tokio::test]
    async fn test_patch_status_overlay() {
        let registry = Arc::new(MemoryRegistry::new());
        let store = pods(&registry);
        store.create(scheduled("web", "worker-1")).await.unwrap();

        let patched = store
            .patch_status("web", json!({"podIp": "10.0.0.5"}))
            .await
            .unwrap();

        assert_eq!(patched.status.pod_ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(patched.status.start_time, None);
        assert_eq!(patched.spec.node_name, "worker-1");
    }

    #[tokio::test]
    async fn test_patch_status_decode_error() {
        let registry = Arc::new(MemoryRegistry::new());
        let store = pods(&registry);
        store.create(Pod::new("web")).await.unwrap();

        let result = store.patch_status("web", json!({"podIp": 42})).await;
        assert!(matches!(result, Err(RudderError::Decode(_))));
    }

    #[tokio::test]
    async fn test_patch_status_missing_is_not_found() {
        let registry = Arc::new(MemoryRegistry::new());
        let result = pods(&registry).patch_status("ghost", json!({})).await;

        assert!(result.unwrap_err().is_not_found());
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct Secret {
        metadata: ObjectMeta,
        data: String,
    }

    impl HasMetadata for Secret {
        fn metadata(&self) -> &ObjectMeta {
            &self.metadata
        }

        fn metadata_mut(&mut self) -> &mut ObjectMeta {
            &mut self.metadata
        }
    }

    impl Resource for Secret {
        const KIND: &'static str = "Secret";
        const ROUTE: &'static str = "secrets";
    }

    #[tokio::test]
    async fn test_patch_status_unsupported_kind() {
        let registry = Arc::new(MemoryRegistry::new());
        let store: ObjectStore<Secret> = ObjectStore::new(registry.clone());
        store
            .create(Secret {
                metadata: ObjectMeta::named("token"),
                data: "s3cr3t".to_string(),
            })
            .await
            .unwrap();

        let result = store.patch_status("token", json!({"ready": true})).await;
        assert!(matches!(result, Err(RudderError::UnsupportedStatus("Secret"))));
    }

    #[tokio::test]
    async fn test_custom_prefix() {
        let registry = Arc::new(MemoryRegistry::new());
        let store: ObjectStore<Pod> = ObjectStore::with_prefix(registry.clone(), "/cluster-a/");
        store.create(Pod::new("web")).await.unwrap();

        let keys: HashSet<String> = registry
            .get_prefix("/")
            .await
            .unwrap()
            .into_iter()
            .map(|kv| kv.key)
            .collect();
        assert!(keys.contains("/cluster-a/pods/web"));
    }
}
