//! Cluster API clients used by the control loops
//!
//! The scheduler and node agent only need a handful of calls against the
//! object store. [`HttpClient`] talks to a remote API server;
//! [`LocalCluster`] goes straight to an in-process registry, which is what
//! single-binary setups and tests use.

use crate::api::{FieldSelector, Node, Pod, Resource, REGISTRY_PREFIX};
use crate::error::{ErrorResponse, Result, RudderError};
use crate::registry::Registry;
use crate::store::ObjectStore;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Store operations consumed by the scheduler and node agent
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// All nodes, in store order
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// Pods matching a field selector, in store order
    async fn list_pods(&self, selector: &FieldSelector) -> Result<Vec<Pod>>;

    /// Merge-patch a pod
    async fn patch_pod(&self, name: &str, partial: &Pod) -> Result<Pod>;
}

/// HTTP client for a remote API server
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    /// Create a client for the API server at `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| RudderError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL of the API server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url<T: Resource>(&self, name: Option<&str>) -> String {
        match name {
            Some(name) => format!("{}/{}/{}", self.base_url, T::ROUTE, name),
            None => format!("{}/{}", self.base_url, T::ROUTE),
        }
    }

    /// List objects of a kind, optionally filtered
    pub async fn list<T: Resource>(&self, selector: Option<&FieldSelector>) -> Result<Vec<T>> {
        let mut request = self.client.get(self.url::<T>(None));
        if let Some(selector) = selector {
            request = request.query(&[("fieldSelector", selector.to_string())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RudderError::Network(e.to_string()))?;
        read_json(response).await
    }

    /// Fetch one object by name
    pub async fn get<T: Resource>(&self, name: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url::<T>(Some(name)))
            .send()
            .await
            .map_err(|e| RudderError::Network(e.to_string()))?;
        read_json(response).await
    }

    /// Create an object
    pub async fn create<T: Resource>(&self, object: &T) -> Result<T> {
        let response = self
            .client
            .post(self.url::<T>(None))
            .json(object)
            .send()
            .await
            .map_err(|e| RudderError::Network(e.to_string()))?;
        read_json(response).await
    }

    /// Merge-patch an object
    pub async fn patch<T: Resource>(&self, name: &str, partial: &T) -> Result<T> {
        debug!(kind = T::KIND, name = %name, "PATCH");
        let response = self
            .client
            .patch(self.url::<T>(Some(name)))
            .json(partial)
            .send()
            .await
            .map_err(|e| RudderError::Network(e.to_string()))?;
        read_json(response).await
    }
}

#[async_trait]
impl ClusterApi for HttpClient {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.list(None).await
    }

    async fn list_pods(&self, selector: &FieldSelector) -> Result<Vec<Pod>> {
        self.list(Some(selector)).await
    }

    async fn patch_pod(&self, name: &str, partial: &Pod) -> Result<Pod> {
        self.patch(name, partial).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| RudderError::Network(e.to_string()))?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
        return Err(RudderError::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_slice(&body).map_err(|e| RudderError::Decode(e.to_string()))
}

/// In-process access to the object store
#[derive(Clone)]
pub struct LocalCluster {
    nodes: ObjectStore<Node>,
    pods: ObjectStore<Pod>,
}

impl LocalCluster {
    /// Access a registry under the default prefix
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self::with_prefix(registry, REGISTRY_PREFIX)
    }

    /// Access a registry under a custom prefix
    pub fn with_prefix(registry: Arc<dyn Registry>, prefix: &str) -> Self {
        Self {
            nodes: ObjectStore::with_prefix(registry.clone(), prefix),
            pods: ObjectStore::with_prefix(registry, prefix),
        }
    }

    /// Node store
    pub fn nodes(&self) -> &ObjectStore<Node> {
        &self.nodes
    }

    /// Pod store
    pub fn pods(&self) -> &ObjectStore<Pod> {
        &self.pods
    }
}

#[async_trait]
impl ClusterApi for LocalCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.nodes.list(None).await
    }

    async fn list_pods(&self, selector: &FieldSelector) -> Result<Vec<Pod>> {
        self.pods.list(Some(selector)).await
    }

    async fn patch_pod(&self, name: &str, partial: &Pod) -> Result<Pod> {
        debug!(pod = %name, node = %partial.spec.node_name, "Local patch");
        self.pods.patch(name, partial.clone()).await
    }
}
