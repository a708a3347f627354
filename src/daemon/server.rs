//! API server bootstrap

use super::api::create_router;
use crate::config::ApiServerConfig;
use crate::error::Result;
use crate::registry::{FsRegistry, MemoryRegistry, Registry};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// HTTP front end of the object store
pub struct ApiServer {
    config: ApiServerConfig,
    registry: Arc<dyn Registry>,
}

impl ApiServer {
    /// Create a server, opening the configured registry
    pub fn new(config: ApiServerConfig) -> Result<Self> {
        let registry: Arc<dyn Registry> = match &config.registry_dir {
            Some(dir) => {
                info!(dir = %dir.display(), "Using filesystem registry");
                Arc::new(FsRegistry::new(dir.clone())?)
            }
            None => {
                info!("Using in-memory registry");
                Arc::new(MemoryRegistry::new())
            }
        };

        Ok(Self::with_registry(config, registry))
    }

    /// Create a server over an existing registry
    pub fn with_registry(config: ApiServerConfig, registry: Arc<dyn Registry>) -> Self {
        Self { config, registry }
    }

    /// Router serving this server's registry
    pub fn router(&self) -> Router {
        create_router(self.registry.clone(), &self.config.registry_prefix)
    }

    /// Bind the configured address and serve until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        self.serve(listener, cancel).await
    }

    /// Serve on an already bound listener until `cancel` fires
    pub async fn serve(self, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        let addr: SocketAddr = listener.local_addr()?;
        info!(%addr, prefix = %self.config.registry_prefix, "API server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;

        info!("API server stopped");
        Ok(())
    }
}
