//! API server
//!
//! Serves the object store over HTTP/JSON. Handlers are stateless; every
//! request goes straight to the registry.

mod api;
mod server;

pub use api::{create_router, default_router, AppState, ROUTE_NOT_FOUND};
pub use server::ApiServer;
