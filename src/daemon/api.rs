//! REST API for the object store
//!
//! Every resource kind gets the same five routes, served by one set of
//! generic handlers:
//!
//! | Method | Path                    |
//! |--------|-------------------------|
//! | GET    | `/<route>`              |
//! | POST   | `/<route>`              |
//! | GET    | `/<route>/:name`        |
//! | PATCH  | `/<route>/:name`        |
//! | PATCH  | `/<route>/:name/status` |
//!
//! Anything else, including a known path with an unserved method, gets the
//! JSON 404 of [`ROUTE_NOT_FOUND`].

use crate::api::{Deployment, FieldSelector, Node, Pod, ReplicaSet, Resource, REGISTRY_PREFIX};
use crate::error::{ErrorResponse, Result, RudderError};
use crate::registry::Registry;
use crate::store::ObjectStore;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Message returned for unmatched routes
pub const ROUTE_NOT_FOUND: &str = "This route does not exist";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    registry: Arc<dyn Registry>,
    prefix: String,
}

impl AppState {
    /// Create state over a registry and key prefix
    pub fn new(registry: Arc<dyn Registry>, prefix: &str) -> Self {
        Self {
            registry,
            prefix: prefix.to_string(),
        }
    }

    /// Object store for one kind
    pub fn store<T: Resource>(&self) -> ObjectStore<T> {
        ObjectStore::with_prefix(self.registry.clone(), &self.prefix)
    }
}

/// List query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "fieldSelector", default)]
    pub field_selector: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Build the API router over a registry
pub fn create_router(registry: Arc<dyn Registry>, prefix: &str) -> Router {
    Router::new()
        .route("/healthz", get(health_check).fallback(route_not_found))
        .merge(resource_routes::<Node>())
        .merge(resource_routes::<Pod>())
        .merge(resource_routes::<Deployment>())
        .merge(resource_routes::<ReplicaSet>())
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(registry, prefix))
}

/// Router with the default registry prefix
pub fn default_router(registry: Arc<dyn Registry>) -> Router {
    create_router(registry, REGISTRY_PREFIX)
}

fn resource_routes<T: Resource>() -> Router<AppState> {
    let collection = format!("/{}", T::ROUTE);
    let item = format!("/{}/:name", T::ROUTE);
    let status = format!("/{}/:name/status", T::ROUTE);

    Router::new()
        .route(
            &collection,
            get(list_objects::<T>)
                .post(create_object::<T>)
                .fallback(route_not_found),
        )
        .route(
            &item,
            get(get_object::<T>)
                .patch(patch_object::<T>)
                .fallback(route_not_found),
        )
        .route(&status, patch(patch_status::<T>).fallback(route_not_found))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn route_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new(ROUTE_NOT_FOUND)))
}

async fn list_objects<T: Resource>(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<T>>> {
    let Query(query) = query.map_err(|e| RudderError::MalformedFilter(e.body_text()))?;
    let selector = match query.field_selector.as_deref() {
        Some(raw) => FieldSelector::parse(raw)?,
        None => None,
    };

    let objects = state.store::<T>().list(selector.as_ref()).await?;
    Ok(Json(objects))
}

async fn create_object<T: Resource>(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<T>)> {
    let object: T = decode_body(&body)?;
    let created = state.store::<T>().create(object).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_object<T: Resource>(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<T>> {
    Ok(Json(state.store::<T>().get(&name).await?))
}

async fn patch_object<T: Resource>(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<T>> {
    let partial: T = decode_body(&body)?;
    Ok(Json(state.store::<T>().patch(&name, partial).await?))
}

async fn patch_status<T: Resource>(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<T>> {
    let partial: Value = decode_body(&body)?;
    Ok(Json(state.store::<T>().patch_status(&name, partial).await?))
}

fn decode_body<B: DeserializeOwned>(body: &[u8]) -> Result<B> {
    serde_json::from_slice(body).map_err(|e| RudderError::Decode(e.to_string()))
}
