//! memebox-server library interface
//!
//! Serves the meme catalog over HTTP and lazily fills in generated
//! descriptions for records that do not have one yet.

pub mod api;
pub mod collaborators;
pub mod enrichment;
pub mod error;
pub mod search;
pub mod service;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use axum::http::Method;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::service::CatalogService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CatalogService>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last request error, reported by `/health`
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(service: CatalogService) -> Self {
        Self {
            service: Arc::new(service),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember a failed request for health reporting
    pub async fn record_error(&self, err: &ApiError) {
        *self.last_error.write().await = Some(err.to_string());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    Router::new()
        .merge(api::meme_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
