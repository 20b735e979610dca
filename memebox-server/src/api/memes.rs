//! Meme catalog endpoints
//!
//! - `GET /api/memes` - full catalog, enriching records that lack a description
//! - `GET /api/memes/search?q=...` - substring search, no enrichment

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use memebox_common::MemeRecord;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{ApiError, ApiResult, AppState};

/// Catalog listing and search response
#[derive(Debug, Serialize)]
pub struct MemesResponse {
    pub memes: Vec<MemeRecord>,
}

/// Query parameters for search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// GET /api/memes
pub async fn list_memes(State(state): State<AppState>) -> ApiResult<Json<MemesResponse>> {
    match state.service.list().await {
        Ok(catalog) => Ok(Json(MemesResponse {
            memes: catalog.memes,
        })),
        Err(e) => {
            let err = ApiError::from(e);
            error!(error = %err, "Failed to load meme catalog");
            state.record_error(&err).await;
            Err(err)
        }
    }
}

/// GET /api/memes/search?q=term
pub async fn search_memes(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<MemesResponse>> {
    match state.service.search(query.q.as_deref()).await {
        Ok(memes) => {
            info!(query = ?query.q, results = memes.len(), "Search completed");
            Ok(Json(MemesResponse { memes }))
        }
        Err(e) => {
            let err = ApiError::from(e);
            if let ApiError::InvalidQuery(_) = err {
                info!("Search rejected: missing query");
            } else {
                error!(error = %err, "Search failed");
                state.record_error(&err).await;
            }
            Err(err)
        }
    }
}

/// Build meme catalog routes
pub fn meme_routes() -> Router<AppState> {
    Router::new()
        .route("/api/memes", get(list_memes))
        .route("/api/memes/search", get(search_memes))
}
