//! API Handlers
//!
//! HTTP request handlers for the adapter's operational endpoints.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::adapter::DatabaseAdapter;
use crate::error::Result;
use crate::models::{HealthResponse, StatsResponse};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Adapter lifecycle operations, independent of its query handle
    pub adapter: Arc<dyn DatabaseAdapter>,
}

impl AppState {
    /// Creates a new AppState around the given adapter.
    pub fn new(adapter: Arc<dyn DatabaseAdapter>) -> Self {
        Self { adapter }
    }
}

/// Handler for GET /health
///
/// Runs the combined cache and database health check.
pub async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    state.adapter.ping().await?;
    Ok(Json(HealthResponse::healthy()))
}

/// Handler for GET /stats
///
/// Returns accessor statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(state.adapter.stats()))
}
