/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// Always 200 while the process is up; `data.database` reports whether
/// PostgreSQL answered and `data.connections` the pool occupancy.

use crate::{app::AppState, response::ApiResponse};
use axum::extract::State;
use serde::Serialize;
use stockroom_shared::db::pool::{self, PoolStats};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,

    pub version: String,

    /// "connected" or "disconnected"
    pub database: String,

    pub connections: PoolStats,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthResponse> {
    let database = match pool::health_check(&state.db).await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            "disconnected"
        }
    };

    ApiResponse::ok(HealthResponse {
        status: if database == "connected" { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        connections: pool::get_pool_stats(&state.db),
    })
}
