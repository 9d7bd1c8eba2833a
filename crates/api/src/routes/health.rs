use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status: `ok` when every collaborator is reachable.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the shadow database is reachable.
    pub db_healthy: bool,
    /// Shadow database server version, when reachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_version: Option<String>,
    /// Configured proposal-source model.
    pub llm_model: String,
}

/// GET /health -- returns service and collaborator health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = sqlshadow_db::health_check(&state.pool).await.is_ok();
    let db_version = if db_healthy {
        sqlshadow_db::server_version(&state.pool).await.ok()
    } else {
        None
    };

    let status = if db_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        db_version,
        llm_model: state.llm_model.clone(),
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
