use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use sqlshadow_core::security::SecurityGuard;
use sqlshadow_core::types::{Dialect, OptimizationRequest};
use sqlshadow_core::verdict::{OutcomeStatus, RequestOutcome};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Request payload for `POST /api/v1/optimize`.
#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    /// The SQL statement to optimize.
    pub sql: String,
    /// Target database dialect (default: `postgres`).
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_database() -> String {
    "postgres".to_string()
}

/// Response payload: `verified` plus the full engine outcome.
#[derive(Debug, Serialize)]
pub struct OptimizeResponse {
    /// `true` only when a candidate passed both verification checks.
    pub verified: bool,
    #[serde(flatten)]
    pub outcome: RequestOutcome,
}

/// POST /api/v1/optimize -- run one statement through the verification loop.
async fn optimize(
    State(state): State<AppState>,
    Json(payload): Json<OptimizeRequest>,
) -> AppResult<Json<OptimizeResponse>> {
    let sql = payload.sql.trim();
    if sql.is_empty() {
        return Err(AppError::BadRequest("sql must not be empty".to_string()));
    }
    let dialect: Dialect = payload
        .database
        .parse()
        .map_err(|e: sqlshadow_core::types::UnsupportedDialect| {
            AppError::BadRequest(e.to_string())
        })?;

    // Reject unsafe statements at the boundary, before any shadow work.
    let guard = SecurityGuard::new(state.orchestrator.config());
    guard
        .validate(sql)
        .map_err(|violation| AppError::BadRequest(violation.to_string()))?;

    let request = OptimizationRequest::new(sql, dialect);
    tracing::info!(request_id = %request.id, "Accepted optimization request");

    let outcome = state
        .orchestrator
        .optimize(&request, CancellationToken::new())
        .await;

    if outcome.status == OutcomeStatus::FatalError {
        let detail = outcome
            .error
            .clone()
            .unwrap_or_else(|| "unknown engine failure".to_string());
        return Err(AppError::Engine(detail));
    }

    Ok(Json(OptimizeResponse {
        verified: outcome.verified(),
        outcome,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/optimize", post(optimize))
}
