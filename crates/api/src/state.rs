use std::sync::Arc;

use sqlshadow_engine::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Shadow database connection pool (also used for health checks).
    pub pool: sqlshadow_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The verification and decision engine.
    pub orchestrator: Arc<Orchestrator>,
    /// Proposal-source model name, reported by the health endpoint.
    pub llm_model: String,
}
