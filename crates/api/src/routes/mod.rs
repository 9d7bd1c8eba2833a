use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod optimize;

/// All routes mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(optimize::router())
}
