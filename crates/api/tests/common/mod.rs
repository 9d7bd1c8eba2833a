//! Shared helpers for API integration tests.
//!
//! Tests run without a live shadow database: the pool connects lazily to an
//! unreachable address, so request-validation paths and health degradation
//! can be exercised hermetically.

// Each test binary compiles its own copy; not every binary uses every helper.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::http::header::CONTENT_TYPE;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use sqlshadow_api::config::ServerConfig;
use sqlshadow_api::routes;
use sqlshadow_api::state::AppState;
use sqlshadow_core::collaborators::{ProposalContext, ProposalResponse, ProposalSource};
use sqlshadow_core::config::EngineConfig;
use sqlshadow_core::error::CollaboratorError;
use sqlshadow_db::PgShadowDatabase;
use sqlshadow_engine::Orchestrator;

/// A proposal source that must never be reached in these tests.
struct UnreachableProposals;

#[async_trait]
impl ProposalSource for UnreachableProposals {
    async fn propose(
        &self,
        _context: &ProposalContext,
    ) -> Result<ProposalResponse, CollaboratorError> {
        Err(CollaboratorError::Unavailable(
            "proposal source not configured in tests".to_string(),
        ))
    }
}

/// Build the app router with a lazily-connecting pool pointed at nothing.
pub fn build_test_app() -> Router {
    let pool = sqlshadow_db::create_pool_lazy("postgres://sqlshadow@127.0.0.1:1/sqlshadow")
        .expect("lazy pool construction cannot fail");

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(PgShadowDatabase::new(pool.clone())),
        Arc::new(UnreachableProposals),
        EngineConfig::default(),
    ));

    let state = AppState {
        pool,
        config: Arc::new(ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["http://localhost:5173".to_string()],
            request_timeout_secs: 600,
        }),
        orchestrator,
        llm_model: "gpt-4o-mini".to_string(),
    };

    let request_id_header = axum::http::HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}

/// Issue a GET request against the app.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request builds"),
    )
    .await
    .expect("request succeeds")
}

/// Issue a JSON POST request against the app.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds"),
    )
    .await
    .expect("request succeeds")
}

/// Decode a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is valid JSON")
}

pub fn assert_error_code(json: &serde_json::Value, code: &str) {
    assert_eq!(json["code"], code, "unexpected error payload: {json}");
}
