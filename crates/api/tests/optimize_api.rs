//! Integration tests for request validation on the optimize endpoint.
//!
//! None of these requests may reach the shadow database; the harness points
//! the pool at an unreachable address to enforce that.

mod common;

use axum::http::StatusCode;
use common::{assert_error_code, body_json, post_json};
use serde_json::json;

#[tokio::test]
async fn empty_sql_is_rejected() {
    let app = common::build_test_app();
    let response = post_json(app, "/api/v1/optimize", json!({ "sql": "   " })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_error_code(&body, "BAD_REQUEST");
    assert!(body["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn unsupported_dialect_is_rejected() {
    let app = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/optimize",
        json!({ "sql": "SELECT 1", "database": "mysql" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_error_code(&body, "BAD_REQUEST");
    assert!(body["error"].as_str().unwrap().contains("mysql"));
}

#[tokio::test]
async fn mutating_statement_is_rejected_at_the_boundary() {
    let app = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/optimize",
        json!({ "sql": "DELETE FROM orders WHERE id = 1" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("forbidden"));
}

#[tokio::test]
async fn multi_statement_input_is_rejected() {
    let app = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/optimize",
        json!({ "sql": "SELECT 1; SELECT 2" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unreachable_shadow_database_yields_engine_error() {
    let app = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/optimize",
        json!({ "sql": "SELECT id FROM orders WHERE id = 1" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_error_code(&body, "ENGINE_ERROR");
}

#[tokio::test]
async fn missing_sql_field_is_a_client_error() {
    let app = common::build_test_app();
    let response = post_json(app, "/api/v1/optimize", json!({ "database": "postgres" })).await;

    // Axum's Json extractor rejects the payload before the handler runs.
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
