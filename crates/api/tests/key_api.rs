//! Integration tests for `GET /api/key`.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, TEST_KEY};

#[tokio::test]
async fn configured_key_is_returned() {
    let app = common::build_test_app(Some(TEST_KEY));
    let response = get(app, "/api/key").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json, serde_json::json!({ "apiKey": TEST_KEY }));
}

#[tokio::test]
async fn missing_key_is_a_server_error() {
    let app = common::build_test_app(None);
    let response = get(app, "/api/key").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "API key not configured on server");
    assert_eq!(json["code"], "INTERNAL_ERROR");
}
