//! Integration tests for `/images/edit` and `/text`.

mod common;

use axum::http::StatusCode;
use common::{body_json, post_json, TEST_KEY};
use serde_json::json;

#[tokio::test]
async fn image_edit_returns_edited_artifact() {
    let app = common::build_test_app(Some(TEST_KEY));
    let response = post_json(
        app,
        "/api/v1/images/edit",
        json!({
            "image": { "type": "url", "url": "https://img.test/1.png" },
            "instruction": "make it night"
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let image = body_json(response).await["data"].clone();
    assert_eq!(image["type"], "url");
    assert_eq!(image["url"], "https://img.test/1.png");
}

#[tokio::test]
async fn blank_instruction_is_rejected() {
    let app = common::build_test_app(Some(TEST_KEY));
    let response = post_json(
        app,
        "/api/v1/images/edit",
        json!({ "image": { "type": "url", "url": "https://img.test/1.png" }, "instruction": " " }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn text_generation_round_trips_prompt() {
    let app = common::build_test_app(Some(TEST_KEY));
    let response = post_json(app, "/api/v1/text", json!({ "prompt": "  a haiku  " })).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["text"], "text for a haiku");
}

#[tokio::test]
async fn text_generation_needs_the_key() {
    let app = common::build_test_app(None);
    let response = post_json(app, "/api/v1/text", json!({ "prompt": "a haiku" })).await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "API key not configured on server");
}
