//! Integration tests for the `GET /batches/{id}/events` progress stream.

mod common;

use axum::http::{header, StatusCode};
use common::{body_json, body_text, get, post_json, wait_for_run, TEST_KEY};
use serde_json::json;

/// `(event name, data)` pairs of a server-sent event body.
fn parse_events(body: &str) -> Vec<(String, serde_json::Value)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut name = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    name = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = serde_json::from_str(v.trim()).ok();
                }
            }
            Some((name?, data?))
        })
        .collect()
}

async fn start_batch(app: &axum::Router, prompts: serde_json::Value) -> String {
    let response = post_json(app.clone(), "/api/v1/batches", json!({ "prompts": prompts })).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn live_run_streams_progress_until_finished() {
    let app = common::build_test_app(Some(TEST_KEY));
    let id = start_batch(&app, json!(["slow fox", "slow heron"])).await;
    let other = start_batch(&app, json!(["an unrelated owl"])).await;

    let response = get(app.clone(), &format!("/api/v1/batches/{id}/events")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let events = parse_events(&body_text(response).await);

    let (first, snapshot) = &events[0];
    assert_eq!(first, "run.snapshot");
    assert_eq!(snapshot["id"], id.as_str());

    let (last, finished) = events.last().unwrap();
    assert_eq!(last, "run.finished");
    assert_eq!(finished["payload"]["outcome"], "completed");

    let scene_updates: Vec<_> = events.iter().filter(|(name, _)| name == "scene.status").collect();
    assert!(!scene_updates.is_empty());
    assert!(events[1..]
        .iter()
        .all(|(_, data)| data["run_id"] == id.as_str() && data["run_id"] != other.as_str()));
}

#[tokio::test]
async fn finished_run_sends_only_a_snapshot() {
    let app = common::build_test_app(Some(TEST_KEY));
    let id = start_batch(&app, json!(["a fox"])).await;
    wait_for_run(&app, &id).await;

    let body = body_text(get(app, &format!("/api/v1/batches/{id}/events")).await).await;
    let events = parse_events(&body);

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "run.snapshot");
    assert_eq!(events[0].1["state"], "completed");
}

#[tokio::test]
async fn unknown_run_has_no_stream() {
    let app = common::build_test_app(Some(TEST_KEY));
    let response = get(
        app,
        "/api/v1/batches/00000000-0000-0000-0000-000000000000/events",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
