#![allow(dead_code)]

pub mod fake_store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atelier_core::job::ArtifactRef;
use atelier_core::model::ModelSet;
use atelier_genai::{ErrorKind, GenAiError, GenerativeBackend, OperationStatus, VideoOperation};
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use atelier_api::config::ServerConfig;
use atelier_api::router::build_app_router;
use atelier_api::state::AppState;
use atelier_store::StoreConfig;

pub const TEST_KEY: &str = "test-key";

/// Build a test `ServerConfig` with safe defaults.
///
/// Video polling has no interval so runs finish as fast as the stub answers.
pub fn test_config(api_key: Option<&str>) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        api_key: api_key.map(str::to_string),
        genai_base_url: "http://genai.invalid".to_string(),
        models: ModelSet::default(),
        video_poll_interval_secs: 0,
        run_retention: 100,
        store: None,
    }
}

/// Backend double.
///
/// Image prompts containing `fail` are rejected; prompts containing `slow`
/// take 200 ms. Videos finish on the first poll.
pub struct StubBackend;

#[async_trait]
impl GenerativeBackend for StubBackend {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenAiError> {
        Ok(format!("text for {prompt}"))
    }

    async fn generate_json(
        &self,
        _prompt: &str,
        _schema: &serde_json::Value,
    ) -> Result<serde_json::Value, GenAiError> {
        Ok(serde_json::json!({
            "title": "The Lighthouse",
            "scenes": [
                {"image_prompt": "a lighthouse at dusk", "narration": "It began at dusk."},
                {"image_prompt": "a storm rolls in", "narration": "Then the storm came."}
            ]
        }))
    }

    async fn generate_image(&self, prompt: &str) -> Result<ArtifactRef, GenAiError> {
        if prompt.contains("slow") {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        if prompt.contains("fail") {
            return Err(GenAiError::new(ErrorKind::Api, "image generation failed"));
        }
        Ok(ArtifactRef::url(format!("https://img.test/{}.png", prompt.len())))
    }

    async fn edit_image(&self, image: &ArtifactRef, _instruction: &str) -> Result<ArtifactRef, GenAiError> {
        Ok(image.clone())
    }

    async fn submit_video(
        &self,
        prompt: &str,
        _image: Option<&ArtifactRef>,
    ) -> Result<VideoOperation, GenAiError> {
        Ok(VideoOperation::new(format!("operations/{}", prompt.len())))
    }

    async fn poll_video(&self, op: &VideoOperation) -> Result<OperationStatus, GenAiError> {
        Ok(OperationStatus::Done(ArtifactRef::url(format!(
            "https://video.test/{}.mp4",
            op.name
        ))))
    }

    async fn synthesize_speech(&self, text: &str) -> Result<ArtifactRef, GenAiError> {
        Ok(ArtifactRef::inline_bytes("audio/wav", text.as_bytes()))
    }

    async fn fetch(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, GenAiError> {
        Ok(artifact.to_uri().into_bytes())
    }
}

/// Build the full application router over [`StubBackend`].
pub fn build_test_app(api_key: Option<&str>) -> Router {
    let config = test_config(api_key);
    let state = AppState::new(config.clone(), Arc::new(StubBackend));
    build_app_router(state, &config)
}

/// Build the application router with the store pointed at `store_url`.
pub fn build_test_app_with_store(api_key: Option<&str>, store_url: &str) -> Router {
    let config = ServerConfig {
        store: Some(StoreConfig {
            url: store_url.to_string(),
            anon_key: "anon-key".to_string(),
        }),
        ..test_config(api_key)
    };
    let state = AppState::new(config.clone(), Arc::new(StubBackend));
    build_app_router(state, &config)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: impl Into<String>) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Read the whole body as text. Streaming bodies are read until they end.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll `GET /api/v1/batches/{id}` until the run leaves `running`.
pub async fn wait_for_run(app: &Router, id: &str) -> serde_json::Value {
    for _ in 0..200 {
        let response = get(app.clone(), &format!("/api/v1/batches/{id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let run = body_json(response).await["data"].clone();
        if run["state"] != "running" {
            return run;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run {id} did not finish");
}
