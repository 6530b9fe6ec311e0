//! Handlers for the `/batches` resource.
//!
//! A batch is one pipeline run over an ordered scene list. Runs start on a
//! background task and are polled through `GET /batches/{id}`.

use std::sync::Arc;

use atelier_core::batch::{parse_json, prompts_from_value, BatchLoadError};
use atelier_core::scene::Storyboard;
use atelier_core::types::RunId;
use atelier_pipeline::ad::{ad_pipeline, AdBrief};
use atelier_pipeline::events::RUN_FINISHED;
use atelier_pipeline::story::{write_script, StoryRequest};
use atelier_pipeline::{EventBus, FailurePolicy, Pipeline, PipelineEvent};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::progress;
use crate::response::DataResponse;
use crate::runs::{RunHandle, RunKind, RunView};
use crate::state::AppState;

/// Body of `POST /batches`.
///
/// `upload` takes precedence over `prompts` and accepts the same shapes as
/// `POST /batches/load`.
#[derive(Debug, Deserialize)]
pub struct CreateBatch {
    #[serde(default)]
    pub prompts: Vec<String>,
    pub upload: Option<serde_json::Value>,
    #[serde(default)]
    pub delay_secs: u64,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub images_only: bool,
}

/// Longest pause accepted between scenes.
pub const MAX_DELAY_SECS: u64 = 300;

#[derive(Debug, Serialize)]
pub struct LoadedBatch {
    pub count: usize,
    pub prompts: Vec<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Register the pipeline's run and execute it in the background.
async fn start_run(state: &AppState, kind: RunKind, pipeline: Pipeline) -> RunView {
    let pipeline = pipeline.with_events(Arc::clone(&state.event_bus));
    let handle = state
        .runs
        .register(pipeline.run_id(), kind, pipeline.scenes())
        .await;
    let view = handle.view().await;

    state.runs.spawn(async move {
        let report = pipeline.run(handle.cancel_token()).await;
        handle.finish(report.outcome.into()).await;
    });
    view
}

/// Mark a run that never reached its scenes as failed and tell listeners.
async fn fail_run(handle: &RunHandle, events: &EventBus, message: String) {
    events.publish(
        PipelineEvent::new(RUN_FINISHED, handle.id)
            .with_payload(serde_json::json!({ "outcome": "failed", "error": message })),
    );
    handle.fail(message).await;
}

fn resolve_prompts(input: &CreateBatch) -> Result<Vec<String>, BatchLoadError> {
    if let Some(upload) = &input.upload {
        return prompts_from_value(upload);
    }
    let prompts: Vec<String> = input
        .prompts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if prompts.is_empty() {
        return Err(BatchLoadError::Empty);
    }
    Ok(prompts)
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

/// POST /api/v1/batches
///
/// Start a batch over the given prompts. Returns 201 with the run, all
/// scenes `pending`.
pub async fn create_batch(
    State(state): State<AppState>,
    Json(input): Json<CreateBatch>,
) -> AppResult<impl IntoResponse> {
    state.require_api_key().await?;
    if input.delay_secs > MAX_DELAY_SECS {
        return Err(AppError::BadRequest(format!(
            "delay_secs must be at most {MAX_DELAY_SECS}"
        )));
    }
    let prompts = resolve_prompts(&input)?;

    let options = state.batch_options(input.delay_secs, input.failure_policy, input.images_only);
    let pipeline = Pipeline::new(
        Arc::clone(&state.backend),
        Storyboard::from_prompts(prompts),
        options,
    );
    let run = start_run(&state, RunKind::Batch, pipeline).await;

    tracing::info!(run_id = %run.id, scenes = run.scenes.len(), "Batch submitted");
    Ok((StatusCode::CREATED, Json(DataResponse { data: run })))
}

/// POST /api/v1/batches/story
///
/// Write a script from the premise, then run its scenes with narration.
/// The run is listed immediately; its scenes appear once the script exists.
pub async fn create_story(
    State(state): State<AppState>,
    Json(request): Json<StoryRequest>,
) -> AppResult<impl IntoResponse> {
    state.require_api_key().await?;
    request.validate()?;

    let run_id = uuid::Uuid::new_v4();
    let scenes = Arc::new(RwLock::new(Vec::new()));
    let handle = state
        .runs
        .register(run_id, RunKind::Story, Arc::clone(&scenes))
        .await;
    let run = handle.view().await;

    let backend = Arc::clone(&state.backend);
    let events = Arc::clone(&state.event_bus);
    let options = state.batch_options(0, FailurePolicy::Isolate, false);
    state.runs.spawn(async move {
        let script = match write_script(backend.as_ref(), &request).await {
            Ok(script) => script,
            Err(e) => return fail_run(&handle, &events, e.to_string()).await,
        };
        let storyboard = match script.storyboard(&request.characters) {
            Ok(storyboard) => storyboard,
            Err(e) => return fail_run(&handle, &events, e.to_string()).await,
        };
        handle.set_title(script.title.clone()).await;
        *scenes.write().await = storyboard.into_scenes();

        let report = Pipeline::from_shared(run_id, backend, scenes, options)
            .with_events(events)
            .run(handle.cancel_token())
            .await;
        handle.finish(report.outcome.into()).await;
    });

    tracing::info!(run_id = %run_id, "Story submitted");
    Ok((StatusCode::CREATED, Json(DataResponse { data: run })))
}

/// POST /api/v1/batches/story/script
///
/// Write and return a script without generating any media.
pub async fn preview_script(
    State(state): State<AppState>,
    Json(request): Json<StoryRequest>,
) -> AppResult<impl IntoResponse> {
    state.require_api_key().await?;
    let script = write_script(state.backend.as_ref(), &request).await?;
    Ok(Json(DataResponse { data: script }))
}

/// POST /api/v1/batches/ad
///
/// Four chained commercial shots. The run stops at the first failed shot.
pub async fn create_ad(
    State(state): State<AppState>,
    Json(brief): Json<AdBrief>,
) -> AppResult<impl IntoResponse> {
    state.require_api_key().await?;
    let options = state.batch_options(0, FailurePolicy::AbortRemaining, false);
    let pipeline = ad_pipeline(Arc::clone(&state.backend), &brief, options)?;
    let run = start_run(&state, RunKind::Ad, pipeline).await;

    tracing::info!(run_id = %run.id, product = %brief.product.trim(), "Ad video submitted");
    Ok((StatusCode::CREATED, Json(DataResponse { data: run })))
}

/// GET /api/v1/batches
pub async fn list_batches(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let runs = state.runs.list().await;
    Ok(Json(DataResponse { data: runs }))
}

/// GET /api/v1/batches/{id}
pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<RunId>,
) -> AppResult<impl IntoResponse> {
    let run = state.runs.get(id).await?.view().await;
    Ok(Json(DataResponse { data: run }))
}

/// GET /api/v1/batches/{id}/events
///
/// Server-sent events: a `run.snapshot`, then the run's progress events
/// until `run.finished`.
pub async fn stream_events(
    State(state): State<AppState>,
    Path(id): Path<RunId>,
) -> AppResult<impl IntoResponse> {
    let handle = state.runs.get(id).await?;
    let events = state.event_bus.subscribe();
    tracing::debug!(run_id = %id, "Progress stream opened");
    Ok(Sse::new(progress::run_events(handle, events)).keep_alive(KeepAlive::default()))
}

/// POST /api/v1/batches/{id}/cancel
///
/// Returns 202: the scene in flight finishes before the run stops.
pub async fn cancel_batch(
    State(state): State<AppState>,
    Path(id): Path<RunId>,
) -> AppResult<impl IntoResponse> {
    state.runs.cancel(id).await?;
    let run = state.runs.get(id).await?.view().await;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: run })))
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// POST /api/v1/batches/load
///
/// Validate an uploaded prompt file without starting a run. The body is
/// read as text so malformed JSON is reported with the batch error codes.
pub async fn load_batch(body: String) -> AppResult<impl IntoResponse> {
    let prompts = parse_json(&body)?;
    tracing::debug!(count = prompts.len(), "Prompt file loaded");
    Ok(Json(DataResponse {
        data: LoadedBatch {
            count: prompts.len(),
            prompts,
        },
    }))
}
