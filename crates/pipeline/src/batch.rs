//! Sequential scene pipeline.
//!
//! Scenes are processed strictly in order, one at a time:
//!
//! 1. `generating-image`: image from the scene prompt.
//! 2. `generating-video`: video conditioned on that image, polled to
//!    completion.
//! 3. `generating-audio`: narration, only for scenes that carry one.
//!
//! The cancellation token is checked before each scene starts. A scene
//! already in flight always runs to its end; scenes never started stay
//! `pending`.

use std::sync::Arc;
use std::time::Duration;

use atelier_core::error::CoreError;
use atelier_core::scene::{Scene, SceneStatus, Storyboard};
use atelier_core::types::RunId;
use atelier_genai::video::generate_video;
use atelier_genai::{GenerativeBackend, PollConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::events::{EventBus, PipelineEvent, RUN_FINISHED, RUN_STARTED};

/// What a failed scene does to the rest of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Mark the scene `error` and continue with the next one.
    #[default]
    Isolate,
    /// Stop at the first failed scene; later scenes stay `pending`.
    AbortRemaining,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Pause between consecutive scenes.
    pub delay: Duration,
    pub failure_policy: FailurePolicy,
    pub poll: PollConfig,
    /// Stop after the image stage.
    pub images_only: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            failure_policy: FailurePolicy::Isolate,
            poll: PollConfig::default(),
            images_only: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every scene was attempted.
    Completed,
    /// The token was cancelled before all scenes started.
    Cancelled,
    /// A failure stopped the run under [`FailurePolicy::AbortRemaining`].
    Aborted,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub outcome: RunOutcome,
    pub scenes: Vec<Scene>,
}

impl RunReport {
    pub fn count(&self, status: SceneStatus) -> usize {
        self.scenes.iter().filter(|s| s.status == status).count()
    }
}

pub struct Pipeline {
    run_id: RunId,
    backend: Arc<dyn GenerativeBackend>,
    scenes: Arc<RwLock<Vec<Scene>>>,
    events: Arc<EventBus>,
    options: BatchOptions,
}

impl Pipeline {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        storyboard: Storyboard,
        options: BatchOptions,
    ) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4(),
            backend,
            scenes: Arc::new(RwLock::new(storyboard.into_scenes())),
            events: Arc::new(EventBus::default()),
            options,
        }
    }

    /// Run over a scene list owned by the caller, e.g. one that a registry
    /// exposed before the scenes were known.
    pub fn from_shared(
        run_id: RunId,
        backend: Arc<dyn GenerativeBackend>,
        scenes: Arc<RwLock<Vec<Scene>>>,
        options: BatchOptions,
    ) -> Self {
        Self {
            run_id,
            backend,
            scenes,
            events: Arc::new(EventBus::default()),
            options,
        }
    }

    /// Publish progress on a shared bus instead of a private one.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Live view of the scenes, updated as the run progresses.
    pub fn scenes(&self) -> Arc<RwLock<Vec<Scene>>> {
        Arc::clone(&self.scenes)
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub async fn snapshot(&self) -> Vec<Scene> {
        self.scenes.read().await.clone()
    }

    /// Process every scene in order until done, cancelled or aborted.
    pub async fn run(&self, cancel: &CancellationToken) -> RunReport {
        let total = self.scenes.read().await.len();
        tracing::info!(run_id = %self.run_id, scenes = total, "Pipeline run started");
        self.events.publish(
            PipelineEvent::new(RUN_STARTED, self.run_id)
                .with_payload(serde_json::json!({ "scenes": total })),
        );

        let mut outcome = RunOutcome::Completed;
        for index in 0..total {
            if index > 0 && !self.options.delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.options.delay) => {}
                }
            }
            if cancel.is_cancelled() {
                tracing::info!(run_id = %self.run_id, next_scene = index, "Pipeline run cancelled");
                outcome = RunOutcome::Cancelled;
                break;
            }

            if let Err(e) = self.process_scene(index).await {
                let message = e.to_string();
                tracing::warn!(run_id = %self.run_id, scene = index, error = %message, "Scene failed");
                if let Err(e) = self.update(index, |s| s.fail(message)).await {
                    tracing::error!(run_id = %self.run_id, scene = index, error = %e, "Could not mark scene failed");
                }
                if self.options.failure_policy == FailurePolicy::AbortRemaining {
                    outcome = RunOutcome::Aborted;
                    break;
                }
            }
        }

        let scenes = self.snapshot().await;
        let report = RunReport {
            run_id: self.run_id,
            outcome,
            scenes,
        };
        tracing::info!(
            run_id = %self.run_id,
            outcome = ?outcome,
            done = report.count(SceneStatus::Done),
            failed = report.count(SceneStatus::Error),
            "Pipeline run finished",
        );
        self.events.publish(
            PipelineEvent::new(RUN_FINISHED, self.run_id)
                .with_payload(serde_json::json!({ "outcome": outcome })),
        );
        report
    }

    async fn process_scene(&self, index: usize) -> Result<(), PipelineError> {
        let (prompt, narration, reference, status) = {
            let scenes = self.scenes.read().await;
            let scene = scenes.get(index).ok_or_else(|| missing_scene(index))?;
            (
                scene.prompt.clone(),
                scene.narration.clone(),
                scene.reference.clone(),
                scene.status,
            )
        };
        if status == SceneStatus::Done {
            tracing::debug!(run_id = %self.run_id, scene = index, "Scene already done, skipping");
            return Ok(());
        }

        self.update(index, Scene::start_image).await?;
        let image = match &reference {
            Some(reference) => self.backend.edit_image(reference, &prompt).await?,
            None => self.backend.generate_image(&prompt).await?,
        };
        self.update(index, |s| s.finish_image(image.clone())).await?;

        if self.options.images_only {
            self.update(index, Scene::finish).await?;
            return Ok(());
        }

        self.update(index, Scene::start_video).await?;
        let video =
            generate_video(self.backend.as_ref(), &prompt, Some(&image), &self.options.poll).await?;

        match narration.filter(|n| !n.trim().is_empty()) {
            None => self.update(index, |s| s.finish_video(video)).await?,
            Some(text) => {
                self.update(index, |s| s.start_audio(video)).await?;
                let audio = self.backend.synthesize_speech(&text).await?;
                self.update(index, |s| s.finish_audio(audio)).await?;
            }
        }
        Ok(())
    }

    /// Apply a transition to one scene and publish the resulting status.
    async fn update<F>(&self, index: usize, apply: F) -> Result<(), CoreError>
    where
        F: FnOnce(&mut Scene) -> Result<(), CoreError>,
    {
        let status = {
            let mut scenes = self.scenes.write().await;
            let scene = scenes.get_mut(index).ok_or_else(|| missing_scene(index))?;
            apply(scene)?;
            scene.status
        };
        tracing::debug!(run_id = %self.run_id, scene = index, status = %status, "Scene status changed");
        self.events
            .publish(PipelineEvent::scene_status(self.run_id, index, status));
        Ok(())
    }
}

fn missing_scene(index: usize) -> CoreError {
    CoreError::NotFound {
        entity: "scene",
        id: index.to_string(),
    }
}
