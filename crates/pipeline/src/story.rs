//! Story pipeline: premise to narrated multi-scene video.
//!
//! A text model first writes a script (title plus per-scene image prompt
//! and narration) as schema-constrained JSON. The script becomes a
//! storyboard whose scenes run through the sequential [`Pipeline`], which
//! adds the narration stage for every scene carrying narration text.

use std::sync::Arc;

use atelier_core::character::{compose_prompt, first_reference, Character};
use atelier_core::error::CoreError;
use atelier_core::scene::{Scene, Storyboard};
use atelier_genai::{GenAiError, GenerativeBackend};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::batch::{BatchOptions, Pipeline, RunReport};
use crate::error::PipelineError;
use crate::events::EventBus;

pub const DEFAULT_SCENE_COUNT: usize = 4;
pub const MAX_SCENE_COUNT: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryRequest {
    pub premise: String,
    #[serde(default = "default_scene_count")]
    pub scene_count: usize,
    /// Characters whose descriptions are woven into every image prompt.
    #[serde(default)]
    pub characters: Vec<Character>,
}

fn default_scene_count() -> usize {
    DEFAULT_SCENE_COUNT
}

impl StoryRequest {
    pub fn new(premise: impl Into<String>) -> Self {
        Self {
            premise: premise.into(),
            scene_count: DEFAULT_SCENE_COUNT,
            characters: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.premise.trim().is_empty() {
            return Err(CoreError::Validation("story premise must not be empty".to_string()));
        }
        if !(1..=MAX_SCENE_COUNT).contains(&self.scene_count) {
            return Err(CoreError::Validation(format!(
                "scene count must be between 1 and {MAX_SCENE_COUNT}"
            )));
        }
        self.characters.iter().try_for_each(Character::validate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryScript {
    pub title: String,
    pub scenes: Vec<ScriptScene>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptScene {
    pub image_prompt: String,
    pub narration: String,
}

impl StoryScript {
    /// One scene per script entry, with character descriptions appended to
    /// each image prompt. When a character carries a reference image, every
    /// scene is drawn from it.
    pub fn storyboard(&self, characters: &[Character]) -> Result<Storyboard, CoreError> {
        let reference = first_reference(characters);
        let scenes = self
            .scenes
            .iter()
            .enumerate()
            .map(|(i, s)| {
                Ok(Scene::new(i, compose_prompt(&s.image_prompt, characters)?)
                    .with_narration(s.narration.trim())
                    .with_reference(reference.cloned()))
            })
            .collect::<Result<Vec<_>, CoreError>>()?;
        Ok(Storyboard::from_scenes(scenes))
    }
}

/// Response schema handed to the text model.
pub fn script_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "scenes": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "image_prompt": { "type": "STRING" },
                        "narration": { "type": "STRING" }
                    },
                    "required": ["image_prompt", "narration"]
                }
            }
        },
        "required": ["title", "scenes"]
    })
}

pub fn script_prompt(request: &StoryRequest) -> Result<String, CoreError> {
    let ask = format!(
        "Write a short visual story in exactly {} scenes based on this premise: {}\n\
         For each scene give a detailed, self-contained image prompt describing the shot \
         and one or two sentences of narration to be read aloud.",
        request.scene_count,
        request.premise.trim()
    );
    compose_prompt(&ask, &request.characters)
}

/// Ask the text model for a script and check its shape.
pub async fn write_script(
    backend: &dyn GenerativeBackend,
    request: &StoryRequest,
) -> Result<StoryScript, PipelineError> {
    request.validate()?;
    let value = backend
        .generate_json(&script_prompt(request)?, &script_schema())
        .await?;
    let script: StoryScript = serde_json::from_value(value).map_err(GenAiError::malformed_json)?;

    let usable = script
        .scenes
        .iter()
        .all(|s| !s.image_prompt.trim().is_empty());
    if script.scenes.is_empty() || !usable {
        return Err(GenAiError::empty_result("story scenes").into());
    }
    tracing::info!(title = %script.title, scenes = script.scenes.len(), "Story script written");
    Ok(script)
}

#[derive(Debug, Clone, Serialize)]
pub struct StoryReport {
    pub script: StoryScript,
    pub run: RunReport,
}

/// Write the script, then generate every scene in order.
pub async fn run_story(
    backend: Arc<dyn GenerativeBackend>,
    request: &StoryRequest,
    options: BatchOptions,
    events: Arc<EventBus>,
    cancel: &CancellationToken,
) -> Result<StoryReport, PipelineError> {
    let script = write_script(backend.as_ref(), request).await?;
    let storyboard = script.storyboard(&request.characters)?;

    let run = Pipeline::new(backend, storyboard, options)
        .with_events(events)
        .run(cancel)
        .await;
    Ok(StoryReport { script, run })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use atelier_core::job::ArtifactRef;
    use atelier_core::scene::SceneStatus;
    use atelier_genai::{ErrorKind, PollConfig};

    use super::*;
    use crate::testing::MockBackend;

    fn script_json() -> serde_json::Value {
        serde_json::json!({
            "title": "The Lighthouse",
            "scenes": [
                {"image_prompt": "a lighthouse at dusk", "narration": "It began at dusk."},
                {"image_prompt": "a storm rolls in", "narration": "Then the storm came."}
            ]
        })
    }

    fn fast_options() -> BatchOptions {
        BatchOptions {
            poll: PollConfig {
                interval: std::time::Duration::ZERO,
                max_polls: 2,
            },
            ..Default::default()
        }
    }

    #[test]
    fn request_validation() {
        assert_matches!(StoryRequest::new("  ").validate(), Err(CoreError::Validation(_)));
        let mut req = StoryRequest::new("a heist");
        req.scene_count = 0;
        assert!(req.validate().is_err());
        req.scene_count = 3;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn storyboard_weaves_in_characters() {
        let script: StoryScript = serde_json::from_value(script_json()).unwrap();
        let mira = Character::new("Mira", "red coat, silver hair");
        let board = script.storyboard(&[mira]).unwrap();

        assert_eq!(board.len(), 2);
        let first = &board.scenes()[0];
        assert!(first.prompt.starts_with("a lighthouse at dusk"));
        assert!(first.prompt.contains("Mira: red coat, silver hair"));
        assert_eq!(first.narration.as_deref(), Some("It began at dusk."));
        assert!(first.reference.is_none());
        assert_eq!(board.scenes()[1].index, 1);
    }

    #[tokio::test]
    async fn reference_image_drives_scene_images() {
        let backend = Arc::new(MockBackend::new().with_script(script_json()));
        let dyn_backend: Arc<dyn GenerativeBackend> = backend.clone();
        let mut mira = Character::new("Mira", "red coat");
        mira.reference_image = Some(ArtifactRef::url("https://ref/mira.png"));
        let request = StoryRequest {
            characters: vec![mira],
            ..StoryRequest::new("a lighthouse keeper")
        };

        let report = run_story(
            dyn_backend,
            &request,
            BatchOptions {
                images_only: true,
                ..fast_options()
            },
            Arc::new(EventBus::default()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.run.count(SceneStatus::Done), 2);
        let calls = backend.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[1].starts_with("edit:a lighthouse at dusk"));
        assert!(calls[2].starts_with("edit:a storm rolls in"));
        assert_eq!(
            report.run.scenes[0].image,
            Some(ArtifactRef::url(format!(
                "https://ref/mira.png?edit={}",
                report.run.scenes[0].prompt
            )))
        );
    }

    #[tokio::test]
    async fn malformed_script_is_reported() {
        let backend = MockBackend::new().with_script(serde_json::json!({"title": 3}));
        let err = write_script(&backend, &StoryRequest::new("x")).await.unwrap_err();
        assert_matches!(err, PipelineError::GenAi(e) if e.kind() == ErrorKind::MalformedJson);
    }

    #[tokio::test]
    async fn empty_script_is_reported() {
        let backend =
            MockBackend::new().with_script(serde_json::json!({"title": "t", "scenes": []}));
        let err = write_script(&backend, &StoryRequest::new("x")).await.unwrap_err();
        assert_matches!(err, PipelineError::GenAi(e) if e.kind() == ErrorKind::EmptyResult);
    }

    #[tokio::test]
    async fn story_runs_every_stage() {
        let backend = Arc::new(MockBackend::new().with_script(script_json()));
        let dyn_backend: Arc<dyn GenerativeBackend> = backend.clone();

        let report = run_story(
            dyn_backend,
            &StoryRequest::new("a lighthouse keeper"),
            fast_options(),
            Arc::new(EventBus::default()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.script.title, "The Lighthouse");
        assert_eq!(report.run.count(SceneStatus::Done), 2);
        assert!(report.run.scenes.iter().all(|s| s.audio.is_some()));

        let calls = backend.calls();
        assert!(calls[0].starts_with("json:"));
        assert_eq!(
            &calls[1..],
            &[
                "image:a lighthouse at dusk",
                "video:a lighthouse at dusk",
                "speech:It began at dusk.",
                "image:a storm rolls in",
                "video:a storm rolls in",
                "speech:Then the storm came.",
            ]
        );
    }
}
