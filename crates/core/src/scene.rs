//! Scenes, their per-scene status machine, and ordered storyboards.
//!
//! A scene moves through
//!
//! ```text
//! pending -> generating-image -> image-done -> generating-video -> done
//!                                                      \-> generating-audio -> done
//! ```
//!
//! `error` is reachable from every generating state. Failed scenes are never
//! retried automatically; re-triggering one starts again at
//! `generating-image`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job::ArtifactRef;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SceneStatus {
    Pending,
    GeneratingImage,
    ImageDone,
    GeneratingVideo,
    GeneratingAudio,
    Done,
    Error,
}

impl SceneStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SceneStatus::Done | SceneStatus::Error)
    }

    pub fn is_generating(self) -> bool {
        matches!(
            self,
            SceneStatus::GeneratingImage | SceneStatus::GeneratingVideo | SceneStatus::GeneratingAudio
        )
    }

    pub fn can_transition_to(self, next: SceneStatus) -> bool {
        use SceneStatus::*;
        match (self, next) {
            (Pending | Error, GeneratingImage) => true,
            (GeneratingImage, ImageDone) => true,
            (ImageDone, GeneratingVideo | Done) => true,
            (GeneratingVideo, Done | GeneratingAudio) => true,
            (GeneratingAudio, Done) => true,
            (from, Error) => from.is_generating(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SceneStatus::Pending => "pending",
            SceneStatus::GeneratingImage => "generating-image",
            SceneStatus::ImageDone => "image-done",
            SceneStatus::GeneratingVideo => "generating-video",
            SceneStatus::GeneratingAudio => "generating-audio",
            SceneStatus::Done => "done",
            SceneStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SceneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

/// One unit of a storyboard: a prompt plus everything derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Position in the storyboard (0-based, renumbered on reorder).
    pub index: usize,
    pub prompt: String,
    /// Voice-over text for story scenes.
    pub narration: Option<String>,
    /// Character reference the image is derived from instead of being
    /// generated from the prompt alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ArtifactRef>,
    pub status: SceneStatus,
    pub image: Option<ArtifactRef>,
    pub video: Option<ArtifactRef>,
    pub audio: Option<ArtifactRef>,
    pub error: Option<String>,
}

impl Scene {
    pub fn new(index: usize, prompt: impl Into<String>) -> Self {
        Self {
            index,
            prompt: prompt.into(),
            narration: None,
            reference: None,
            status: SceneStatus::Pending,
            image: None,
            video: None,
            audio: None,
            error: None,
        }
    }

    pub fn with_narration(mut self, narration: impl Into<String>) -> Self {
        self.narration = Some(narration.into());
        self
    }

    pub fn with_reference(mut self, reference: Option<ArtifactRef>) -> Self {
        self.reference = reference;
        self
    }

    pub fn start_image(&mut self) -> Result<(), CoreError> {
        self.transition(SceneStatus::GeneratingImage)?;
        self.error = None;
        Ok(())
    }

    pub fn finish_image(&mut self, image: ArtifactRef) -> Result<(), CoreError> {
        self.transition(SceneStatus::ImageDone)?;
        self.image = Some(image);
        Ok(())
    }

    pub fn start_video(&mut self) -> Result<(), CoreError> {
        self.transition(SceneStatus::GeneratingVideo)
    }

    /// Store the clip and finish the scene.
    pub fn finish_video(&mut self, video: ArtifactRef) -> Result<(), CoreError> {
        self.transition(SceneStatus::Done)?;
        self.video = Some(video);
        Ok(())
    }

    /// Store the clip and move on to narration.
    pub fn start_audio(&mut self, video: ArtifactRef) -> Result<(), CoreError> {
        self.transition(SceneStatus::GeneratingAudio)?;
        self.video = Some(video);
        Ok(())
    }

    pub fn finish_audio(&mut self, audio: ArtifactRef) -> Result<(), CoreError> {
        self.transition(SceneStatus::Done)?;
        self.audio = Some(audio);
        Ok(())
    }

    /// Finish an image-only scene.
    pub fn finish(&mut self) -> Result<(), CoreError> {
        if self.status != SceneStatus::ImageDone {
            return Err(self.conflict(SceneStatus::Done));
        }
        self.transition(SceneStatus::Done)
    }

    /// Mark the scene failed. Artifacts produced by earlier stages are kept.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), CoreError> {
        self.transition(SceneStatus::Error)?;
        self.error = Some(message.into());
        Ok(())
    }

    /// Drop all results and go back to `pending`.
    pub fn reset(&mut self) {
        self.status = SceneStatus::Pending;
        self.image = None;
        self.video = None;
        self.audio = None;
        self.error = None;
    }

    fn transition(&mut self, next: SceneStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(self.conflict(next));
        }
        self.status = next;
        Ok(())
    }

    fn conflict(&self, next: SceneStatus) -> CoreError {
        CoreError::Conflict(format!(
            "scene {} cannot move from {} to {}",
            self.index, self.status, next
        ))
    }
}

// ---------------------------------------------------------------------------
// Storyboard
// ---------------------------------------------------------------------------

/// Ordered, user-reorderable list of scenes. Order drives playback and
/// merge order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Storyboard {
    scenes: Vec<Scene>,
}

impl Storyboard {
    pub fn from_prompts<I, S>(prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scenes = prompts
            .into_iter()
            .enumerate()
            .map(|(i, p)| Scene::new(i, p))
            .collect();
        Self { scenes }
    }

    pub fn from_scenes(scenes: Vec<Scene>) -> Self {
        let mut board = Self { scenes };
        board.renumber();
        board
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scenes_mut(&mut self) -> &mut [Scene] {
        &mut self.scenes
    }

    pub fn into_scenes(self) -> Vec<Scene> {
        self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn prompts(&self) -> Vec<&str> {
        self.scenes.iter().map(|s| s.prompt.as_str()).collect()
    }

    pub fn push(&mut self, prompt: impl Into<String>) {
        let index = self.scenes.len();
        self.scenes.push(Scene::new(index, prompt));
    }

    pub fn insert(&mut self, at: usize, prompt: impl Into<String>) -> Result<(), CoreError> {
        if at > self.scenes.len() {
            return Err(self.out_of_range(at));
        }
        self.scenes.insert(at, Scene::new(at, prompt));
        self.renumber();
        Ok(())
    }

    pub fn remove(&mut self, at: usize) -> Result<Scene, CoreError> {
        if at >= self.scenes.len() {
            return Err(self.out_of_range(at));
        }
        let scene = self.scenes.remove(at);
        self.renumber();
        Ok(scene)
    }

    /// Move the scene at `from` so that it ends up at position `to`.
    pub fn move_scene(&mut self, from: usize, to: usize) -> Result<(), CoreError> {
        if from >= self.scenes.len() {
            return Err(self.out_of_range(from));
        }
        if to >= self.scenes.len() {
            return Err(self.out_of_range(to));
        }
        let scene = self.scenes.remove(from);
        self.scenes.insert(to, scene);
        self.renumber();
        Ok(())
    }

    /// Put every scene back to `pending`, dropping results.
    pub fn reset(&mut self) {
        self.scenes.iter_mut().for_each(Scene::reset);
    }

    fn renumber(&mut self) {
        for (i, scene) in self.scenes.iter_mut().enumerate() {
            scene.index = i;
        }
    }

    fn out_of_range(&self, at: usize) -> CoreError {
        CoreError::Validation(format!(
            "scene position {at} is out of range (storyboard has {} scenes)",
            self.scenes.len()
        ))
    }
}
