//! In-memory backend double shared by the pipeline tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use atelier_core::job::ArtifactRef;
use atelier_genai::{GenAiError, GenerativeBackend, OperationStatus, VideoOperation};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct MockBackend {
    /// Every call in order, e.g. `"image:a"`, `"video:a"`, `"speech:hello"`.
    pub calls: Mutex<Vec<String>>,
    /// Prompts whose image call fails.
    pub fail_images: HashSet<String>,
    /// Prompts whose video operation reports failure.
    pub fail_videos: HashSet<String>,
    /// Cancel this token on the image call for the given prompt.
    pub cancel_on_image: Option<(String, CancellationToken)>,
    /// Returned by `generate_json`.
    pub script: Option<serde_json::Value>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_images(mut self, prompts: &[&str]) -> Self {
        self.fail_images = prompts.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn failing_videos(mut self, prompts: &[&str]) -> Self {
        self.fail_videos = prompts.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn cancelling_on(mut self, prompt: &str, token: CancellationToken) -> Self {
        self.cancel_on_image = Some((prompt.to_string(), token));
        self
    }

    pub fn with_script(mut self, script: serde_json::Value) -> Self {
        self.script = Some(script);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl GenerativeBackend for MockBackend {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenAiError> {
        self.record(format!("text:{prompt}"));
        Ok(format!("text for {prompt}"))
    }

    async fn generate_json(
        &self,
        prompt: &str,
        _schema: &serde_json::Value,
    ) -> Result<serde_json::Value, GenAiError> {
        self.record(format!("json:{prompt}"));
        self.script
            .clone()
            .ok_or_else(|| GenAiError::empty_result("JSON"))
    }

    async fn generate_image(&self, prompt: &str) -> Result<ArtifactRef, GenAiError> {
        self.record(format!("image:{prompt}"));
        if let Some((trigger, token)) = &self.cancel_on_image {
            if trigger == prompt {
                token.cancel();
            }
        }
        if self.fail_images.contains(prompt) {
            return Err(GenAiError::safety_blocked("SAFETY"));
        }
        Ok(ArtifactRef::url(format!("https://img.test/{prompt}.png")))
    }

    async fn edit_image(
        &self,
        image: &ArtifactRef,
        instruction: &str,
    ) -> Result<ArtifactRef, GenAiError> {
        self.record(format!("edit:{instruction}"));
        Ok(ArtifactRef::url(format!("{}?edit={instruction}", image.to_uri())))
    }

    async fn submit_video(
        &self,
        prompt: &str,
        image: Option<&ArtifactRef>,
    ) -> Result<VideoOperation, GenAiError> {
        self.record(format!("video:{prompt}"));
        assert!(image.is_some(), "videos are conditioned on the scene image");
        Ok(VideoOperation::new(prompt))
    }

    async fn poll_video(&self, operation: &VideoOperation) -> Result<OperationStatus, GenAiError> {
        if self.fail_videos.contains(&operation.name) {
            return Ok(OperationStatus::Failed("video blocked".to_string()));
        }
        Ok(OperationStatus::Done(ArtifactRef::url(format!(
            "https://video.test/{}.mp4",
            operation.name
        ))))
    }

    async fn synthesize_speech(&self, text: &str) -> Result<ArtifactRef, GenAiError> {
        self.record(format!("speech:{text}"));
        Ok(ArtifactRef::inline_bytes("audio/wav", b"RIFF"))
    }

    async fn fetch(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, GenAiError> {
        match artifact {
            ArtifactRef::Url { url } => Ok(url.as_bytes().to_vec()),
            inline => inline
                .decode_inline()
                .unwrap_or_else(|| Ok(Vec::new()))
                .map_err(GenAiError::from),
        }
    }
}
