//! The seam between pipelines and the generative API.
//!
//! Pipelines are written against [`GenerativeBackend`] so they can run
//! against [`GenAiClient`](crate::GenAiClient) in production and against an
//! in-memory double in tests. [`Retrying`] decorates any backend with the
//! retry-with-backoff policy, one independent retry loop per call.

use async_trait::async_trait;
use atelier_core::job::ArtifactRef;
use serde::{Deserialize, Serialize};

use crate::error::GenAiError;
use crate::retry::{with_retry, RetryPolicy};

/// Handle of a submitted long-running video generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoOperation {
    pub name: String,
}

impl VideoOperation {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Result of one status query for a [`VideoOperation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Running,
    Done(ArtifactRef),
    Failed(String),
}

#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Free-form text completion.
    async fn generate_text(&self, prompt: &str) -> Result<String, GenAiError>;

    /// Structured completion constrained by a JSON schema.
    async fn generate_json(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, GenAiError>;

    async fn generate_image(&self, prompt: &str) -> Result<ArtifactRef, GenAiError>;

    /// Apply a natural-language edit to an existing image.
    async fn edit_image(
        &self,
        image: &ArtifactRef,
        instruction: &str,
    ) -> Result<ArtifactRef, GenAiError>;

    /// Start a video generation, optionally conditioned on a still image.
    async fn submit_video(
        &self,
        prompt: &str,
        image: Option<&ArtifactRef>,
    ) -> Result<VideoOperation, GenAiError>;

    async fn poll_video(&self, operation: &VideoOperation) -> Result<OperationStatus, GenAiError>;

    /// Text to speech. The returned artifact is a WAV payload.
    async fn synthesize_speech(&self, text: &str) -> Result<ArtifactRef, GenAiError>;

    /// Raw bytes of an artifact, downloading URL references.
    async fn fetch(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, GenAiError>;
}

/// Wraps a backend so every call goes through [`with_retry`].
#[derive(Debug, Clone)]
pub struct Retrying<B> {
    inner: B,
    policy: RetryPolicy,
}

impl<B> Retrying<B> {
    pub fn new(inner: B, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<B: GenerativeBackend> GenerativeBackend for Retrying<B> {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenAiError> {
        with_retry(&self.policy, || self.inner.generate_text(prompt)).await
    }

    async fn generate_json(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, GenAiError> {
        with_retry(&self.policy, || self.inner.generate_json(prompt, schema)).await
    }

    async fn generate_image(&self, prompt: &str) -> Result<ArtifactRef, GenAiError> {
        with_retry(&self.policy, || self.inner.generate_image(prompt)).await
    }

    async fn edit_image(
        &self,
        image: &ArtifactRef,
        instruction: &str,
    ) -> Result<ArtifactRef, GenAiError> {
        with_retry(&self.policy, || self.inner.edit_image(image, instruction)).await
    }

    async fn submit_video(
        &self,
        prompt: &str,
        image: Option<&ArtifactRef>,
    ) -> Result<VideoOperation, GenAiError> {
        with_retry(&self.policy, || self.inner.submit_video(prompt, image)).await
    }

    async fn poll_video(&self, operation: &VideoOperation) -> Result<OperationStatus, GenAiError> {
        with_retry(&self.policy, || self.inner.poll_video(operation)).await
    }

    async fn synthesize_speech(&self, text: &str) -> Result<ArtifactRef, GenAiError> {
        with_retry(&self.policy, || self.inner.synthesize_speech(text)).await
    }

    async fn fetch(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, GenAiError> {
        with_retry(&self.policy, || self.inner.fetch(artifact)).await
    }
}
