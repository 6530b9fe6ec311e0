//! Video generation poll loop.
//!
//! Video models run as long-running operations: submit once, then wait a
//! fixed interval and re-query until the operation reports done or error.
//! The loop is bounded by [`PollConfig::max_polls`] and is not interrupted
//! by pipeline cancellation; a submitted video is always awaited.

use std::time::Duration;

use atelier_core::job::ArtifactRef;

use crate::backend::{GenerativeBackend, OperationStatus, VideoOperation};
use crate::error::{ErrorKind, GenAiError};

#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Wait before each status query.
    pub interval: Duration,
    /// Status queries before giving up.
    pub max_polls: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_polls: 60,
        }
    }
}

/// Poll `operation` until it finishes.
pub async fn wait_for_video<B>(
    backend: &B,
    operation: &VideoOperation,
    config: &PollConfig,
) -> Result<ArtifactRef, GenAiError>
where
    B: GenerativeBackend + ?Sized,
{
    for poll in 1..=config.max_polls {
        tokio::time::sleep(config.interval).await;

        match backend.poll_video(operation).await? {
            OperationStatus::Running => {
                tracing::debug!(operation = %operation.name, poll, "Video still generating");
            }
            OperationStatus::Done(video) => {
                tracing::info!(operation = %operation.name, polls = poll, "Video generation finished");
                return Ok(video);
            }
            OperationStatus::Failed(message) => {
                tracing::warn!(operation = %operation.name, error = %message, "Video generation failed");
                return Err(GenAiError::new(ErrorKind::Api, message));
            }
        }
    }

    Err(GenAiError::new(
        ErrorKind::Timeout,
        format!(
            "Video generation did not finish within {} seconds",
            config.interval.as_secs() * u64::from(config.max_polls)
        ),
    ))
}

/// Submit a video generation and wait for its result.
pub async fn generate_video<B>(
    backend: &B,
    prompt: &str,
    image: Option<&ArtifactRef>,
    config: &PollConfig,
) -> Result<ArtifactRef, GenAiError>
where
    B: GenerativeBackend + ?Sized,
{
    let operation = backend.submit_video(prompt, image).await?;
    wait_for_video(backend, &operation, config).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;

    /// Reports `Running` until `ready_after` polls, then the configured outcome.
    struct ScriptedVideo {
        ready_after: u32,
        outcome: OperationStatus,
        polls: AtomicU32,
        conditioned_on: Mutex<Option<ArtifactRef>>,
    }

    impl ScriptedVideo {
        fn new(ready_after: u32, outcome: OperationStatus) -> Self {
            Self {
                ready_after,
                outcome,
                polls: AtomicU32::new(0),
                conditioned_on: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl GenerativeBackend for ScriptedVideo {
        async fn generate_text(&self, _prompt: &str) -> Result<String, GenAiError> {
            unimplemented!()
        }

        async fn generate_json(
            &self,
            _prompt: &str,
            _schema: &serde_json::Value,
        ) -> Result<serde_json::Value, GenAiError> {
            unimplemented!()
        }

        async fn generate_image(&self, _prompt: &str) -> Result<ArtifactRef, GenAiError> {
            unimplemented!()
        }

        async fn edit_image(
            &self,
            _image: &ArtifactRef,
            _instruction: &str,
        ) -> Result<ArtifactRef, GenAiError> {
            unimplemented!()
        }

        async fn submit_video(
            &self,
            prompt: &str,
            image: Option<&ArtifactRef>,
        ) -> Result<VideoOperation, GenAiError> {
            *self.conditioned_on.lock().unwrap() = image.cloned();
            Ok(VideoOperation::new(format!("operations/{prompt}")))
        }

        async fn poll_video(&self, _operation: &VideoOperation) -> Result<OperationStatus, GenAiError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < self.ready_after {
                Ok(OperationStatus::Running)
            } else {
                Ok(self.outcome.clone())
            }
        }

        async fn synthesize_speech(&self, _text: &str) -> Result<ArtifactRef, GenAiError> {
            unimplemented!()
        }

        async fn fetch(&self, _artifact: &ArtifactRef) -> Result<Vec<u8>, GenAiError> {
            unimplemented!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn polls_at_fixed_interval_until_done() {
        let video = ArtifactRef::url("https://v/1.mp4");
        let backend = ScriptedVideo::new(3, OperationStatus::Done(video.clone()));
        let image = ArtifactRef::url("https://img/1.png");
        let start = tokio::time::Instant::now();

        let result = generate_video(&backend, "waves", Some(&image), &PollConfig::default())
            .await
            .unwrap();

        assert_eq!(result, video);
        assert_eq!(backend.polls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert_eq!(*backend.conditioned_on.lock().unwrap(), Some(image));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_operation_is_an_error() {
        let backend = ScriptedVideo::new(1, OperationStatus::Failed("blocked".into()));
        let err = generate_video(&backend, "x", None, &PollConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(err.message(), "blocked");
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_polls() {
        let backend = ScriptedVideo::new(u32::MAX, OperationStatus::Running);
        let config = PollConfig {
            interval: Duration::from_secs(10),
            max_polls: 4,
        };
        let err = generate_video(&backend, "x", None, &config).await.unwrap_err();
        assert_matches!(err.kind(), ErrorKind::Timeout);
        assert_eq!(backend.polls.load(Ordering::SeqCst), 4);
    }
}
