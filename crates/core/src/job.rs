//! Ephemeral generation jobs and the artifacts they produce.
//!
//! A [`GenerationJob`] tracks one requested artifact from the moment the
//! user triggers generation until it either completes or fails. Jobs live
//! only in memory for the lifetime of a run.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{RunId, Timestamp};

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// The kind of media a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Image,
    Video,
    Audio,
}

impl ArtifactKind {
    /// File extension used when the artifact is offered as a download.
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Image => "png",
            ArtifactKind::Video => "mp4",
            ArtifactKind::Audio => "wav",
        }
    }

    /// Extension for a concrete MIME type, falling back to the kind's own
    /// extension for types it does not know.
    pub fn extension_for_mime(self, mime_type: &str) -> &'static str {
        let essence = mime_type.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            "video/mp4" => "mp4",
            "video/webm" => "webm",
            "video/quicktime" => "mov",
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/mpeg" => "mp3",
            "audio/ogg" => "ogg",
            _ => self.extension(),
        }
    }

    /// Default MIME type for the kind.
    pub fn default_mime_type(self) -> &'static str {
        match self {
            ArtifactKind::Image => "image/png",
            ArtifactKind::Video => "video/mp4",
            ArtifactKind::Audio => "audio/wav",
        }
    }
}

/// Reference to a finished artifact: either a remote URL or an inline
/// base64 payload returned directly by the generative API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactRef {
    Url { url: String },
    Inline { mime_type: String, data: String },
}

impl ArtifactRef {
    pub fn url(url: impl Into<String>) -> Self {
        ArtifactRef::Url { url: url.into() }
    }

    /// Wrap raw bytes as an inline base64 artifact.
    pub fn inline_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        ArtifactRef::Inline {
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Decode an inline payload. Returns `None` for URL references.
    pub fn decode_inline(&self) -> Option<Result<Vec<u8>, CoreError>> {
        match self {
            ArtifactRef::Url { .. } => None,
            ArtifactRef::Inline { data, .. } => Some(
                base64::engine::general_purpose::STANDARD
                    .decode(data)
                    .map_err(|e| CoreError::Validation(format!("invalid base64 payload: {e}"))),
            ),
        }
    }

    /// MIME type carried by an inline payload.
    pub fn mime_type(&self) -> Option<&str> {
        match self {
            ArtifactRef::Url { .. } => None,
            ArtifactRef::Inline { mime_type, .. } => Some(mime_type),
        }
    }

    /// File extension for this artifact when treated as `kind`. Inline
    /// payloads use their MIME type, URLs the kind's default.
    pub fn extension(&self, kind: ArtifactKind) -> &'static str {
        match self.mime_type() {
            Some(mime) => kind.extension_for_mime(mime),
            None => kind.extension(),
        }
    }

    /// `data:` URI for inline payloads, the URL itself otherwise.
    pub fn to_uri(&self) -> String {
        match self {
            ArtifactRef::Url { url } => url.clone(),
            ArtifactRef::Inline { mime_type, data } => format!("data:{mime_type};base64,{data}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Generating,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// `pending -> generating -> done | error`. A failed job may be
    /// re-triggered manually, which puts it back to `generating`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Generating)
                | (JobStatus::Generating, JobStatus::Done)
                | (JobStatus::Generating, JobStatus::Error)
                | (JobStatus::Error, JobStatus::Generating)
        )
    }
}

// ---------------------------------------------------------------------------
// GenerationJob
// ---------------------------------------------------------------------------

/// One requested artifact and its progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: RunId,
    pub kind: ArtifactKind,
    pub prompt: String,
    pub status: JobStatus,
    pub result: Option<ArtifactRef>,
    pub error: Option<String>,
    pub created_at: Timestamp,
}

impl GenerationJob {
    pub fn new(kind: ArtifactKind, prompt: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            kind,
            prompt: prompt.into(),
            status: JobStatus::Pending,
            result: None,
            error: None,
            created_at: chrono::Utc::now(),
        }
    }

    pub fn start(&mut self) -> Result<(), CoreError> {
        self.transition(JobStatus::Generating)?;
        self.error = None;
        Ok(())
    }

    pub fn complete(&mut self, result: ArtifactRef) -> Result<(), CoreError> {
        self.transition(JobStatus::Done)?;
        self.result = Some(result);
        Ok(())
    }

    /// Mark the job failed. Any earlier result is kept.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), CoreError> {
        self.transition(JobStatus::Error)?;
        self.error = Some(message.into());
        Ok(())
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::Conflict(format!(
                "job {} cannot move from {:?} to {:?}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn job_happy_path() {
        let mut job = GenerationJob::new(ArtifactKind::Image, "a red fox");
        assert_eq!(job.status, JobStatus::Pending);

        job.start().unwrap();
        job.complete(ArtifactRef::url("https://cdn/fox.png")).unwrap();

        assert_eq!(job.status, JobStatus::Done);
        assert_eq!(job.result, Some(ArtifactRef::url("https://cdn/fox.png")));
    }

    #[test]
    fn cannot_complete_pending_job() {
        let mut job = GenerationJob::new(ArtifactKind::Video, "waves");
        assert_matches!(
            job.complete(ArtifactRef::url("x")),
            Err(CoreError::Conflict(_))
        );
        assert!(job.result.is_none());
    }

    #[test]
    fn failed_job_can_be_retriggered() {
        let mut job = GenerationJob::new(ArtifactKind::Audio, "hello");
        job.start().unwrap();
        job.fail("boom").unwrap();
        assert_eq!(job.error.as_deref(), Some("boom"));

        job.start().unwrap();
        assert_eq!(job.status, JobStatus::Generating);
        assert!(job.error.is_none());
    }

    #[test]
    fn done_is_terminal() {
        assert!(!JobStatus::Done.can_transition_to(JobStatus::Generating));
        assert!(JobStatus::Done.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }

    #[test]
    fn inline_artifact_decodes() {
        let art = ArtifactRef::inline_bytes("image/png", &[1, 2, 3]);
        assert_eq!(art.decode_inline().unwrap().unwrap(), vec![1, 2, 3]);
        assert!(art.to_uri().starts_with("data:image/png;base64,"));
        assert!(ArtifactRef::url("u").decode_inline().is_none());
    }

    #[test]
    fn extensions_by_kind() {
        assert_eq!(ArtifactKind::Image.extension(), "png");
        assert_eq!(ArtifactKind::Video.extension(), "mp4");
        assert_eq!(ArtifactKind::Audio.extension(), "wav");
    }

    #[test]
    fn inline_extension_follows_mime_type() {
        let jpeg = ArtifactRef::inline_bytes("image/jpeg", &[0xff, 0xd8]);
        assert_eq!(jpeg.extension(ArtifactKind::Image), "jpg");

        let wav = ArtifactRef::inline_bytes("audio/wav; rate=24000", &[0]);
        assert_eq!(wav.extension(ArtifactKind::Audio), "wav");

        let unknown = ArtifactRef::inline_bytes("application/octet-stream", &[0]);
        assert_eq!(unknown.extension(ArtifactKind::Image), "png");
        assert_eq!(ArtifactRef::url("https://v/1").extension(ArtifactKind::Video), "mp4");
    }
}
