use atelier_core::error::CoreError;
use atelier_core::ffmpeg::FfmpegError;
use atelier_genai::GenAiError;

use crate::export::ExportError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A generative call failed; the message is user-facing.
    #[error(transparent)]
    GenAi(#[from] GenAiError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Merge failed: {0}")]
    Merge(#[from] FfmpegError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
