//! Merge a run's finished clips into one video.

use std::path::{Path, PathBuf};

use atelier_core::ffmpeg::{merge_clips, FfmpegError, MergeOptions};
use atelier_core::job::{ArtifactKind, ArtifactRef};
use atelier_core::naming::scene_artifact_filename;
use atelier_core::scene::{Scene, SceneStatus};
use atelier_genai::GenerativeBackend;

use crate::error::PipelineError;

/// Videos of the `done` scenes, in storyboard order.
pub fn finished_clips(scenes: &[Scene]) -> Vec<(usize, &ArtifactRef)> {
    scenes
        .iter()
        .filter(|s| s.status == SceneStatus::Done)
        .filter_map(|s| s.video.as_ref().map(|v| (s.index, v)))
        .collect()
}

/// Write an artifact's bytes to `dir/name`.
pub async fn materialize(
    backend: &dyn GenerativeBackend,
    artifact: &ArtifactRef,
    dir: &Path,
    name: &str,
) -> Result<PathBuf, PipelineError> {
    let bytes = backend.fetch(artifact).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Download every finished clip to a scratch directory and merge them into
/// `output`. Returns the number of clips merged.
pub async fn merge_scene_videos(
    backend: &dyn GenerativeBackend,
    scenes: &[Scene],
    output: &Path,
    options: &MergeOptions,
) -> Result<usize, PipelineError> {
    let clips = finished_clips(scenes);
    if clips.is_empty() {
        return Err(FfmpegError::InvalidInput("no finished clips to merge".to_string()).into());
    }

    let scratch = tempfile::tempdir()?;
    let mut inputs = Vec::with_capacity(clips.len());
    for (index, video) in &clips {
        let name = scene_artifact_filename(*index, ArtifactKind::Video, video);
        inputs.push(materialize(backend, video, scratch.path(), &name).await?);
    }

    tracing::info!(
        clips = inputs.len(),
        crossfade = ?options.crossfade_secs,
        output = %output.display(),
        "Merging scene videos",
    );
    merge_clips(&inputs, output, options).await?;
    Ok(inputs.len())
}
