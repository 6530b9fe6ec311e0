//! Export finished artifacts as loose files or a ZIP bundle.
//!
//! Entry names follow [`atelier_core::naming`], so a bundle lists in
//! storyboard order.

use std::io::Write;
use std::path::{Path, PathBuf};

use atelier_core::job::{ArtifactKind, ArtifactRef};
use atelier_core::naming::scene_artifact_filename;
use atelier_core::scene::Scene;
use atelier_genai::{GenAiError, GenerativeBackend};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export")]
    Empty,

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// An artifact that could not be downloaded.
#[derive(Debug)]
pub struct ArtifactFailure {
    pub name: String,
    pub error: GenAiError,
}

/// Result of [`collect_artifacts`]: what was fetched and what was not.
#[derive(Debug, Default)]
pub struct CollectedArtifacts {
    pub entries: Vec<ExportEntry>,
    pub failures: Vec<ArtifactFailure>,
}

/// Fetch every artifact the scenes hold, image before video before
/// narration within a scene.
///
/// A failed download is recorded in `failures` and does not discard the
/// artifacts already fetched.
pub async fn collect_artifacts(backend: &dyn GenerativeBackend, scenes: &[Scene]) -> CollectedArtifacts {
    let mut collected = CollectedArtifacts::default();
    for scene in scenes {
        let artifacts: [(ArtifactKind, Option<&ArtifactRef>); 3] = [
            (ArtifactKind::Image, scene.image.as_ref()),
            (ArtifactKind::Video, scene.video.as_ref()),
            (ArtifactKind::Audio, scene.audio.as_ref()),
        ];
        for (kind, artifact) in artifacts {
            let Some(artifact) = artifact else { continue };
            let name = scene_artifact_filename(scene.index, kind, artifact);
            match backend.fetch(artifact).await {
                Ok(bytes) => collected.entries.push(ExportEntry { name, bytes }),
                Err(error) => {
                    tracing::warn!(artifact = %name, error = %error, "Artifact download failed");
                    collected.failures.push(ArtifactFailure { name, error });
                }
            }
        }
    }
    collected
}

/// Write the entries into a new ZIP file at `path` on the blocking pool.
pub async fn write_zip(path: PathBuf, entries: Vec<ExportEntry>) -> Result<(), ExportError> {
    tokio::task::spawn_blocking(move || write_archive(&path, &entries)).await?
}

/// Synchronous body of [`write_zip`].
pub fn write_archive(path: &Path, entries: &[ExportEntry]) -> Result<(), ExportError> {
    if entries.is_empty() {
        return Err(ExportError::Empty);
    }

    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for entry in entries {
        zip.start_file(entry.name.as_str(), options)?;
        zip.write_all(&entry.bytes)?;
    }
    zip.finish()?;

    tracing::info!(path = %path.display(), entries = entries.len(), "Archive written");
    Ok(())
}

/// Write the entries as individual files under `dir`.
pub async fn write_files(dir: &Path, entries: &[ExportEntry]) -> Result<Vec<PathBuf>, ExportError> {
    tokio::fs::create_dir_all(dir).await?;
    let mut written = Vec::with_capacity(entries.len());
    for entry in entries {
        let path = dir.join(&entry.name);
        tokio::fs::write(&path, &entry.bytes).await?;
        written.push(path);
    }
    Ok(written)
}
