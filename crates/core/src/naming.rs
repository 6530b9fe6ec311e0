//! Download file naming.
//!
//! Generates deterministic file names for generated artifacts so that
//! exported bundles sort in storyboard order.

use crate::job::{ArtifactKind, ArtifactRef};

/// File name for one scene artifact.
///
/// Convention: `scene-{NN}-{role}.{ext}` with a 1-based, zero-padded index.
/// The extension follows the artifact's MIME type when it carries one.
///
/// # Examples
///
/// ```
/// use atelier_core::job::{ArtifactKind, ArtifactRef};
/// use atelier_core::naming::scene_artifact_filename;
///
/// let png = ArtifactRef::inline_bytes("image/png", b"x");
/// let jpeg = ArtifactRef::inline_bytes("image/jpeg", b"x");
/// let clip = ArtifactRef::url("https://cdn/clip");
///
/// assert_eq!(scene_artifact_filename(0, ArtifactKind::Image, &png), "scene-01-image.png");
/// assert_eq!(scene_artifact_filename(0, ArtifactKind::Image, &jpeg), "scene-01-image.jpg");
/// assert_eq!(scene_artifact_filename(9, ArtifactKind::Video, &clip), "scene-10-video.mp4");
/// ```
pub fn scene_artifact_filename(index: usize, kind: ArtifactKind, artifact: &ArtifactRef) -> String {
    let role = match kind {
        ArtifactKind::Image => "image",
        ArtifactKind::Video => "video",
        ArtifactKind::Audio => "narration",
    };
    format!("scene-{:02}-{role}.{}", index + 1, artifact.extension(kind))
}

/// File name of the merged clip.
pub const MERGED_VIDEO_FILENAME: &str = "merged.mp4";

/// Lowercase, dash-separated slug of `title`, limited to 48 characters.
/// Falls back to `"untitled"` when nothing alphanumeric remains.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.chars().count() >= 48 {
            break;
        }
    }
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// Archive name for an exported run, e.g. `my-story.zip`.
pub fn archive_filename(title: &str) -> String {
    format!("{}.zip", slugify(title))
}
