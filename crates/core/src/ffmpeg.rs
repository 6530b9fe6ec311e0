//! FFmpeg/FFprobe helpers for merging finished clips.
//!
//! Clips are joined in storyboard order either with a plain `concat`
//! filter or with chained `xfade` crossfades. Crossfade offsets depend on
//! clip durations, which are either assumed (every clip has the nominal
//! model output length) or probed with `ffprobe`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Nominal length of one generated clip, used when durations are not probed.
pub const DEFAULT_CLIP_DURATION_SECS: f64 = 8.0;
/// Default crossfade length.
pub const DEFAULT_CROSSFADE_SECS: f64 = 0.5;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("video file not found: {0}")]
    VideoNotFound(String),

    #[error("invalid merge request: {0}")]
    InvalidInput(String),
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Merge options
// ---------------------------------------------------------------------------

/// Where crossfade timing comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipTiming {
    /// Every clip is assumed to last this many seconds.
    Assumed(f64),
    /// Run `ffprobe` on every clip.
    Probed,
}

impl Default for ClipTiming {
    fn default() -> Self {
        ClipTiming::Assumed(DEFAULT_CLIP_DURATION_SECS)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOptions {
    /// Crossfade length in seconds; `None` means hard cuts.
    pub crossfade_secs: Option<f64>,
    pub timing: ClipTiming,
    /// Carry audio tracks through a hard-cut concat. Crossfaded merges are
    /// always video-only.
    pub include_audio: bool,
}

// ---------------------------------------------------------------------------
// Filter graphs
// ---------------------------------------------------------------------------

/// `[0:v][1:v]...concat=n=N:v=1:a=0[outv]`, or with interleaved audio
/// pads and an `[outa]` output when `include_audio` is set.
pub fn build_concat_filter(clip_count: usize, include_audio: bool) -> String {
    let mut graph = String::new();
    for i in 0..clip_count {
        graph.push_str(&format!("[{i}:v]"));
        if include_audio {
            graph.push_str(&format!("[{i}:a]"));
        }
    }
    if include_audio {
        graph.push_str(&format!("concat=n={clip_count}:v=1:a=1[outv][outa]"));
    } else {
        graph.push_str(&format!("concat=n={clip_count}:v=1:a=0[outv]"));
    }
    graph
}

/// Chain `xfade` filters across clips with the given durations.
///
/// The k-th fade starts at `sum(durations[..k]) - k * fade`, so each fade
/// overlaps the tail of the running output. The last stage is labelled
/// `[outv]`.
pub fn build_xfade_filter(durations: &[f64], fade_secs: f64) -> Result<String, FfmpegError> {
    if durations.len() < 2 {
        return Err(FfmpegError::InvalidInput(
            "crossfade needs at least two clips".to_string(),
        ));
    }
    if !(fade_secs.is_finite() && fade_secs > 0.0) {
        return Err(FfmpegError::InvalidInput(format!(
            "crossfade duration must be positive, got {fade_secs}"
        )));
    }
    if let Some(short) = durations.iter().find(|d| **d <= fade_secs) {
        return Err(FfmpegError::InvalidInput(format!(
            "clip of {short:.3}s is too short for a {fade_secs:.3}s crossfade"
        )));
    }

    let mut stages = Vec::with_capacity(durations.len() - 1);
    let mut elapsed = 0.0;
    let mut previous = "[0:v]".to_string();
    for k in 1..durations.len() {
        elapsed += durations[k - 1];
        let offset = elapsed - k as f64 * fade_secs;
        let label = if k == durations.len() - 1 {
            "[outv]".to_string()
        } else {
            format!("[v{k}]")
        };
        stages.push(format!(
            "{previous}[{k}:v]xfade=transition=fade:duration={fade_secs:.3}:offset={offset:.3}{label}"
        ));
        previous = label;
    }
    Ok(stages.join(";"))
}

/// Full ffmpeg argument list for a filter-graph merge.
pub fn merge_args(
    inputs: &[PathBuf],
    output: &Path,
    filter_graph: &str,
    with_audio: bool,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into()];
    for input in inputs {
        args.push("-i".into());
        args.push(input.as_os_str().to_owned());
    }
    args.push("-filter_complex".into());
    args.push(filter_graph.into());
    args.push("-map".into());
    args.push("[outv]".into());
    if with_audio {
        args.push("-map".into());
        args.push("[outa]".into());
    } else {
        args.push("-an".into());
    }
    for a in ["-c:v", "libx264", "-pix_fmt", "yuv420p", "-movflags", "+faststart"] {
        args.push(a.into());
    }
    args.push(output.as_os_str().to_owned());
    args
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run `ffprobe` on a video file and return the parsed JSON output.
pub async fn probe_video(path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    if !path.exists() {
        return Err(FfmpegError::VideoNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

/// Clip durations according to `timing`.
pub async fn resolve_durations(
    inputs: &[PathBuf],
    timing: ClipTiming,
) -> Result<Vec<f64>, FfmpegError> {
    match timing {
        ClipTiming::Assumed(secs) => Ok(vec![secs; inputs.len()]),
        ClipTiming::Probed => {
            let mut durations = Vec::with_capacity(inputs.len());
            for input in inputs {
                let probe = probe_video(input).await?;
                let d = parse_duration(&probe);
                if d <= 0.0 {
                    return Err(FfmpegError::ParseError(format!(
                        "could not determine duration of {}",
                        input.display()
                    )));
                }
                durations.push(d);
            }
            Ok(durations)
        }
    }
}

/// Merge `inputs` in order into `output`.
///
/// A single input is copied through unchanged.
pub async fn merge_clips(
    inputs: &[PathBuf],
    output: &Path,
    options: &MergeOptions,
) -> Result<(), FfmpegError> {
    if inputs.is_empty() {
        return Err(FfmpegError::InvalidInput("no clips to merge".to_string()));
    }
    for input in inputs {
        if !input.exists() {
            return Err(FfmpegError::VideoNotFound(
                input.to_string_lossy().to_string(),
            ));
        }
    }

    if inputs.len() == 1 {
        tokio::fs::copy(&inputs[0], output).await?;
        return Ok(());
    }

    let (graph, with_audio) = match options.crossfade_secs {
        Some(fade) => {
            let durations = resolve_durations(inputs, options.timing).await?;
            (build_xfade_filter(&durations, fade)?, false)
        }
        None => (
            build_concat_filter(inputs.len(), options.include_audio),
            options.include_audio,
        ),
    };

    tracing::debug!(clips = inputs.len(), graph = %graph, "Merging clips");

    let output_status = tokio::process::Command::new("ffmpeg")
        .args(merge_args(inputs, output, &graph, with_audio))
        .output()
        .await
        .map_err(FfmpegError::NotFound)?;

    if !output_status.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output_status.status.code(),
            stderr: String::from_utf8_lossy(&output_status.stderr).to_string(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Find the first video stream in the ffprobe output.
fn first_video_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// Parse the video duration in seconds from ffprobe output.
pub fn parse_duration(probe: &FfprobeOutput) -> f64 {
    // Try format-level duration first.
    if let Some(d) = &probe.format.duration {
        if let Ok(secs) = d.parse::<f64>() {
            return secs;
        }
    }
    // Fall back to the first video stream's duration.
    if let Some(stream) = first_video_stream(probe) {
        if let Some(d) = &stream.duration {
            if let Ok(secs) = d.parse::<f64>() {
                return secs;
            }
        }
    }
    0.0
}
