//! Command-line runner: generate a batch, story or ad video without the
//! HTTP server and export the results to a directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use atelier_core::batch::PromptList;
use atelier_core::context::AppContext;
use atelier_core::ffmpeg::{ClipTiming, MergeOptions};
use atelier_core::model::ModelSet;
use atelier_core::naming::{archive_filename, MERGED_VIDEO_FILENAME};
use atelier_core::scene::{SceneStatus, Storyboard};
use atelier_genai::client::DEFAULT_BASE_URL;
use atelier_genai::{GenAiClient, GenerativeBackend, RetryPolicy, Retrying};
use atelier_pipeline::ad::{run_ad, AdBrief};
use atelier_pipeline::events::SCENE_STATUS;
use atelier_pipeline::export::{collect_artifacts, write_files, write_zip, ExportEntry};
use atelier_pipeline::merge::merge_scene_videos;
use atelier_pipeline::story::{run_story, StoryRequest, DEFAULT_SCENE_COUNT};
use atelier_pipeline::{BatchOptions, EventBus, FailurePolicy, Pipeline, RunOutcome, RunReport};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "atelier-worker", version, about = "Generate scenes and export them to a directory")]
struct Cli {
    /// Prompt file: JSON (`[{"prompt": ...}]` or `{"scenes": [...]}`) or
    /// plain text with one prompt per line.
    #[arg(required_unless_present_any = ["story", "ad"], conflicts_with_all = ["story", "ad"])]
    prompt_file: Option<PathBuf>,

    /// Write a narrated story from this premise instead of reading a file.
    #[arg(long, conflicts_with = "ad")]
    story: Option<String>,

    /// Scenes in the story.
    #[arg(long, default_value_t = DEFAULT_SCENE_COUNT)]
    scenes: usize,

    /// Generate a four-shot ad video for this product.
    #[arg(long)]
    ad: Option<String>,

    /// Output directory.
    #[arg(long, default_value = "out")]
    out: PathBuf,

    /// Seconds to wait between scenes.
    #[arg(long, default_value_t = 0)]
    delay: u64,

    /// Stop after the image stage.
    #[arg(long)]
    images_only: bool,

    /// Stop at the first failed scene instead of continuing.
    #[arg(long)]
    abort_on_failure: bool,

    /// Merge the finished clips into one video (needs ffmpeg).
    #[arg(long)]
    merge: bool,

    /// Crossfade length in seconds between merged clips.
    #[arg(long, requires = "merge")]
    crossfade: Option<f64>,

    /// Measure clip lengths with ffprobe instead of assuming the nominal
    /// clip duration when placing crossfades.
    #[arg(long, requires = "crossfade")]
    probe_durations: bool,

    /// Also bundle everything into a ZIP archive.
    #[arg(long)]
    zip: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier_worker=debug,atelier_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // --- Backend ---
    let context = AppContext::from_env();
    let api_key = context.require_api_key()?.to_string();
    let base_url = std::env::var("GENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let client = GenAiClient::with_client(reqwest::Client::new(), base_url, api_key, ModelSet::default());
    let backend: Arc<dyn GenerativeBackend> =
        Arc::new(Retrying::new(client, RetryPolicy::default()));

    // --- Cancellation ---
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, stopping after the current scene");
            signal_cancel.cancel();
        }
    });

    // --- Progress ---
    let events = Arc::new(EventBus::default());
    let mut progress = events.subscribe();
    tokio::spawn(async move {
        loop {
            match progress.recv().await {
                Ok(event) if event.event_type == SCENE_STATUS => {
                    if let (Some(index), Some(status)) = (event.scene_index, event.status) {
                        tracing::info!(scene = index + 1, status = status.as_str(), "Scene progress");
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress log fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let options = BatchOptions {
        delay: Duration::from_secs(cli.delay),
        failure_policy: if cli.abort_on_failure {
            FailurePolicy::AbortRemaining
        } else {
            FailurePolicy::Isolate
        },
        images_only: cli.images_only,
        ..BatchOptions::default()
    };

    // --- Run ---
    let (title, report) = if let Some(premise) = &cli.story {
        let request = StoryRequest {
            scene_count: cli.scenes,
            ..StoryRequest::new(premise.clone())
        };
        let story = run_story(Arc::clone(&backend), &request, options, events, &cancel).await?;
        (story.script.title, story.run)
    } else if let Some(product) = &cli.ad {
        let report = run_ad(Arc::clone(&backend), &AdBrief::new(product.clone()), options, events, &cancel).await?;
        (format!("{product} ad"), report)
    } else {
        let path = cli
            .prompt_file
            .as_deref()
            .context("a prompt file, --story or --ad is required")?;
        run_prompt_file(Arc::clone(&backend), path, options, events, &cancel).await?
    };

    summarize(&report);

    export(backend.as_ref(), &cli, &title, &report).await
}

async fn run_prompt_file(
    backend: Arc<dyn GenerativeBackend>,
    path: &Path,
    options: BatchOptions,
    events: Arc<EventBus>,
    cancel: &CancellationToken,
) -> anyhow::Result<(String, RunReport)> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut prompts = PromptList::default();
    let count = prompts
        .load_file(&file_name, &text)
        .with_context(|| format!("failed to load prompts from {}", path.display()))?;
    tracing::info!(file = %path.display(), prompts = count, "Prompt file loaded");

    let storyboard = Storyboard::from_prompts(prompts.prompts().iter().cloned());
    let report = Pipeline::new(backend, storyboard, options)
        .with_events(events)
        .run(cancel)
        .await;

    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "batch".to_string());
    Ok((title, report))
}

fn summarize(report: &RunReport) {
    let done = report.count(SceneStatus::Done);
    let failed = report.count(SceneStatus::Error);
    let pending = report.count(SceneStatus::Pending);
    match report.outcome {
        RunOutcome::Completed => tracing::info!(done, failed, "Run completed"),
        RunOutcome::Cancelled => tracing::warn!(done, failed, pending, "Run cancelled"),
        RunOutcome::Aborted => tracing::warn!(done, failed, pending, "Run aborted at first failure"),
    }
    for scene in report.scenes.iter().filter(|s| s.status == SceneStatus::Error) {
        tracing::warn!(
            scene = scene.index + 1,
            error = scene.error.as_deref().unwrap_or_default(),
            "Scene failed"
        );
    }
}

/// Write every finished artifact to the output directory, then optionally
/// merge the clips and bundle the lot.
async fn export(
    backend: &dyn GenerativeBackend,
    cli: &Cli,
    title: &str,
    report: &RunReport,
) -> anyhow::Result<()> {
    let collected = collect_artifacts(backend, &report.scenes).await;
    for failure in &collected.failures {
        tracing::error!(artifact = %failure.name, error = %failure.error, "Artifact not exported");
    }
    let failed = collected.failures.len();
    let mut entries = collected.entries;
    if entries.is_empty() {
        tracing::warn!("No finished artifacts to export");
        if failed > 0 {
            anyhow::bail!("{failed} artifact(s) could not be exported");
        }
        return Ok(());
    }
    let written = write_files(&cli.out, &entries).await?;
    tracing::info!(dir = %cli.out.display(), files = written.len(), "Artifacts written");

    if cli.merge {
        let output = cli.out.join(MERGED_VIDEO_FILENAME);
        let options = merge_options(cli);
        // A failed merge leaves the individual clips in place.
        match merge_scene_videos(backend, &report.scenes, &output, &options).await {
            Ok(clips) => {
                tracing::info!(clips, output = %output.display(), "Clips merged");
                entries.push(ExportEntry {
                    name: MERGED_VIDEO_FILENAME.to_string(),
                    bytes: tokio::fs::read(&output).await?,
                });
            }
            Err(e) => tracing::error!(error = %e, "Merge failed"),
        }
    }

    if cli.zip {
        let archive = cli.out.join(archive_filename(title));
        write_zip(archive, entries).await?;
    }

    if failed > 0 {
        anyhow::bail!("{failed} artifact(s) could not be exported");
    }
    Ok(())
}

fn merge_options(cli: &Cli) -> MergeOptions {
    MergeOptions {
        crossfade_secs: cli.crossfade,
        timing: if cli.probe_durations {
            ClipTiming::Probed
        } else {
            ClipTiming::default()
        },
        ..MergeOptions::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_file_or_story_is_required() {
        assert!(Cli::try_parse_from(["atelier-worker"]).is_err());
        assert!(Cli::try_parse_from(["atelier-worker", "prompts.json", "--story", "x"]).is_err());

        let cli = Cli::try_parse_from(["atelier-worker", "--story", "a heist", "--scenes", "3"]).unwrap();
        assert_eq!(cli.story.as_deref(), Some("a heist"));
        assert_eq!(cli.scenes, 3);
    }

    #[test]
    fn crossfade_needs_merge() {
        assert!(Cli::try_parse_from(["atelier-worker", "p.txt", "--crossfade", "1"]).is_err());

        let cli =
            Cli::try_parse_from(["atelier-worker", "p.txt", "--merge", "--crossfade", "0.5", "--zip"]).unwrap();
        assert_eq!(cli.crossfade, Some(0.5));
        assert!(cli.zip);
        assert_eq!(cli.out, PathBuf::from("out"));
        assert_eq!(merge_options(&cli).timing, ClipTiming::default());
    }

    #[test]
    fn probe_durations_selects_probed_timing() {
        assert!(Cli::try_parse_from(["atelier-worker", "p.txt", "--merge", "--probe-durations"]).is_err());

        let cli = Cli::try_parse_from([
            "atelier-worker",
            "p.txt",
            "--merge",
            "--crossfade",
            "1",
            "--probe-durations",
        ])
        .unwrap();
        let options = merge_options(&cli);
        assert_eq!(options.timing, ClipTiming::Probed);
        assert_eq!(options.crossfade_secs, Some(1.0));
    }
}
