//! Parallel image variations.
//!
//! All requests are issued at once and awaited together; there is no
//! concurrency bound. Results come back in request order, each one
//! independently a success or a failure.

use atelier_core::error::CoreError;
use atelier_core::job::{ArtifactKind, GenerationJob};
use atelier_core::model::MAX_IMAGES_PER_CALL;
use atelier_genai::GenerativeBackend;
use futures::future::join_all;

/// Upper bound on variations per request.
pub const MAX_VARIATIONS: usize = MAX_IMAGES_PER_CALL as usize * 2;

/// Generate `count` images of the same prompt concurrently.
pub async fn generate_variations(
    backend: &dyn GenerativeBackend,
    prompt: &str,
    count: usize,
) -> Result<Vec<GenerationJob>, CoreError> {
    if prompt.trim().is_empty() {
        return Err(CoreError::Validation("prompt must not be empty".to_string()));
    }
    if !(1..=MAX_VARIATIONS).contains(&count) {
        return Err(CoreError::Validation(format!(
            "variation count must be between 1 and {MAX_VARIATIONS}"
        )));
    }
    let prompts = vec![prompt.to_string(); count];
    generate_images(backend, &prompts).await
}

/// One image job per prompt, all in flight at the same time.
pub async fn generate_images(
    backend: &dyn GenerativeBackend,
    prompts: &[String],
) -> Result<Vec<GenerationJob>, CoreError> {
    let mut jobs = prompts
        .iter()
        .map(|p| {
            let mut job = GenerationJob::new(ArtifactKind::Image, p.clone());
            job.start()?;
            Ok(job)
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

    let results = join_all(jobs.iter().map(|job| backend.generate_image(&job.prompt))).await;

    for (job, result) in jobs.iter_mut().zip(results) {
        match result {
            Ok(image) => job.complete(image)?,
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Variation failed");
                job.fail(e.to_string())?;
            }
        }
    }
    Ok(jobs)
}
