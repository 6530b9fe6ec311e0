//! Ad-video flow: four narratively chained shots for one product.
//!
//! Each shot's prompt restates the product and refers back to the previous
//! beat so the clips read as one spot. The shots depend on each other, so
//! the run stops at the first failure.

use std::sync::Arc;

use atelier_core::error::CoreError;
use atelier_core::scene::Storyboard;
use atelier_genai::GenerativeBackend;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::batch::{BatchOptions, FailurePolicy, Pipeline, RunReport};
use crate::events::EventBus;

/// The four beats, in order. `{product}` is replaced by the product name.
pub const AD_BEATS: [(&str, &str); 4] = [
    (
        "hook",
        "An attention-grabbing opening shot that teases {product} without fully revealing it.",
    ),
    (
        "problem",
        "A relatable everyday moment showing the frustration that {product} solves.",
    ),
    ("solution", "{product} in use, making that frustration disappear."),
    (
        "call to action",
        "A confident closing hero shot of {product} with clean space for a tagline.",
    ),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdBrief {
    pub product: String,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

impl AdBrief {
    pub fn new(product: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            audience: None,
            style: None,
        }
    }
}

/// Prompts for the four beats.
pub fn ad_prompts(brief: &AdBrief) -> Result<Vec<String>, CoreError> {
    let product = brief.product.trim();
    if product.is_empty() {
        return Err(CoreError::Validation("product must not be empty".to_string()));
    }

    let mut suffix = String::new();
    if let Some(audience) = brief.audience.as_deref().filter(|a| !a.trim().is_empty()) {
        suffix.push_str(&format!(" Aimed at {}.", audience.trim()));
    }
    if let Some(style) = brief.style.as_deref().filter(|s| !s.trim().is_empty()) {
        suffix.push_str(&format!(" Visual style: {}.", style.trim()));
    }

    let prompts = AD_BEATS
        .iter()
        .enumerate()
        .map(|(i, (beat, direction))| {
            let continuity = match i {
                0 => String::new(),
                _ => format!(" Continues directly from the {} shot.", AD_BEATS[i - 1].0),
            };
            format!(
                "Commercial, {beat} shot. {}{continuity}{suffix}",
                direction.replace("{product}", product)
            )
        })
        .collect();
    Ok(prompts)
}

/// A pipeline over the four shots, set to [`FailurePolicy::AbortRemaining`].
pub fn ad_pipeline(
    backend: Arc<dyn GenerativeBackend>,
    brief: &AdBrief,
    options: BatchOptions,
) -> Result<Pipeline, CoreError> {
    let storyboard = Storyboard::from_prompts(ad_prompts(brief)?);
    let options = BatchOptions {
        failure_policy: FailurePolicy::AbortRemaining,
        ..options
    };
    Ok(Pipeline::new(backend, storyboard, options))
}

/// Run the four shots, stopping at the first failure.
pub async fn run_ad(
    backend: Arc<dyn GenerativeBackend>,
    brief: &AdBrief,
    options: BatchOptions,
    events: Arc<EventBus>,
    cancel: &CancellationToken,
) -> Result<RunReport, CoreError> {
    let pipeline = ad_pipeline(backend, brief, options)?.with_events(events);
    tracing::info!(run_id = %pipeline.run_id(), product = %brief.product.trim(), "Ad video run starting");
    Ok(pipeline.run(cancel).await)
}

#[cfg(test)]
mod tests {
    use atelier_core::scene::SceneStatus;
    use atelier_genai::PollConfig;

    use super::*;
    use crate::batch::RunOutcome;
    use crate::testing::MockBackend;

    #[test]
    fn four_chained_prompts() {
        let brief = AdBrief {
            product: "Glow Lamp".to_string(),
            audience: Some("students".to_string()),
            style: None,
        };
        let prompts = ad_prompts(&brief).unwrap();

        assert_eq!(prompts.len(), 4);
        assert!(prompts.iter().all(|p| p.contains("Glow Lamp")));
        assert!(prompts.iter().all(|p| p.ends_with("Aimed at students.")));
        assert!(prompts[0].starts_with("Commercial, hook shot."));
        assert!(!prompts[0].contains("Continues"));
        assert!(prompts[2].contains("Continues directly from the problem shot."));
        assert!(prompts[3].starts_with("Commercial, call to action shot."));
    }

    #[test]
    fn blank_product_rejected() {
        assert!(ad_prompts(&AdBrief::new(" ")).is_err());
    }

    #[tokio::test]
    async fn first_failure_aborts_remaining_shots() {
        let prompts = ad_prompts(&AdBrief::new("Glow Lamp")).unwrap();
        let backend = Arc::new(MockBackend::new().failing_images(&[prompts[1].as_str()]));
        let dyn_backend: Arc<dyn GenerativeBackend> = backend.clone();
        let options = BatchOptions {
            poll: PollConfig {
                interval: std::time::Duration::ZERO,
                max_polls: 1,
            },
            ..Default::default()
        };

        let report = run_ad(
            dyn_backend,
            &AdBrief::new("Glow Lamp"),
            options,
            Arc::new(EventBus::default()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.outcome, RunOutcome::Aborted);
        let statuses: Vec<_> = report.scenes.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![
                SceneStatus::Done,
                SceneStatus::Error,
                SceneStatus::Pending,
                SceneStatus::Pending
            ]
        );
    }
}
