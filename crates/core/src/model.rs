//! Model selection: which generative model serves a call, and with which
//! parameters.
//!
//! A [`ModelConfig`] is validated once where it enters the system (request
//! body, config file) instead of string-comparing model ids at call sites.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";
pub const DEFAULT_VIDEO_MODEL: &str = "veo-3.0-generate-001";
pub const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_VOICE: &str = "Kore";

/// Aspect ratios accepted by the image and video models.
pub const VALID_ASPECT_RATIOS: &[&str] = &["1:1", "3:4", "4:3", "9:16", "16:9"];

pub const MIN_VIDEO_DURATION_SECS: u8 = 1;
pub const MAX_VIDEO_DURATION_SECS: u8 = 8;
pub const MAX_IMAGES_PER_CALL: u8 = 4;

// ---------------------------------------------------------------------------
// Params
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageParams {
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_image_count")]
    pub number_of_images: u8,
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            aspect_ratio: default_aspect_ratio(),
            number_of_images: default_image_count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoParams {
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_video_duration")]
    pub duration_secs: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
}

impl Default for VideoParams {
    fn default() -> Self {
        Self {
            aspect_ratio: default_aspect_ratio(),
            duration_secs: default_video_duration(),
            negative_prompt: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechParams {
    #[serde(default = "default_voice")]
    pub voice: String,
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self {
            voice: default_voice(),
        }
    }
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

fn default_image_count() -> u8 {
    1
}

fn default_video_duration() -> u8 {
    MAX_VIDEO_DURATION_SECS
}

fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}

// ---------------------------------------------------------------------------
// ModelConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Text,
    Image,
    Video,
    Speech,
}

/// Tagged model configuration, e.g.
/// `{"kind": "video", "modelId": "veo-3.0-generate-001", "params": {"durationSecs": 8}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ModelConfig {
    Text {
        model_id: String,
        #[serde(default)]
        params: TextParams,
    },
    Image {
        model_id: String,
        #[serde(default)]
        params: ImageParams,
    },
    Video {
        model_id: String,
        #[serde(default)]
        params: VideoParams,
    },
    Speech {
        model_id: String,
        #[serde(default)]
        params: SpeechParams,
    },
}

impl ModelConfig {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelConfig::Text { .. } => ModelKind::Text,
            ModelConfig::Image { .. } => ModelKind::Image,
            ModelConfig::Video { .. } => ModelKind::Video,
            ModelConfig::Speech { .. } => ModelKind::Speech,
        }
    }

    pub fn model_id(&self) -> &str {
        match self {
            ModelConfig::Text { model_id, .. }
            | ModelConfig::Image { model_id, .. }
            | ModelConfig::Video { model_id, .. }
            | ModelConfig::Speech { model_id, .. } => model_id,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.model_id().trim().is_empty() {
            return Err(CoreError::Validation("modelId must not be empty".to_string()));
        }
        match self {
            ModelConfig::Text { params, .. } => {
                if let Some(t) = params.temperature {
                    if !(0.0..=2.0).contains(&t) {
                        return Err(CoreError::Validation(format!(
                            "temperature must be within 0.0..=2.0, got {t}"
                        )));
                    }
                }
            }
            ModelConfig::Image { params, .. } => {
                validate_aspect_ratio(&params.aspect_ratio)?;
                if params.number_of_images == 0 || params.number_of_images > MAX_IMAGES_PER_CALL {
                    return Err(CoreError::Validation(format!(
                        "numberOfImages must be within 1..={MAX_IMAGES_PER_CALL}, got {}",
                        params.number_of_images
                    )));
                }
            }
            ModelConfig::Video { params, .. } => {
                validate_aspect_ratio(&params.aspect_ratio)?;
                if !(MIN_VIDEO_DURATION_SECS..=MAX_VIDEO_DURATION_SECS)
                    .contains(&params.duration_secs)
                {
                    return Err(CoreError::Validation(format!(
                        "durationSecs must be within {MIN_VIDEO_DURATION_SECS}..={MAX_VIDEO_DURATION_SECS}, got {}",
                        params.duration_secs
                    )));
                }
            }
            ModelConfig::Speech { params, .. } => {
                if params.voice.trim().is_empty() {
                    return Err(CoreError::Validation("voice must not be empty".to_string()));
                }
            }
        }
        Ok(())
    }

    /// Parse and validate a config from JSON in one step.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CoreError> {
        let config: ModelConfig = serde_json::from_value(value)
            .map_err(|e| CoreError::Validation(format!("invalid model config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

pub fn validate_aspect_ratio(ratio: &str) -> Result<(), CoreError> {
    if VALID_ASPECT_RATIOS.contains(&ratio) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid aspect ratio '{ratio}'. Must be one of: {}",
            VALID_ASPECT_RATIOS.join(", ")
        )))
    }
}

// ---------------------------------------------------------------------------
// ModelSet
// ---------------------------------------------------------------------------

/// The four models a pipeline run uses, one per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSet {
    pub text: ModelConfig,
    pub image: ModelConfig,
    pub video: ModelConfig,
    pub speech: ModelConfig,
}

impl ModelSet {
    /// Check every slot holds a valid config of the matching kind.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (slot, config, expected) in [
            ("text", &self.text, ModelKind::Text),
            ("image", &self.image, ModelKind::Image),
            ("video", &self.video, ModelKind::Video),
            ("speech", &self.speech, ModelKind::Speech),
        ] {
            if config.kind() != expected {
                return Err(CoreError::Validation(format!(
                    "{slot} slot holds a {:?} model",
                    config.kind()
                )));
            }
            config.validate()?;
        }
        Ok(())
    }
}

impl Default for ModelSet {
    fn default() -> Self {
        Self {
            text: ModelConfig::Text {
                model_id: DEFAULT_TEXT_MODEL.to_string(),
                params: TextParams::default(),
            },
            image: ModelConfig::Image {
                model_id: DEFAULT_IMAGE_MODEL.to_string(),
                params: ImageParams::default(),
            },
            video: ModelConfig::Video {
                model_id: DEFAULT_VIDEO_MODEL.to_string(),
                params: VideoParams::default(),
            },
            speech: ModelConfig::Speech {
                model_id: DEFAULT_SPEECH_MODEL.to_string(),
                params: SpeechParams::default(),
            },
        }
    }
}
