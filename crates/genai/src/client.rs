//! REST client for the generative API.
//!
//! One method per model capability. The client makes exactly one HTTP
//! request per call; retries are layered on top with
//! [`Retrying`](crate::Retrying).

use async_trait::async_trait;
use atelier_core::audio::{pcm_to_wav, sample_rate_from_mime, SPEECH_CHANNELS, SPEECH_SAMPLE_RATE};
use atelier_core::job::{ArtifactKind, ArtifactRef};
use atelier_core::model::{ModelConfig, ModelSet};
use base64::Engine;
use serde_json::json;

use crate::backend::{GenerativeBackend, OperationStatus, VideoOperation};
use crate::error::{ErrorKind, GenAiError};
use crate::wire::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Operation, Part,
    PredictRequest, PredictResponse, SpeechConfig,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for instruction-based image edits.
pub const IMAGE_EDIT_MODEL: &str = "gemini-2.5-flash-image-preview";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// HTTP client bound to one API key and one set of models.
pub struct GenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    models: ModelSet,
}

impl GenAiClient {
    pub fn new(api_key: impl Into<String>, models: ModelSet) -> Self {
        Self::with_client(reqwest::Client::new(), DEFAULT_BASE_URL, api_key, models)
    }

    /// Reuse an existing [`reqwest::Client`] and point at another base URL.
    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        models: ModelSet,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            models,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn models(&self) -> &ModelSet {
        &self.models
    }

    fn model_url(&self, model_id: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model_id, method)
    }

    async fn generate_content(
        &self,
        model_id: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GenAiError> {
        let response = self
            .http
            .post(self.model_url(model_id, "generateContent"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await?;
        let body: GenerateContentResponse = Self::parse_response(response).await?;

        if let Some(reason) = body.block_reason() {
            return Err(GenAiError::safety_blocked(reason));
        }
        Ok(body)
    }

    /// Generate up to `count` images for one prompt.
    pub async fn generate_images(
        &self,
        prompt: &str,
        count: u8,
    ) -> Result<Vec<ArtifactRef>, GenAiError> {
        let ModelConfig::Image { model_id, params } = &self.models.image else {
            return Err(GenAiError::new(ErrorKind::Api, "image slot holds no image model"));
        };
        let request = PredictRequest {
            instances: vec![json!({ "prompt": prompt })],
            parameters: json!({
                "sampleCount": count.max(1),
                "aspectRatio": params.aspect_ratio,
            }),
        };
        let response = self
            .http
            .post(self.model_url(model_id, "predict"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;
        let body: PredictResponse = Self::parse_response(response).await?;

        let mut images = Vec::with_capacity(body.predictions.len());
        let mut filtered = None;
        for prediction in body.predictions {
            match prediction.bytes_base64_encoded {
                Some(data) => images.push(ArtifactRef::Inline {
                    mime_type: prediction
                        .mime_type
                        .unwrap_or_else(|| ArtifactKind::Image.default_mime_type().to_string()),
                    data,
                }),
                None => filtered = filtered.or(prediction.rai_filtered_reason),
            }
        }

        if images.is_empty() {
            return Err(match filtered {
                Some(reason) => GenAiError::safety_blocked(reason),
                None => GenAiError::empty_result("image"),
            });
        }
        Ok(images)
    }

    /// Fetch the current state of a long-running operation.
    pub async fn get_operation(&self, name: &str) -> Result<Operation, GenAiError> {
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, name))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Download a URL. The API key is attached only for URLs served by
    /// the API itself.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, GenAiError> {
        let mut request = self.http.get(url);
        if url.starts_with(&self.base_url) {
            request = request.header(API_KEY_HEADER, &self.api_key);
        }
        let response = Self::ensure_success(request.send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn inline_image_part(&self, image: &ArtifactRef) -> Result<Part, GenAiError> {
        match image {
            ArtifactRef::Inline { mime_type, data } => Ok(Part::inline(mime_type, data)),
            ArtifactRef::Url { url } => {
                let bytes = self.download(url).await?;
                Ok(Part::inline(
                    ArtifactKind::Image.default_mime_type(),
                    base64::engine::general_purpose::STANDARD.encode(bytes),
                ))
            }
        }
    }

    // ---- private helpers ----

    /// Return the response unchanged on 2xx, otherwise a classified
    /// [`GenAiError`] built from the status and body.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GenAiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GenAiError::from_response(status.as_u16(), &body));
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GenAiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl GenerativeBackend for GenAiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenAiError> {
        let ModelConfig::Text { model_id, params } = &self.models.text else {
            return Err(GenAiError::new(ErrorKind::Api, "text slot holds no text model"));
        };
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(prompt)])],
            generation_config: Some(GenerationConfig {
                temperature: params.temperature,
                ..Default::default()
            }),
        };
        let body = self.generate_content(model_id, &request).await?;
        body.text().ok_or_else(|| GenAiError::empty_result("text"))
    }

    async fn generate_json(
        &self,
        prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, GenAiError> {
        let ModelConfig::Text { model_id, params } = &self.models.text else {
            return Err(GenAiError::new(ErrorKind::Api, "text slot holds no text model"));
        };
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(prompt)])],
            generation_config: Some(GenerationConfig {
                temperature: params.temperature,
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(schema.clone()),
                ..Default::default()
            }),
        };
        let body = self.generate_content(model_id, &request).await?;
        let text = body.text().ok_or_else(|| GenAiError::empty_result("JSON"))?;
        parse_json_text(&text)
    }

    async fn generate_image(&self, prompt: &str) -> Result<ArtifactRef, GenAiError> {
        let mut images = self.generate_images(prompt, 1).await?;
        Ok(images.swap_remove(0))
    }

    async fn edit_image(
        &self,
        image: &ArtifactRef,
        instruction: &str,
    ) -> Result<ArtifactRef, GenAiError> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![
                self.inline_image_part(image).await?,
                Part::text(instruction),
            ])],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["IMAGE".to_string(), "TEXT".to_string()]),
                ..Default::default()
            }),
        };
        let body = self.generate_content(IMAGE_EDIT_MODEL, &request).await?;
        let data = body
            .inline_data()
            .ok_or_else(|| GenAiError::empty_result("edited image"))?;
        Ok(ArtifactRef::Inline {
            mime_type: data.mime_type.clone(),
            data: data.data.clone(),
        })
    }

    async fn submit_video(
        &self,
        prompt: &str,
        image: Option<&ArtifactRef>,
    ) -> Result<VideoOperation, GenAiError> {
        let ModelConfig::Video { model_id, params } = &self.models.video else {
            return Err(GenAiError::new(ErrorKind::Api, "video slot holds no video model"));
        };

        let mut instance = json!({ "prompt": prompt });
        if let Some(image) = image {
            let part = self.inline_image_part(image).await?;
            if let Some(inline) = part.inline_data {
                instance["image"] = json!({
                    "bytesBase64Encoded": inline.data,
                    "mimeType": inline.mime_type,
                });
            }
        }
        let mut parameters = json!({
            "aspectRatio": params.aspect_ratio,
            "durationSeconds": params.duration_secs,
        });
        if let Some(negative) = &params.negative_prompt {
            parameters["negativePrompt"] = json!(negative);
        }

        let response = self
            .http
            .post(self.model_url(model_id, "predictLongRunning"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&PredictRequest {
                instances: vec![instance],
                parameters,
            })
            .send()
            .await?;
        let operation: Operation = Self::parse_response(response).await?;

        tracing::debug!(operation = %operation.name, "Video generation submitted");
        Ok(VideoOperation::new(operation.name))
    }

    async fn poll_video(&self, operation: &VideoOperation) -> Result<OperationStatus, GenAiError> {
        let op = self.get_operation(&operation.name).await?;
        Ok(operation_status(&op))
    }

    async fn synthesize_speech(&self, text: &str) -> Result<ArtifactRef, GenAiError> {
        let ModelConfig::Speech { model_id, params } = &self.models.speech else {
            return Err(GenAiError::new(ErrorKind::Api, "speech slot holds no speech model"));
        };
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(text)])],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig::voice(&params.voice)),
                ..Default::default()
            }),
        };
        let body = self.generate_content(model_id, &request).await?;
        let data = body
            .inline_data()
            .ok_or_else(|| GenAiError::empty_result("audio"))?;

        let pcm = base64::engine::general_purpose::STANDARD
            .decode(&data.data)
            .map_err(|e| GenAiError::new(ErrorKind::EmptyResult, format!("invalid audio payload: {e}")))?;
        let rate = sample_rate_from_mime(&data.mime_type).unwrap_or(SPEECH_SAMPLE_RATE);
        let wav = pcm_to_wav(&pcm, rate, SPEECH_CHANNELS);
        Ok(ArtifactRef::inline_bytes(ArtifactKind::Audio.default_mime_type(), &wav))
    }

    async fn fetch(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, GenAiError> {
        match artifact {
            ArtifactRef::Url { url } => self.download(url).await,
            inline => inline
                .decode_inline()
                .unwrap_or_else(|| Ok(Vec::new()))
                .map_err(GenAiError::from),
        }
    }
}

/// Map an operation snapshot to a poll outcome.
fn operation_status(op: &Operation) -> OperationStatus {
    if !op.done {
        return OperationStatus::Running;
    }
    if let Some(error) = &op.error {
        let message = error
            .message
            .clone()
            .unwrap_or_else(|| format!("video generation failed (code {})", error.code.unwrap_or(0)));
        return OperationStatus::Failed(message);
    }
    match op.video_uri() {
        Some(uri) => OperationStatus::Done(ArtifactRef::url(uri)),
        None => match op.filtered_reasons().first() {
            Some(reason) => OperationStatus::Failed(format!(
                "Generation was blocked by the safety filter ({reason})"
            )),
            None => OperationStatus::Failed("video generation finished without a video".to_string()),
        },
    }
}

/// Parse model output as JSON, tolerating a fenced ```json block.
fn parse_json_text(text: &str) -> Result<serde_json::Value, GenAiError> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(unfenced.trim()).map_err(GenAiError::malformed_json)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn operation(json: &str) -> Operation {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn running_operation() {
        let op = operation(r#"{"name":"operations/1","done":false}"#);
        assert_eq!(operation_status(&op), OperationStatus::Running);
    }

    #[test]
    fn finished_operation_yields_url() {
        let op = operation(
            r#"{"name":"operations/1","done":true,"response":{"generateVideoResponse":
                {"generatedSamples":[{"video":{"uri":"https://v/1.mp4"}}]}}}"#,
        );
        assert_eq!(
            operation_status(&op),
            OperationStatus::Done(ArtifactRef::url("https://v/1.mp4"))
        );
    }

    #[test]
    fn failed_operation_carries_message() {
        let op = operation(r#"{"name":"o","done":true,"error":{"code":3,"message":"bad image"}}"#);
        assert_eq!(operation_status(&op), OperationStatus::Failed("bad image".into()));
    }

    #[test]
    fn filtered_video_is_reported() {
        let op = operation(
            r#"{"name":"o","done":true,"response":{"generateVideoResponse":
                {"raiMediaFilteredReasons":["celebrity"]}}}"#,
        );
        assert_matches!(operation_status(&op), OperationStatus::Failed(m) if m.contains("celebrity"));
    }

    #[test]
    fn json_text_with_fence() {
        let v = parse_json_text("```json\n{\"title\":\"x\"}\n```").unwrap();
        assert_eq!(v["title"], "x");
    }

    #[test]
    fn malformed_json_text() {
        let err = parse_json_text("not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedJson);
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = GenAiClient::with_client(
            reqwest::Client::new(),
            "http://localhost:9000/",
            "k",
            ModelSet::default(),
        );
        assert_eq!(
            client.model_url("m", "predict"),
            "http://localhost:9000/models/m:predict"
        );
    }
}
