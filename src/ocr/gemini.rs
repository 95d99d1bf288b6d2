//! Gemini `generateContent` client.
//!
//! Used twice in the pipeline: as an OCR backend (plain transcription) and as the
//! [`FieldModel`] that reads fields straight from the photo or from OCR text.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{BackendFuture, BackendKind, OcrBackend};
use crate::config::ModelConfig;
use crate::errors::{error_logging, AppResult};
use crate::extraction::model::{image_extraction_prompt, text_extraction_prompt};
use crate::extraction::{parse_model_fields, FieldModel, ModelFields, ModelFuture};
use crate::ocr_errors::OcrError;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const BACKEND: &str = "gemini";

const TRANSCRIPTION_PROMPT: &str = "Copy out every piece of text visible on this medicine \
strip or carton: product name, generic composition, batch number (B.No.), MFG and EXP dates, \
M.R.P. and manufacturer. Reply in plain text only and keep numbers and formatting exactly as \
printed.";

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: Option<String>,
    models: Vec<String>,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn from_config(config: &ModelConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            api_key: config.api_key.clone(),
            models: config.models.clone(),
            http,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && !self.models.is_empty()
    }

    /// Plain-text transcription of the label
    pub async fn transcribe(&self, image: &[u8]) -> Result<Option<String>, OcrError> {
        let text = self
            .generate(vec![json!({"text": TRANSCRIPTION_PROMPT}), inline_image(image)])
            .await?;
        let text = text.trim();
        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(text.to_string()))
        }
    }

    pub async fn extract_fields_from_image(&self, image: &[u8]) -> Result<ModelFields, OcrError> {
        let raw = self
            .generate(vec![
                json!({"text": image_extraction_prompt()}),
                inline_image(image),
            ])
            .await?;
        parse_reply(&raw)
    }

    pub async fn extract_fields_from_text(&self, text: &str) -> Result<ModelFields, OcrError> {
        let raw = self
            .generate(vec![json!({"text": text_extraction_prompt(text)})])
            .await?;
        parse_reply(&raw)
    }

    /// Send one user turn, trying configured models in order.
    ///
    /// A model that does not exist for this key moves on to the next one; any other
    /// failure is returned immediately.
    async fn generate(&self, parts: Vec<Value>) -> Result<String, OcrError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(OcrError::BackendUnavailable {
                backend: BACKEND.to_string(),
            });
        };
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": parts
            }]
        });

        let mut last_error = String::from("no model configured");
        for model in &self.models {
            let url = format!("{}/{}:generateContent", BASE_URL, model);
            let response = self
                .http
                .post(&url)
                .header("x-goog-api-key", key)
                .json(&body)
                .send()
                .await
                .map_err(|e| {
                    error_logging::log_network_error(&e, "gemini_generate", Some(model.as_str()), None);
                    OcrError::call_failed(BACKEND, e.to_string())
                })?;

            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if status.is_success() {
                debug!(model = %model, bytes = text.len(), "Gemini responded");
                return candidate_text(&text);
            }

            let detail = extract_gemini_error(&text).unwrap_or(text);
            if status == reqwest::StatusCode::NOT_FOUND || detail.contains("NOT_FOUND") {
                warn!(model = %model, "Gemini model not available, trying next model");
                last_error = format!("model {} not found: {}", model, detail);
                continue;
            }
            error_logging::log_network_error(
                &detail,
                "gemini_generate",
                Some(model.as_str()),
                Some(status.as_u16()),
            );
            return Err(OcrError::call_failed(
                BACKEND,
                format!("Gemini API error ({}): {}", status, detail),
            ));
        }

        Err(OcrError::call_failed(BACKEND, last_error))
    }
}

fn inline_image(image: &[u8]) -> Value {
    let mime = image::guess_format(image)
        .map(|format| format.to_mime_type())
        .unwrap_or("image/jpeg");
    json!({
        "inline_data": {
            "mime_type": mime,
            "data": BASE64.encode(image)
        }
    })
}

fn parse_reply(raw: &str) -> Result<ModelFields, OcrError> {
    parse_model_fields(raw).ok_or_else(|| {
        let preview: String = raw.chars().take(120).collect();
        OcrError::MalformedModelResponse(preview)
    })
}

/// Concatenated text parts of the first candidate
fn candidate_text(body: &str) -> Result<String, OcrError> {
    let payload: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| OcrError::call_failed(BACKEND, format!("invalid response JSON: {}", e)))?;
    let Some(content) = payload
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
    else {
        return Ok(String::new());
    };
    Ok(content
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect::<Vec<_>>()
        .join(""))
}

fn extract_gemini_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<GeminiError>,
    }

    #[derive(Deserialize)]
    struct GeminiError {
        message: Option<String>,
        status: Option<String>,
        code: Option<i32>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    Some(format_error_parts(
        error.message,
        error.status,
        error.code.map(|value| value.to_string()),
    ))
}

fn format_error_parts(message: Option<String>, kind: Option<String>, code: Option<String>) -> String {
    let non_blank = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    let mut parts = Vec::new();
    if let Some(message) = non_blank(message) {
        parts.push(message);
    }
    if let Some(kind) = non_blank(kind) {
        parts.push(format!("type: {}", kind));
    }
    if let Some(code) = non_blank(code) {
        parts.push(format!("code: {}", code));
    }
    if parts.is_empty() {
        "unknown error".to_string()
    } else {
        parts.join(" | ")
    }
}

fn soft_fields(result: Result<ModelFields, OcrError>, pass: &str) -> Option<ModelFields> {
    match result {
        Ok(fields) if fields.is_empty() => None,
        Ok(fields) => Some(fields),
        Err(OcrError::BackendUnavailable { .. }) => None,
        Err(err) => {
            error_logging::log_backend_error(&err, pass, err.is_billing_disabled(), None);
            None
        }
    }
}

impl OcrBackend for GeminiClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Gemini
    }

    fn is_available(&self) -> bool {
        self.is_configured()
    }

    fn extract_text<'a>(&'a self, image: &'a [u8]) -> BackendFuture<'a> {
        Box::pin(self.transcribe(image))
    }
}

impl FieldModel for GeminiClient {
    fn is_available(&self) -> bool {
        self.is_configured()
    }

    fn extract_from_image<'a>(&'a self, image: &'a [u8]) -> ModelFuture<'a> {
        Box::pin(async move {
            soft_fields(self.extract_fields_from_image(image).await, "gemini_image_fields")
        })
    }

    fn extract_from_text<'a>(&'a self, text: &'a str) -> ModelFuture<'a> {
        Box::pin(async move {
            soft_fields(self.extract_fields_from_text(text).await, "gemini_text_fields")
        })
    }
}
