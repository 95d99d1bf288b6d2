//! Google Cloud Vision `images:annotate` backend, last resort in the cascade.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{BackendFuture, BackendKind, OcrBackend};
use crate::config::CloudOcrConfig;
use crate::ocr_errors::OcrError;

const ANNOTATE_URL: &str = "https://vision.googleapis.com/v1/images:annotate";
const BACKEND: &str = "cloud_vision";

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
    error: Option<StatusBody>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default, rename = "textAnnotations")]
    text_annotations: Vec<TextAnnotation>,
    error: Option<StatusBody>,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    message: Option<String>,
    status: Option<String>,
}

impl StatusBody {
    fn describe(&self) -> String {
        match (&self.message, &self.status) {
            (Some(message), Some(status)) => format!("{} ({})", message, status),
            (Some(message), None) => message.clone(),
            (None, Some(status)) => status.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

/// Whether an error body means the project has no billing account attached
pub fn is_billing_disabled(message: &str) -> bool {
    message.contains("BILLING_DISABLED") || message.to_lowercase().contains("requires billing")
}

fn call_failed(message: String) -> OcrError {
    OcrError::BackendCallFailed {
        backend: BACKEND.to_string(),
        billing_disabled: is_billing_disabled(&message),
        message,
    }
}

pub struct CloudVisionBackend {
    api_key: Option<String>,
    http_timeout: Duration,
}

impl CloudVisionBackend {
    pub fn new(config: &CloudOcrConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            http_timeout: Duration::from_secs(config.http_timeout_secs),
        }
    }

    async fn annotate(&self, image: &[u8]) -> Result<Option<String>, OcrError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(OcrError::BackendUnavailable {
                backend: BACKEND.to_string(),
            });
        };
        let body = json!({
            "requests": [{
                "image": {"content": BASE64.encode(image)},
                "features": [{"type": "TEXT_DETECTION"}]
            }]
        });

        let client = reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|e| call_failed(e.to_string()))?;
        let response = client
            .post(ANNOTATE_URL)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| call_failed(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(call_failed(format!("Vision API error ({}): {}", status, text)));
        }
        debug!(bytes = text.len(), "Cloud Vision responded");
        first_annotation(&text)
    }
}

/// Full-text annotation of the first image, or the error embedded in a 200 reply
fn first_annotation(body: &str) -> Result<Option<String>, OcrError> {
    let payload: AnnotateResponse = serde_json::from_str(body)
        .map_err(|e| call_failed(format!("invalid response JSON: {}", e)))?;
    if let Some(error) = payload.error {
        return Err(call_failed(error.describe()));
    }
    let Some(first) = payload.responses.into_iter().next() else {
        return Ok(None);
    };
    if let Some(error) = first.error {
        return Err(call_failed(error.describe()));
    }
    Ok(first
        .text_annotations
        .into_iter()
        .next()
        .and_then(|annotation| annotation.description)
        .filter(|text| !text.trim().is_empty()))
}

impl OcrBackend for CloudVisionBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::CloudVision
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn extract_text<'a>(&'a self, image: &'a [u8]) -> BackendFuture<'a> {
        Box::pin(self.annotate(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billing_detection() {
        assert!(is_billing_disabled(
            "This API method requires billing to be enabled."
        ));
        assert!(is_billing_disabled("status: BILLING_DISABLED"));
        assert!(!is_billing_disabled("API key not valid"));
    }

    #[test]
    fn test_first_annotation() {
        let body = r#"{"responses": [{"textAnnotations": [{"description": "Dolo-650\nMRP 35.70"}, {"description": "Dolo-650"}]}]}"#;
        assert_eq!(
            first_annotation(body).expect("valid body").as_deref(),
            Some("Dolo-650\nMRP 35.70")
        );
        assert_eq!(first_annotation(r#"{"responses": [{}]}"#).expect("valid body"), None);
    }

    #[test]
    fn test_embedded_billing_error() {
        let body = r#"{"responses": [{"error": {"message": "This API method requires billing to be enabled", "status": "PERMISSION_DENIED"}}]}"#;
        let err = first_annotation(body).expect_err("embedded error");
        assert!(err.is_billing_disabled());
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let backend = CloudVisionBackend::new(&CloudOcrConfig::default());
        assert!(!backend.is_available());
        assert!(matches!(
            backend.extract_text(b"img").await,
            Err(OcrError::BackendUnavailable { .. })
        ));
    }
}
