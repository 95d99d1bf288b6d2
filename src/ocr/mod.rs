//! # OCR Backends and Cascade
//!
//! Three text-extraction strategies sit behind one [`OcrBackend`] capability:
//!
//! - [`TesseractBackend`]: the local engine, run over several preprocessed variants
//! - [`GeminiClient`]: a vision-language model asked to transcribe the label
//! - [`CloudVisionBackend`]: a cloud OCR service
//!
//! [`OcrOrchestrator`] walks them in a fixed priority order and returns the first
//! non-blank text. A failing backend never aborts the cascade; only exhausting every
//! backend yields `None`.

pub mod gemini;
pub mod tesseract;
pub mod vision;

pub use gemini::GeminiClient;
pub use tesseract::{merge_unique_lines, TesseractBackend};
pub use vision::{is_billing_disabled, CloudVisionBackend};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageFormat};
use tracing::{debug, info, warn, Instrument};

use crate::config::AppConfig;
use crate::errors::error_logging;
use crate::observability::{self, BackendOutcome};
use crate::ocr_config::OcrConfig;
use crate::ocr_errors::OcrError;

/// Identifies a backend in logs and metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Tesseract,
    Gemini,
    CloudVision,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Tesseract => "tesseract",
            BackendKind::Gemini => "gemini",
            BackendKind::CloudVision => "cloud_vision",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type BackendFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Option<String>, OcrError>> + Send + 'a>>;

/// Image bytes in, text out.
///
/// `Ok(None)` means the backend ran and found nothing. Errors are reported so the
/// cascade can log them, then it moves on.
pub trait OcrBackend: Send + Sync {
    fn kind(&self) -> BackendKind;
    fn is_available(&self) -> bool;
    fn extract_text<'a>(&'a self, image: &'a [u8]) -> BackendFuture<'a>;
}

/// Which backends may run, resolved once from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendAvailability {
    /// Tesseract compiled in and enabled
    pub local: bool,
    /// Gemini API key present
    pub vision_model: bool,
    /// Cloud Vision API key present
    pub cloud: bool,
}

impl BackendAvailability {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            local: config.ocr.tesseract_enabled && cfg!(feature = "tesseract"),
            vision_model: config.model.is_configured(),
            cloud: config.cloud.is_configured(),
        }
    }

    pub fn any(&self) -> bool {
        self.local || self.vision_model || self.cloud
    }
}

/// Check size and format limits, then decode.
///
/// These are the only input errors the pipeline reports; everything past this point
/// degrades to `None`.
pub fn validate_image_bytes(bytes: &[u8], config: &OcrConfig) -> Result<DynamicImage, OcrError> {
    let size = bytes.len() as u64;
    if size == 0 {
        return Err(OcrError::Validation("image is empty".to_string()));
    }

    let limits = &config.format_limits;
    if size > limits.min_quick_reject {
        info!(
            size_bytes = size,
            threshold = limits.min_quick_reject,
            "Quick rejecting oversized image"
        );
        return Err(OcrError::Validation(format!(
            "image too large: {} bytes exceeds quick reject threshold of {} bytes",
            size, limits.min_quick_reject
        )));
    }

    let format = image::guess_format(bytes)
        .map_err(|e| OcrError::ImageLoad(format!("unrecognised image format: {}", e)))?;
    let max_size = match format {
        ImageFormat::Png => limits.png_max,
        ImageFormat::Jpeg => limits.jpeg_max,
        ImageFormat::Bmp => limits.bmp_max,
        ImageFormat::Tiff => limits.tiff_max,
        ImageFormat::WebP => limits.webp_max,
        _ => config.max_file_size,
    };
    if size > max_size {
        return Err(OcrError::Validation(format!(
            "{:?} image too large: {} bytes, maximum allowed {} bytes",
            format, size, max_size
        )));
    }

    let image = image::load_from_memory(bytes)?;
    debug!(
        format = ?format,
        width = image.width(),
        height = image.height(),
        size_bytes = size,
        "Image validated"
    );
    Ok(image)
}

/// Fixed-priority fallback chain over OCR backends
pub struct OcrOrchestrator {
    backends: Vec<Arc<dyn OcrBackend>>,
    backend_timeout: Duration,
}

impl OcrOrchestrator {
    pub fn new(backends: Vec<Arc<dyn OcrBackend>>) -> Self {
        Self {
            backends,
            backend_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    /// Local engine, model, cloud OCR, then the model once more.
    pub fn from_config(config: &AppConfig, gemini: Arc<GeminiClient>) -> Self {
        let local: Arc<dyn OcrBackend> = Arc::new(TesseractBackend::new(&config.ocr));
        let cloud: Arc<dyn OcrBackend> = Arc::new(CloudVisionBackend::new(&config.cloud));
        let model: Arc<dyn OcrBackend> = gemini;
        Self::new(vec![local, model.clone(), cloud, model])
            .with_backend_timeout(Duration::from_secs(config.ocr.operation_timeout_secs))
    }

    pub fn backends(&self) -> &[Arc<dyn OcrBackend>] {
        &self.backends
    }

    /// First non-blank text from the cascade, or `None` once every backend is exhausted.
    pub async fn extract_text(&self, image: &[u8]) -> Option<String> {
        self.run_cascade(image)
            .instrument(observability::ocr_span("cascade"))
            .await
    }

    async fn run_cascade(&self, image: &[u8]) -> Option<String> {
        for (position, backend) in self.backends.iter().enumerate() {
            let kind = backend.kind();
            if !backend.is_available() {
                debug!(backend = %kind, position, "Backend unavailable, skipping");
                observability::record_backend_attempt(
                    kind.as_str(),
                    BackendOutcome::Unavailable,
                    Duration::ZERO,
                );
                continue;
            }

            let start = Instant::now();
            let result =
                match tokio::time::timeout(self.backend_timeout, backend.extract_text(image)).await {
                    Ok(result) => result,
                    Err(_) => Err(OcrError::Timeout(format!(
                        "{} exceeded {}s",
                        kind,
                        self.backend_timeout.as_secs()
                    ))),
                };
            let elapsed = start.elapsed();

            match result {
                Ok(Some(text)) if !text.trim().is_empty() => {
                    info!(
                        backend = %kind,
                        position,
                        chars = text.len(),
                        duration_ms = elapsed.as_millis(),
                        "OCR backend produced text"
                    );
                    observability::record_backend_attempt(
                        kind.as_str(),
                        BackendOutcome::Success,
                        elapsed,
                    );
                    return Some(text);
                }
                Ok(_) => {
                    info!(backend = %kind, position, "OCR backend returned no text");
                    observability::record_backend_attempt(
                        kind.as_str(),
                        BackendOutcome::Empty,
                        elapsed,
                    );
                }
                Err(OcrError::BackendUnavailable { .. }) => {
                    debug!(backend = %kind, position, "Backend reported itself unavailable");
                    observability::record_backend_attempt(
                        kind.as_str(),
                        BackendOutcome::Unavailable,
                        elapsed,
                    );
                }
                Err(err) => {
                    let billing = err.is_billing_disabled();
                    error_logging::log_backend_error(&err, kind.as_str(), billing, Some(elapsed));
                    let outcome = if billing {
                        BackendOutcome::BillingDisabled
                    } else {
                        BackendOutcome::Failure
                    };
                    observability::record_backend_attempt(kind.as_str(), outcome, elapsed);
                }
            }
        }

        warn!(
            backends = self.backends.len(),
            "All OCR backends exhausted without text"
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::new_luma8(width, height);
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode png");
        buf
    }

    #[test]
    fn test_validate_rejects_empty_and_garbage() {
        let config = OcrConfig::default();
        assert!(matches!(
            validate_image_bytes(&[], &config),
            Err(OcrError::Validation(_))
        ));
        assert!(matches!(
            validate_image_bytes(b"definitely not an image", &config),
            Err(OcrError::ImageLoad(_))
        ));
    }

    #[test]
    fn test_validate_applies_format_limit() {
        let bytes = png_bytes(16, 16);
        let mut config = OcrConfig::default();
        assert!(validate_image_bytes(&bytes, &config).is_ok());

        config.format_limits.png_max = 10;
        assert!(matches!(
            validate_image_bytes(&bytes, &config),
            Err(OcrError::Validation(_))
        ));
    }

    #[test]
    fn test_availability_from_default_config() {
        let availability = BackendAvailability::from_config(&AppConfig::default());
        assert!(!availability.vision_model);
        assert!(!availability.cloud);
        assert_eq!(availability.local, cfg!(feature = "tesseract"));
    }

    #[test]
    fn test_backend_kind_labels() {
        assert_eq!(BackendKind::CloudVision.as_str(), "cloud_vision");
        assert_eq!(BackendKind::Gemini.to_string(), "gemini");
    }
}
