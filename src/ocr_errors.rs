//! # OCR Error Types Module
//!
//! Error taxonomy for the OCR cascade and extraction pipeline.
//!
//! Only [`OcrError::Validation`], [`OcrError::ImageLoad`] and [`OcrError::NoTextExtracted`]
//! ever leave [`crate::pipeline::MedicineAnalyzer::analyze`]. Everything else is produced by a
//! single backend or extraction pass and is recovered locally.

/// Custom error types for OCR operations
#[derive(Debug, Clone, PartialEq)]
pub enum OcrError {
    /// Input failed size/format validation
    Validation(String),
    /// Image bytes could not be decoded
    ImageLoad(String),
    /// Backend is not configured, not compiled in, or not installed
    BackendUnavailable { backend: String },
    /// Network, auth, quota or billing failure from one backend
    BackendCallFailed {
        backend: String,
        message: String,
        billing_disabled: bool,
    },
    /// Model output was not JSON even after brace recovery
    MalformedModelResponse(String),
    /// A single backend exceeded its time limit
    Timeout(String),
    /// Every backend was exhausted and no field came back from the model either
    NoTextExtracted,
}

impl OcrError {
    /// Whether the cascade should downgrade this error to "try the next backend".
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            OcrError::BackendUnavailable { .. }
                | OcrError::BackendCallFailed { .. }
                | OcrError::MalformedModelResponse(_)
                | OcrError::Timeout(_)
        )
    }

    pub fn is_billing_disabled(&self) -> bool {
        matches!(
            self,
            OcrError::BackendCallFailed {
                billing_disabled: true,
                ..
            }
        )
    }

    /// Shorthand for a failed call that is not billing related.
    pub fn call_failed(backend: &str, message: impl Into<String>) -> Self {
        OcrError::BackendCallFailed {
            backend: backend.to_string(),
            message: message.into(),
            billing_disabled: false,
        }
    }
}

impl std::fmt::Display for OcrError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrError::Validation(msg) => {
                write!(f, "[VALIDATION] Image validation failed: {}", msg)
            }
            OcrError::ImageLoad(msg) => {
                write!(f, "[IMAGE_LOAD] Failed to decode image: {}", msg)
            }
            OcrError::BackendUnavailable { backend } => {
                write!(f, "[OCR_BACKEND] Backend '{}' is not available", backend)
            }
            OcrError::BackendCallFailed {
                backend,
                message,
                billing_disabled,
            } => {
                if *billing_disabled {
                    write!(
                        f,
                        "[OCR_BILLING] Backend '{}' rejected the call, billing disabled: {}",
                        backend, message
                    )
                } else {
                    write!(f, "[OCR_BACKEND] Backend '{}' call failed: {}", backend, message)
                }
            }
            OcrError::MalformedModelResponse(msg) => {
                write!(f, "[MODEL_RESPONSE] Model output is not valid JSON: {}", msg)
            }
            OcrError::Timeout(msg) => write!(f, "[OCR_TIMEOUT] OCR processing timed out: {}", msg),
            OcrError::NoTextExtracted => write!(
                f,
                "[NO_TEXT] Could not extract text from this image. Please try with a clearer image"
            ),
        }
    }
}

impl std::error::Error for OcrError {}

impl From<anyhow::Error> for OcrError {
    fn from(err: anyhow::Error) -> Self {
        OcrError::call_failed("unknown", err.to_string())
    }
}

impl From<image::ImageError> for OcrError {
    fn from(err: image::ImageError) -> Self {
        OcrError::ImageLoad(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(OcrError::BackendUnavailable {
            backend: "tesseract".to_string()
        }
        .is_recoverable());
        assert!(OcrError::call_failed("gemini", "503").is_recoverable());
        assert!(OcrError::MalformedModelResponse("oops".to_string()).is_recoverable());
        assert!(OcrError::Timeout("60s".to_string()).is_recoverable());

        assert!(!OcrError::NoTextExtracted.is_recoverable());
        assert!(!OcrError::ImageLoad("truncated".to_string()).is_recoverable());
        assert!(!OcrError::Validation("empty".to_string()).is_recoverable());
    }

    #[test]
    fn test_billing_disabled_display() {
        let err = OcrError::BackendCallFailed {
            backend: "cloud_vision".to_string(),
            message: "BILLING_DISABLED".to_string(),
            billing_disabled: true,
        };
        assert!(err.is_billing_disabled());
        assert!(err.to_string().starts_with("[OCR_BILLING]"));
        assert!(!OcrError::call_failed("cloud_vision", "403").is_billing_disabled());
    }
}
