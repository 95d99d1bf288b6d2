//! # Application Error Types
//!
//! This module defines the application-level error type used by configuration loading,
//! the CLI driver and anything that wraps the analysis pipeline.

use std::fmt;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Validation errors (input files, CLI arguments)
    Validation(String),
    /// OCR and extraction pipeline errors
    Ocr(String),
    /// File system errors
    FileSystem(String),
    /// Network/communication errors
    Network(String),
    /// Internal application errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Validation(msg) => write!(f, "[VALIDATION] {}", msg),
            AppError::Ocr(msg) => write!(f, "[OCR] {}", msg),
            AppError::FileSystem(msg) => write!(f, "[FILESYSTEM] {}", msg),
            AppError::Network(msg) => write!(f, "[NETWORK] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::FileSystem(err.to_string())
    }
}

impl From<crate::ocr_errors::OcrError> for AppError {
    fn from(err: crate::ocr_errors::OcrError) -> Self {
        AppError::Ocr(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the crate
pub mod error_logging {
    use tracing::{error, warn};

    /// Log an analysis failure with image and timing context
    pub fn log_ocr_error(
        error: &impl std::fmt::Display,
        operation: &str,
        image_size: Option<u64>,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            image_size_bytes = ?image_size,
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "OCR processing failed"
        );
    }

    /// Log a failed backend call inside the cascade.
    ///
    /// These are downgraded to "try the next backend", so they log at warn level.
    /// Billing problems get their own message so they stand out in dashboards.
    pub fn log_backend_error(
        error: &impl std::fmt::Display,
        backend: &str,
        billing_disabled: bool,
        duration: Option<std::time::Duration>,
    ) {
        if billing_disabled {
            warn!(
                error = %error,
                backend = %backend,
                duration_ms = ?duration.map(|d| d.as_millis()),
                "Backend billing is disabled for this project, skipping"
            );
        } else {
            warn!(
                error = %error,
                backend = %backend,
                duration_ms = ?duration.map(|d| d.as_millis()),
                "Backend call failed, trying next backend"
            );
        }
    }

    /// Log network/communication errors with endpoint context
    pub fn log_network_error(
        error: &impl std::fmt::Display,
        operation: &str,
        endpoint: Option<&str>,
        status: Option<u16>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            endpoint = ?endpoint,
            status = ?status,
            "Network operation failed"
        );
    }

    /// Log file system errors with path and operation context
    pub fn log_filesystem_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&str>,
        file_size: Option<u64>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            file_size_bytes = ?file_size,
            "File system operation failed"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(error: &impl std::fmt::Display, config_key: &str, operation: &str) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr_errors::OcrError;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            AppError::Config("missing key".to_string()).to_string(),
            "[CONFIG] missing key"
        );
        assert_eq!(
            AppError::Validation("bad path".to_string()).to_string(),
            "[VALIDATION] bad path"
        );
        assert!(AppError::Network("down".to_string())
            .to_string()
            .starts_with("[NETWORK]"));
    }

    #[test]
    fn test_from_ocr_error() {
        let err: AppError = OcrError::NoTextExtracted.into();
        match err {
            AppError::Ocr(msg) => assert!(msg.contains("NO_TEXT")),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_from_anyhow() {
        let err: AppError = anyhow::anyhow!("boom").into();
        assert_eq!(err, AppError::Internal("boom".to_string()));
    }
}
