//! # Unified Application Configuration
//!
//! This module provides a centralized configuration system that consolidates
//! all settings into a single, structured configuration object. It supports
//! loading from environment variables, validation, and a redacted summary for logs.
//!
//! Absence of a credential is not an error: it disables the backend that needs it.

use crate::errors::{AppError, AppResult};
use crate::observability_config::ObservabilityConfig;
use crate::ocr_config::OcrConfig;
use std::env;

pub const DEFAULT_GEMINI_MODELS: &str = "gemini-2.0-flash,gemini-2.5-flash";

/// Vision-language model settings
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// API key; `None` disables the model entirely
    pub api_key: Option<String>,
    /// Model names tried in order when the previous one is not found
    pub models: Vec<String>,
    /// Per-request HTTP timeout in seconds
    pub http_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            models: parse_model_list(DEFAULT_GEMINI_MODELS),
            http_timeout_secs: 30,
        }
    }
}

impl ModelConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Validate model configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.models.is_empty() {
            return Err(AppError::Config(
                "At least one model name must be configured".to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(AppError::Config("HTTP timeout cannot be 0".to_string()));
        }
        if self.http_timeout_secs > 300 {
            return Err(AppError::Config(
                "HTTP timeout cannot be greater than 300 seconds".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cloud OCR service settings
#[derive(Debug, Clone)]
pub struct CloudOcrConfig {
    /// API key; `None` disables the service
    pub api_key: Option<String>,
    /// Per-request HTTP timeout in seconds
    pub http_timeout_secs: u64,
}

impl Default for CloudOcrConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            http_timeout_secs: 30,
        }
    }
}

impl CloudOcrConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.http_timeout_secs == 0 {
            return Err(AppError::Config("HTTP timeout cannot be 0".to_string()));
        }
        Ok(())
    }
}

/// Which extraction passes run inside `analyze`
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Run the model over the raw image before OCR
    pub model_direct_extraction: bool,
    /// Run the model over OCR text when key fields are still missing
    pub model_text_extraction: bool,
    /// Caller-side bound on one `analyze` call, in seconds
    pub analysis_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_direct_extraction: true,
            model_text_extraction: true,
            analysis_timeout_secs: 180,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.analysis_timeout_secs == 0 {
            return Err(AppError::Config(
                "analysis_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Local OCR engine and preprocessing
    pub ocr: OcrConfig,
    /// Vision-language model
    pub model: ModelConfig,
    /// Cloud OCR service
    pub cloud: CloudOcrConfig,
    /// Extraction pass switches
    pub pipeline: PipelineConfig,
    /// Logging configuration
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        // Local OCR engine
        config.ocr.tesseract_enabled = parse_bool_var("TESSERACT_ENABLED", true);
        config.ocr.languages = env::var("OCR_LANGUAGES")
            .unwrap_or_else(|_| crate::ocr_config::DEFAULT_LANGUAGES.to_string());
        config.ocr.tessdata_path = non_empty_var("TESSDATA_PATH");
        config.ocr.operation_timeout_secs = env::var("OCR_OPERATION_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .map_err(|_| {
                AppError::Config("OCR_OPERATION_TIMEOUT_SECS must be a valid number".to_string())
            })?;

        // Shared HTTP timeout
        let http_timeout_secs: u64 = env::var("HTTP_CLIENT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| {
                AppError::Config("HTTP_CLIENT_TIMEOUT_SECS must be a valid number".to_string())
            })?;

        // Vision-language model
        config.model.api_key = non_empty_var("GEMINI_API_KEY");
        config.model.models = parse_model_list(
            &env::var("GEMINI_MODELS").unwrap_or_else(|_| DEFAULT_GEMINI_MODELS.to_string()),
        );
        config.model.http_timeout_secs = http_timeout_secs;

        // Cloud OCR
        config.cloud.api_key = non_empty_var("GOOGLE_VISION_API_KEY");
        config.cloud.http_timeout_secs = http_timeout_secs;

        // Pipeline passes
        config.pipeline.model_direct_extraction = parse_bool_var("MODEL_DIRECT_EXTRACTION", true);
        config.pipeline.model_text_extraction = parse_bool_var("MODEL_TEXT_EXTRACTION", true);
        config.pipeline.analysis_timeout_secs = env::var("ANALYSIS_TIMEOUT_SECS")
            .unwrap_or_else(|_| "180".to_string())
            .parse()
            .map_err(|_| {
                AppError::Config("ANALYSIS_TIMEOUT_SECS must be a valid number".to_string())
            })?;

        config.observability = ObservabilityConfig::from_env();

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.ocr.validate()?;
        self.model.validate()?;
        self.cloud.validate()?;
        self.pipeline.validate()?;
        self.observability.validate().map_err(AppError::Config)?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: tesseract_enabled={}, ocr_languages={}, gemini_api_key={}, gemini_models={}, vision_api_key={}, model_direct={}, model_text={}, environment={}",
            self.ocr.tesseract_enabled,
            self.ocr.languages,
            redact(&self.model.api_key),
            self.model.models.join(","),
            redact(&self.cloud.api_key),
            self.pipeline.model_direct_extraction,
            self.pipeline.model_text_extraction,
            self.observability.environment
        )
    }
}

fn redact(secret: &Option<String>) -> &'static str {
    if secret.is_some() {
        "[REDACTED]"
    } else {
        "[UNSET]"
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool_var(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Split a comma-separated model list, dropping blanks
pub fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.model.is_configured());
        assert!(!config.cloud.is_configured());
    }

    #[test]
    fn test_model_config_validation() {
        let mut config = ModelConfig::default();
        assert_eq!(config.models, vec!["gemini-2.0-flash", "gemini-2.5-flash"]);

        config.models.clear();
        assert!(config.validate().is_err());
        config.models = vec!["gemini-2.0-flash".to_string()];

        config.http_timeout_secs = 0;
        assert!(config.validate().is_err());
        config.http_timeout_secs = 301;
        assert!(config.validate().is_err());
        config.http_timeout_secs = 30;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_config_validation() {
        let mut config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        config.analysis_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_model_list() {
        assert_eq!(
            parse_model_list(" a , ,b,"),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(parse_model_list("").is_empty());
    }

    #[test]
    fn test_summary_redacts_keys() {
        let mut config = AppConfig::default();
        config.model.api_key = Some("super-secret-key".to_string());
        let summary = config.summary();
        assert!(!summary.contains("super-secret-key"));
        assert!(summary.contains("gemini_api_key=[REDACTED]"));
        assert!(summary.contains("vision_api_key=[UNSET]"));
    }
}
