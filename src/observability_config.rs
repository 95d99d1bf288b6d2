//! # Observability Configuration
//!
//! Environment-specific settings for logging output.

use std::env;

/// How log lines are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output
    Pretty,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    /// Parse `LOG_FORMAT`. Returns `None` for "auto" or anything unknown.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Observability configuration for different environments
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Environment name (development, staging, production)
    pub environment: String,
    /// Log level for the crate's own targets
    pub log_level: String,
    /// Explicit format; when `None` the environment decides
    pub log_format: Option<LogFormat>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_format: None,
        }
    }
}

impl ObservabilityConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: env::var("LOG_FORMAT")
                .ok()
                .and_then(|value| LogFormat::parse(&value)),
        }
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Check if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Format actually used: explicit setting, else pretty in development and JSON elsewhere
    pub fn effective_format(&self) -> LogFormat {
        self.log_format.unwrap_or(if self.is_development() {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!("Invalid log level: {}", self.log_level));
        }
        if self.environment.trim().is_empty() {
            return Err("Environment name cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Environment-specific configuration presets
pub mod presets {
    use super::{LogFormat, ObservabilityConfig};

    /// Development configuration with verbose pretty logs
    pub fn development() -> ObservabilityConfig {
        ObservabilityConfig {
            environment: "development".to_string(),
            log_level: "debug".to_string(),
            log_format: Some(LogFormat::Pretty),
        }
    }

    /// Production configuration with JSON logs
    pub fn production() -> ObservabilityConfig {
        ObservabilityConfig {
            environment: "production".to_string(),
            log_level: "warn".to_string(),
            log_format: Some(LogFormat::Json),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.environment, "development");
        assert_eq!(config.log_level, "info");
        assert!(config.log_format.is_none());
        assert_eq!(config.effective_format(), LogFormat::Pretty);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ObservabilityConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        config.log_level = "WARN".to_string();
        assert!(config.validate().is_ok());

        config.environment = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" Pretty "), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("auto"), None);
    }

    #[test]
    fn test_environment_detection() {
        let dev = presets::development();
        assert!(dev.is_development());
        assert!(!dev.is_production());

        let prod = presets::production();
        assert!(prod.is_production());
        assert_eq!(prod.effective_format(), LogFormat::Json);

        let staging = ObservabilityConfig {
            environment: "staging".to_string(),
            ..Default::default()
        };
        assert_eq!(staging.effective_format(), LogFormat::Json);
    }
}
