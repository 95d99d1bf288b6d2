//! Observability module for centralized metrics and logging setup.
//!
//! This module provides:
//! - Structured logging with configurable levels and formats
//! - Tracing spans for the OCR, extraction and pipeline stages
//! - Metric recorders over the `metrics` facade
//!
//! No metrics exporter is installed here. A host process that wants Prometheus or
//! similar installs its own recorder; without one the recorders are no-ops.

pub mod metrics;
pub mod tracing_mod;

use anyhow::Result;

use crate::observability_config::ObservabilityConfig;

pub use metrics::{
    record_analysis_metrics, record_backend_attempt, record_date_reconciliation,
    record_field_extraction, BackendOutcome,
};
pub use tracing_mod::{extraction_span, init_tracing_with_config, ocr_span, pipeline_span};

/// Initialize logging with custom configuration
pub fn init_observability_with_config(config: &ObservabilityConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    init_tracing_with_config(config)?;

    tracing::info!(
        environment = %config.environment,
        log_format = ?config.effective_format(),
        "Observability initialized"
    );
    Ok(())
}
