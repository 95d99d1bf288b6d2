//! Tracing and logging setup module.
//!
//! This module provides:
//! - Structured logging configuration
//! - Tracing span creation utilities

use anyhow::Result;
use tracing_subscriber::prelude::*;

use crate::observability_config::{LogFormat, ObservabilityConfig};

/// Initialize structured logging with tracing and configuration
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    // RUST_LOG still wins for anything it names
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("medscan={}", config.log_level.to_lowercase()).parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("hyper=warn".parse()?);

    match config.effective_format() {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_thread_names(false),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_thread_names(true),
                )
                .try_init()?;
        }
    }

    tracing::debug!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Create a span for OCR operations
pub fn ocr_span(operation: &str) -> tracing::Span {
    tracing::info_span!("ocr_operation", operation = operation, component = "ocr")
}

/// Create a span for field extraction passes
pub fn extraction_span(operation: &str) -> tracing::Span {
    tracing::info_span!(
        "extraction_operation",
        operation = operation,
        component = "extraction"
    )
}

/// Create a span covering one `analyze` call
pub fn pipeline_span(request_id: &str) -> tracing::Span {
    tracing::info_span!(
        "pipeline_operation",
        request_id = request_id,
        component = "pipeline"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_can_be_entered_without_subscriber() {
        let span = ocr_span("cascade");
        let _guard = span.enter();
        let inner = extraction_span("regex");
        let _inner_guard = inner.enter();
        let outer = pipeline_span("req-1");
        drop(outer);
    }
}
