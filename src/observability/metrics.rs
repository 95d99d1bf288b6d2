//! Metric recorders for the OCR cascade and extraction pipeline.
//!
//! All functions go through the `metrics` facade macros and are no-ops until a
//! recorder is installed by the host process.

use std::time::Duration;

/// Outcome label for one backend attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOutcome {
    Success,
    Empty,
    Failure,
    Unavailable,
    BillingDisabled,
}

impl BackendOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendOutcome::Success => "success",
            BackendOutcome::Empty => "empty",
            BackendOutcome::Failure => "failure",
            BackendOutcome::Unavailable => "unavailable",
            BackendOutcome::BillingDisabled => "billing_disabled",
        }
    }
}

/// Record one backend attempt inside the OCR cascade
pub fn record_backend_attempt(backend: &str, outcome: BackendOutcome, duration: Duration) {
    let backend = backend.to_string();
    metrics::counter!(
        "ocr_backend_attempts_total",
        "backend" => backend.clone(),
        "result" => outcome.as_str()
    )
    .increment(1);
    if outcome != BackendOutcome::Unavailable {
        metrics::histogram!("ocr_backend_duration_seconds", "backend" => backend)
            .record(duration.as_secs_f64());
    }
}

/// Record which pass filled a field
pub fn record_field_extraction(field: &'static str, source: &'static str) {
    metrics::counter!("field_extraction_total", "field" => field, "source" => source).increment(1);
}

/// Record which reconciliation rule fired
pub fn record_date_reconciliation(rule: &'static str) {
    metrics::counter!("date_reconciliation_total", "rule" => rule).increment(1);
}

/// Record the end of one analysis with its outcome and total duration
pub fn record_analysis_metrics(result: &'static str, duration: Duration, image_size: u64) {
    metrics::counter!("analysis_total", "result" => result).increment(1);
    metrics::histogram!("analysis_duration_seconds").record(duration.as_secs_f64());
    metrics::histogram!("analysis_image_size_bytes").record(image_size as f64);
}
