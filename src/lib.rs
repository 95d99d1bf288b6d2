//! # medscan
//!
//! Reads medicine packaging photos and extracts brand, dosage, batch number,
//! manufacture and expiry dates, manufacturer and price.
//!
//! The entry point is [`pipeline::MedicineAnalyzer`]: build it from an
//! [`config::AppConfig`], then call `analyze` with the raw image bytes.

pub mod config;
pub mod dates;
pub mod errors;
pub mod extraction;
pub mod observability;
pub mod observability_config;
pub mod ocr;
pub mod ocr_config;
pub mod ocr_errors;
pub mod pipeline;
pub mod post_processing;
pub mod preprocessing;

// Re-export types for easier access
pub use dates::CalendarMonth;
pub use extraction::{FieldKind, FieldModel, FieldSet, FieldSource, ModelFields};
pub use ocr::{OcrBackend, OcrOrchestrator};
pub use ocr_errors::OcrError;
pub use pipeline::{ExtractedRecord, FieldSources, MedicineAnalyzer, PipelineSettings};
