//! # Pipeline Controller
//!
//! [`MedicineAnalyzer::analyze`] turns one photo of a medicine pack into an
//! [`ExtractedRecord`]. The passes run strictly in order:
//!
//! 1. validate and decode the input
//! 2. ask the model for fields straight from the image
//! 3. OCR cascade, then the regex tables over the text
//! 4. ask the model again over the text when key fields are still missing
//! 5. brand/manufacturer corrections and the loose batch patterns
//! 6. MRP, then dates: parse, labeled fallback, reconcile, finalize
//!
//! An earlier pass always wins; later passes only fill what is still empty.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn, Instrument};

use crate::config::AppConfig;
use crate::dates::reconcile::{finalize_dates, reconcile, ReconciliationRule};
use crate::dates::{CalendarMonth, DateParser, EXPIRY_LABELS, MANUFACTURE_LABELS};
use crate::errors::{error_logging, AppResult};
use crate::extraction::{
    extract_with_regex, normalize_value, normalize_vertical, parse_mrp, FieldKind, FieldModel,
    FieldSet, FieldSource,
};
use crate::observability;
use crate::ocr::{validate_image_bytes, BackendAvailability, GeminiClient, OcrOrchestrator};
use crate::ocr_config::OcrConfig;
use crate::ocr_errors::OcrError;
use crate::post_processing::{fallback_batch, post_process};

/// Which pass produced each field of a record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSources {
    pub brand: Option<FieldSource>,
    pub generic_name: Option<FieldSource>,
    pub dosage: Option<FieldSource>,
    pub batch_number: Option<FieldSource>,
    pub manufacture_date: Option<FieldSource>,
    pub expiry_date: Option<FieldSource>,
    pub manufacturer: Option<FieldSource>,
    pub mrp: Option<FieldSource>,
}

impl FieldSources {
    pub fn get(&self, kind: FieldKind) -> Option<FieldSource> {
        match kind {
            FieldKind::Brand => self.brand,
            FieldKind::GenericName => self.generic_name,
            FieldKind::Dosage => self.dosage,
            FieldKind::BatchNumber => self.batch_number,
            FieldKind::ManufactureDate => self.manufacture_date,
            FieldKind::ExpiryDate => self.expiry_date,
            FieldKind::Manufacturer => self.manufacturer,
            FieldKind::Mrp => self.mrp,
        }
    }

    pub fn set(&mut self, kind: FieldKind, source: FieldSource) {
        let slot = match kind {
            FieldKind::Brand => &mut self.brand,
            FieldKind::GenericName => &mut self.generic_name,
            FieldKind::Dosage => &mut self.dosage,
            FieldKind::BatchNumber => &mut self.batch_number,
            FieldKind::ManufactureDate => &mut self.manufacture_date,
            FieldKind::ExpiryDate => &mut self.expiry_date,
            FieldKind::Manufacturer => &mut self.manufacturer,
            FieldKind::Mrp => &mut self.mrp,
        };
        *slot = Some(source);
    }

    fn record(&mut self, kinds: &[FieldKind], source: FieldSource) {
        for kind in kinds {
            self.set(*kind, source);
            observability::record_field_extraction(kind.as_str(), source.as_str());
        }
    }
}

/// Structured result of one analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecord {
    pub brand: Option<String>,
    pub generic_name: Option<String>,
    pub dosage: Option<String>,
    pub batch_number: Option<String>,
    pub manufacture_date: Option<CalendarMonth>,
    pub expiry_date: Option<CalendarMonth>,
    pub manufacturer: Option<String>,
    /// Zero when no price could be read
    pub mrp: f64,
    /// Full OCR text, empty when only the model pass produced fields
    pub raw_text: String,
    pub sources: FieldSources,
    /// Reconciliation rule that settled the dates, absent without OCR text
    pub date_rule: Option<ReconciliationRule>,
}

/// Switches and limits fixed when the analyzer is built
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub model_direct_extraction: bool,
    pub model_text_extraction: bool,
    pub ocr: OcrConfig,
    /// Pins "today" for date defaults; the current month when `None`
    pub today: Option<CalendarMonth>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            model_direct_extraction: true,
            model_text_extraction: true,
            ocr: OcrConfig::default(),
            today: None,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model_direct_extraction: config.pipeline.model_direct_extraction,
            model_text_extraction: config.pipeline.model_text_extraction,
            ocr: config.ocr.clone(),
            today: None,
        }
    }

    pub fn with_today(mut self, today: CalendarMonth) -> Self {
        self.today = Some(today);
        self
    }
}

/// End-to-end analyzer over an OCR cascade and an optional field model.
///
/// Holds no mutable state; one instance can serve concurrent calls.
pub struct MedicineAnalyzer {
    orchestrator: OcrOrchestrator,
    model: Option<Arc<dyn FieldModel>>,
    settings: PipelineSettings,
}

impl MedicineAnalyzer {
    pub fn new(
        orchestrator: OcrOrchestrator,
        model: Option<Arc<dyn FieldModel>>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            orchestrator,
            model,
            settings,
        }
    }

    /// Build every backend from configuration. The Gemini client serves both as an
    /// OCR backend and as the field model.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let gemini = Arc::new(GeminiClient::from_config(&config.model)?);
        let orchestrator = OcrOrchestrator::from_config(config, gemini.clone());
        let model: Arc<dyn FieldModel> = gemini;

        let availability = BackendAvailability::from_config(config);
        if !availability.any() {
            warn!("No OCR backend is available; only input validation will run");
        }
        info!(
            backends = orchestrator.backends().len(),
            local = availability.local,
            vision_model = availability.vision_model,
            cloud = availability.cloud,
            "Medicine analyzer ready"
        );
        Ok(Self::new(
            orchestrator,
            Some(model),
            PipelineSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Analyze one image.
    ///
    /// Fails only on invalid input or when neither OCR text nor a brand came back.
    pub async fn analyze(&self, image: &[u8]) -> Result<ExtractedRecord, OcrError> {
        let request_id = format!(
            "{:x}",
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        let start = Instant::now();
        let image_size = image.len() as u64;

        let result = self
            .run(image)
            .instrument(observability::pipeline_span(&request_id))
            .await;
        let elapsed = start.elapsed();

        match &result {
            Ok(record) => {
                info!(
                    request_id = %request_id,
                    brand = ?record.brand,
                    duration_ms = elapsed.as_millis(),
                    "Analysis completed"
                );
                observability::record_analysis_metrics("success", elapsed, image_size);
            }
            Err(OcrError::NoTextExtracted) => {
                warn!(request_id = %request_id, "No text or brand extracted from image");
                observability::record_analysis_metrics("no_text", elapsed, image_size);
            }
            Err(err) => {
                error_logging::log_ocr_error(err, "analyze", Some(image_size), Some(elapsed));
                observability::record_analysis_metrics("invalid_input", elapsed, image_size);
            }
        }
        result
    }

    async fn run(&self, image: &[u8]) -> Result<ExtractedRecord, OcrError> {
        validate_image_bytes(image, &self.settings.ocr)?;

        let mut fields = FieldSet::default();
        let mut sources = FieldSources::default();
        let model = self.available_model();

        if self.settings.model_direct_extraction {
            if let Some(model) = model {
                if let Some(found) = model.extract_from_image(image).await {
                    let filled = fields.fill_missing(&found.into_field_set().normalized());
                    debug!(filled = filled.len(), "Model image pass finished");
                    sources.record(&filled, FieldSource::ModelImage);
                }
            }
        }

        let text = self
            .orchestrator
            .extract_text(image)
            .await
            .map(|text| normalize_vertical(&text))
            .filter(|text| !text.trim().is_empty());

        if let Some(text) = &text {
            let filled = fields.fill_missing(&extract_with_regex(text));
            sources.record(&filled, FieldSource::Regex);

            if fields.missing_key_fields() && self.settings.model_text_extraction {
                if let Some(model) = model {
                    if let Some(found) = model.extract_from_text(text).await {
                        let filled = fields.fill_missing(&found.into_field_set().normalized());
                        debug!(filled = filled.len(), "Model text pass finished");
                        sources.record(&filled, FieldSource::ModelText);
                    }
                }
            }
        }

        if text.is_none() && fields.brand.is_none() {
            return Err(OcrError::NoTextExtracted);
        }
        let raw_text = text.unwrap_or_default();

        let (mut fields, corrected) = post_process(fields, &raw_text);
        sources.record(&corrected, FieldSource::Correction);

        if fields.batch_number.is_none() {
            let batch = fallback_batch(&raw_text)
                .and_then(|raw| normalize_value(FieldKind::BatchNumber, &raw));
            if batch.is_some() {
                fields.batch_number = batch;
                sources.record(&[FieldKind::BatchNumber], FieldSource::Fallback);
            }
        }

        let mrp = fields.mrp.as_deref().and_then(parse_mrp).unwrap_or(0.0);
        if fields.mrp.is_some() && mrp == 0.0 {
            debug!(raw = ?fields.mrp, "MRP not parseable, defaulting to 0.0");
        }

        let today = self.settings.today.unwrap_or_else(CalendarMonth::current);
        let (manufacture, expiry, date_rule) =
            resolve_dates(&fields, &raw_text, today, &mut sources);

        Ok(ExtractedRecord {
            brand: fields.brand,
            generic_name: fields.generic_name,
            dosage: fields.dosage,
            batch_number: fields.batch_number,
            manufacture_date: Some(manufacture),
            expiry_date: Some(expiry),
            manufacturer: fields.manufacturer,
            mrp,
            raw_text,
            sources,
            date_rule,
        })
    }

    fn available_model(&self) -> Option<&dyn FieldModel> {
        self.model
            .as_deref()
            .filter(|model| model.is_available())
    }
}

struct ParsedDate {
    month: Option<CalendarMonth>,
    /// Found by the label scan rather than parsed from the field value
    labeled: bool,
}

fn parse_or_labeled(
    parser: &DateParser,
    raw: Option<&str>,
    text: &str,
    labels: &[&str],
) -> ParsedDate {
    if let Some(month) = raw.and_then(|raw| parser.parse_model_date(raw)) {
        return ParsedDate {
            month: Some(month),
            labeled: false,
        };
    }
    let month = parser.find_labeled_date(text, labels);
    ParsedDate {
        month,
        labeled: month.is_some(),
    }
}

/// Parse, fall back to labeled dates in the text, reconcile, then finalize.
fn resolve_dates(
    fields: &FieldSet,
    text: &str,
    today: CalendarMonth,
    sources: &mut FieldSources,
) -> (CalendarMonth, CalendarMonth, Option<ReconciliationRule>) {
    let _span = observability::extraction_span("dates").entered();
    let parser = DateParser::with_current_year(today.year());

    let manufacture = parse_or_labeled(
        &parser,
        fields.manufacture_date.as_deref(),
        text,
        MANUFACTURE_LABELS,
    );
    if manufacture.labeled {
        sources.record(&[FieldKind::ManufactureDate], FieldSource::Fallback);
    }
    let expiry = parse_or_labeled(&parser, fields.expiry_date.as_deref(), text, EXPIRY_LABELS);
    if expiry.labeled {
        sources.record(&[FieldKind::ExpiryDate], FieldSource::Fallback);
    }
    let (mut manufacture, mut expiry) = (manufacture.month, expiry.month);

    let mut rule = None;
    if !text.is_empty() {
        let reconciled = reconcile(text, manufacture, expiry, today);
        if Some(reconciled.manufacture) != manufacture {
            sources.record(&[FieldKind::ManufactureDate], FieldSource::Fallback);
        }
        if Some(reconciled.expiry) != expiry {
            sources.record(&[FieldKind::ExpiryDate], FieldSource::Fallback);
        }
        manufacture = Some(reconciled.manufacture);
        expiry = Some(reconciled.expiry);
        rule = Some(reconciled.rule);
    }

    if manufacture.is_none() {
        sources.set(FieldKind::ManufactureDate, FieldSource::Fallback);
    }
    if expiry.is_none() {
        sources.set(FieldKind::ExpiryDate, FieldSource::Fallback);
    }
    let (manufacture, expiry) = finalize_dates(manufacture, expiry, today);
    (manufacture, expiry, rule)
}

/// Caller-side bound on one analysis
pub async fn analyze_with_timeout(
    analyzer: &MedicineAnalyzer,
    image: &[u8],
    timeout: Duration,
) -> Result<ExtractedRecord, OcrError> {
    match tokio::time::timeout(timeout, analyzer.analyze(image)).await {
        Ok(result) => result,
        Err(_) => Err(OcrError::Timeout(format!(
            "analysis exceeded {}s",
            timeout.as_secs()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cm(year: i32, month: u32) -> CalendarMonth {
        CalendarMonth::new(year, month).expect("valid month")
    }

    #[test]
    fn test_sources_set_and_get() {
        let mut sources = FieldSources::default();
        sources.set(FieldKind::Brand, FieldSource::Regex);
        sources.set(FieldKind::Brand, FieldSource::Correction);
        assert_eq!(sources.get(FieldKind::Brand), Some(FieldSource::Correction));
        assert_eq!(sources.get(FieldKind::Mrp), None);
    }

    #[test]
    fn test_resolve_dates_with_parsed_pair() {
        let fields = FieldSet {
            manufacture_date: Some("01/2024".to_string()),
            expiry_date: Some("JAN.26".to_string()),
            ..Default::default()
        };
        let mut sources = FieldSources::default();
        let (mfd, exp, rule) = resolve_dates(&fields, "", cm(2026, 10), &mut sources);
        assert_eq!((mfd, exp), (cm(2024, 1), cm(2026, 1)));
        assert_eq!(rule, None);
        assert_eq!(sources.manufacture_date, None);
    }

    #[test]
    fn test_resolve_dates_defaults_without_text() {
        let mut sources = FieldSources::default();
        let (mfd, exp, _) = resolve_dates(&FieldSet::default(), "", cm(2026, 10), &mut sources);
        assert_eq!((mfd, exp), (cm(2026, 10), cm(2028, 10)));
        assert_eq!(sources.expiry_date, Some(FieldSource::Fallback));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = ExtractedRecord {
            brand: Some("Dolo-650".to_string()),
            generic_name: None,
            dosage: None,
            batch_number: Some("ALA306".to_string()),
            manufacture_date: Some(cm(2024, 1)),
            expiry_date: Some(cm(2026, 1)),
            manufacturer: None,
            mrp: 0.0,
            raw_text: String::new(),
            sources: FieldSources::default(),
            date_rule: None,
        };
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["batchNumber"], "ALA306");
        assert!(json.get("rawText").is_some());
        assert!(json.get("manufactureDate").is_some());
    }
}
