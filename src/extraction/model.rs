//! Model-assisted field extraction.
//!
//! The model is asked for a JSON object with exactly seven string keys. Its reply goes
//! through [`parse_model_fields`], the only place raw model output is interpreted; nothing
//! untyped leaves this module.

use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};

use super::FieldSet;

/// Keys every model reply must carry
pub const MODEL_FIELD_KEYS: [&str; 7] = [
    "brand",
    "dosage",
    "batch_number",
    "manufacture_date",
    "expiry_date",
    "manufacturer",
    "mrp",
];

const JSON_SCHEMA: &str = r#"{"brand": "", "dosage": "", "batch_number": "", "manufacture_date": "", "expiry_date": "", "manufacturer": "", "mrp": ""}"#;

const FIELD_RULES: &str = r#"Field rules:
1. brand: the product name printed largest on the pack, e.g. BIFILAC, O2, Dolo-650, RABEMI-DSR, Crocin, Pan 40.
   Do not return the generic composition ("Paracetamol Tablets IP", "Ofloxacin & Ornidazole") when a brand is printed.
2. dosage: strength with its unit, e.g. "650 mg", "200 mg + 500 mg".
3. batch_number: the code after "B.No.", "Batch No.", "Lot" or "L.No.", e.g. "ALA306", "E40001", "RC-071022".
   Never return a licence number.
4. manufacture_date: the date after "MFG.", "MFD." or "Mfg.Dt.", copied exactly as printed ("10/2023", "JAN.24", "AUG.2024").
5. expiry_date: the date after "EXP.", "Exp.Dt." or "Use Before", copied exactly as printed ("09/2025", "DEC.26", "JUL.2028").
6. manufacturer: the company after "Mfd. by", "Manufactured by" or "Marketed by", e.g. "Micro Labs", "Meyer Organics".
7. mrp: the price number only, e.g. "140.00", "35.70"."#;

const WORKED_EXAMPLES: &str = r#"Examples of correct answers:
{"brand": "BIFILAC", "dosage": "", "batch_number": "ALA306", "manufacture_date": "10/2023", "expiry_date": "09/2025", "manufacturer": "TOA Pharmaceuticals", "mrp": "140.00"}
{"brand": "O2", "dosage": "200 mg + 500 mg", "batch_number": "E40001", "manufacture_date": "JAN.24", "expiry_date": "DEC.26", "manufacturer": "Meyer Organics", "mrp": "189.00"}
{"brand": "Dolo-650", "dosage": "650 mg", "batch_number": "D0983759", "manufacture_date": "AUG.2024", "expiry_date": "JUL.2028", "manufacturer": "Micro Labs", "mrp": "35.70"}
{"brand": "RABEMI-DSR", "dosage": "20 mg + 30 mg", "batch_number": "RC-071022", "manufacture_date": "10/2022", "expiry_date": "09/2024", "manufacturer": "Renewed Life Sciences", "mrp": ""}"#;

/// Prompt sent with the package photo
pub fn image_extraction_prompt() -> String {
    format!(
        "You are reading a photo of an Indian medicine strip or carton. Text may be small, \
         reflective, or printed in several orientations, so read every direction.\n\n\
         {FIELD_RULES}\n\n{WORKED_EXAMPLES}\n\n\
         Reply with ONLY this JSON object and nothing else:\n{JSON_SCHEMA}\n\
         Use \"\" for any field you cannot find."
    )
}

/// Prompt wrapping text already produced by OCR
pub fn text_extraction_prompt(ocr_text: &str) -> String {
    format!(
        "You are reading OCR output from an Indian medicine strip or carton. \
         The text may contain recognition errors.\n\n\
         {FIELD_RULES}\n\n{WORKED_EXAMPLES}\n\n\
         OCR text:\n\"\"\"\n{ocr_text}\n\"\"\"\n\n\
         Reply with ONLY this JSON object and nothing else:\n{JSON_SCHEMA}\n\
         Use \"\" for any field you cannot find."
    )
}

/// Typed view of one model reply. Empty strings are already `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelFields {
    pub brand: Option<String>,
    pub dosage: Option<String>,
    pub batch_number: Option<String>,
    pub manufacture_date: Option<String>,
    pub expiry_date: Option<String>,
    pub manufacturer: Option<String>,
    pub mrp: Option<String>,
}

impl ModelFields {
    fn from_object(object: &Map<String, Value>) -> Self {
        let text = |key: &str| object.get(key).and_then(value_as_text);
        Self {
            brand: text("brand"),
            dosage: text("dosage"),
            batch_number: text("batch_number"),
            manufacture_date: text("manufacture_date"),
            expiry_date: text("expiry_date"),
            manufacturer: text("manufacturer"),
            mrp: text("mrp"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.brand.is_none()
            && self.dosage.is_none()
            && self.batch_number.is_none()
            && self.manufacture_date.is_none()
            && self.expiry_date.is_none()
            && self.manufacturer.is_none()
            && self.mrp.is_none()
    }

    /// Raw values as a [`FieldSet`], before normalization
    pub fn into_field_set(self) -> FieldSet {
        FieldSet {
            brand: self.brand,
            generic_name: None,
            dosage: self.dosage,
            batch_number: self.batch_number,
            manufacture_date: self.manufacture_date,
            expiry_date: self.expiry_date,
            manufacturer: self.manufacturer,
            mrp: self.mrp,
        }
    }
}

// Models sometimes return prices as numbers
fn value_as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn parse_object(candidate: &str) -> Option<ModelFields> {
    match serde_json::from_str::<Value>(candidate).ok()? {
        Value::Object(object) => Some(ModelFields::from_object(&object)),
        _ => None,
    }
}

/// Parse a model reply, or `None` when it holds no JSON object.
///
/// Code fences are stripped first. If the remainder is not JSON, the span from the first
/// `{` to the last `}` is tried instead.
pub fn parse_model_fields(raw: &str) -> Option<ModelFields> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    if let Some(fields) = parse_object(cleaned) {
        return Some(fields);
    }

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_object(&cleaned[start..=end])
}

pub type ModelFuture<'a> = Pin<Box<dyn Future<Output = Option<ModelFields>> + Send + 'a>>;

/// A model that can read fields from a photo or from OCR text.
///
/// Both calls are soft: a missing key, a transport error or an unparseable reply all
/// come back as `None` and the pipeline moves on.
pub trait FieldModel: Send + Sync {
    fn is_available(&self) -> bool;
    fn extract_from_image<'a>(&'a self, image: &'a [u8]) -> ModelFuture<'a>;
    fn extract_from_text<'a>(&'a self, text: &'a str) -> ModelFuture<'a>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let raw = r#"{"brand": "BIFILAC", "dosage": "", "batch_number": "ALA306", "manufacture_date": "10/2023", "expiry_date": "09/2025", "manufacturer": "TOA Pharmaceuticals", "mrp": "140.00"}"#;
        let fields = parse_model_fields(raw).expect("plain JSON should parse");
        assert_eq!(fields.brand.as_deref(), Some("BIFILAC"));
        assert_eq!(fields.dosage, None);
        assert_eq!(fields.mrp.as_deref(), Some("140.00"));
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"brand\": \"O2\", \"mrp\": 189}\n```";
        let fields = parse_model_fields(raw).expect("fenced JSON should parse");
        assert_eq!(fields.brand.as_deref(), Some("O2"));
        assert_eq!(fields.mrp.as_deref(), Some("189"));
        assert_eq!(fields.batch_number, None);
    }

    #[test]
    fn test_parse_json_embedded_in_prose() {
        let raw = "Here is the result: {\"brand\": \"Dolo-650\", \"dosage\": \"650 mg\"} hope it helps";
        let fields = parse_model_fields(raw).expect("embedded JSON should parse");
        assert_eq!(fields.brand.as_deref(), Some("Dolo-650"));
        assert_eq!(fields.dosage.as_deref(), Some("650 mg"));
    }

    #[test]
    fn test_parse_rejects_non_objects() {
        assert_eq!(parse_model_fields(""), None);
        assert_eq!(parse_model_fields("I could not read the image."), None);
        assert_eq!(parse_model_fields("[1, 2, 3]"), None);
        assert_eq!(parse_model_fields("} broken {"), None);
    }

    #[test]
    fn test_prompts_carry_schema_and_text() {
        let prompt = text_extraction_prompt("B.No. ALA306");
        assert!(prompt.contains("B.No. ALA306"));
        for key in MODEL_FIELD_KEYS {
            assert!(prompt.contains(key), "prompt missing key {key}");
        }
        assert!(image_extraction_prompt().contains("RABEMI-DSR"));
    }

    #[test]
    fn test_into_field_set() {
        let fields = ModelFields {
            brand: Some("O2".to_string()),
            ..Default::default()
        };
        assert!(!fields.is_empty());
        let set = fields.into_field_set();
        assert_eq!(set.brand.as_deref(), Some("O2"));
        assert!(set.generic_name.is_none());
    }
}
