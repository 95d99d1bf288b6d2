//! # Field Extraction Module
//!
//! Turns OCR text (or model output) into candidate field values:
//!
//! - [`patterns`]: ordered regex tables, first match wins
//! - [`normalize`]: per-field cleanup and rejection of implausible values
//! - [`model`]: the vision-language model pass with a strict JSON contract
//!
//! Every pass produces a [`FieldSet`]. Later passes only fill fields that are still empty.

pub mod model;
pub mod normalize;
pub mod patterns;

pub use model::{parse_model_fields, FieldModel, ModelFields, ModelFuture};
pub use normalize::{format_dosage, is_valid_brand, normalize_value, parse_mrp};
pub use patterns::field_patterns;

use regex::Regex;
use serde::Serialize;

/// Marker returned by [`find_first_match`] when no rule matched
pub const PLACEHOLDER: &str = "Information not available";

/// Fields the regex tables know about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Brand,
    GenericName,
    Dosage,
    BatchNumber,
    ManufactureDate,
    ExpiryDate,
    Manufacturer,
    Mrp,
}

impl FieldKind {
    pub const ALL: [FieldKind; 8] = [
        FieldKind::Brand,
        FieldKind::GenericName,
        FieldKind::Dosage,
        FieldKind::BatchNumber,
        FieldKind::ManufactureDate,
        FieldKind::ExpiryDate,
        FieldKind::Manufacturer,
        FieldKind::Mrp,
    ];

    /// Snake-case name, also used as the metrics label and model JSON key
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Brand => "brand",
            FieldKind::GenericName => "generic_name",
            FieldKind::Dosage => "dosage",
            FieldKind::BatchNumber => "batch_number",
            FieldKind::ManufactureDate => "manufacture_date",
            FieldKind::ExpiryDate => "expiry_date",
            FieldKind::Manufacturer => "manufacturer",
            FieldKind::Mrp => "mrp",
        }
    }
}

/// Which pass filled a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    ModelImage,
    Regex,
    ModelText,
    Correction,
    Fallback,
}

impl FieldSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldSource::ModelImage => "model_image",
            FieldSource::Regex => "regex",
            FieldSource::ModelText => "model_text",
            FieldSource::Correction => "correction",
            FieldSource::Fallback => "fallback",
        }
    }
}

/// Candidate values produced by one extraction pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    pub brand: Option<String>,
    pub generic_name: Option<String>,
    pub dosage: Option<String>,
    pub batch_number: Option<String>,
    pub manufacture_date: Option<String>,
    pub expiry_date: Option<String>,
    pub manufacturer: Option<String>,
    pub mrp: Option<String>,
}

impl FieldSet {
    pub fn get(&self, kind: FieldKind) -> Option<&str> {
        self.slot(kind).as_deref()
    }

    fn slot(&self, kind: FieldKind) -> &Option<String> {
        match kind {
            FieldKind::Brand => &self.brand,
            FieldKind::GenericName => &self.generic_name,
            FieldKind::Dosage => &self.dosage,
            FieldKind::BatchNumber => &self.batch_number,
            FieldKind::ManufactureDate => &self.manufacture_date,
            FieldKind::ExpiryDate => &self.expiry_date,
            FieldKind::Manufacturer => &self.manufacturer,
            FieldKind::Mrp => &self.mrp,
        }
    }

    pub fn slot_mut(&mut self, kind: FieldKind) -> &mut Option<String> {
        match kind {
            FieldKind::Brand => &mut self.brand,
            FieldKind::GenericName => &mut self.generic_name,
            FieldKind::Dosage => &mut self.dosage,
            FieldKind::BatchNumber => &mut self.batch_number,
            FieldKind::ManufactureDate => &mut self.manufacture_date,
            FieldKind::ExpiryDate => &mut self.expiry_date,
            FieldKind::Manufacturer => &mut self.manufacturer,
            FieldKind::Mrp => &mut self.mrp,
        }
    }

    pub fn is_empty(&self) -> bool {
        FieldKind::ALL.iter().all(|kind| self.get(*kind).is_none())
    }

    /// Brand, batch, manufacture or expiry still missing
    pub fn missing_key_fields(&self) -> bool {
        [
            FieldKind::Brand,
            FieldKind::BatchNumber,
            FieldKind::ManufactureDate,
            FieldKind::ExpiryDate,
        ]
        .iter()
        .any(|kind| self.get(*kind).is_none())
    }

    /// Copy into `self` every field it lacks and `other` has.
    /// Returns the kinds that were filled.
    pub fn fill_missing(&mut self, other: &FieldSet) -> Vec<FieldKind> {
        let mut filled = Vec::new();
        for kind in FieldKind::ALL {
            if self.get(kind).is_some() {
                continue;
            }
            if let Some(value) = other.get(kind) {
                *self.slot_mut(kind) = Some(value.to_string());
                filled.push(kind);
            }
        }
        filled
    }

    /// Run every value through [`normalize_value`], dropping what it rejects.
    pub fn normalized(&self) -> FieldSet {
        let mut out = FieldSet::default();
        for kind in FieldKind::ALL {
            *out.slot_mut(kind) = self.get(kind).and_then(|raw| normalize_value(kind, raw));
        }
        out
    }
}

/// First group of the first rule that matches, trimmed, or [`PLACEHOLDER`].
///
/// Rules without a capture group are skipped.
pub fn find_first_match(text: &str, rules: &[Regex]) -> String {
    for rule in rules {
        if rule.captures_len() < 2 {
            continue;
        }
        if let Some(group) = rule.captures(text).and_then(|caps| caps.get(1)) {
            return group.as_str().trim().to_string();
        }
    }
    PLACEHOLDER.to_string()
}

/// Regex pass over `text` for a single field, normalized.
pub fn extract_field(kind: FieldKind, text: &str) -> Option<String> {
    normalize_value(kind, &find_first_match(text, field_patterns(kind)))
}

/// Regex pass over every field.
pub fn extract_with_regex(text: &str) -> FieldSet {
    let _span = crate::observability::extraction_span("regex").entered();
    let mut fields = FieldSet::default();
    for kind in FieldKind::ALL {
        *fields.slot_mut(kind) = extract_field(kind, text);
    }
    tracing::debug!(?fields, "Regex extraction finished");
    fields
}

/// Join runs of single-character lines.
///
/// Vertical text on a strip comes out of OCR one letter per line; `B\nI\nF` becomes `BIF`.
pub fn normalize_vertical(text: &str) -> String {
    let mut normalized: Vec<String> = Vec::new();
    let mut run = String::new();

    for line in text.lines() {
        let line = line.trim();
        let mut chars = line.chars();
        let single_alnum = match (chars.next(), chars.next()) {
            (Some(c), None) => c.is_alphanumeric(),
            _ => false,
        };
        if single_alnum {
            run.push_str(line);
            continue;
        }
        if !run.is_empty() {
            normalized.push(std::mem::take(&mut run));
        }
        normalized.push(line.to_string());
    }
    if !run.is_empty() {
        normalized.push(run);
    }
    normalized.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_first_match_placeholder() {
        assert_eq!(
            find_first_match("nothing useful", field_patterns(FieldKind::Mrp)),
            PLACEHOLDER
        );
    }

    #[test]
    fn test_find_first_match_skips_groupless_rules() {
        let rules = vec![
            Regex::new(r"BIFILAC").expect("valid"),
            Regex::new(r"(B\w+)").expect("valid"),
        ];
        assert_eq!(find_first_match("BIFILAC", &rules), "BIFILAC");
        let rules = vec![Regex::new(r"\d+").expect("valid")];
        assert_eq!(find_first_match("123", &rules), PLACEHOLDER);
    }

    #[test]
    fn test_fill_missing_never_overwrites() {
        let mut first = FieldSet {
            brand: Some("BIFILAC".to_string()),
            ..Default::default()
        };
        let second = FieldSet {
            brand: Some("Other".to_string()),
            batch_number: Some("ALA306".to_string()),
            ..Default::default()
        };
        let filled = first.fill_missing(&second);
        assert_eq!(filled, vec![FieldKind::BatchNumber]);
        assert_eq!(first.brand.as_deref(), Some("BIFILAC"));
        assert_eq!(first.batch_number.as_deref(), Some("ALA306"));
    }

    #[test]
    fn test_missing_key_fields() {
        let mut fields = FieldSet {
            brand: Some("O2".to_string()),
            batch_number: Some("E40001".to_string()),
            manufacture_date: Some("JAN.24".to_string()),
            ..Default::default()
        };
        assert!(fields.missing_key_fields());
        fields.expiry_date = Some("DEC.26".to_string());
        assert!(!fields.missing_key_fields());
    }

    #[test]
    fn test_normalize_vertical() {
        assert_eq!(normalize_vertical("B\nI\nF\nI\nL\nA\nC\nMRP 140"), "BIFILAC\nMRP 140");
        assert_eq!(normalize_vertical("Dolo\n6\n5\n0"), "Dolo\n650");
        assert_eq!(normalize_vertical("a line\n-\nnext"), "a line\n-\nnext");
    }
}
