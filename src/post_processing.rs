//! Corrections for known brand and manufacturer misreadings.
//!
//! Short stylized brand names are the field OCR corrupts most often on reflective
//! packs. The tables here are small and explicit: exact lower-cased matches first, then
//! substring checks, then a scan of the full text when the field is still empty. There
//! is no edit-distance matching.

use lazy_static::lazy_static;
use regex::Regex;

use crate::extraction::{format_dosage, FieldKind, FieldSet};

/// Exact lower-cased brand readings and their correction
const BRAND_CORRECTIONS: &[(&str, &str)] = &[
    ("bifilac", "BIFILAC"),
    ("bifiiac", "BIFILAC"),
    ("bifllac", "BIFILAC"),
    ("bif1lac", "BIFILAC"),
    ("o 2", "O2"),
    ("02", "O2"),
    ("oz", "O2"),
    ("dolo 650", "Dolo-650"),
    ("dolo650", "Dolo-650"),
    ("dol0 650", "Dolo-650"),
    ("dolo-65o", "Dolo-650"),
    ("rabemi dsr", "RABEMI-DSR"),
    ("rabemidsr", "RABEMI-DSR"),
    ("rabemi-dsr", "RABEMI-DSR"),
];

/// A correction that applies when every keyword occurs in the haystack
struct KeywordRule {
    all_of: &'static [&'static str],
    value: &'static str,
}

const fn rule(all_of: &'static [&'static str], value: &'static str) -> KeywordRule {
    KeywordRule { all_of, value }
}

/// Checked against an existing brand that matched no exact correction
const BRAND_CONTAINS: &[KeywordRule] = &[
    rule(&["bifilac"], "BIFILAC"),
    rule(&["rabemi", "dsr"], "RABEMI-DSR"),
    rule(&["dolo", "650"], "Dolo-650"),
];

/// Checked against the full text when no brand was found
const BRAND_FROM_TEXT: &[KeywordRule] = &[
    rule(&["bifilac"], "BIFILAC"),
    rule(&["rabemi", "dsr"], "RABEMI-DSR"),
    rule(&["dolo", "650"], "Dolo-650"),
    // Composition of the known brands
    rule(&["ofloxacin", "ornidazole"], "O2"),
    rule(&["paracetamol", "650"], "Dolo-650"),
    rule(&["rabeprazole", "domperidone"], "RABEMI-DSR"),
];

/// Substring of an existing manufacturer and its canonical name, first hit wins
const MANUFACTURER_CORRECTIONS: &[(&str, &str)] = &[
    ("toa", "TOA Pharmaceuticals"),
    ("toa pharma", "TOA Pharmaceuticals"),
    ("meyer", "Meyer Organics"),
    ("meyer organics", "Meyer Organics"),
    ("micro labs", "Micro Labs"),
    ("microlabs", "Micro Labs"),
    ("paalmi", "Paalmi Pharmaceuticals"),
    ("renewed life", "Renewed Life Sciences"),
];

const MANUFACTURER_FROM_TEXT: &[KeywordRule] = &[
    rule(&["toa", "pharma"], "TOA Pharmaceuticals"),
    rule(&["meyer"], "Meyer Organics"),
    rule(&["micro labs"], "Micro Labs"),
    rule(&["microlabs"], "Micro Labs"),
    rule(&["paalmi"], "Paalmi Pharmaceuticals"),
    rule(&["renewed life"], "Renewed Life Sciences"),
];

lazy_static! {
    static ref FALLBACK_BATCH_RULES: Vec<Regex> = [
        r"(?i)B\.?\s*No\.?\s*[:#.\-]?\s*([A-Z]?\d{4,}[A-Z0-9]*)",
        r"(?i)Batch\s*[:#.\-]?\s*([A-Z]?\d{4,}[A-Z0-9]*)",
        r"\b([A-Z]\d{5,})\b",
        r"(\d{6,})",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("Fallback batch pattern should be valid"))
    .collect();
}

fn first_rule_match(haystack: &str, rules: &[KeywordRule]) -> Option<&'static str> {
    rules
        .iter()
        .find(|rule| rule.all_of.iter().all(|keyword| haystack.contains(keyword)))
        .map(|rule| rule.value)
}

/// Canonical brand for `brand`, or `None` when no table entry applies
pub fn correct_brand(brand: &str) -> Option<&'static str> {
    let lower = brand.trim().to_lowercase();
    if let Some((_, value)) = BRAND_CORRECTIONS.iter().find(|(key, _)| *key == lower) {
        return Some(*value);
    }
    if let Some(value) = first_rule_match(&lower, BRAND_CONTAINS) {
        return Some(value);
    }
    matches!(lower.as_str(), "o2" | "o 2" | "02").then_some("O2")
}

/// Brand inferred from the full text when extraction found none
pub fn brand_from_text(text: &str) -> Option<&'static str> {
    first_rule_match(&text.to_lowercase(), BRAND_FROM_TEXT)
}

pub fn correct_manufacturer(manufacturer: &str) -> Option<&'static str> {
    let lower = manufacturer.trim().to_lowercase();
    MANUFACTURER_CORRECTIONS
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|(_, value)| *value)
}

pub fn manufacturer_from_text(text: &str) -> Option<&'static str> {
    first_rule_match(&text.to_lowercase(), MANUFACTURER_FROM_TEXT)
}

/// Looser batch patterns for when every labelled rule failed
pub fn fallback_batch(text: &str) -> Option<String> {
    FALLBACK_BATCH_RULES
        .iter()
        .find_map(|rule| rule.captures(text).and_then(|caps| caps.get(1)))
        .map(|group| group.as_str().to_string())
}

/// Apply brand, manufacturer and dosage corrections.
///
/// Returns the corrected set and the kinds whose value changed or was filled.
pub fn post_process(mut fields: FieldSet, text: &str) -> (FieldSet, Vec<FieldKind>) {
    let mut corrected = Vec::new();

    let brand = match fields.brand.as_deref() {
        Some(brand) => correct_brand(brand).filter(|value| *value != brand),
        None if !text.is_empty() => brand_from_text(text),
        None => None,
    };
    if let Some(brand) = brand {
        tracing::debug!(brand, "Brand corrected");
        fields.brand = Some(brand.to_string());
        corrected.push(FieldKind::Brand);
    }

    let manufacturer = match fields.manufacturer.as_deref() {
        Some(manufacturer) => {
            correct_manufacturer(manufacturer).filter(|value| *value != manufacturer)
        }
        None if !text.is_empty() => manufacturer_from_text(text),
        None => None,
    };
    if let Some(manufacturer) = manufacturer {
        tracing::debug!(manufacturer, "Manufacturer corrected");
        fields.manufacturer = Some(manufacturer.to_string());
        corrected.push(FieldKind::Manufacturer);
    }

    if let Some(dosage) = fields.dosage.take() {
        let formatted = format_dosage(&dosage);
        if formatted != dosage {
            corrected.push(FieldKind::Dosage);
        }
        fields.dosage = Some(formatted);
    }

    (fields, corrected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_brand_corrections() {
        assert_eq!(correct_brand("Bif1lac"), Some("BIFILAC"));
        assert_eq!(correct_brand(" oz "), Some("O2"));
        assert_eq!(correct_brand("DOLO-65O"), Some("Dolo-650"));
        assert_eq!(correct_brand("RabemiDSR"), Some("RABEMI-DSR"));
    }

    #[test]
    fn test_brand_containment() {
        assert_eq!(correct_brand("BIFILAC Capsules"), Some("BIFILAC"));
        assert_eq!(correct_brand("Dolo 650mg"), Some("Dolo-650"));
        assert_eq!(correct_brand("O2"), Some("O2"));
        assert_eq!(correct_brand("Crocin"), None);
        // Only exact for O2; "2024" must not become a brand
        assert_eq!(correct_brand("Pan 2024"), None);
    }

    #[test]
    fn test_brand_from_text_order() {
        assert_eq!(
            brand_from_text("Ofloxacin and Ornidazole Tablets"),
            Some("O2")
        );
        assert_eq!(
            brand_from_text("Paracetamol Tablets IP 650 mg"),
            Some("Dolo-650")
        );
        assert_eq!(
            brand_from_text("Rabeprazole Sodium & Domperidone SR"),
            Some("RABEMI-DSR")
        );
        assert_eq!(brand_from_text("Vitamin C chewable"), None);
    }

    #[test]
    fn test_manufacturer_corrections() {
        assert_eq!(correct_manufacturer("MICRO LABS LIMITED"), Some("Micro Labs"));
        assert_eq!(
            correct_manufacturer("Meyer Organics Pvt"),
            Some("Meyer Organics")
        );
        assert_eq!(correct_manufacturer("Cipla"), None);
        assert_eq!(
            manufacturer_from_text("Mfd. by TOA PHARMA Co."),
            Some("TOA Pharmaceuticals")
        );
        assert_eq!(manufacturer_from_text("Marketed by Paalmi"), Some("Paalmi Pharmaceuticals"));
    }

    #[test]
    fn test_fallback_batch() {
        assert_eq!(fallback_batch("B No 123456X").as_deref(), Some("123456X"));
        assert_eq!(fallback_batch("lot D0983759 here").as_deref(), Some("D0983759"));
        assert_eq!(fallback_batch("code 9876543").as_deref(), Some("9876543"));
        assert_eq!(fallback_batch("nothing here"), None);
    }

    #[test]
    fn test_post_process_reports_changes() {
        let fields = FieldSet {
            brand: Some("bifiiac".to_string()),
            dosage: Some("650mg".to_string()),
            manufacturer: Some("Micro Labs".to_string()),
            ..Default::default()
        };
        let (fields, corrected) = post_process(fields, "");
        assert_eq!(fields.brand.as_deref(), Some("BIFILAC"));
        assert_eq!(fields.dosage.as_deref(), Some("650 mg"));
        assert_eq!(fields.manufacturer.as_deref(), Some("Micro Labs"));
        assert_eq!(corrected, vec![FieldKind::Brand, FieldKind::Dosage]);
    }

    #[test]
    fn test_post_process_fills_from_text() {
        let (fields, corrected) =
            post_process(FieldSet::default(), "Dolo 650 tablets\nMicro Labs Limited");
        assert_eq!(fields.brand.as_deref(), Some("Dolo-650"));
        assert_eq!(fields.manufacturer.as_deref(), Some("Micro Labs"));
        assert_eq!(corrected, vec![FieldKind::Brand, FieldKind::Manufacturer]);
    }
}
