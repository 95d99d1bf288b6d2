//! Per-field cleanup of raw extracted strings.
//!
//! All functions here are idempotent: feeding a cleaned value back in returns it unchanged.

use lazy_static::lazy_static;
use regex::Regex;

use super::{FieldKind, PLACEHOLDER};

/// Lead words that mark packaging prose rather than a product name.
/// Words in the first list must stand alone; words in the second reject any token they start.
const DENIED_BRAND_WORDS: &[&str] = &["each", "film", "the", "this", "for", "use"];
const DENIED_BRAND_PREFIXES: &[&str] = &[
    "coated",
    "tablet",
    "capsule",
    "contains",
    "information",
    "store",
    "keep",
    "protect",
];

lazy_static! {
    static ref LEADING_NOISE_RE: Regex =
        Regex::new(r"^[:\-.\s]+").expect("Leading noise pattern should be valid");
    static ref TRAILING_NOISE_RE: Regex =
        Regex::new(r"[:\-.\s]+$").expect("Trailing noise pattern should be valid");
    static ref BRAND_SUFFIX_RE: Regex =
        Regex::new(r"(?i)\s*\b(tablets?|capsules?|I\.?P\.?|B\.?P\.?)$")
            .expect("Brand suffix pattern should be valid");
    static ref ALPHANUMERIC_RE: Regex =
        Regex::new(r"[A-Za-z0-9]").expect("Alphanumeric pattern should be valid");
    static ref PRICE_RE: Regex =
        Regex::new(r"(\d+(?:[.,]\d{1,2})?)").expect("Price pattern should be valid");
    static ref DOSAGE_UNIT_RE: Regex =
        Regex::new(r"(?i)(\d+)\s*(mg|mcg|g|ml)\b").expect("Dosage unit pattern should be valid");
}

fn strip_noise(value: &str) -> String {
    let trimmed = LEADING_NOISE_RE.replace(value.trim(), "");
    TRAILING_NOISE_RE.replace(&trimmed, "").to_string()
}

/// Whether `value` can be a product name.
pub fn is_valid_brand(value: &str) -> bool {
    let Some(first) = value.split_whitespace().next() else {
        return false;
    };
    let first = first.to_lowercase();
    if DENIED_BRAND_WORDS.contains(&first.as_str()) {
        return false;
    }
    !DENIED_BRAND_PREFIXES
        .iter()
        .any(|prefix| first.starts_with(prefix))
}

/// Clean a raw value for `kind`; `None` means the value carries no information.
pub fn normalize_value(kind: FieldKind, raw: &str) -> Option<String> {
    if raw.trim().is_empty() || raw.trim() == PLACEHOLDER {
        return None;
    }
    let mut value = strip_noise(raw);

    match kind {
        FieldKind::Brand => {
            if !is_valid_brand(&value) {
                return None;
            }
            // "Paracetamol Tablets I.P." loses both suffixes
            loop {
                let stripped = BRAND_SUFFIX_RE.replace(&value, "").to_string();
                let stripped = strip_noise(&stripped);
                if stripped == value {
                    break;
                }
                value = stripped;
            }
        }
        FieldKind::BatchNumber => {
            if !ALPHANUMERIC_RE.is_match(&value) {
                return None;
            }
        }
        FieldKind::Mrp => {
            let caps = PRICE_RE.captures(&value)?;
            value = caps[1].replace(',', ".");
        }
        FieldKind::Dosage => {
            value = format_dosage(&value);
        }
        FieldKind::GenericName
        | FieldKind::ManufactureDate
        | FieldKind::ExpiryDate
        | FieldKind::Manufacturer => {}
    }

    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Price as a number; a comma is read as the decimal separator.
pub fn parse_mrp(raw: &str) -> Option<f64> {
    let caps = PRICE_RE.captures(raw)?;
    caps[1].replace(',', ".").parse::<f64>().ok()
}

/// `"650mg"` becomes `"650 mg"`; anything else is left alone.
pub fn format_dosage(raw: &str) -> String {
    DOSAGE_UNIT_RE.replace_all(raw.trim(), "$1 $2").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_and_empty_are_absent() {
        for kind in FieldKind::ALL {
            assert_eq!(normalize_value(kind, ""), None);
            assert_eq!(normalize_value(kind, "   "), None);
            assert_eq!(normalize_value(kind, PLACEHOLDER), None);
        }
    }

    #[test]
    fn test_brand_rules() {
        assert_eq!(normalize_value(FieldKind::Brand, "Each film coated tablet"), None);
        assert_eq!(normalize_value(FieldKind::Brand, "Store below 25C"), None);
        assert_eq!(normalize_value(FieldKind::Brand, "Tablets"), None);
        assert_eq!(
            normalize_value(FieldKind::Brand, "Paracetamol Tablets I.P."),
            Some("Paracetamol".to_string())
        );
        assert_eq!(
            normalize_value(FieldKind::Brand, ": Dolo-650 -"),
            Some("Dolo-650".to_string())
        );
        // Lead word only denied when it stands alone
        assert!(is_valid_brand("Theobid"));
        assert!(!is_valid_brand("the tablet"));
    }

    #[test]
    fn test_batch_rules() {
        assert_eq!(normalize_value(FieldKind::BatchNumber, "--"), None);
        assert_eq!(
            normalize_value(FieldKind::BatchNumber, ": RC-071022"),
            Some("RC-071022".to_string())
        );
    }

    #[test]
    fn test_mrp_rules() {
        assert_eq!(
            normalize_value(FieldKind::Mrp, "Rs. 140,00"),
            Some("140.00".to_string())
        );
        assert_eq!(normalize_value(FieldKind::Mrp, "free"), None);
        assert_eq!(parse_mrp("35.70"), Some(35.70));
        assert_eq!(parse_mrp("189,5"), Some(189.5));
        assert_eq!(parse_mrp("n/a"), None);
    }

    #[test]
    fn test_format_dosage() {
        assert_eq!(format_dosage("650mg"), "650 mg");
        assert_eq!(format_dosage("200MG + 500mg"), "200 MG + 500 mg");
        assert_eq!(format_dosage("2.5 ml"), "2.5 ml");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let samples = [
            (FieldKind::BatchNumber, "ALA306"),
            (FieldKind::Brand, "Paracetamol Tablets I.P."),
            (FieldKind::Dosage, "200mg+500mg"),
            (FieldKind::Mrp, "M.R.P. Rs.140,00"),
            (FieldKind::ExpiryDate, "DEC.26"),
        ];
        for (kind, raw) in samples {
            let once = normalize_value(kind, raw).expect("sample should normalize");
            let twice = normalize_value(kind, &once).expect("clean value should survive");
            assert_eq!(once, twice, "{kind:?} not idempotent for {raw:?}");
        }
        assert_eq!(
            normalize_value(FieldKind::BatchNumber, "ALA306"),
            Some("ALA306".to_string())
        );
    }
}
