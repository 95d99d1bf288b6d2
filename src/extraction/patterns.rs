//! Ordered regex rule tables, one per field.
//!
//! Within a table the most specific rules come first (named brands, explicit
//! "B.No."/"MFG"/"EXP" labels) and the loosest shapes come last, so that e.g. a licence
//! number cannot win over a labelled batch code. Every rule is compiled case-insensitive
//! with `.` matching newlines.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

use super::FieldKind;

const BRAND_PATTERNS: &[&str] = &[
    // Brands seen on reference packages
    r"\b(BIFILAC|Bifilac)\b",
    r"\b(O2|O\s*2)\b",
    r"\b(Dolo[\s\-]*650|DOLO[\s\-]*650)\b",
    r"\b(RABEMI[\s\-]*DSR|Rabemi[\s\-]*DSR)\b",
    // Common Indian brands
    r"\b(Dolo\s*\d+|Crocin|Pan\s*\d+|Azee\s*\d+|Calpol|Combiflam|Allegra|Montair|Augmentin|Zifi\s*\d+|Shelcal|Becosules|Limcee|Revital|Liv\s*52|Digene|Gelusil|Eno|Hajmola|Pudin\s*Hara)\b",
    // Generic names printed as the product name
    r"\b(Ofloxacin|Ornidazole|Paracetamol|Rabeprazole|Domperidone)\s*(?:Tablets?|Capsules?)?\s*(?:I\.?P\.?)?\b",
    // Shapes
    r"^([A-Z][A-Za-z0-9\-]+(?:\s*\d+)?)\b",
    r"\b([A-Z][a-z]+[\s\-]*\d{2,4})\b",
    r"\b([A-Z][a-z]+(?:\s*[&+]\s*[A-Za-z]+)?)\s*(?:Tablet|Capsule|Syrup|Tab|Cap)\b",
];

const GENERIC_NAME_PATTERNS: &[&str] = &[
    r"\b(?:contains|each)\s+(.+?)(?:IP|BP|USP|Ph\.?Eur\.|\)|\n)",
    r"\b(Paracetamol|Ibuprofen|Amoxicillin|Ciprofloxacin|Metronidazole|Azithromycin|Ofloxacin|Ornidazole|Pantoprazole|Omeprazole|Ranitidine|Cetirizine|Levocetirizine|Montelukast|Atorvastatin|Metformin|Rabeprazole|Domperidone)\b",
];

const DOSAGE_PATTERNS: &[&str] = &[
    r"(\d+(?:\.\d+)?\s*(?:mg|mcg|g|ml|IU)(?:\s*[+/&]\s*\d+(?:\.\d+)?\s*(?:mg|mcg|g|ml|IU))?)",
    r"\b(\d+\s*mg)\b",
    r"\b(\d+\s*mcg)\b",
    r"(\d+\s*mg\s*[+/&]\s*\d+\s*mg)",
];

const BATCH_PATTERNS: &[&str] = &[
    // Labelled
    r"B\.?\s*No\.?\s*[:#.\-]?\s*([A-Z0-9][A-Z0-9\-]{3,})",
    r"Batch\s*(?:No\.?|Number|#)?\s*[:#.\-]?\s*([A-Z0-9][A-Z0-9\-]{3,})",
    r"Lot\s*(?:No\.?|Number|#)?\s*[:#.\-]?\s*([A-Z0-9][A-Z0-9\-]{3,})",
    r"B\.N\.?\s*[:#.\-]?\s*([A-Z0-9][A-Z0-9\-]{3,})",
    r"L\.?\s*No\.?\s*[:#.\-]?\s*([A-Z0-9][A-Z0-9\-]{3,})",
    // Bare shapes: ALA306, RC-071022, E40001, BN12345
    r"\b([A-Z]{2,3}[\-]?[A-Z0-9]{3,})\b",
    r"\b([A-Z]\d{5,})\b",
    r"\b([A-Z]{1,3}\d{4,})\b",
];

const MANUFACTURE_DATE_PATTERNS: &[&str] = &[
    r"MFG\.?\s*(?:DT\.?|DATE|D)?\s*[:#.\-]?\s*([A-Z]{3}\.?\s*\d{2,4})",
    r"MFD\.?\s*(?:DT\.?|DATE|D)?\s*[:#.\-]?\s*([A-Z]{3}\.?\s*\d{2,4})",
    r"M\.?D\.?\s*[:#.\-]?\s*([A-Z]{3}\.?\s*\d{2,4})",
    r"MFG\.?\s*(?:DT\.?|DATE)?\s*[:#.\-]?\s*(\d{1,2}[./-]\d{2,4})",
    r"MFD\.?\s*(?:DT\.?|DATE)?\s*[:#.\-]?\s*(\d{1,2}[./-]\d{2,4})",
    r"(?:Mfg|Mfd|Manufactured)\s*[:#.\-]?\s*([A-Z]{3}\.?\s*\d{2,4}|\d{1,2}[./-]\d{2,4})",
    r"MFG\.?\s*[:#.\-]?\s*(\d{2}[./-]\d{4})",
    // A numeric date somewhere before an EXP label
    r"(\d{2}/\d{4})\s*.*EXP",
];

const EXPIRY_DATE_PATTERNS: &[&str] = &[
    r"EXP\.?\s*(?:DT\.?|DATE|D)?\s*[:#.\-]?\s*([A-Z]{3}\.?\s*\d{2,4})",
    r"E\.?D\.?\s*[:#.\-]?\s*([A-Z]{3}\.?\s*\d{2,4})",
    r"EXP\.?\s*(?:DT\.?|DATE)?\s*[:#.\-]?\s*(\d{1,2}[./-]\d{2,4})",
    r"(?:Expiry|Exp|Use\s*Before|Best\s*Before)\s*[:#.\-]?\s*([A-Z]{3}\.?\s*\d{2,4}|\d{1,2}[./-]\d{2,4})",
    r"(?:Use|Best)\s*(?:Before|By)\s*[:#.\-]?\s*([A-Z]{3}\.?\s*\d{2,4}|\d{1,2}[./-]\d{2,4})",
    r"EXP\.?\s*[:#.\-]?\s*(\d{2}[./-]\d{4})",
    r"EXP\.?\s*[:#.\-]?\s*([A-Z]{3}\.?\s*\d{2})",
    // Month and year closing the text
    r"((?:JUL|AUG|SEP|OCT|NOV|DEC|JAN|FEB|MAR|APR|MAY|JUN)\.?\s*\d{4})\s*$",
];

const MANUFACTURER_PATTERNS: &[&str] = &[
    r"(?:Mfd\.?\s*by|Mfg\.?\s*by|Manufactured\s*by|Marketed\s*by|Mkt\.?\s*by)\s*[:#]?\s*([A-Za-z][A-Za-z\s&\.\-]+?)(?:\s*(?:Ltd|Pvt|Private|Limited|Pharma|Pharmaceuticals|Healthcare|Laboratories|Labs))",
    r"\b(Mankind|Cipla|Sun\s*Pharma|Dr\.?\s*Reddy'?s?|Lupin|Abbott|GSK|Pfizer|Zydus|Torrent|Alkem|Intas|Glenmark|Cadila|Micro\s*Labs|Macleods|Ranbaxy|Biocon|Wockhardt|Ipca|USV|Alembic|FDC|Ajanta|Eris|Natco|Hetero|Aurobindo|Emcure|Aristo|Blue\s*Cross|Sanofi|Bayer|Novartis|Merck|AstraZeneca|Meyer|Franco\s*Indian|JB\s*Chemicals?|Medy|Medley|TOA|TOAPHARMA|Paalmi|Renewed\s*Life|Meyer\s*Organics)\b",
    r"(TABLETS?\s*\(INDIA\)\s*(?:LIMITED|LTD))",
];

const MRP_PATTERNS: &[&str] = &[
    r"M\.?R\.?P\.?\s*[:#]?\s*(?:Rs\.?|₹|INR)?\s*(\d+(?:[.,]\d{1,2})?)",
    r"(?:Price|MRP)\s*[:#]?\s*(?:Rs\.?|₹|INR)?\s*(\d+(?:[.,]\d{1,2})?)",
    r"Rs\.?\s*(\d+(?:[.,]\d{1,2})?)",
    r"₹\s*(\d+(?:[.,]\d{1,2})?)",
    r"M\.R\.P\.Rs\.?\s*(\d+(?:[.,]\d{1,2})?)",
    r"FOR\s*\d+\s*(?:TABS?|CAPS?)\s*.*?Rs\.?\s*(\d+(?:[.,]\d{1,2})?)",
];

fn compile_rules(field: &str, patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .dot_matches_new_line(true)
                .build()
                .unwrap_or_else(|e| panic!("{} pattern '{}' should be valid: {}", field, pattern, e))
        })
        .collect()
}

lazy_static! {
    static ref BRAND_RULES: Vec<Regex> = compile_rules("brand", BRAND_PATTERNS);
    static ref GENERIC_NAME_RULES: Vec<Regex> = compile_rules("generic_name", GENERIC_NAME_PATTERNS);
    static ref DOSAGE_RULES: Vec<Regex> = compile_rules("dosage", DOSAGE_PATTERNS);
    static ref BATCH_RULES: Vec<Regex> = compile_rules("batch_number", BATCH_PATTERNS);
    static ref MANUFACTURE_DATE_RULES: Vec<Regex> =
        compile_rules("manufacture_date", MANUFACTURE_DATE_PATTERNS);
    static ref EXPIRY_DATE_RULES: Vec<Regex> = compile_rules("expiry_date", EXPIRY_DATE_PATTERNS);
    static ref MANUFACTURER_RULES: Vec<Regex> = compile_rules("manufacturer", MANUFACTURER_PATTERNS);
    static ref MRP_RULES: Vec<Regex> = compile_rules("mrp", MRP_PATTERNS);
}

/// The ordered rule list for `kind`.
pub fn field_patterns(kind: FieldKind) -> &'static [Regex] {
    match kind {
        FieldKind::Brand => &BRAND_RULES,
        FieldKind::GenericName => &GENERIC_NAME_RULES,
        FieldKind::Dosage => &DOSAGE_RULES,
        FieldKind::BatchNumber => &BATCH_RULES,
        FieldKind::ManufactureDate => &MANUFACTURE_DATE_RULES,
        FieldKind::ExpiryDate => &EXPIRY_DATE_RULES,
        FieldKind::Manufacturer => &MANUFACTURER_RULES,
        FieldKind::Mrp => &MRP_RULES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tables_compile_and_capture() {
        for kind in FieldKind::ALL {
            let rules = field_patterns(kind);
            assert!(!rules.is_empty(), "{kind:?} has no rules");
            for rule in rules {
                assert!(
                    rule.captures_len() > 1,
                    "{kind:?} rule '{}' has no capture group",
                    rule.as_str()
                );
            }
        }
    }

    #[test]
    fn test_rules_are_case_insensitive() {
        let batch = &field_patterns(FieldKind::BatchNumber)[0];
        let caps = batch.captures("b.no. ala306").expect("lowercase label should match");
        assert_eq!(&caps[1], "ala306");
    }
}
