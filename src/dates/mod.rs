//! # Date Parsing Module
//!
//! Packaging dates are month-granular and printed in many shapes: `DEC.26`, `10/2023`,
//! `Aug 2024`, `07-28`, sometimes just a year. This module turns those strings into
//! [`CalendarMonth`] values and mines date evidence out of free OCR text.
//!
//! Parsing never fails loudly. A string that matches no rule yields `None`.

pub mod reconcile;

pub use reconcile::{
    finalize_dates, reconcile, shelf_life_months, ReconciledDates, ReconciliationRule,
};

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Earliest year accepted on a package
pub const MIN_YEAR: i32 = 1990;
/// How far past the current year an expiry may lie
pub const YEARS_AHEAD: i32 = 20;

/// Labels that introduce a manufacture date
pub const MANUFACTURE_LABELS: &[&str] = &["mfg", "mfg.", "mfd", "manufactured", "mfg.dt", "mfg dt"];
/// Labels that introduce an expiry date
pub const EXPIRY_LABELS: &[&str] = &[
    "exp",
    "exp.",
    "expiry",
    "use before",
    "best before",
    "exp.dt",
    "exp dt",
];

/// Values that mean "nothing was found"
const ABSENT_MARKERS: &[&str] = &["n/a", "na", "unknown", "information not available"];

/// Window scanned after a label when the line-scoped search finds nothing
const LABEL_WINDOW_CHARS: usize = 120;
/// Maximum gap between a month token and the year that follows it
const MONTH_YEAR_MAX_GAP: usize = 12;

lazy_static! {
    static ref MONTH_YEAR_RE: Regex = Regex::new(
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*[.\-/\s]*(\d{2,4})\b"
    )
    .expect("Month/year pattern should be valid");
    static ref NUMERIC_MONTH_YEAR_RE: Regex =
        Regex::new(r"\b(\d{1,2})[./-](\d{2,4})\b").expect("Numeric month/year pattern should be valid");
    static ref FOUR_DIGIT_YEAR_RE: Regex =
        Regex::new(r"\b((?:19|20)\d{2})\b").expect("Year pattern should be valid");
    static ref TWO_DIGIT_RE: Regex =
        Regex::new(r"\b(\d{2})\b").expect("Two digit pattern should be valid");
    static ref EMBEDDED_PERIOD_RE: Regex =
        Regex::new(r"\.(\d)").expect("Embedded period pattern should be valid");
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").expect("Whitespace pattern should be valid");
    static ref ANY_MONTH_RE: Regex =
        Regex::new(r"(?i)(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)")
            .expect("Month name pattern should be valid");
    static ref ANY_NUMBER_RE: Regex = Regex::new(r"(\d{2,4})").expect("Number pattern should be valid");

    // Date-shaped tokens near a label
    static ref DATE_TOKEN_RE: Regex = Regex::new(
        r"(?i)\b((?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+\d{2,4}|\d{1,2}[./-]\d{2,4}|(?:19|20)\d{2})\b"
    )
    .expect("Date token pattern should be valid");
    static ref MONTH_TOKEN_RE: Regex =
        Regex::new(r"(?i)(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\b")
            .expect("Month token pattern should be valid");

    // Candidate mining over the whole text
    static ref CANDIDATE_MONTH_NAME_RE: Regex = Regex::new(
        r"(?i)\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\s+\d{4}\b"
    )
    .expect("Candidate month-name pattern should be valid");
    static ref CANDIDATE_NUMERIC_RE: Regex =
        Regex::new(r"\b\d{1,2}[./-]\d{2,4}\b").expect("Candidate numeric pattern should be valid");
    static ref CANDIDATE_YEAR_RE: Regex =
        Regex::new(r"\b(?:19|20)\d{2}\b").expect("Candidate year pattern should be valid");
}

/// chrono templates tried last, after `JAN.24` has become `JAN 24`.
/// Templates without a day get one prepended so chrono can build a date.
const FALLBACK_FORMATS: &[&str] = &[
    "%m/%Y", "%m-%Y", "%m.%Y", "%m/%y", "%m-%y", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%b %Y",
    "%B %Y", "%b %y", "%B %y", "%b. %Y", "%b. %y", "%Y",
];

/// A year and month with the day fixed to 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarMonth {
    year: i32,
    month: u32,
}

impl CalendarMonth {
    /// Returns `None` when `month` is outside 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Drops the day of `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The first day of this month, if chrono can represent the year.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// Current month in UTC
    pub fn current() -> Self {
        Self::from_date(Utc::now().date_naive())
    }

    /// Shift by `months`, which may be negative.
    pub fn add_months(&self, months: i32) -> Self {
        let (year, month) = shift_year_month(self.year, self.month, months);
        Self { year, month }
    }
}

impl fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for CalendarMonth {
    type Err = String;

    /// Parses the `YYYY-MM` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{}'", s))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in '{}'", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in '{}'", s))?;
        CalendarMonth::new(year, month).ok_or_else(|| format!("month out of range in '{}'", s))
    }
}

impl Serialize for CalendarMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CalendarMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn shift_year_month(year: i32, month: u32, months: i32) -> (i32, u32) {
    let offset = month as i32 - 1 + months;
    let year = year + offset.div_euclid(12);
    let month = offset.rem_euclid(12) as u32 + 1;
    (year, month)
}

/// Month arithmetic on full dates.
///
/// The day is clamped to 28 so every month can hold it; if the date still cannot be
/// built, day 1 is used, and if even that fails the input is returned unchanged.
pub fn add_months_to_date(date: NaiveDate, months: i32) -> NaiveDate {
    let (year, month) = shift_year_month(date.year(), date.month(), months);
    let day = date.day().min(28);
    NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| NaiveDate::from_ymd_opt(year, month, 1))
        .unwrap_or(date)
}

/// Month number for a name or abbreviation, looked up by its first three letters.
pub fn month_from_name(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Two-digit years below 50 are 20xx, 50..=99 are 19xx; anything else is kept.
pub fn fold_two_digit_year(year: i32) -> i32 {
    if year < 50 {
        year + 2000
    } else if year < 100 {
        year + 1900
    } else {
        year
    }
}

fn is_absent(value: &str) -> bool {
    let lowered = value.trim().to_lowercase();
    lowered.is_empty() || ABSENT_MARKERS.contains(&lowered.as_str())
}

/// Parser with a fixed upper year bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateParser {
    max_year: i32,
}

impl Default for DateParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DateParser {
    /// Upper bound is the current UTC year plus [`YEARS_AHEAD`].
    pub fn new() -> Self {
        Self::with_current_year(Utc::now().year())
    }

    /// Fix "now" for deterministic results.
    pub fn with_current_year(current_year: i32) -> Self {
        Self {
            max_year: current_year + YEARS_AHEAD,
        }
    }

    pub fn max_year(&self) -> i32 {
        self.max_year
    }

    fn accept(&self, year: i32, month: u32) -> Option<CalendarMonth> {
        if (MIN_YEAR..=self.max_year).contains(&year) {
            CalendarMonth::new(year, month)
        } else {
            None
        }
    }

    /// Parse one date string, trying the rules from most to least specific.
    pub fn parse_flexible(&self, raw: &str) -> Option<CalendarMonth> {
        if is_absent(raw) {
            return None;
        }
        let s = raw.trim();

        // Month name followed by a 2-4 digit year
        if let Some(caps) = MONTH_YEAR_RE.captures(s) {
            let month = month_from_name(&caps[1]);
            let year = caps[2].parse::<i32>().ok().map(fold_two_digit_year);
            if let (Some(month), Some(year)) = (month, year) {
                if let Some(parsed) = self.accept(year, month) {
                    return Some(parsed);
                }
            }
        }

        // MM/YY or MM/YYYY
        if let Some(parsed) = self.parse_numeric(s) {
            return Some(parsed);
        }

        // Bare 19xx/20xx
        if let Some(caps) = FOUR_DIGIT_YEAR_RE.captures(s) {
            if let Some(parsed) = caps[1].parse::<i32>().ok().and_then(|y| self.accept(y, 1)) {
                return Some(parsed);
            }
        }

        // Bare two-digit year
        if let Some(caps) = TWO_DIGIT_RE.captures(s) {
            if let Some(parsed) = caps[1]
                .parse::<i32>()
                .ok()
                .map(fold_two_digit_year)
                .and_then(|y| self.accept(y, 1))
            {
                return Some(parsed);
            }
        }

        self.parse_with_templates(s)
    }

    fn parse_numeric(&self, s: &str) -> Option<CalendarMonth> {
        let caps = NUMERIC_MONTH_YEAR_RE.captures(s)?;
        let month: u32 = caps[1].parse().ok()?;
        let year = fold_two_digit_year(caps[2].parse().ok()?);
        self.accept(year, month)
    }

    fn parse_with_templates(&self, s: &str) -> Option<CalendarMonth> {
        let spaced = EMBEDDED_PERIOD_RE.replace_all(s, " $1");
        let normalized = WHITESPACE_RE.replace_all(spaced.trim(), " ").to_string();

        for format in FALLBACK_FORMATS {
            let parsed = if format.contains("%d") {
                NaiveDate::parse_from_str(&normalized, format)
            } else if *format == "%Y" {
                NaiveDate::parse_from_str(&format!("01 01 {}", normalized), "%d %m %Y")
            } else {
                NaiveDate::parse_from_str(&format!("01 {}", normalized), &format!("%d {}", format))
            };
            if let Ok(date) = parsed {
                if let Some(month) = self.accept(date.year(), date.month()) {
                    return Some(month);
                }
            }
        }
        None
    }

    /// Parse a date string returned by the vision-language model.
    ///
    /// Falls back to "any month name plus the first 2-4 digit number" when the
    /// flexible rules find nothing.
    pub fn parse_model_date(&self, raw: &str) -> Option<CalendarMonth> {
        if is_absent(raw) {
            return None;
        }
        if let Some(parsed) = self.parse_flexible(raw) {
            return Some(parsed);
        }

        let month = month_from_name(ANY_MONTH_RE.captures(raw)?.get(1)?.as_str())?;
        let year: i32 = ANY_NUMBER_RE.captures(raw)?.get(1)?.as_str().parse().ok()?;
        self.accept(fold_two_digit_year(year), month)
    }

    /// Find a date printed next to one of `keywords`.
    ///
    /// Lines mentioning a licence are skipped, since licence numbers often carry years.
    pub fn find_labeled_date(&self, text: &str, keywords: &[&str]) -> Option<CalendarMonth> {
        if text.trim().is_empty() {
            return None;
        }
        let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        let lines: Vec<&str> = text.lines().collect();

        for (i, line) in lines.iter().enumerate() {
            let lowered = line.to_lowercase();
            if !keywords.iter().any(|k| lowered.contains(k.as_str())) {
                continue;
            }
            if lowered.contains("lic") {
                continue;
            }
            let scope = match lines.get(i + 1) {
                Some(next) => format!("{} {}", line, next),
                None => line.to_string(),
            };
            if let Some(found) = self.date_near_label(&scope) {
                return Some(found);
            }
        }

        let lowered_text = text.to_lowercase();
        for keyword in &keywords {
            // Lowercasing can change byte offsets for non-ASCII text
            let Some(start) = lowered_text.find(keyword.as_str()) else {
                continue;
            };
            let Some(tail) = text.get(start..) else {
                continue;
            };
            let window: String = tail.chars().take(LABEL_WINDOW_CHARS).collect();
            if let Some(found) = self.date_near_label(&window) {
                return Some(found);
            }
        }
        None
    }

    fn date_near_label(&self, scope: &str) -> Option<CalendarMonth> {
        if let Some(token) = DATE_TOKEN_RE.find(scope) {
            if let Some(parsed) = self.parse_flexible(token.as_str()) {
                return Some(parsed);
            }
        }

        // Month token and a year up to a few characters later, e.g. "AUG. / 2024"
        let years: Vec<_> = CANDIDATE_YEAR_RE.find_iter(scope).collect();
        if years.is_empty() {
            return None;
        }
        for month in MONTH_TOKEN_RE.find_iter(scope) {
            for year in &years {
                if year.start() >= month.end() && year.start() - month.end() <= MONTH_YEAR_MAX_GAP {
                    if let Some(parsed) = scope
                        .get(month.start()..year.end())
                        .and_then(|candidate| self.parse_flexible(candidate))
                    {
                        return Some(parsed);
                    }
                }
            }
        }
        None
    }

    /// Every date-shaped token in `text`, parsed, sorted ascending and de-duplicated.
    ///
    /// Bare years inside an already matched month-name or numeric token are skipped,
    /// so `06/2022` contributes one candidate and not a second `2022-01`.
    pub fn find_date_candidates(&self, text: &str) -> Vec<CalendarMonth> {
        let mut candidates = BTreeSet::new();
        let mut consumed: Vec<(usize, usize)> = Vec::new();

        for token in CANDIDATE_MONTH_NAME_RE.find_iter(text) {
            consumed.push((token.start(), token.end()));
            if let Some(parsed) = self.parse_flexible(token.as_str()) {
                candidates.insert(parsed);
            }
        }

        for token in CANDIDATE_NUMERIC_RE.find_iter(text) {
            consumed.push((token.start(), token.end()));
            // Numeric tokens only count as MM/YY; prices like 35.70 must not become years
            if let Some(parsed) = self.parse_numeric(token.as_str()) {
                candidates.insert(parsed);
            }
        }

        for token in CANDIDATE_YEAR_RE.find_iter(text) {
            let inside = consumed
                .iter()
                .any(|(start, end)| token.start() >= *start && token.end() <= *end);
            if inside {
                continue;
            }
            if let Some(parsed) = token.as_str().parse::<i32>().ok().and_then(|y| self.accept(y, 1)) {
                candidates.insert(parsed);
            }
        }

        candidates.into_iter().collect()
    }
}

/// [`DateParser::parse_flexible`] with the current year
pub fn parse_flexible(raw: &str) -> Option<CalendarMonth> {
    DateParser::new().parse_flexible(raw)
}

/// [`DateParser::parse_model_date`] with the current year
pub fn parse_model_date(raw: &str) -> Option<CalendarMonth> {
    DateParser::new().parse_model_date(raw)
}

/// [`DateParser::find_labeled_date`] with the current year
pub fn find_labeled_date(text: &str, keywords: &[&str]) -> Option<CalendarMonth> {
    DateParser::new().find_labeled_date(text, keywords)
}

/// [`DateParser::find_date_candidates`] with the current year
pub fn find_date_candidates(text: &str) -> Vec<CalendarMonth> {
    DateParser::new().find_date_candidates(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cm(year: i32, month: u32) -> CalendarMonth {
        CalendarMonth::new(year, month).expect("valid month")
    }

    fn parser() -> DateParser {
        DateParser::with_current_year(2026)
    }

    #[test]
    fn test_month_arithmetic() {
        assert_eq!(cm(2024, 1).add_months(24), cm(2026, 1));
        assert_eq!(cm(2024, 11).add_months(3), cm(2025, 2));
        assert_eq!(cm(2024, 1).add_months(-1), cm(2023, 12));
        assert_eq!(cm(2024, 3).add_months(-27), cm(2021, 12));
    }

    #[test]
    fn test_add_months_to_date_clamps_day() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).expect("valid date");
        assert_eq!(
            add_months_to_date(date, 1),
            NaiveDate::from_ymd_opt(2024, 2, 28).expect("valid date")
        );
        let date = NaiveDate::from_ymd_opt(2023, 12, 15).expect("valid date");
        assert_eq!(
            add_months_to_date(date, -12),
            NaiveDate::from_ymd_opt(2022, 12, 15).expect("valid date")
        );
    }

    #[test]
    fn test_display_and_from_str() {
        assert_eq!(cm(2026, 1).to_string(), "2026-01");
        assert_eq!("2023-10".parse::<CalendarMonth>(), Ok(cm(2023, 10)));
        assert!("2023-13".parse::<CalendarMonth>().is_err());
        assert!("garbage".parse::<CalendarMonth>().is_err());
    }

    #[test]
    fn test_serde_uses_year_month_string() {
        let json = serde_json::to_string(&cm(2025, 6)).expect("serialize");
        assert_eq!(json, "\"2025-06\"");
        let back: CalendarMonth = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, cm(2025, 6));
    }

    #[test]
    fn test_parse_month_name_forms() {
        let p = parser();
        assert_eq!(p.parse_flexible("DEC.26"), Some(cm(2026, 12)));
        assert_eq!(p.parse_flexible("Aug 2024"), Some(cm(2024, 8)));
        assert_eq!(p.parse_flexible("JUL.2028"), Some(cm(2028, 7)));
        assert_eq!(p.parse_flexible("Sept-95"), Some(cm(1995, 9)));
    }

    #[test]
    fn test_parse_numeric_forms() {
        let p = parser();
        assert_eq!(p.parse_flexible("10/2023"), Some(cm(2023, 10)));
        assert_eq!(p.parse_flexible("09-25"), Some(cm(2025, 9)));
        assert_eq!(p.parse_flexible("3.2024"), Some(cm(2024, 3)));
    }

    #[test]
    fn test_parse_loose_forms() {
        let p = parser();
        assert_eq!(p.parse_flexible("2023"), Some(cm(2023, 1)));
        assert_eq!(p.parse_flexible("24"), Some(cm(2024, 1)));
    }

    #[test]
    fn test_parse_rejects_absent_and_out_of_range() {
        let p = parser();
        assert_eq!(p.parse_flexible(""), None);
        assert_eq!(p.parse_flexible("N/A"), None);
        assert_eq!(p.parse_flexible("Information not available"), None);
        assert_eq!(p.parse_flexible("JAN 1985"), None);
        assert_eq!(p.parse_flexible("2099"), None);
        assert_eq!(p.parse_flexible("no digits here"), None);
    }

    #[test]
    fn test_parse_model_date_fallback() {
        let p = parser();
        assert_eq!(p.parse_model_date("DEC.26"), Some(cm(2026, 12)));
        assert_eq!(p.parse_model_date("unknown"), None);
        assert_eq!(p.parse_model_date(""), None);
    }

    #[test]
    fn test_find_labeled_date_same_line() {
        let p = parser();
        let text = "DOLO-650\nB.No. D0983759\nMFG. AUG. 2024\nEXP. JUL. 2028";
        assert_eq!(p.find_labeled_date(text, MANUFACTURE_LABELS), Some(cm(2024, 8)));
        assert_eq!(p.find_labeled_date(text, EXPIRY_LABELS), Some(cm(2028, 7)));
    }

    #[test]
    fn test_find_labeled_date_skips_licence_lines() {
        let p = parser();
        let text = "Mfg. Lic. No. KTK/25/2012\nMFD 10/2023";
        assert_eq!(p.find_labeled_date(text, MANUFACTURE_LABELS), Some(cm(2023, 10)));
    }

    #[test]
    fn test_candidates_skip_years_inside_tokens() {
        let p = parser();
        let candidates = p.find_date_candidates("MFG 06/2022 EXP 06/2025");
        assert_eq!(candidates, vec![cm(2022, 6), cm(2025, 6)]);
    }

    #[test]
    fn test_candidates_ignore_prices() {
        let p = parser();
        let candidates = p.find_date_candidates("M.R.P. Rs. 35.70 per strip");
        assert!(candidates.is_empty());
    }
}
