//! Manufacture/expiry reconciliation.
//!
//! Given the dates read next to their labels (either may be missing) and the full OCR
//! text as secondary evidence, produce an ordered pair with manufacture <= expiry.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::{CalendarMonth, DateParser};

/// Shelf life assumed when nothing better is known
pub const DEFAULT_SHELF_LIFE_MONTHS: i32 = 24;
/// Window used when the text holds no date evidence at all
pub const NO_EVIDENCE_WINDOW_MONTHS: i32 = 12;

lazy_static! {
    static ref SHELF_LIFE_LABEL_RE: Regex = Regex::new(
        r"(?i)\b(best\s*before|use\s*before|shelf\s*life)\s*(\d{1,2})\s*months?\b"
    )
    .expect("Shelf life pattern should be valid");
    static ref SHELF_LIFE_FROM_MFG_RE: Regex = Regex::new(
        r"(?i)\b(\d{1,2})\s*months?\s*(?:from|after)\s*(?:mfg|manufacture|manufacturing)\b"
    )
    .expect("Shelf life from manufacture pattern should be valid");
}

/// Which row of the decision table produced the pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationRule {
    /// Inverted pair replaced by min/max of the text's candidates
    InvertedFromCandidates,
    /// Inverted pair swapped
    InvertedSwapped,
    ExpiryFromShelfLife,
    ExpiryFromCandidate,
    ExpiryDefault,
    ManufactureFromCandidate,
    ManufactureFromShelfLife,
    ManufactureDefault,
    BothFromCandidates,
    BothFromSingleCandidate,
    BothFromToday,
    Unchanged,
}

impl ReconciliationRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationRule::InvertedFromCandidates => "inverted_from_candidates",
            ReconciliationRule::InvertedSwapped => "inverted_swapped",
            ReconciliationRule::ExpiryFromShelfLife => "expiry_from_shelf_life",
            ReconciliationRule::ExpiryFromCandidate => "expiry_from_candidate",
            ReconciliationRule::ExpiryDefault => "expiry_default",
            ReconciliationRule::ManufactureFromCandidate => "manufacture_from_candidate",
            ReconciliationRule::ManufactureFromShelfLife => "manufacture_from_shelf_life",
            ReconciliationRule::ManufactureDefault => "manufacture_default",
            ReconciliationRule::BothFromCandidates => "both_from_candidates",
            ReconciliationRule::BothFromSingleCandidate => "both_from_single_candidate",
            ReconciliationRule::BothFromToday => "both_from_today",
            ReconciliationRule::Unchanged => "unchanged",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciledDates {
    pub manufacture: CalendarMonth,
    pub expiry: CalendarMonth,
    pub rule: ReconciliationRule,
}

/// Shelf life in months from phrases like "shelf life 24 months" or
/// "36 months from manufacture". Zero is treated as not stated.
pub fn shelf_life_months(text: &str) -> Option<u32> {
    let months = if let Some(caps) = SHELF_LIFE_LABEL_RE.captures(text) {
        caps.get(2)?.as_str().parse::<u32>().ok()
    } else if let Some(caps) = SHELF_LIFE_FROM_MFG_RE.captures(text) {
        caps.get(1)?.as_str().parse::<u32>().ok()
    } else {
        None
    };
    months.filter(|m| *m > 0)
}

/// Resolve a consistent manufacture/expiry pair.
///
/// The first applicable rule wins:
///
/// | input | result |
/// |---|---|
/// | both, expiry < manufacture | min/max of >= 2 candidates, else swap |
/// | manufacture only | + shelf life, else earliest later candidate, else + 24 months |
/// | expiry only | latest earlier candidate, else - shelf life, else - 24 months |
/// | neither | min/max of >= 2 candidates, else (d, d + 24), else (today, today + 12) |
/// | both, ordered | unchanged |
pub fn reconcile(
    text: &str,
    manufacture: Option<CalendarMonth>,
    expiry: Option<CalendarMonth>,
    today: CalendarMonth,
) -> ReconciledDates {
    let parser = DateParser::with_current_year(today.year());
    let candidates = parser.find_date_candidates(text);
    let shelf_life = shelf_life_months(text).map(|m| m as i32);

    let (manufacture, expiry, rule) = match (manufacture, expiry) {
        (Some(mfd), Some(exp)) if exp < mfd => match (candidates.first(), candidates.last()) {
            (Some(first), Some(last)) if candidates.len() >= 2 => {
                (*first, *last, ReconciliationRule::InvertedFromCandidates)
            }
            _ => (exp, mfd, ReconciliationRule::InvertedSwapped),
        },
        (Some(mfd), Some(exp)) => (mfd, exp, ReconciliationRule::Unchanged),
        (Some(mfd), None) => {
            if let Some(months) = shelf_life {
                (mfd, mfd.add_months(months), ReconciliationRule::ExpiryFromShelfLife)
            } else if let Some(later) = candidates.iter().find(|c| **c > mfd) {
                (mfd, *later, ReconciliationRule::ExpiryFromCandidate)
            } else {
                (
                    mfd,
                    mfd.add_months(DEFAULT_SHELF_LIFE_MONTHS),
                    ReconciliationRule::ExpiryDefault,
                )
            }
        }
        (None, Some(exp)) => {
            if let Some(earlier) = candidates.iter().rev().find(|c| **c < exp) {
                (*earlier, exp, ReconciliationRule::ManufactureFromCandidate)
            } else if let Some(months) = shelf_life {
                (exp.add_months(-months), exp, ReconciliationRule::ManufactureFromShelfLife)
            } else {
                (
                    exp.add_months(-DEFAULT_SHELF_LIFE_MONTHS),
                    exp,
                    ReconciliationRule::ManufactureDefault,
                )
            }
        }
        (None, None) => match candidates.as_slice() {
            [] => (
                today,
                today.add_months(NO_EVIDENCE_WINDOW_MONTHS),
                ReconciliationRule::BothFromToday,
            ),
            [only] => (
                *only,
                only.add_months(DEFAULT_SHELF_LIFE_MONTHS),
                ReconciliationRule::BothFromSingleCandidate,
            ),
            [first, .., last] => (*first, *last, ReconciliationRule::BothFromCandidates),
        },
    };

    tracing::debug!(
        rule = rule.as_str(),
        candidates = candidates.len(),
        shelf_life_months = ?shelf_life,
        manufacture = %manufacture,
        expiry = %expiry,
        "Reconciled manufacture/expiry dates"
    );
    crate::observability::record_date_reconciliation(rule.as_str());

    ReconciledDates {
        manufacture,
        expiry,
        rule,
    }
}

/// Final safety net applied by the pipeline after reconciliation.
///
/// Missing manufacture becomes `today`, missing expiry becomes manufacture + 24 months,
/// and an inverted pair is swapped.
pub fn finalize_dates(
    manufacture: Option<CalendarMonth>,
    expiry: Option<CalendarMonth>,
    today: CalendarMonth,
) -> (CalendarMonth, CalendarMonth) {
    let manufacture = manufacture.unwrap_or(today);
    let expiry = expiry.unwrap_or_else(|| manufacture.add_months(DEFAULT_SHELF_LIFE_MONTHS));
    if expiry < manufacture {
        tracing::warn!(%manufacture, %expiry, "Expiry before manufacture, swapping");
        (expiry, manufacture)
    } else {
        (manufacture, expiry)
    }
}
