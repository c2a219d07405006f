//! Document structure pattern matching
//!
//! Pure text analysis: does the extracted text contain the structural
//! elements a genuine document of the declared type would carry? Six
//! generic element checks run for every type, plus a per-type marker
//! battery (invoice numbers, license numbers, account patterns). The
//! structure score is the fraction of applicable checks that passed.
//!
//! Deterministic by construction: same text + declared type always
//! produces the same result. There is no failure mode; text that matches
//! nothing simply scores 0.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::engine::DocumentType;

// ─── Generic Element Patterns ───────────────────────────────────────

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    // Slash/dash/dot numeric dates in either field order, plus month-name
    // forms ("March 15, 2024", "15 March 2024").
    let months = r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|jul(?:y)?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";
    Regex::new(&format!(
        r"(?i)\b(?:\d{{1,2}}[/.\-]\d{{1,2}}[/.\-]\d{{2,4}}|\d{{4}}[/.\-]\d{{1,2}}[/.\-]\d{{1,2}}|(?:{months})\.?\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}}|\d{{1,2}}(?:st|nd|rd|th)?\s+(?:{months})\.?,?\s+\d{{4}})\b"
    ))
    .unwrap()
});

static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:[$€£]\s?\d[\d,]*(?:\.\d{1,2})?|(?:usd|eur|gbp)\s?\d[\d,]*(?:\.\d{1,2})?|\b\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?\b|\b\d+\.\d{2}\b)")
        .unwrap()
});

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    // US street shapes: house number, name words, street-type suffix
    Regex::new(r"(?i)\b\d{1,6}\s+[A-Za-z][A-Za-z.' ]{2,40}\s+(?:street|st|avenue|ave|road|rd|boulevard|blvd|lane|ln|drive|dr|court|ct|place|pl|way|circle|cir|suite|ste)\b\.?")
        .unwrap()
});

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap()
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    // Separators are required so a bare 10-digit run does not pass as a phone
    Regex::new(r"(?:\+?1[ .\-]?)?(?:\(\d{3}\)[ .\-]?|\d{3}[ .\-])\d{3}[ .\-]\d{4}\b").unwrap()
});

// ─── Type-Specific Markers ──────────────────────────────────────────

static INVOICE_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    // The identifier token must contain a digit ("invoice for" is not one)
    Regex::new(r"(?i)\b(?:invoice|inv)\s*(?:no\.?|number|num)?[ :#.\-]*(?:[A-Za-z]{0,5}[-/]?)?\d[A-Za-z0-9\-/]*")
        .unwrap()
});

static DUE_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:due\s+date|payment\s+due|due\s+(?:on|by))\b").unwrap());

static LINE_ITEMS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:qty|quantity|unit\s+price|subtotal|line\s+total|item\s+description|description\s+of\s+(?:goods|services))\b")
        .unwrap()
});

static LICENSE_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\blicen[cs]e\s*(?:no\.?|number|num)?[ :#.\-]*(?:[A-Za-z]{0,5}[-/]?)?\d[A-Za-z0-9\-/]*")
        .unwrap()
});

static EXPIRATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:expiration|expiry|expires?|valid\s+(?:through|until|thru))\b").unwrap()
});

static AUTHORITY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:issued\s+by|issuing\s+authority|department\s+of|state\s+of|city\s+of|county\s+of)\b")
        .unwrap()
});

static BANK_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:bank|credit\s+union|savings\s+(?:bank|association))\b").unwrap()
});

static ACCOUNT_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    // Account identifiers are often partially masked on statements
    Regex::new(r"(?i)\baccount\s*(?:no\.?|number|num)?[ :#.]*[Xx*\d][Xx*\d\-]{3,}").unwrap()
});

static BALANCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bbalance\b").unwrap());

static INVOICE_MARKERS: &[(&str, &Lazy<Regex>)] = &[
    ("invoice_number", &INVOICE_NUMBER_RE),
    ("due_date", &DUE_DATE_RE),
    ("line_items", &LINE_ITEMS_RE),
];

static BUSINESS_LICENSE_MARKERS: &[(&str, &Lazy<Regex>)] = &[
    ("license_number", &LICENSE_NUMBER_RE),
    ("expiration", &EXPIRATION_RE),
    ("issuing_authority", &AUTHORITY_RE),
];

static BANK_STATEMENT_MARKERS: &[(&str, &Lazy<Regex>)] = &[
    ("bank_name", &BANK_NAME_RE),
    ("account_number", &ACCOUNT_NUMBER_RE),
    ("balance", &BALANCE_RE),
];

fn markers_for(doc_type: DocumentType) -> &'static [(&'static str, &'static Lazy<Regex>)] {
    match doc_type {
        DocumentType::Invoice => INVOICE_MARKERS,
        DocumentType::BusinessLicense => BUSINESS_LICENSE_MARKERS,
        DocumentType::BankStatement => BANK_STATEMENT_MARKERS,
        // No reliable cross-jurisdiction markers; generic checks only
        DocumentType::TaxDocument | DocumentType::IdDocument => &[],
    }
}

// ─── Results ────────────────────────────────────────────────────────

/// One type-specific marker and whether the text contained it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerCheck {
    pub marker: String,
    pub present: bool,
}

/// Structural element presence for one document text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureResult {
    pub has_numeric_tokens: bool,
    pub has_dates: bool,
    pub has_amounts: bool,
    pub has_addresses: bool,
    pub has_emails: bool,
    pub has_phone_numbers: bool,
    pub type_markers: Vec<MarkerCheck>,
    /// Passed checks / applicable checks, in [0, 1]
    pub score: f64,
}

/// Match the extracted text against the structural expectations of the
/// declared document type.
pub fn match_structure(text: &str, declared_type: DocumentType) -> StructureResult {
    let generic = [
        NUMERIC_RE.is_match(text),
        DATE_RE.is_match(text),
        AMOUNT_RE.is_match(text),
        ADDRESS_RE.is_match(text),
        EMAIL_RE.is_match(text),
        PHONE_RE.is_match(text),
    ];

    let type_markers: Vec<MarkerCheck> = markers_for(declared_type)
        .iter()
        .map(|(name, re)| MarkerCheck {
            marker: (*name).to_string(),
            present: re.is_match(text),
        })
        .collect();

    let passed =
        generic.iter().filter(|p| **p).count() + type_markers.iter().filter(|m| m.present).count();
    let applicable = generic.len() + type_markers.len();

    let result = StructureResult {
        has_numeric_tokens: generic[0],
        has_dates: generic[1],
        has_amounts: generic[2],
        has_addresses: generic[3],
        has_emails: generic[4],
        has_phone_numbers: generic[5],
        type_markers,
        score: (passed as f64 / applicable as f64).clamp(0.0, 1.0),
    };
    tracing::debug!(
        "Structure match for {:?}: {}/{} checks passed",
        declared_type,
        passed,
        applicable
    );
    result
}

/// Date tokens found in the text, in document order.
///
/// Shared with the fraud date-plausibility check so both stages agree on
/// what counts as a date.
pub(crate) fn extract_date_tokens(text: &str) -> Vec<String> {
    DATE_RE.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// How many currency-amount tokens the text carries. Feeds the
/// classification feature vector.
pub(crate) fn count_amounts(text: &str) -> usize {
    AMOUNT_RE.find_iter(text).count()
}
