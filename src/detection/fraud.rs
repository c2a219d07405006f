//! Fraud heuristics
//!
//! Five independent checks run in a fixed order against the raw bytes, the
//! extracted text, and the declared metadata:
//!
//! 1. **Duplicate submission** — content hash already in the fraud pattern
//!    cache (the only check with a side effect: first sightings are
//!    recorded)
//! 2. **Manipulated image** — byte-level capture-trace inspection of the
//!    container (missing camera/scanner metadata, alpha channel on a scan
//!    format, sub-print density)
//! 3. **Inconsistent dates** — any date in the text parsing to the future
//!    or before 2000
//! 4. **Suspicious text patterns** — placeholder words and filler runs
//! 5. **Metadata mismatch** — declared amount absent from the text
//!
//! Each check tolerates missing input: no text, no metadata, or an unknown
//! container contributes no evidence and raises no flag. The fraud score is
//! the flagged fraction of the five checks.

use std::sync::Arc;

use aho_corasick::AhoCorasick;
use chrono::{Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::engine::cache::FraudPatternCache;
use crate::engine::VerificationRequest;

use super::structure::extract_date_tokens;

/// Number of heuristic checks; the score denominator.
const CHECK_COUNT: usize = 5;

/// Documents dated before this year are treated as implausible.
const MIN_PLAUSIBLE_YEAR: i32 = 2000;

/// Printed documents below this density read as screen-resolution exports.
const MIN_PLAUSIBLE_DPI: f64 = 72.0;

const PLACEHOLDER_WORDS: &[&str] = &[
    "test",
    "sample",
    "dummy",
    "fake",
    "example",
    "placeholder",
    "lorem ipsum",
];

static PLACEHOLDER_AC: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(PLACEHOLDER_WORDS)
        .unwrap()
});

static LONG_DIGIT_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{10,}\b").unwrap());

// ─── Result ─────────────────────────────────────────────────────────

/// Outcome of the five fraud checks, in evaluation order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudResult {
    pub duplicate_submission: bool,
    pub manipulated_image: bool,
    pub inconsistent_dates: bool,
    pub suspicious_patterns: bool,
    pub metadata_mismatch: bool,
    /// Flagged checks / total checks, in [0, 1]
    pub score: f64,
    /// One human-readable line per raised flag, in check order
    pub flags: Vec<String>,
}

// ─── Detector ───────────────────────────────────────────────────────

/// Runs the heuristic battery; owns the handle to the shared fraud cache.
pub struct FraudDetector {
    cache: Arc<FraudPatternCache>,
}

impl FraudDetector {
    pub fn new(cache: Arc<FraudPatternCache>) -> Self {
        Self { cache }
    }

    /// Examine one submission. `text` is the OCR output for the same bytes;
    /// pass an empty string when extraction produced nothing.
    pub fn examine(&self, request: &VerificationRequest, text: &str) -> FraudResult {
        let mut flags = Vec::new();

        // Check 1: duplicate submission
        let content_hash = FraudPatternCache::hash_content(&request.content);
        let duplicate = match self.cache.check_and_record(
            &content_hash,
            request.declared_type,
            &request.metadata,
        ) {
            Some(prior) => {
                flags.push(format!(
                    "Duplicate submission: identical content first seen {}",
                    prior.first_seen.format("%Y-%m-%d %H:%M UTC")
                ));
                true
            }
            None => false,
        };

        // Check 2: manipulated image
        let manipulated = match tampering_indicators(&request.content) {
            indicators if indicators.len() >= 2 => {
                flags.push(format!(
                    "Image tampering indicators: {}",
                    indicators.join(", ")
                ));
                true
            }
            _ => false,
        };

        // Check 3: inconsistent dates
        let implausible = implausible_dates(text);
        let inconsistent_dates = if implausible.is_empty() {
            false
        } else {
            flags.push(format!(
                "Implausible dates in document text: {}",
                implausible.join(", ")
            ));
            true
        };

        // Check 4: suspicious text patterns
        let suspicious_reasons = suspicious_patterns(text);
        let suspicious = if suspicious_reasons.is_empty() {
            false
        } else {
            flags.push(format!(
                "Suspicious text patterns: {}",
                suspicious_reasons.join(", ")
            ));
            true
        };

        // Check 5: declared amount absent from text
        let mismatch = match request.metadata.expected_amount {
            Some(amount) if !amount_present(text, amount) => {
                flags.push(format!(
                    "Declared amount {} not found in document text",
                    amount
                ));
                true
            }
            _ => false,
        };

        let raised = flags.len();
        tracing::debug!("Fraud examination: {}/{} checks flagged", raised, CHECK_COUNT);

        FraudResult {
            duplicate_submission: duplicate,
            manipulated_image: manipulated,
            inconsistent_dates,
            suspicious_patterns: suspicious,
            metadata_mismatch: mismatch,
            score: (raised as f64 / CHECK_COUNT as f64).clamp(0.0, 1.0),
            flags,
        }
    }
}

// ─── Capture-Trace Inspection ───────────────────────────────────────

/// What the container bytes reveal about how the image was produced
#[derive(Debug, Default)]
struct CaptureTrace {
    known_container: bool,
    has_capture_metadata: bool,
    has_alpha: bool,
    dpi: Option<f64>,
}

fn tampering_indicators(content: &[u8]) -> Vec<&'static str> {
    let trace = inspect_capture_trace(content);
    let mut indicators = Vec::new();
    if trace.known_container && !trace.has_capture_metadata {
        indicators.push("missing embedded capture metadata");
    }
    if trace.has_alpha {
        indicators.push("alpha channel present on a scan format");
    }
    if matches!(trace.dpi, Some(dpi) if dpi < MIN_PLAUSIBLE_DPI) {
        indicators.push("density below print resolution");
    }
    indicators
}

fn inspect_capture_trace(content: &[u8]) -> CaptureTrace {
    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    if content.len() >= 3 && content[0] == 0xFF && content[1] == 0xD8 && content[2] == 0xFF {
        inspect_jpeg(content)
    } else if content.starts_with(&PNG_SIGNATURE) {
        inspect_png(content)
    } else {
        // Unknown container: no evidence either way
        CaptureTrace::default()
    }
}

/// Walk JPEG marker segments for Exif and JFIF density headers.
fn inspect_jpeg(bytes: &[u8]) -> CaptureTrace {
    let mut trace = CaptureTrace {
        known_container: true,
        ..CaptureTrace::default()
    };
    let mut i = 2usize;
    while i + 4 <= bytes.len() {
        if bytes[i] != 0xFF {
            break;
        }
        let marker = bytes[i + 1];
        // Standalone markers carry no length field
        if marker == 0x01 || (0xD0..=0xD8).contains(&marker) {
            i += 2;
            continue;
        }
        // Start of entropy-coded data or end of image
        if marker == 0xDA || marker == 0xD9 {
            break;
        }
        let len = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
        if len < 2 || i + 2 + len > bytes.len() {
            break;
        }
        let segment = &bytes[i + 4..i + 2 + len];
        match marker {
            0xE1 if segment.starts_with(b"Exif\0\0") => trace.has_capture_metadata = true,
            0xE0 if segment.starts_with(b"JFIF\0") && segment.len() >= 12 => {
                let x_density = u16::from_be_bytes([segment[8], segment[9]]) as f64;
                match segment[7] {
                    1 => trace.dpi = Some(x_density),
                    2 => trace.dpi = Some(x_density * 2.54),
                    _ => {}
                }
            }
            _ => {}
        }
        i += 2 + len;
    }
    trace
}

/// Walk PNG chunks for alpha, embedded Exif, and physical density.
fn inspect_png(bytes: &[u8]) -> CaptureTrace {
    let mut trace = CaptureTrace {
        known_container: true,
        ..CaptureTrace::default()
    };
    let mut i = 8usize;
    while i + 8 <= bytes.len() {
        let len = u32::from_be_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]) as usize;
        let chunk_type = [bytes[i + 4], bytes[i + 5], bytes[i + 6], bytes[i + 7]];
        let data_start = i + 8;
        if data_start + len > bytes.len() {
            break;
        }
        let data = &bytes[data_start..data_start + len];
        match &chunk_type {
            b"IHDR" if len >= 13 => {
                // Color types 4 (gray+alpha) and 6 (RGBA)
                if data[9] == 4 || data[9] == 6 {
                    trace.has_alpha = true;
                }
            }
            b"tRNS" => trace.has_alpha = true,
            b"eXIf" => trace.has_capture_metadata = true,
            b"pHYs" if len >= 9 => {
                if data[8] == 1 {
                    let ppu = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as f64;
                    trace.dpi = Some(ppu * 0.0254);
                }
            }
            b"IEND" => break,
            _ => {}
        }
        // Skip data and CRC
        i = data_start + len + 4;
    }
    trace
}

// ─── Date Plausibility ──────────────────────────────────────────────

fn implausible_dates(text: &str) -> Vec<String> {
    let today = Utc::now().date_naive();
    extract_date_tokens(text)
        .into_iter()
        .filter(|token| {
            matches!(parse_date_token(token),
                     Some(date) if date > today || date.year() < MIN_PLAUSIBLE_YEAR)
        })
        .collect()
}

/// Parse one extracted date token, trying the formats the structure
/// patterns admit. Ambiguous numeric order falls back from month-first to
/// day-first; two-digit years go through `%y` so "3/15/24" does not read
/// as the year 24. Unparseable tokens are skipped, not flagged.
fn parse_date_token(token: &str) -> Option<NaiveDate> {
    const NAMED_FORMATS: &[&str] = &[
        "%B %d, %Y", "%B %d %Y", "%b %d, %Y", "%b %d %Y", "%d %B %Y", "%d %b %Y",
    ];

    if token.chars().any(|c| c.is_ascii_alphabetic()) {
        let cleaned = strip_ordinals(token).replace('.', "");
        let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        return NAMED_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok());
    }

    let fields: Vec<&str> = token.split(['/', '-', '.']).collect();
    let formats: &[&str] = if fields.first().map_or(false, |f| f.len() == 4) {
        &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"]
    } else if fields.last().map_or(false, |f| f.len() <= 2) {
        &["%m/%d/%y", "%d/%m/%y", "%m-%d-%y", "%d-%m-%y", "%m.%d.%y", "%d.%m.%y"]
    } else {
        &["%m/%d/%Y", "%d/%m/%Y", "%m-%d-%Y", "%d-%m-%Y", "%m.%d.%Y", "%d.%m.%Y"]
    };
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(token, fmt).ok())
}

/// Remove English ordinal suffixes ("15th" -> "15") so chrono can parse.
fn strip_ordinals(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let bytes = token.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() && i + 2 <= bytes.len() {
            let rest = &token[i..];
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            let after = &rest[digits.len()..];
            let lower = after.to_ascii_lowercase();
            if lower.starts_with("st") || lower.starts_with("nd") || lower.starts_with("rd")
                || lower.starts_with("th")
            {
                out.push_str(&digits);
                i += digits.len() + 2;
                continue;
            }
        }
        let ch = token[i..].chars().next().unwrap_or('\0');
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

// ─── Suspicious Patterns ────────────────────────────────────────────

fn suspicious_patterns(text: &str) -> Vec<String> {
    let mut reasons = Vec::new();
    if let Some(word) = isolated_placeholder_word(text) {
        reasons.push(format!("placeholder word \"{}\"", word));
    }
    if let Some(run) = filler_run(text) {
        reasons.push(format!("filler character run \"{}\"", run));
    }
    if let Some(m) = LONG_DIGIT_TOKEN_RE.find(text) {
        reasons.push(format!("numeric token of unusual length \"{}\"", m.as_str()));
    }
    reasons
}

/// First placeholder word that appears as a whole word, not inside a
/// larger word ("attest" must not trip on "test").
fn isolated_placeholder_word(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    for m in PLACEHOLDER_AC.find_iter(text) {
        let before_ok = m.start() == 0 || !bytes[m.start() - 1].is_ascii_alphanumeric();
        let after_ok = m.end() == bytes.len() || !bytes[m.end()].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return Some(text[m.start()..m.end()].to_string());
        }
    }
    None
}

/// Repeated-character filler: six of the same non-whitespace character in
/// a row, or five of the same digit. Run-scanned by hand since the regex
/// crate has no backreferences.
fn filler_run(text: &str) -> Option<String> {
    let mut run_char = '\0';
    let mut run_len = 0usize;
    for ch in text.chars() {
        if ch == run_char {
            run_len += 1;
        } else {
            run_char = ch;
            run_len = 1;
        }
        if ch.is_whitespace() {
            continue;
        }
        let threshold = if ch.is_ascii_digit() { 5 } else { 6 };
        if run_len == threshold {
            return Some(std::iter::repeat(ch).take(threshold).collect());
        }
    }
    None
}

// ─── Amount Presence ────────────────────────────────────────────────

/// Does the minimal decimal rendering of the declared amount occur in the
/// text once thousands separators are stripped?
fn amount_present(text: &str, amount: f64) -> bool {
    let needle = format!("{}", amount);
    text.replace(',', "").contains(&needle)
}
