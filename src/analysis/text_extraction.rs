//! Text extraction contract
//!
//! OCR is an external capability: real deployments plug a service or
//! engine in behind [`TextExtractor`]. What the pipeline needs from every
//! implementation is the same shape of answer — the text, per-word
//! confidence aggregated into one figure, and a derived text-quality
//! score — so the derivation lives here in [`OcrResult::from_words`] and
//! implementations only supply words and confidences.
//!
//! [`PlainTextExtractor`] is the built-in adapter for text-native
//! submissions and tests: it treats the byte buffer as UTF-8 and
//! synthesizes word confidences from character cleanliness.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::VeridocResult;

/// Per-word confidence above this counts as a high-confidence word.
pub const HIGH_CONFIDENCE_WORD: f64 = 0.8;
/// Per-word confidence below this counts as a low-confidence word.
pub const LOW_CONFIDENCE_WORD: f64 = 0.6;

/// Extracted text and extraction quality for one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    /// Mean per-word confidence, in [0, 1]
    pub confidence: f64,
    pub word_count: usize,
    pub line_count: usize,
    pub block_count: usize,
    pub high_confidence_words: usize,
    pub low_confidence_words: usize,
    /// Composite extraction quality, in [0, 1]
    pub text_quality: f64,
    pub error: Option<String>,
}

impl OcrResult {
    /// Derive the aggregate fields from extracted text and its per-word
    /// confidences. Every extractor reports through this so quality means
    /// the same thing regardless of the backing engine.
    pub fn from_words(text: String, word_confidences: &[f64]) -> Self {
        let word_count = word_confidences.len();
        let high_confidence_words = word_confidences
            .iter()
            .filter(|&&c| c > HIGH_CONFIDENCE_WORD)
            .count();
        let low_confidence_words = word_confidences
            .iter()
            .filter(|&&c| c < LOW_CONFIDENCE_WORD)
            .count();
        let confidence = if word_count == 0 {
            0.0
        } else {
            word_confidences.iter().sum::<f64>() / word_count as f64
        };
        let text_quality = if word_count == 0 {
            0.0
        } else {
            let high_frac = high_confidence_words as f64 / word_count as f64;
            let low_frac = low_confidence_words as f64 / word_count as f64;
            (0.7 * confidence + 0.3 * high_frac - 0.2 * low_frac).clamp(0.0, 1.0)
        };
        let line_count = text.lines().filter(|l| !l.trim().is_empty()).count();
        let block_count = text
            .split("\n\n")
            .filter(|b| !b.trim().is_empty())
            .count();

        Self {
            text,
            confidence,
            word_count,
            line_count,
            block_count,
            high_confidence_words,
            low_confidence_words,
            text_quality,
            error: None,
        }
    }

    /// Empty result for a failed or timed-out extraction.
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            word_count: 0,
            line_count: 0,
            block_count: 0,
            high_confidence_words: 0,
            low_confidence_words: 0,
            text_quality: 0.0,
            error: Some(reason.into()),
        }
    }
}

/// Capability contract for text extraction. Fail-soft: implementations
/// should prefer returning [`OcrResult::degraded`] over `Err`; the engine
/// absorbs both the same way.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, content: &[u8], language: &str) -> VeridocResult<OcrResult>;
}

/// Built-in adapter for text-native document content.
#[derive(Debug, Default)]
pub struct PlainTextExtractor;

/// Share of replacement characters beyond which the buffer is not text.
const MAX_REPLACEMENT_FRACTION: f64 = 0.10;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, content: &[u8], _language: &str) -> VeridocResult<OcrResult> {
        let text = String::from_utf8_lossy(content).into_owned();
        let total_chars = text.chars().count();
        let replaced = text.chars().filter(|&c| c == '\u{FFFD}').count();
        if total_chars > 0 && replaced as f64 / total_chars as f64 > MAX_REPLACEMENT_FRACTION {
            tracing::debug!(
                "Plain-text extraction rejected buffer: {}/{} replacement characters",
                replaced,
                total_chars
            );
            return Ok(OcrResult::degraded("content is not valid UTF-8 text"));
        }

        let confidences: Vec<f64> = text.split_whitespace().map(word_confidence).collect();
        Ok(OcrResult::from_words(text, &confidences))
    }
}

/// Cleanliness of one token: the share of characters that are printable
/// ASCII. Mojibake and control characters read as low confidence.
fn word_confidence(word: &str) -> f64 {
    let total = word.chars().count();
    if total == 0 {
        return 0.0;
    }
    let clean = word.chars().filter(|c| c.is_ascii_graphic()).count();
    clean as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clean_text_extracts_with_full_confidence() {
        let text = b"Invoice #: INV-2024-0317\nTotal Due: $1,250.00\n\nThank you.";
        let result = PlainTextExtractor.extract(text, "eng").await.unwrap();
        assert!(result.error.is_none());
        assert_eq!(result.word_count, 8);
        assert_eq!(result.line_count, 3);
        assert_eq!(result.block_count, 2);
        assert_eq!(result.high_confidence_words, 8);
        assert_eq!(result.low_confidence_words, 0);
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert!((result.text_quality - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_binary_buffer_degrades() {
        let bytes = [0xFFu8, 0xFE, 0x92, 0x01, 0x80, 0xAB, 0xCD, 0xEF];
        let result = PlainTextExtractor.extract(&bytes, "eng").await.unwrap();
        assert!(result.error.is_some());
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.text_quality, 0.0);
        assert!(result.text.is_empty());
    }

    #[test]
    fn test_from_words_derivation() {
        let result = OcrResult::from_words("alpha beta gamma".to_string(), &[0.9, 0.9, 0.5]);
        assert_eq!(result.word_count, 3);
        assert_eq!(result.high_confidence_words, 2);
        assert_eq!(result.low_confidence_words, 1);
        assert!((result.confidence - (2.3 / 3.0)).abs() < 1e-9);
        // 0.7 * 0.7667 + 0.3 * 0.6667 - 0.2 * 0.3333
        let expected = 0.7 * (2.3 / 3.0) + 0.3 * (2.0 / 3.0) - 0.2 * (1.0 / 3.0);
        assert!((result.text_quality - expected).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_boundaries_are_strict() {
        let result = OcrResult::from_words("a b".to_string(), &[0.8, 0.6]);
        assert_eq!(result.high_confidence_words, 0);
        assert_eq!(result.low_confidence_words, 0);
    }

    #[test]
    fn test_no_words_means_zero_quality() {
        let result = OcrResult::from_words(String::new(), &[]);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.text_quality, 0.0);
        assert_eq!(result.block_count, 0);
    }

    #[test]
    fn test_quality_is_clamped() {
        let result = OcrResult::from_words("noisy".to_string(), &[0.1]);
        assert!(result.text_quality >= 0.0);
    }
}
