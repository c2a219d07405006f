//! End-to-end verification pipeline tests
//!
//! Drives `VeridocEngine` through complete submissions: a clean invoice,
//! duplicate resubmission, a stalled capability, the single fatal error,
//! cache maintenance, and report rendering. Capability stubs stand in for
//! external OCR and image services so outcomes are deterministic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use veridoc::engine::{CacheEntry, DEFAULT_RETENTION_DAYS};
use veridoc::{
    render_report, Capabilities, DocumentMetadata, DocumentType, ImageAnalyzer,
    ImageQualityResult, OcrResult, ReportFormat, Resolution, TextExtractor,
    VerificationRequest, VeridocConfig, VeridocEngine, VeridocError, VeridocResult,
};

// ─── Fixtures ───────────────────────────────────────────────────────

const INVOICE_TEXT: &str = "\
ACME SUPPLY CO\n\
123 Market Street, Springfield\n\
billing@acmesupply.com | (555) 123-4567\n\
Invoice #: INV-2024-0317\n\
Invoice Date: 3/15/2024    Due Date: 4/14/2024\n\
Qty  Description        Unit Price   Amount\n\
2    Copper fittings    $125.00      $250.00\n\
Subtotal: $250.00\n\
Total Due: $1,250.00\n";

fn invoice_metadata() -> DocumentMetadata {
    DocumentMetadata {
        expected_amount: Some(1250.0),
        expected_date: NaiveDate::from_ymd_opt(2024, 3, 15),
        issuer_name: Some("Acme Supply Co".to_string()),
    }
}

fn invoice_request(content: Vec<u8>) -> VerificationRequest {
    VerificationRequest {
        content,
        declared_type: DocumentType::Invoice,
        metadata: invoice_metadata(),
    }
}

/// PNG-shaped byte stream with a clean capture trace: RGB color type,
/// embedded Exif, 300 DPI density. CRCs are junk; nothing decodes it.
fn clean_scan_bytes() -> Vec<u8> {
    let mut out = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    let ihdr: Vec<u8> = vec![0, 0, 0, 100, 0, 0, 0, 100, 8, 2, 0, 0, 0];
    push_chunk(&mut out, b"IHDR", &ihdr);
    push_chunk(&mut out, b"eXIf", &[0x4D, 0x4D, 0, 42]);
    let ppm = (300.0f64 / 0.0254) as u32;
    let mut phys = Vec::new();
    phys.extend_from_slice(&ppm.to_be_bytes());
    phys.extend_from_slice(&ppm.to_be_bytes());
    phys.push(1);
    push_chunk(&mut out, b"pHYs", &phys);
    push_chunk(&mut out, b"IEND", &[]);
    out
}

fn push_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(data);
    out.extend_from_slice(&[0, 0, 0, 0]); // CRC, unchecked
}

// ─── Capability Stubs ───────────────────────────────────────────────

/// Image analyzer that reports a fixed result regardless of content.
struct FixedImageAnalyzer(ImageQualityResult);

#[async_trait]
impl ImageAnalyzer for FixedImageAnalyzer {
    async fn analyze(&self, _content: &[u8]) -> VeridocResult<ImageQualityResult> {
        Ok(self.0.clone())
    }
}

/// Text extractor that returns fixed text with uniform word confidence.
struct FixedTextExtractor {
    text: String,
    word_confidence: f64,
}

#[async_trait]
impl TextExtractor for FixedTextExtractor {
    async fn extract(&self, _content: &[u8], _language: &str) -> VeridocResult<OcrResult> {
        let confidences: Vec<f64> = self
            .text
            .split_whitespace()
            .map(|_| self.word_confidence)
            .collect();
        Ok(OcrResult::from_words(self.text.clone(), &confidences))
    }
}

/// Extractor that outlives any reasonable capability timeout.
struct StalledTextExtractor;

#[async_trait]
impl TextExtractor for StalledTextExtractor {
    async fn extract(&self, _content: &[u8], _language: &str) -> VeridocResult<OcrResult> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        unreachable!("the engine must cancel this capability call")
    }
}

fn good_scan_result() -> ImageQualityResult {
    ImageQualityResult {
        resolution: Resolution {
            width: 1700,
            height: 2200,
            acceptable: true,
        },
        sharpness: 0.8,
        brightness: 0.7,
        contrast: 0.55,
        color_balance_ok: true,
        byte_size: 200_000,
        format: "png".to_string(),
        score: 0.9,
        error: None,
    }
}

fn stubbed_engine(config: VeridocConfig) -> VeridocEngine {
    VeridocEngine::with_capabilities(
        config,
        Capabilities {
            image_analyzer: Arc::new(FixedImageAnalyzer(good_scan_result())),
            text_extractor: Arc::new(FixedTextExtractor {
                text: INVOICE_TEXT.to_string(),
                word_confidence: 0.95,
            }),
            ..Capabilities::default()
        },
    )
}

// ─── Full Pipeline ──────────────────────────────────────────────────

#[tokio::test]
async fn test_clean_invoice_verifies_as_authentic() {
    let engine = stubbed_engine(VeridocConfig::default());
    let report = engine
        .verify(&invoice_request(clean_scan_bytes()))
        .await
        .expect("verification must succeed");

    assert_eq!(report.document_type, DocumentType::Invoice);
    assert!(report.authentic, "confidence was {}", report.confidence);
    assert!(
        report.confidence > 0.85 && report.confidence < 0.95,
        "confidence was {}",
        report.confidence
    );
    assert_eq!(report.fraud_score, 0.0);
    assert!((report.structure.score - 1.0).abs() < 1e-9);
    assert_eq!(report.consistency.score, 1.0);
    assert_eq!(report.classification.predicted_type, DocumentType::Invoice);
    assert!(report.classification.matches);
    assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);
    assert!(
        report.recommendations.is_empty(),
        "recommendations: {:?}",
        report.recommendations
    );
    assert!(!report.engine_version.is_empty());
}

#[tokio::test]
async fn test_resubmission_raises_the_duplicate_flag() {
    let engine = stubbed_engine(VeridocConfig::default());
    let request = invoice_request(clean_scan_bytes());

    let first = engine.verify(&request).await.unwrap();
    assert!(!first.fraud.duplicate_submission);
    assert_eq!(first.fraud_score, 0.0);

    let second = engine.verify(&request).await.unwrap();
    assert!(second.fraud.duplicate_submission);
    assert!((second.fraud_score - 0.2).abs() < 1e-9);
    assert!(second.fraud_score > first.fraud_score);
    assert!(
        second
            .warnings
            .iter()
            .any(|w| w.starts_with("Duplicate submission")),
        "warnings: {:?}",
        second.warnings
    );
    // one duplicate flag alone stays below the fraud ceiling
    assert!(second.authentic);
}

#[tokio::test]
async fn test_stalled_extractor_degrades_instead_of_failing() {
    let config = VeridocConfig {
        capability_timeout_ms: 50,
        ..VeridocConfig::default()
    };
    let engine = VeridocEngine::with_capabilities(
        config,
        Capabilities {
            image_analyzer: Arc::new(FixedImageAnalyzer(good_scan_result())),
            text_extractor: Arc::new(StalledTextExtractor),
            ..Capabilities::default()
        },
    );

    let report = engine
        .verify(&invoice_request(clean_scan_bytes()))
        .await
        .expect("a stage timeout must not abort the verification");

    assert!(report.text_extraction.error.is_some());
    assert_eq!(report.text_extraction.word_count, 0);
    assert_eq!(report.text_extraction.confidence, 0.0);
    assert!(!report.authentic);
    assert!(
        report
            .warnings
            .iter()
            .any(|w| w.contains("Text extraction unavailable") && w.contains("timed out")),
        "warnings: {:?}",
        report.warnings
    );
}

#[tokio::test]
async fn test_empty_content_is_the_only_fatal_error() {
    let engine = VeridocEngine::default();
    let request = VerificationRequest {
        content: Vec::new(),
        declared_type: DocumentType::Invoice,
        metadata: DocumentMetadata::default(),
    };
    let err = engine.verify(&request).await.unwrap_err();
    assert!(matches!(err, VeridocError::InvalidDocument(_)));
}

#[tokio::test]
async fn test_default_capabilities_degrade_on_binary_scan() {
    // A real PNG decodes for quality assessment but is not extractable
    // text; the built-in stack must absorb that without an error.
    let buffer = image::ImageBuffer::from_fn(1000, 800, |x, _y| {
        if x % 10 < 2 {
            image::Luma([20u8])
        } else {
            image::Luma([235u8])
        }
    });
    let mut png = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageLuma8(buffer)
        .write_to(&mut png, image::ImageFormat::Png)
        .unwrap();

    let engine = VeridocEngine::default();
    let report = engine
        .verify(&invoice_request(png.into_inner()))
        .await
        .expect("built-in capabilities must be fail-soft");

    assert!(report.image_quality.error.is_none());
    assert!(report.image_quality.score > 0.7);
    assert!(report.text_extraction.error.is_some());
    assert!(!report.authentic);
    assert!(
        report
            .warnings
            .iter()
            .any(|w| w.contains("Text extraction unavailable")),
        "warnings: {:?}",
        report.warnings
    );
}

// ─── Cache Maintenance ──────────────────────────────────────────────

#[tokio::test]
async fn test_cache_eviction_through_the_engine() {
    let engine = VeridocEngine::default();
    engine.cache().insert(
        "stale".to_string(),
        CacheEntry {
            first_seen: Utc::now() - chrono::Duration::days(40),
            document_type: DocumentType::Invoice,
            metadata: DocumentMetadata::default(),
        },
    );
    engine.cache().insert(
        "fresh".to_string(),
        CacheEntry {
            first_seen: Utc::now() - chrono::Duration::days(1),
            document_type: DocumentType::Invoice,
            metadata: DocumentMetadata::default(),
        },
    );

    let evicted = engine.evict_stale_cache_entries(DEFAULT_RETENTION_DAYS);
    assert_eq!(evicted, 1);
    assert_eq!(engine.cache().len(), 1);
}

// ─── Report Rendering ───────────────────────────────────────────────

#[tokio::test]
async fn test_report_renders_as_json_and_markdown() {
    let engine = stubbed_engine(VeridocConfig::default());
    let report = engine
        .verify(&invoice_request(clean_scan_bytes()))
        .await
        .unwrap();

    let json = render_report(&report, ReportFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["authentic"], serde_json::Value::Bool(true));
    assert_eq!(value["document_type"], "invoice");
    assert!(value["request_id"].is_string());
    assert!(value["confidence"].is_number());
    assert!(value["image_quality"]["score"].is_number());

    let markdown = render_report(&report, ReportFormat::Markdown).unwrap();
    assert!(markdown.starts_with("# Veridoc Verification Report"));
    assert!(markdown.contains("## Signal Breakdown"));
    assert!(markdown.contains("AUTHENTIC"));
    assert!(markdown.contains("predicted `invoice`"));
}

#[tokio::test]
async fn test_cross_typed_submission_is_caught() {
    // Invoice text submitted with a bank-statement declaration: the
    // classifier disagrees and structure finds no bank markers it needs.
    let engine = stubbed_engine(VeridocConfig::default());
    let request = VerificationRequest {
        content: clean_scan_bytes(),
        declared_type: DocumentType::BankStatement,
        metadata: DocumentMetadata::default(),
    };
    let report = engine.verify(&request).await.unwrap();

    assert!(!report.classification.matches);
    assert_eq!(report.classification.predicted_type, DocumentType::Invoice);
    assert!(
        report
            .warnings
            .iter()
            .any(|w| w.contains("classified as invoice, declared as bank_statement")),
        "warnings: {:?}",
        report.warnings
    );
}
