//! # veridoc — Document Authenticity & Fraud-Scoring Engine
//!
//! Standalone verification engine for submitted document images and scans.
//! Fuses independent analytical signals — image quality, extracted text
//! quality, structural pattern matching, fraud heuristics, type
//! classification, and declared-metadata consistency — into a single
//! authenticity verdict with explicit weighting and thresholds.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      VeridocEngine                          │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────────┐                │
//! │  │ Image    │ │ Text     │ │ Document     │   capability   │
//! │  │ Analyzer │ │ Extractor│ │ Classifier   │   traits,      │
//! │  └────┬─────┘ └────┬─────┘ └──────┬───────┘   fail-soft    │
//! │       │            │              │                         │
//! │  ┌────▼────────────▼──────────────▼─────────────────────┐  │
//! │  │  Sequential Verification Stages                      │  │
//! │  │  Quality │ OCR │ Structure │ Fraud │ Class │ Consist │  │
//! │  └────────────────────────┬─────────────────────────────┘  │
//! │                           │                                 │
//! │  ┌────────────────────────▼─────────────────────────────┐  │
//! │  │ Weighted Fusion → Verdict → Warnings → Report        │  │
//! │  │        Fraud Pattern Cache (SHA-256 keyed)           │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Capabilities
//!
//! - **Image Quality Assessment**: resolution, sharpness, brightness,
//!   contrast, color balance — composite score with a neutral fallback
//! - **Text Extraction Contract**: pluggable OCR behind a trait, with
//!   per-word confidence aggregation and a plain-text reference adapter
//! - **Structure Matching**: per-type regex batteries (invoice numbers,
//!   license numbers, account patterns, dates, amounts, addresses)
//! - **Fraud Heuristics**: duplicate submission, tampering indicators,
//!   implausible dates, placeholder text, declared-amount mismatch
//! - **Type Classification**: deterministic feature extraction plus a
//!   prototype classifier, pluggable behind a trait
//! - **Score Fusion**: fixed-weight linear fusion with documented
//!   thresholds, warnings, and actionable recommendations
//! - **Fraud Pattern Cache**: process-wide content hashes with explicit
//!   time-based eviction for repeat-submission detection

pub mod analysis;
pub mod classify;
pub mod detection;
pub mod engine;
pub mod report;

// Re-exports for convenience
pub use analysis::{ImageAnalyzer, ImageQualityResult, OcrResult, PixelStatsAnalyzer,
                   PlainTextExtractor, Resolution, TextExtractor};
pub use classify::{ClassificationResult, DocumentClassifier, FeatureVector,
                   PrototypeClassifier, TypeProbability};
pub use detection::{ConsistencyResult, FraudDetector, FraudResult, MarkerCheck,
                    StructureResult};
pub use engine::{Capabilities, DocumentMetadata, DocumentType, FraudPatternCache,
                 FusionWeights, VerificationReport, VerificationRequest, VeridocConfig,
                 VeridocEngine};
pub use report::{render_report, ReportFormat};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VeridocError {
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Image analysis error: {0}")]
    ImageAnalysis(String),

    #[error("Text extraction error: {0}")]
    TextExtraction(String),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type VeridocResult<T> = Result<T, VeridocError>;
