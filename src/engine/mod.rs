//! # Veridoc Engine — verification orchestrator
//!
//! The engine owns the capability handles and the fraud pattern cache and
//! drives one submission through the six verification stages in order:
//!
//! - `analysis` capabilities — image quality, text extraction (external,
//!   timeout-guarded, fail-soft)
//! - `detection` — structure matching, fraud heuristics, metadata
//!   consistency (in-process, deterministic)
//! - `classify` — feature extraction plus the classifier capability
//! - `fusion` — weighted scores, verdict, warnings, recommendations
//! - `cache` — content-hash record behind duplicate detection
//!
//! A stage failure never aborts a verification; the stage degrades and
//! the report says so. The single fatal error is an empty byte buffer.

pub mod cache;
pub mod fusion;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use uuid::Uuid;

use crate::analysis::{
    ImageAnalyzer, ImageQualityResult, OcrResult, PixelStatsAnalyzer, PlainTextExtractor,
    TextExtractor,
};
use crate::classify::{
    extract_features, ClassificationResult, DocumentClassifier, PrototypeClassifier,
};
use crate::detection::{
    check_consistency, match_structure, ConsistencyResult, FraudDetector, FraudResult,
    StructureResult,
};
use crate::{VeridocError, VeridocResult};

pub use cache::{CacheEntry, FraudPatternCache, DEFAULT_RETENTION_DAYS};
pub use fusion::{FusionWeights, Verdict};

// ─── Configuration ─────────────────────────────────────────────────

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VeridocConfig {
    /// Per-stage fusion weights
    pub weights: FusionWeights,
    /// Confidence must strictly exceed this for an authentic verdict
    pub authentic_min_confidence: f64,
    /// Fraud score must stay strictly below this for an authentic verdict
    pub authentic_max_fraud_score: f64,
    /// Upper bound on each external capability call
    pub capability_timeout_ms: u64,
    /// Language hint forwarded to the text extractor
    pub ocr_language: String,
    /// Retention window used by cache maintenance sweeps
    pub cache_retention_days: i64,
}

impl Default for VeridocConfig {
    fn default() -> Self {
        Self {
            weights: FusionWeights::default(),
            authentic_min_confidence: 0.7,
            authentic_max_fraud_score: 0.3,
            capability_timeout_ms: 5_000,
            ocr_language: "eng".to_string(),
            cache_retention_days: cache::DEFAULT_RETENTION_DAYS,
        }
    }
}

// ─── Request Types ─────────────────────────────────────────────────

/// The document types the engine knows how to verify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    BusinessLicense,
    TaxDocument,
    BankStatement,
    IdDocument,
}

impl DocumentType {
    /// Every known type, in declared order. Classifier distributions and
    /// keyword tables index in this order.
    pub const ALL: [DocumentType; 5] = [
        DocumentType::Invoice,
        DocumentType::BusinessLicense,
        DocumentType::TaxDocument,
        DocumentType::BankStatement,
        DocumentType::IdDocument,
    ];
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invoice => write!(f, "invoice"),
            Self::BusinessLicense => write!(f, "business_license"),
            Self::TaxDocument => write!(f, "tax_document"),
            Self::BankStatement => write!(f, "bank_statement"),
            Self::IdDocument => write!(f, "id_document"),
        }
    }
}

/// What the submitter declared about the document. Every field is
/// optional; absent fields skip their consistency checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub expected_amount: Option<f64>,
    pub expected_date: Option<NaiveDate>,
    pub issuer_name: Option<String>,
}

/// One submission: raw bytes plus declarations. Immutable for the
/// duration of a verification.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub content: Vec<u8>,
    pub declared_type: DocumentType,
    pub metadata: DocumentMetadata,
}

// ─── Capabilities ──────────────────────────────────────────────────

/// The pluggable pieces of a verification engine. The defaults are the
/// built-in deterministic implementations and a fresh empty cache.
pub struct Capabilities {
    pub image_analyzer: Arc<dyn ImageAnalyzer>,
    pub text_extractor: Arc<dyn TextExtractor>,
    pub classifier: Arc<dyn DocumentClassifier>,
    pub fraud_cache: Arc<FraudPatternCache>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            image_analyzer: Arc::new(PixelStatsAnalyzer),
            text_extractor: Arc::new(PlainTextExtractor),
            classifier: Arc::new(PrototypeClassifier),
            fraud_cache: Arc::new(FraudPatternCache::new()),
        }
    }
}

// ─── Verification Report ───────────────────────────────────────────

/// Complete verification report. Assembled once at the end of the
/// pipeline and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub request_id: Uuid,
    pub verified_at: DateTime<Utc>,
    pub document_type: DocumentType,
    pub image_quality: ImageQualityResult,
    pub text_extraction: OcrResult,
    pub structure: StructureResult,
    pub fraud: FraudResult,
    pub classification: ClassificationResult,
    pub consistency: ConsistencyResult,
    /// Fused confidence, in [0, 1]
    pub confidence: f64,
    /// Fraud stage score, in [0, 1]
    pub fraud_score: f64,
    pub authentic: bool,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub duration_ms: u64,
    pub engine_version: String,
}

// ─── Engine ────────────────────────────────────────────────────────

/// The verification engine. Cheap to share: all capability handles are
/// `Arc`s and `verify` takes `&self`, so independent submissions may run
/// concurrently on one engine.
pub struct VeridocEngine {
    config: VeridocConfig,
    image_analyzer: Arc<dyn ImageAnalyzer>,
    text_extractor: Arc<dyn TextExtractor>,
    classifier: Arc<dyn DocumentClassifier>,
    fraud_detector: FraudDetector,
    fraud_cache: Arc<FraudPatternCache>,
}

impl VeridocEngine {
    pub fn new(config: VeridocConfig) -> Self {
        Self::with_capabilities(config, Capabilities::default())
    }

    /// Build an engine around injected capabilities (external OCR, a
    /// trained classifier, a shared cache).
    pub fn with_capabilities(config: VeridocConfig, capabilities: Capabilities) -> Self {
        Self {
            config,
            image_analyzer: capabilities.image_analyzer,
            text_extractor: capabilities.text_extractor,
            classifier: capabilities.classifier,
            fraud_detector: FraudDetector::new(capabilities.fraud_cache.clone()),
            fraud_cache: capabilities.fraud_cache,
        }
    }

    pub fn config(&self) -> &VeridocConfig {
        &self.config
    }

    /// The shared fraud pattern cache.
    pub fn cache(&self) -> &FraudPatternCache {
        &self.fraud_cache
    }

    /// Maintenance sweep: drop cache entries older than the window.
    /// Called by an external scheduler, never by `verify` itself.
    pub fn evict_stale_cache_entries(&self, retention_days: i64) -> usize {
        self.fraud_cache.evict_stale_entries(retention_days)
    }

    /// Main verification entry point — runs the full pipeline.
    pub async fn verify(&self, request: &VerificationRequest) -> VeridocResult<VerificationReport> {
        let start = std::time::Instant::now();

        if request.content.is_empty() {
            return Err(VeridocError::InvalidDocument(
                "document content is empty".to_string(),
            ));
        }

        let request_id = Uuid::new_v4();
        tracing::info!("═══════════════════════════════════════════════════════");
        tracing::info!(
            "Veridoc verification {}: {} bytes, declared {}",
            request_id,
            request.content.len(),
            request.declared_type
        );
        tracing::info!("═══════════════════════════════════════════════════════");

        // ── Step 1: Image quality (capability, timeout-guarded) ──
        let byte_size = request.content.len() as u64;
        let image_quality = match timeout(
            self.capability_timeout(),
            self.image_analyzer.analyze(&request.content),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!("Image analysis failed: {}", e);
                ImageQualityResult::degraded(byte_size, e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    "Image analysis timed out after {} ms",
                    self.config.capability_timeout_ms
                );
                ImageQualityResult::degraded(
                    byte_size,
                    format!("timed out after {} ms", self.config.capability_timeout_ms),
                )
            }
        };
        tracing::debug!(
            "Image quality: score {:.2} ({}x{}, {})",
            image_quality.score,
            image_quality.resolution.width,
            image_quality.resolution.height,
            image_quality.format
        );

        // ── Step 2: Text extraction (capability, timeout-guarded) ──
        let text_extraction = match timeout(
            self.capability_timeout(),
            self.text_extractor
                .extract(&request.content, &self.config.ocr_language),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!("Text extraction failed: {}", e);
                OcrResult::degraded(e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    "Text extraction timed out after {} ms",
                    self.config.capability_timeout_ms
                );
                OcrResult::degraded(format!(
                    "timed out after {} ms",
                    self.config.capability_timeout_ms
                ))
            }
        };
        tracing::debug!(
            "Text extraction: {} words, confidence {:.2}",
            text_extraction.word_count,
            text_extraction.confidence
        );

        // ── Step 3: Structure matching ──
        let structure = match_structure(&text_extraction.text, request.declared_type);

        // ── Step 4: Fraud heuristics ──
        let fraud = self.fraud_detector.examine(request, &text_extraction.text);
        if !fraud.flags.is_empty() {
            tracing::warn!(
                "Fraud checks raised {} flag(s), score {:.2}",
                fraud.flags.len(),
                fraud.score
            );
        }

        // ── Step 5: Classification (capability, timeout-guarded) ──
        let features = extract_features(&text_extraction.text);
        let classification = match timeout(
            self.capability_timeout(),
            self.classifier.classify(&features),
        )
        .await
        {
            Ok(Ok(distribution)) => {
                ClassificationResult::from_distribution(request.declared_type, distribution)
            }
            Ok(Err(e)) => {
                tracing::warn!("Classification failed: {}", e);
                ClassificationResult::degraded(request.declared_type, e.to_string())
            }
            Err(_) => {
                tracing::warn!(
                    "Classification timed out after {} ms",
                    self.config.capability_timeout_ms
                );
                ClassificationResult::degraded(
                    request.declared_type,
                    format!("timed out after {} ms", self.config.capability_timeout_ms),
                )
            }
        };
        tracing::debug!(
            "Classification: predicted {} at {:.2} (declared {})",
            classification.predicted_type,
            classification.confidence,
            classification.expected_type
        );

        // ── Step 6: Metadata consistency ──
        let consistency = check_consistency(&request.metadata, &text_extraction.text);

        // ── Step 7: Fuse scores and assemble the report ──
        let verdict = fusion::fuse(
            &self.config,
            &image_quality,
            &text_extraction,
            &structure,
            &fraud,
            &classification,
            &consistency,
        );
        let warnings = fusion::build_warnings(
            &image_quality,
            &text_extraction,
            &structure,
            &fraud,
            &classification,
        );
        let recommendations =
            fusion::build_recommendations(&image_quality, &text_extraction, &fraud, &consistency);

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Verification complete: confidence {:.2}, fraud {:.2}, authentic={}, {} warning(s), {}ms",
            verdict.confidence,
            verdict.fraud_score,
            verdict.authentic,
            warnings.len(),
            duration_ms
        );

        Ok(VerificationReport {
            request_id,
            verified_at: Utc::now(),
            document_type: request.declared_type,
            image_quality,
            text_extraction,
            structure,
            fraud,
            classification,
            consistency,
            confidence: verdict.confidence,
            fraud_score: verdict.fraud_score,
            authentic: verdict.authentic,
            warnings,
            recommendations,
            duration_ms,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    fn capability_timeout(&self) -> Duration {
        Duration::from_millis(self.config.capability_timeout_ms)
    }
}

impl Default for VeridocEngine {
    fn default() -> Self {
        Self::new(VeridocConfig::default())
    }
}
