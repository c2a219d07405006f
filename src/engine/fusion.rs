//! Weighted signal fusion
//!
//! Folds the six stage results into one confidence figure, the fraud
//! score, and the authenticity verdict, then derives the human-facing
//! warnings and recommendations. Weights and thresholds are engine-wide
//! policy, not per-request knobs.

use serde::{Deserialize, Serialize};

use crate::analysis::image_quality::{MIN_ACCEPTABLE_HEIGHT, MIN_ACCEPTABLE_WIDTH};
use crate::analysis::{ImageQualityResult, OcrResult};
use crate::classify::ClassificationResult;
use crate::detection::{ConsistencyResult, FraudResult, StructureResult};

use super::VeridocConfig;

/// Warning thresholds
pub const LOW_IMAGE_SCORE: f64 = 0.5;
pub const LOW_OCR_CONFIDENCE: f64 = 0.6;
pub const LOW_STRUCTURE_SCORE: f64 = 0.5;
pub const LOW_CONSISTENCY_SCORE: f64 = 0.5;

/// Recommendation thresholds
pub const MIN_SHARPNESS: f64 = 0.5;
pub const LOW_CONFIDENCE_WORD_FRACTION: f64 = 0.3;
pub const MANUAL_REVIEW_FRAUD_SCORE: f64 = 0.3;

/// Per-stage fusion weights. The defaults are the documented production
/// values and sum to 1.0; `fraud_inverse` applies to `1 - fraud_score`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionWeights {
    pub image_quality: f64,
    pub text_quality: f64,
    pub structure: f64,
    pub fraud_inverse: f64,
    pub classification: f64,
    pub consistency: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            image_quality: 0.15,
            text_quality: 0.25,
            structure: 0.20,
            fraud_inverse: 0.20,
            classification: 0.15,
            consistency: 0.05,
        }
    }
}

impl FusionWeights {
    pub fn sum(&self) -> f64 {
        self.image_quality
            + self.text_quality
            + self.structure
            + self.fraud_inverse
            + self.classification
            + self.consistency
    }
}

/// The fused outcome of one verification
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Verdict {
    pub confidence: f64,
    pub fraud_score: f64,
    pub authentic: bool,
}

impl Verdict {
    /// Apply the authenticity policy: confidence strictly above the floor
    /// AND fraud strictly below the ceiling. Inputs are clamped first.
    pub fn derive(config: &VeridocConfig, confidence: f64, fraud_score: f64) -> Self {
        let confidence = clamp_unit(confidence);
        let fraud_score = clamp_unit(fraud_score);
        Self {
            confidence,
            fraud_score,
            authentic: confidence > config.authentic_min_confidence
                && fraud_score < config.authentic_max_fraud_score,
        }
    }
}

/// Clamp a score into [0, 1]; non-finite values collapse to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Weighted linear fusion of the six stage scores.
///
/// The classification stage contributes its confidence only when the
/// predicted type agrees with the declared one; a mismatch contributes
/// zero and is surfaced separately as a warning.
pub fn fuse(
    config: &VeridocConfig,
    image: &ImageQualityResult,
    ocr: &OcrResult,
    structure: &StructureResult,
    fraud: &FraudResult,
    classification: &ClassificationResult,
    consistency: &ConsistencyResult,
) -> Verdict {
    let w = &config.weights;
    let classification_score = if classification.matches {
        classification.confidence
    } else {
        0.0
    };
    let confidence = w.image_quality * clamp_unit(image.score)
        + w.text_quality * clamp_unit(ocr.text_quality)
        + w.structure * clamp_unit(structure.score)
        + w.fraud_inverse * (1.0 - clamp_unit(fraud.score))
        + w.classification * clamp_unit(classification_score)
        + w.consistency * clamp_unit(consistency.score);

    let verdict = Verdict::derive(config, confidence, fraud.score);
    tracing::debug!(
        "Fused verdict: confidence {:.3}, fraud {:.3}, authentic {}",
        verdict.confidence,
        verdict.fraud_score,
        verdict.authentic
    );
    verdict
}

/// Assemble the warning list in fixed rule order.
pub fn build_warnings(
    image: &ImageQualityResult,
    ocr: &OcrResult,
    structure: &StructureResult,
    fraud: &FraudResult,
    classification: &ClassificationResult,
) -> Vec<String> {
    let mut warnings = Vec::new();

    if image.score < LOW_IMAGE_SCORE {
        warnings.push(format!("Low image quality score ({:.2})", image.score));
    }
    if ocr.confidence < LOW_OCR_CONFIDENCE {
        warnings.push(format!("Low OCR confidence ({:.2})", ocr.confidence));
    }
    if let Some(reason) = &image.error {
        warnings.push(format!("Image analysis unavailable: {}", reason));
    }
    if let Some(reason) = &ocr.error {
        warnings.push(format!("Text extraction unavailable: {}", reason));
    }
    if let Some(reason) = &classification.error {
        warnings.push(format!("Document classification unavailable: {}", reason));
    }
    if structure.score < LOW_STRUCTURE_SCORE {
        warnings.push(format!(
            "Document structure does not match the declared type (score {:.2})",
            structure.score
        ));
    }
    warnings.extend(fraud.flags.iter().cloned());
    if !classification.matches {
        warnings.push(format!(
            "Document classified as {}, declared as {}",
            classification.predicted_type, classification.expected_type
        ));
    }

    warnings
}

/// Assemble the recommendation list in fixed rule order.
pub fn build_recommendations(
    image: &ImageQualityResult,
    ocr: &OcrResult,
    fraud: &FraudResult,
    consistency: &ConsistencyResult,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if !image.resolution.acceptable {
        recommendations.push(format!(
            "Rescan the document at {}x{} or higher resolution",
            MIN_ACCEPTABLE_WIDTH, MIN_ACCEPTABLE_HEIGHT
        ));
    }
    if image.sharpness < MIN_SHARPNESS {
        recommendations.push("Use a flatbed scanner or steadier capture; the image is soft".to_string());
    }
    if ocr.word_count > 0 {
        let low_fraction = ocr.low_confidence_words as f64 / ocr.word_count as f64;
        if low_fraction > LOW_CONFIDENCE_WORD_FRACTION {
            recommendations.push(format!(
                "Resubmit a cleaner scan; {:.0}% of words extracted with low confidence",
                low_fraction * 100.0
            ));
        }
    }
    if fraud.score > MANUAL_REVIEW_FRAUD_SCORE {
        recommendations.push("Route this submission for manual review".to_string());
    }
    if consistency.score < LOW_CONSISTENCY_SCORE {
        recommendations.push(
            "Confirm the declared amount, date, and issuer against the document".to_string(),
        );
    }

    recommendations
}
