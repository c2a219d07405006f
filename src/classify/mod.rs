//! Document type classification
//!
//! Two halves with a trait seam between them. Feature extraction is
//! engine-owned and deterministic: the same text always produces the same
//! fixed-width vector, so classifier outputs are comparable across
//! backends. The classifier itself is a capability: deployments can plug
//! a learned model in behind [`DocumentClassifier`], and the built-in
//! [`PrototypeClassifier`] scores the vector against per-type prototype
//! weights with no I/O at all.

use aho_corasick::AhoCorasick;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::detection::structure;
use crate::engine::DocumentType;
use crate::VeridocResult;

/// Fixed width of every feature vector. Slots beyond the live features
/// are reserved so trained models keep their input shape across releases.
pub const FEATURE_DIM: usize = 16;

/// Confidence reported when classification was unavailable.
pub const NEUTRAL_CONFIDENCE: f64 = 0.5;

/// Live feature slots:
///
/// | idx | feature                                    |
/// |-----|--------------------------------------------|
/// | 0   | word count, as a fraction of 500           |
/// | 1-5 | per-type keyword presence, in declared-type order |
/// | 6   | tokens containing digits / all tokens      |
/// | 7   | date tokens, as a fraction of 5            |
/// | 8   | amount tokens, as a fraction of 10         |
/// | 9-15| reserved, always zero                      |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f64; FEATURE_DIM]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

const INVOICE_KEYWORDS: &[&str] = &[
    "invoice", "bill to", "due date", "subtotal", "payment terms", "remit to", "qty",
    "unit price",
];
const LICENSE_KEYWORDS: &[&str] = &[
    "business license", "license number", "licensee", "issuing authority", "permit",
    "certificate of authority", "registration",
];
const TAX_KEYWORDS: &[&str] = &[
    "internal revenue", "form 1040", "w-2", "1099", "taxable income", "withholding",
    "deduction", "tax year", "filing status",
];
const BANK_KEYWORDS: &[&str] = &[
    "bank statement", "account number", "beginning balance", "ending balance", "deposit",
    "withdrawal", "routing number", "statement period",
];
const ID_KEYWORDS: &[&str] = &[
    "date of birth", "identification", "passport", "driver license", "driver's license",
    "nationality", "id number", "place of birth",
];

const KEYWORD_SETS: [&[&str]; 5] = [
    INVOICE_KEYWORDS,
    LICENSE_KEYWORDS,
    TAX_KEYWORDS,
    BANK_KEYWORDS,
    ID_KEYWORDS,
];

static KEYWORD_MATCHERS: Lazy<Vec<AhoCorasick>> = Lazy::new(|| {
    KEYWORD_SETS
        .iter()
        .map(|set| {
            AhoCorasick::builder()
                .ascii_case_insensitive(true)
                .build(*set)
                .unwrap()
        })
        .collect()
});

/// Deterministic feature extraction over extracted text.
pub fn extract_features(text: &str) -> FeatureVector {
    let mut features = [0.0f64; FEATURE_DIM];

    let tokens: Vec<&str> = text.split_whitespace().collect();
    features[0] = (tokens.len() as f64 / 500.0).clamp(0.0, 1.0);

    for (i, matcher) in KEYWORD_MATCHERS.iter().enumerate() {
        features[1 + i] = if matcher.is_match(text) { 1.0 } else { 0.0 };
    }

    if !tokens.is_empty() {
        let numeric = tokens
            .iter()
            .filter(|t| t.chars().any(|c| c.is_ascii_digit()))
            .count();
        features[6] = (numeric as f64 / tokens.len() as f64).clamp(0.0, 1.0);
    }
    features[7] = (structure::extract_date_tokens(text).len() as f64 / 5.0).clamp(0.0, 1.0);
    features[8] = (structure::count_amounts(text) as f64 / 10.0).clamp(0.0, 1.0);

    FeatureVector(features)
}

// ─── Classification Results ─────────────────────────────────────────

/// One entry of a classifier's probability distribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeProbability {
    pub document_type: DocumentType,
    pub probability: f64,
}

/// Classifier verdict against the declared type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub predicted_type: DocumentType,
    pub expected_type: DocumentType,
    pub matches: bool,
    /// Probability assigned to the predicted type, in [0, 1]
    pub confidence: f64,
    pub distribution: Vec<TypeProbability>,
    pub error: Option<String>,
}

impl ClassificationResult {
    /// Reduce a probability distribution to a verdict: argmax against the
    /// declared type. An empty distribution degrades instead of panicking.
    pub fn from_distribution(
        expected_type: DocumentType,
        distribution: Vec<TypeProbability>,
    ) -> Self {
        let best = distribution
            .iter()
            .max_by(|a, b| a.probability.total_cmp(&b.probability));
        match best {
            Some(best) => {
                let predicted_type = best.document_type;
                Self {
                    predicted_type,
                    expected_type,
                    matches: predicted_type == expected_type,
                    confidence: best.probability.clamp(0.0, 1.0),
                    distribution,
                    error: None,
                }
            }
            None => Self::degraded(expected_type, "classifier returned no distribution"),
        }
    }

    /// Neutral verdict for an unavailable classifier: the declared type is
    /// taken at face value at half confidence, so the document is not
    /// punished for an infrastructure fault.
    pub fn degraded(expected_type: DocumentType, reason: impl Into<String>) -> Self {
        let uniform = DocumentType::ALL
            .iter()
            .map(|&document_type| TypeProbability {
                document_type,
                probability: 1.0 / DocumentType::ALL.len() as f64,
            })
            .collect();
        Self {
            predicted_type: expected_type,
            expected_type,
            matches: true,
            confidence: NEUTRAL_CONFIDENCE,
            distribution: uniform,
            error: Some(reason.into()),
        }
    }
}

/// Capability contract for type classification.
#[async_trait]
pub trait DocumentClassifier: Send + Sync {
    /// Probability per known type for one feature vector. Need not be
    /// normalized by the caller's standards; the engine only compares and
    /// clamps.
    async fn classify(&self, features: &FeatureVector) -> VeridocResult<Vec<TypeProbability>>;
}

// ─── Built-in Prototype Classifier ──────────────────────────────────

/// Prototype weights over the nine live feature slots, one row per type
/// in declared-type order. The own-keyword indicator dominates; token
/// ratios corroborate.
const PROTOTYPES: [[f64; 9]; 5] = [
    // Invoice: amounts and due dates around its keyword set
    [0.2, 3.0, 0.0, 0.0, 0.0, 0.0, 0.4, 0.5, 1.0],
    // Business license: text-heavy, few amounts
    [0.2, 0.0, 3.0, 0.0, 0.0, 0.0, 0.2, 0.5, 0.1],
    // Tax document: dense numerics and amounts
    [0.3, 0.0, 0.0, 3.0, 0.0, 0.0, 0.8, 0.4, 0.8],
    // Bank statement: transaction tables, many dates and amounts
    [0.3, 0.0, 0.0, 0.0, 3.0, 0.0, 0.8, 0.8, 1.0],
    // ID document: short text, no amounts
    [0.1, 0.0, 0.0, 0.0, 0.0, 3.0, 0.3, 0.6, 0.0],
];

/// Scores below the floor are lifted to it before normalization so the
/// distribution never collapses to exact zeros.
const SCORE_FLOOR: f64 = 0.05;

/// Built-in deterministic classifier.
#[derive(Debug, Default)]
pub struct PrototypeClassifier;

#[async_trait]
impl DocumentClassifier for PrototypeClassifier {
    async fn classify(&self, features: &FeatureVector) -> VeridocResult<Vec<TypeProbability>> {
        let live = &features.as_slice()[..9];
        let scores: Vec<f64> = PROTOTYPES
            .iter()
            .map(|row| {
                row.iter()
                    .zip(live)
                    .map(|(w, f)| w * f)
                    .sum::<f64>()
                    .max(SCORE_FLOOR)
            })
            .collect();
        let total: f64 = scores.iter().sum();
        Ok(DocumentType::ALL
            .iter()
            .zip(scores)
            .map(|(&document_type, score)| TypeProbability {
                document_type,
                probability: score / total,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVOICE_TEXT: &str = "Invoice #: INV-2024-0317. Bill To: Initech. \
        Due Date: 4/14/2024. Qty 2, Unit Price $125.00, Subtotal $250.00, \
        Total Due: $1,250.00. Payment terms: net 30.";

    const BANK_TEXT: &str = "FIRST NATIONAL BANK STATEMENT. Statement period \
        01/01/2024 - 01/31/2024. Account Number ****1234. Beginning Balance \
        $1,000.00. Deposit $500.00 on 01/05/2024. Withdrawal $89.10 on \
        01/12/2024. Ending Balance $1,410.90.";

    #[test]
    fn test_feature_extraction_is_deterministic() {
        assert_eq!(extract_features(INVOICE_TEXT), extract_features(INVOICE_TEXT));
    }

    #[test]
    fn test_feature_slots() {
        let features = extract_features(INVOICE_TEXT);
        let f = features.as_slice();
        assert_eq!(f.len(), FEATURE_DIM);
        assert!(f[0] > 0.0 && f[0] < 0.2, "word ratio was {}", f[0]);
        assert_eq!(f[1], 1.0, "invoice keyword indicator");
        assert_eq!(f[5], 0.0, "id keyword indicator");
        assert!(f[6] > 0.0, "numeric ratio");
        assert!(f[8] > 0.0, "amount ratio");
        assert!(f[9..].iter().all(|&v| v == 0.0), "reserved slots stay zero");
    }

    #[test]
    fn test_empty_text_extracts_all_zero() {
        let features = extract_features("");
        assert!(features.as_slice().iter().all(|&v| v == 0.0));
    }

    #[tokio::test]
    async fn test_invoice_text_classifies_as_invoice() {
        let dist = PrototypeClassifier
            .classify(&extract_features(INVOICE_TEXT))
            .await
            .unwrap();
        let result = ClassificationResult::from_distribution(DocumentType::Invoice, dist);
        assert_eq!(result.predicted_type, DocumentType::Invoice);
        assert!(result.matches);
        assert!(result.confidence > 0.4, "confidence was {}", result.confidence);
    }

    #[tokio::test]
    async fn test_bank_text_classifies_as_bank_statement() {
        let dist = PrototypeClassifier
            .classify(&extract_features(BANK_TEXT))
            .await
            .unwrap();
        let result = ClassificationResult::from_distribution(DocumentType::BankStatement, dist);
        assert_eq!(result.predicted_type, DocumentType::BankStatement);
        assert!(result.matches);
    }

    #[tokio::test]
    async fn test_distribution_is_normalized() {
        let dist = PrototypeClassifier
            .classify(&extract_features(BANK_TEXT))
            .await
            .unwrap();
        assert_eq!(dist.len(), DocumentType::ALL.len());
        let total: f64 = dist.iter().map(|p| p.probability).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(dist.iter().all(|p| p.probability > 0.0));
    }

    #[test]
    fn test_mismatch_against_declared_type() {
        let dist = vec![
            TypeProbability {
                document_type: DocumentType::Invoice,
                probability: 0.85,
            },
            TypeProbability {
                document_type: DocumentType::TaxDocument,
                probability: 0.15,
            },
        ];
        let result = ClassificationResult::from_distribution(DocumentType::TaxDocument, dist);
        assert_eq!(result.predicted_type, DocumentType::Invoice);
        assert!(!result.matches);
        assert!((result.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_empty_distribution_degrades() {
        let result = ClassificationResult::from_distribution(DocumentType::Invoice, Vec::new());
        assert!(result.error.is_some());
        assert!(result.matches);
        assert_eq!(result.confidence, NEUTRAL_CONFIDENCE);
        assert_eq!(result.distribution.len(), DocumentType::ALL.len());
    }
}
