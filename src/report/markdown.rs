//! Markdown report renderer
//!
//! Produces a review-ready Markdown document with a verdict banner,
//! per-signal breakdown, fraud flags, warnings, and recommendations.

use crate::engine::VerificationReport;
use crate::VeridocResult;

/// Render a verification report as Markdown
pub fn render(report: &VerificationReport) -> VeridocResult<String> {
    let mut md = String::with_capacity(4096);

    // Title
    md.push_str("# Veridoc Verification Report\n\n");

    // Metadata
    md.push_str("| Field | Value |\n|---|---|\n");
    md.push_str(&format!("| **Request ID** | `{}` |\n", report.request_id));
    md.push_str(&format!(
        "| **Verified At** | {} |\n",
        report.verified_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!(
        "| **Declared Type** | `{}` |\n",
        report.document_type
    ));
    md.push_str(&format!(
        "| **Confidence** | **{:.2}** |\n",
        report.confidence
    ));
    md.push_str(&format!("| **Fraud Score** | {:.2} |\n", report.fraud_score));
    md.push_str(&format!(
        "| **Verdict** | {} |\n",
        verdict_badge(report.authentic)
    ));
    md.push_str(&format!("| **Duration** | {}ms |\n", report.duration_ms));
    md.push_str(&format!(
        "| **Engine Version** | {} |\n",
        report.engine_version
    ));
    md.push_str("\n");

    // Verdict summary
    md.push_str("## Verdict\n\n");
    if report.authentic {
        md.push_str(
            "✅ **Document verified as authentic.** Confidence and fraud signals are within acceptance thresholds.\n\n",
        );
    } else {
        md.push_str(&format!(
            "⚠️ **Document not verified as authentic.** Confidence {:.2}, fraud score {:.2}.\n\n",
            report.confidence, report.fraud_score
        ));
    }

    // Per-signal breakdown
    md.push_str("## Signal Breakdown\n\n");
    md.push_str("| Signal | Score | Detail |\n|--------|------:|--------|\n");
    md.push_str(&format!(
        "| Image quality | {:.2} | {}x{} {}, sharpness {:.2} |\n",
        report.image_quality.score,
        report.image_quality.resolution.width,
        report.image_quality.resolution.height,
        report.image_quality.format,
        report.image_quality.sharpness,
    ));
    md.push_str(&format!(
        "| Text extraction | {:.2} | {} words, confidence {:.2} |\n",
        report.text_extraction.text_quality,
        report.text_extraction.word_count,
        report.text_extraction.confidence,
    ));
    let markers_present = report
        .structure
        .type_markers
        .iter()
        .filter(|m| m.present)
        .count();
    md.push_str(&format!(
        "| Structure | {:.2} | {}/{} type markers present |\n",
        report.structure.score,
        markers_present,
        report.structure.type_markers.len(),
    ));
    md.push_str(&format!(
        "| Fraud | {:.2} | {} flag(s) raised |\n",
        report.fraud.score,
        report.fraud.flags.len(),
    ));
    md.push_str(&format!(
        "| Classification | {:.2} | predicted `{}` |\n",
        report.classification.confidence, report.classification.predicted_type,
    ));
    let consistency_checks = [
        report.consistency.amount_matches,
        report.consistency.date_matches,
        report.consistency.issuer_matches,
    ];
    let checked = consistency_checks.iter().flatten().count();
    let matched = consistency_checks.iter().flatten().filter(|&&m| m).count();
    md.push_str(&format!(
        "| Consistency | {:.2} | {}/{} declared fields matched |\n",
        report.consistency.score, matched, checked,
    ));
    md.push_str("\n");

    // Fraud flags
    if !report.fraud.flags.is_empty() {
        md.push_str("## Fraud Flags\n\n");
        for (i, flag) in report.fraud.flags.iter().enumerate() {
            md.push_str(&format!("{}. {}\n", i + 1, flag));
        }
        md.push_str("\n");
    }

    // Warnings
    if !report.warnings.is_empty() {
        md.push_str("## Warnings\n\n");
        for warning in &report.warnings {
            md.push_str(&format!("- ⚠️ {}\n", warning));
        }
        md.push_str("\n");
    }

    // Recommendations
    if !report.recommendations.is_empty() {
        md.push_str("## Recommendations\n\n");
        for recommendation in &report.recommendations {
            md.push_str(&format!("- {}\n", recommendation));
        }
        md.push_str("\n");
    }

    // Footer
    md.push_str("---\n\n");
    md.push_str(&format!(
        "*Generated by Veridoc v{} — Document Verification Engine*\n",
        report.engine_version
    ));

    Ok(md)
}

fn verdict_badge(authentic: bool) -> &'static str {
    if authentic {
        "✅ **AUTHENTIC**"
    } else {
        "⚠️ **REVIEW REQUIRED**"
    }
}
