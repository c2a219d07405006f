//! Report generation — JSON and Markdown output
//!
//! Transforms a `VerificationReport` into machine-readable or
//! human-readable formats suitable for review queues, API responses,
//! and audit trails.

pub mod json;
pub mod markdown;

use crate::engine::VerificationReport;
use crate::VeridocResult;

/// Output format for the verification report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Structured JSON (machine-readable)
    Json,
    /// Human-readable Markdown with tables and summaries
    Markdown,
}

/// Render a report to a string
pub fn render_report(
    report: &VerificationReport,
    format: ReportFormat,
) -> VeridocResult<String> {
    match format {
        ReportFormat::Json => json::render(report),
        ReportFormat::Markdown => markdown::render(report),
    }
}
