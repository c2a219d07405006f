//! JSON report renderer

use crate::engine::VerificationReport;
use crate::VeridocResult;

/// Render a verification report as pretty-printed JSON
pub fn render(report: &VerificationReport) -> VeridocResult<String> {
    serde_json::to_string_pretty(report).map_err(crate::VeridocError::SerdeError)
}
