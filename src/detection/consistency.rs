//! Declared-metadata consistency
//!
//! Compares what the submitter declared about the document against what
//! the extracted text actually says. Absent declarations are skipped and
//! excluded from the score denominator, so a bare submission scores a
//! clean 1.0 rather than being punished for missing expectations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::DocumentMetadata;

/// Per-field agreement between declared metadata and extracted text.
/// `None` means the field was not declared and was not checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyResult {
    pub amount_matches: Option<bool>,
    pub date_matches: Option<bool>,
    pub issuer_matches: Option<bool>,
    /// Matched fields / checked fields; 1.0 when nothing was checked
    pub score: f64,
}

/// Check every declared expectation against the document text.
pub fn check_consistency(metadata: &DocumentMetadata, text: &str) -> ConsistencyResult {
    let amount_matches = metadata
        .expected_amount
        .map(|amount| text_contains_amount(text, amount));
    let date_matches = metadata
        .expected_date
        .map(|date| text_contains_date(text, date));
    let issuer_matches = metadata
        .issuer_name
        .as_deref()
        .map(|issuer| text_contains_issuer(text, issuer));

    let outcomes = [amount_matches, date_matches, issuer_matches];
    let checked = outcomes.iter().filter(|o| o.is_some()).count();
    let matched = outcomes.iter().filter(|o| **o == Some(true)).count();
    let score = if checked == 0 {
        1.0
    } else {
        (matched as f64 / checked as f64).clamp(0.0, 1.0)
    };

    ConsistencyResult {
        amount_matches,
        date_matches,
        issuer_matches,
        score,
    }
}

/// Numeric comparison per token: "$1,250.00" agrees with 1250.0 even
/// though their digit strings differ. Currency symbols and grouping
/// commas drop out of the token; so does a sentence-final period.
fn text_contains_amount(text: &str, amount: f64) -> bool {
    text.split_whitespace().any(|token| {
        let normalized: String = token
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        match normalized.trim_end_matches('.').parse::<f64>() {
            Ok(value) => (value - amount).abs() < 0.005,
            Err(_) => false,
        }
    })
}

/// The declared date counts as present if any common rendering of it
/// occurs in the text. Numeric forms cover the same separators the
/// structure matcher recognizes as dates.
fn text_contains_date(text: &str, date: NaiveDate) -> bool {
    const RENDERINGS: &[&str] = &[
        // Year-first numeric
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%Y.%m.%d",
        // Month-first and day-first numeric, padded and unpadded
        "%-m/%-d/%Y",
        "%-d/%-m/%Y",
        "%m/%d/%Y",
        "%d/%m/%Y",
        "%-m-%-d-%Y",
        "%-d-%-m-%Y",
        "%m-%d-%Y",
        "%d-%m-%Y",
        "%-m.%-d.%Y",
        "%-d.%-m.%Y",
        "%m.%d.%Y",
        "%d.%m.%Y",
        // Month-name forms
        "%B %-d, %Y",
        "%B %d, %Y",
        "%-d %B %Y",
        "%b %-d, %Y",
    ];
    let haystack = text.to_lowercase();
    RENDERINGS.iter().any(|fmt| {
        let rendered = date.format(fmt).to_string().to_lowercase();
        haystack.contains(&rendered)
    })
}

fn text_contains_issuer(text: &str, issuer: &str) -> bool {
    let needle = issuer.trim().to_lowercase();
    !needle.is_empty() && text.to_lowercase().contains(&needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(
        amount: Option<f64>,
        date: Option<NaiveDate>,
        issuer: Option<&str>,
    ) -> DocumentMetadata {
        DocumentMetadata {
            expected_amount: amount,
            expected_date: date,
            issuer_name: issuer.map(str::to_string),
        }
    }

    #[test]
    fn test_no_declarations_scores_clean() {
        let result = check_consistency(&metadata(None, None, None), "any text at all");
        assert_eq!(result.amount_matches, None);
        assert_eq!(result.date_matches, None);
        assert_eq!(result.issuer_matches, None);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn test_denominator_counts_only_declared_fields() {
        // Amount matches, issuer does not, date never declared: 1 of 2
        let md = metadata(Some(1250.0), None, Some("Globex"));
        let result = check_consistency(&md, "ACME CORP invoice, Total Due: $1,250.00");
        assert_eq!(result.amount_matches, Some(true));
        assert_eq!(result.date_matches, None);
        assert_eq!(result.issuer_matches, Some(false));
        assert!((result.score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_formatted_amount_agrees_with_declared_value() {
        let md = metadata(Some(84210.0), None, None);
        assert_eq!(
            check_consistency(&md, "Adjusted total: $84,210.00 for the year")
                .amount_matches,
            Some(true)
        );
        assert_eq!(
            check_consistency(&md, "Adjusted total: $84,215.00 for the year")
                .amount_matches,
            Some(false)
        );
    }

    #[test]
    fn test_fractional_amounts_compare_numerically() {
        let md = metadata(Some(77.25), None, None);
        assert_eq!(
            check_consistency(&md, "copay of 77.25 applied").amount_matches,
            Some(true)
        );
    }

    #[test]
    fn test_sentence_final_punctuation_is_not_part_of_the_amount() {
        let md = metadata(Some(1250.0), None, None);
        for text in [
            "The total due is $1,250.00.",
            "Remit exactly 1250.00. Late payments accrue interest.",
        ] {
            assert_eq!(
                check_consistency(&md, text).amount_matches,
                Some(true),
                "should match in {:?}",
                text
            );
        }
    }

    #[test]
    fn test_date_matches_several_renderings() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let md = metadata(None, Some(date), None);
        for text in [
            "Invoice Date: 3/15/2024",
            "issued 2024-03-15",
            "dated March 15, 2024",
            "on 15 March 2024",
        ] {
            assert_eq!(
                check_consistency(&md, text).date_matches,
                Some(true),
                "should match in {:?}",
                text
            );
        }
        assert_eq!(
            check_consistency(&md, "Invoice Date: 4/15/2024").date_matches,
            Some(false)
        );
    }

    #[test]
    fn test_dashed_and_dotted_dates_match() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let md = metadata(None, Some(date), None);
        for text in [
            "Statement dated 15-03-2024 for account ****4455",
            "Billing period ending 15.03.2024",
            "posted 3-15-2024",
            "receipt 2024/03/15",
        ] {
            assert_eq!(
                check_consistency(&md, text).date_matches,
                Some(true),
                "should match in {:?}",
                text
            );
        }
    }

    #[test]
    fn test_issuer_containment_is_case_insensitive() {
        let md = metadata(None, None, Some("Acme Supply Co"));
        assert_eq!(
            check_consistency(&md, "ACME SUPPLY CO\n123 Market Street").issuer_matches,
            Some(true)
        );
        assert_eq!(
            check_consistency(&md, "Initech Systems").issuer_matches,
            Some(false)
        );
    }

    #[test]
    fn test_all_three_checked_and_matched() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let md = metadata(Some(1250.0), Some(date), Some("Acme Supply"));
        let result = check_consistency(
            &md,
            "Acme Supply invoice dated 3/15/2024, Total Due: $1,250.00",
        );
        assert_eq!(result.score, 1.0);
    }
}
