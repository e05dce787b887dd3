//! Line-oriented metadata extraction from proposal markdown.
//!
//! Proposals are free text. Metadata lives on lines shaped like
//! `key: value`, matched case-insensitively with optional leading
//! whitespace. Unknown keys are ignored. Malformed values never fail the
//! parse; they surface as absent and the gates report them.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::decision::Kpi;

pub const APPROVAL_ID: &str = "approval_id";
pub const APPROVED_BY: &str = "approved_by";
pub const APPROVED_AT: &str = "approved_at";
pub const APPROVAL_REASON: &str = "approval_reason";
pub const EVIDENCE: &str = "evidence";
pub const EVAL: &str = "eval";
pub const LEARN: &str = "learn";
pub const SUCCESS_RATE: &str = "success_rate";
pub const DRIFT: &str = "drift";
pub const REPRODUCIBILITY: &str = "reproducibility";
pub const REVENUE_USDC: &str = "revenue_usdc";
pub const TOKEN_COST_USDC: &str = "token_cost_usdc";

const KEYS: &[&str] = &[
    APPROVAL_ID,
    APPROVED_BY,
    APPROVED_AT,
    APPROVAL_REASON,
    EVIDENCE,
    EVAL,
    LEARN,
    SUCCESS_RATE,
    DRIFT,
    REPRODUCIBILITY,
    REVENUE_USDC,
    TOKEN_COST_USDC,
];

/// Keys whose value is a single token rather than the rest of the line.
const TOKEN_KEYS: &[&str] = &[APPROVAL_ID, APPROVED_BY];

/// `approval_id` values that mean "no approval".
const NULL_APPROVALS: &[&str] = &["none", "null", "na"];

static KEY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_]+)\s*:(.*)$").expect("key line pattern is valid")
});

/// Raw key/value view over a proposal's text.
#[derive(Debug, Default, Clone)]
pub struct ProposalFields {
    seen: HashSet<&'static str>,
    values: HashMap<&'static str, String>,
}

impl ProposalFields {
    /// Scan `text` once, recording every recognised key and the first
    /// non-empty value for each.
    pub fn parse(text: &str) -> Self {
        let mut fields = Self::default();
        for line in text.lines() {
            let Some(caps) = KEY_LINE.captures(line) else {
                continue;
            };
            let key = caps[1].to_ascii_lowercase();
            let Some(key) = KEYS.iter().copied().find(|k| *k == key) else {
                continue;
            };
            fields.seen.insert(key);
            if fields.values.contains_key(key) {
                continue;
            }
            let rest = caps[2].trim();
            let value = if TOKEN_KEYS.contains(&key) {
                rest.split_whitespace().next().unwrap_or("")
            } else {
                rest
            };
            if !value.is_empty() {
                fields.values.insert(key, value.to_string());
            }
        }
        fields
    }

    /// Whether any line carries `key`, with or without a value.
    pub fn is_present(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// First non-empty value for `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn number(&self, key: &str, scale: NumberScale) -> Option<f64> {
        self.value(key).and_then(|v| parse_number(v, scale))
    }
}

/// How a numeric field is normalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberScale {
    /// Ratio metric: `95%` and `95` both become 0.95, `0.95` stays.
    Ratio,
    /// Plain magnitude, e.g. a USDC amount.
    Magnitude,
}

/// Parse a numeric field value. Unparseable text yields `None`.
///
/// Single underscores between digits are accepted as grouping, so `1_000`
/// reads as 1000.
pub fn parse_number(raw: &str, scale: NumberScale) -> Option<f64> {
    let cleaned = raw.trim().replace('%', "");
    let num: f64 = strip_digit_separators(cleaned.trim())?.parse().ok()?;
    if !num.is_finite() {
        return None;
    }
    match scale {
        NumberScale::Magnitude => Some(num),
        NumberScale::Ratio if raw.contains('%') => Some(num / 100.0),
        // tolerate 0-100 scale inputs for ratio metrics
        NumberScale::Ratio if num > 1.0 => Some(num / 100.0),
        NumberScale::Ratio => Some(num),
    }
}

/// Approval markers and KPIs extracted from one proposal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMetadata {
    pub has_approval: bool,
    /// Approval plus non-empty `approved_by`, `approved_at`, `approval_reason`.
    pub has_approval_integrity: bool,
    pub has_evidence: bool,
    pub has_eval: bool,
    pub has_learn: bool,
    /// Parsed KPIs. `margin_rate` is always `None` here; the evaluator fills it.
    pub kpi: Kpi,
}

/// Extract approval markers and KPIs from proposal text.
pub fn parse_proposal(text: &str) -> ParsedMetadata {
    let fields = ProposalFields::parse(text);

    let has_approval = fields
        .value(APPROVAL_ID)
        .is_some_and(|id| !NULL_APPROVALS.contains(&id.to_lowercase().as_str()));
    let has_approval_integrity = has_approval
        && [APPROVED_BY, APPROVED_AT, APPROVAL_REASON]
            .iter()
            .all(|key| fields.value(key).is_some());

    ParsedMetadata {
        has_approval,
        has_approval_integrity,
        has_evidence: fields.is_present(EVIDENCE),
        has_eval: fields.is_present(EVAL),
        has_learn: fields.is_present(LEARN),
        kpi: Kpi {
            success_rate: fields.number(SUCCESS_RATE, NumberScale::Ratio),
            drift: fields.number(DRIFT, NumberScale::Ratio),
            reproducibility: fields.number(REPRODUCIBILITY, NumberScale::Ratio),
            revenue_usdc: fields.number(REVENUE_USDC, NumberScale::Magnitude),
            token_cost_usdc: fields.number(TOKEN_COST_USDC, NumberScale::Magnitude),
            margin_rate: None,
        },
    }
}

fn strip_digit_separators(text: &str) -> Option<String> {
    if !text.contains('_') {
        return Some(text.to_string());
    }
    let bytes = text.as_bytes();
    let digit_at = |i: Option<usize>| i.and_then(|i| bytes.get(i)).is_some_and(u8::is_ascii_digit);
    let grouped = bytes
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'_')
        .all(|(i, _)| digit_at(i.checked_sub(1)) && digit_at(Some(i + 1)));
    if !grouped {
        return None;
    }
    Some(text.replace('_', ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSING: &str = "# PASS sample
approval_id: APR-1001
approved_by: owner_min
approved_at: 2026-02-28T00:00:00Z
approval_reason: approved_for_pipeline_pass_sample
EVIDENCE: command logs attached
EVAL: goal met
LEARN: keep this format
success_rate: 95%
drift: 3%
reproducibility: 100%
revenue_usdc: 3.0
token_cost_usdc: 0.5
";

    #[test]
    fn parse_number_percent() {
        assert_eq!(parse_number("95%", NumberScale::Ratio), Some(0.95));
        assert_eq!(parse_number(" 3 % ", NumberScale::Ratio), Some(0.03));
    }

    #[test]
    fn parse_number_tolerates_hundred_scale() {
        assert_eq!(parse_number("70", NumberScale::Ratio), Some(0.70));
        assert_eq!(parse_number("0.5", NumberScale::Ratio), Some(0.5));
        assert_eq!(parse_number("1", NumberScale::Ratio), Some(1.0));
    }

    #[test]
    fn parse_number_rejects_text() {
        assert_eq!(parse_number("abc", NumberScale::Ratio), None);
        assert_eq!(parse_number("", NumberScale::Ratio), None);
        assert_eq!(parse_number("inf", NumberScale::Magnitude), None);
        assert_eq!(parse_number("NaN", NumberScale::Ratio), None);
    }

    #[test]
    fn parse_number_accepts_digit_grouping() {
        assert_eq!(parse_number("1_000", NumberScale::Magnitude), Some(1000.0));
        assert_eq!(parse_number("1_000.5", NumberScale::Magnitude), Some(1000.5));
        assert_eq!(parse_number("9_5%", NumberScale::Ratio), Some(0.95));
        assert_eq!(parse_number("_1000", NumberScale::Magnitude), None);
        assert_eq!(parse_number("1__000", NumberScale::Magnitude), None);
        assert_eq!(parse_number("1000_", NumberScale::Magnitude), None);
        assert_eq!(parse_number("1_.5", NumberScale::Magnitude), None);
    }

    #[test]
    fn parse_number_magnitude_is_not_scaled() {
        assert_eq!(parse_number("250", NumberScale::Magnitude), Some(250.0));
        assert_eq!(parse_number("-1.5", NumberScale::Magnitude), Some(-1.5));
    }

    #[test]
    fn passing_sample_has_everything() {
        let parsed = parse_proposal(PASSING);
        assert!(parsed.has_approval);
        assert!(parsed.has_approval_integrity);
        assert!(parsed.has_evidence && parsed.has_eval && parsed.has_learn);
        assert_eq!(parsed.kpi.success_rate, Some(0.95));
        assert_eq!(parsed.kpi.drift, Some(0.03));
        assert_eq!(parsed.kpi.reproducibility, Some(1.0));
        assert_eq!(parsed.kpi.revenue_usdc, Some(3.0));
        assert_eq!(parsed.kpi.token_cost_usdc, Some(0.5));
        assert_eq!(parsed.kpi.margin_rate, None);
    }

    #[test]
    fn keys_are_case_insensitive_and_indented() {
        let fields = ProposalFields::parse("   Approval_ID :  APR-7 trailing\n\tSUCCESS_RATE:0.9\n");
        assert_eq!(fields.value(APPROVAL_ID), Some("APR-7"));
        assert_eq!(fields.value(SUCCESS_RATE), Some("0.9"));
    }

    #[test]
    fn first_non_empty_value_wins() {
        let fields = ProposalFields::parse("drift:\ndrift: 5%\ndrift: 50%\n");
        assert!(fields.is_present(DRIFT));
        assert_eq!(fields.value(DRIFT), Some("5%"));
    }

    #[test]
    fn empty_value_does_not_borrow_next_line() {
        let parsed = parse_proposal("approval_id: APR-1\napproved_by:\napproved_at: now\napproval_reason: ok\n");
        assert!(parsed.has_approval);
        assert!(!parsed.has_approval_integrity);
    }

    #[test]
    fn null_approval_ids_do_not_count() {
        for id in ["none", "NULL", "Na"] {
            let parsed = parse_proposal(&format!("approval_id: {id}\n"));
            assert!(!parsed.has_approval, "{id} should not count as approval");
        }
        assert!(parse_proposal("approval_id: nada\n").has_approval);
    }

    #[test]
    fn presence_markers_need_no_value() {
        let parsed = parse_proposal("evidence:\neval :\n");
        assert!(parsed.has_evidence);
        assert!(parsed.has_eval);
        assert!(!parsed.has_learn);
    }

    #[test]
    fn similar_keys_are_not_confused() {
        let parsed = parse_proposal("evidence_link: x\nevaluation: y\nmy_learn: z\n");
        assert!(!parsed.has_evidence);
        assert!(!parsed.has_eval);
        assert!(!parsed.has_learn);
    }

    #[test]
    fn unparseable_kpi_is_absent() {
        let parsed = parse_proposal("success_rate: high\ndrift: n/a\n");
        assert_eq!(parsed.kpi.success_rate, None);
        assert_eq!(parsed.kpi.drift, None);
    }
}
