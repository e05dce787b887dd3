//! Local policy gates.
//!
//! Every gate runs on every proposal so the decision lists all failures, not
//! just the first. Reasons demote; warnings are advisory.

use std::path::Path;

use tracing::debug;

use crate::config::GateConfig;
use crate::decision::{Action, Decision, Kpi};
use crate::parser::ParsedMetadata;

pub const PREFIX_RULE_FAIL: &str = "prefix_rule_fail";
pub const MISSING_APPROVAL_ID: &str = "missing_approval_id";
pub const APPROVAL_INTEGRITY_FAIL: &str = "approval_integrity_fail";
pub const MISSING_EVIDENCE: &str = "missing_evidence";
pub const MISSING_EVAL: &str = "missing_eval";
pub const MISSING_LEARN: &str = "missing_learn";
pub const KPI_SUCCESS_RATE_FAIL: &str = "kpi_success_rate_fail";
pub const KPI_DRIFT_FAIL: &str = "kpi_drift_fail";
pub const KPI_REPRODUCIBILITY_FAIL: &str = "kpi_reproducibility_fail";
pub const ECON_INVALID_NEGATIVE_VALUES: &str = "econ_invalid_negative_values";
pub const KPI_MARGIN_RATE_FAIL: &str = "kpi_margin_rate_fail";

/// Reason code for a proposal older than the SLA.
pub fn sla_exceeded(sla_hours: f64) -> String {
    // Debug formatting keeps the float form, e.g. `24.0`.
    format!("sla_exceeded>{sla_hours:?}h")
}

/// Evaluate one proposal against the configured gates.
///
/// `path` is the scanned path; `file_name` its base name, which the prefix
/// rule checks.
pub fn evaluate(
    path: &Path,
    file_name: &str,
    parsed: &ParsedMetadata,
    age_hours: f64,
    config: &GateConfig,
) -> Decision {
    let mut reasons: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    if age_hours > config.sla_hours {
        reasons.push(sla_exceeded(config.sla_hours));
    }
    if !config.prefix_matches(file_name) {
        reasons.push(PREFIX_RULE_FAIL.into());
    }

    let markers = [
        (parsed.has_approval, MISSING_APPROVAL_ID),
        (parsed.has_approval_integrity, APPROVAL_INTEGRITY_FAIL),
        (parsed.has_evidence, MISSING_EVIDENCE),
        (parsed.has_eval, MISSING_EVAL),
        (parsed.has_learn, MISSING_LEARN),
    ];
    reasons.extend(
        markers
            .iter()
            .filter(|(present, _)| !present)
            .map(|(_, code)| code.to_string()),
    );

    let mut kpi = parsed.kpi.clone();
    if !kpi.success_rate.is_some_and(|v| v >= config.min_success) {
        reasons.push(KPI_SUCCESS_RATE_FAIL.into());
    }
    if !kpi.drift.is_some_and(|v| v <= config.max_drift) {
        reasons.push(KPI_DRIFT_FAIL.into());
    }
    if !kpi.reproducibility.is_some_and(|v| v >= config.min_repro) {
        reasons.push(KPI_REPRODUCIBILITY_FAIL.into());
    }

    apply_economics(&mut kpi, config, &mut reasons, &mut warnings);

    let action = if reasons.is_empty() {
        Action::Promote
    } else {
        Action::Demote
    };
    debug!(file = %file_name, %action, reasons = reasons.len(), "gates evaluated");

    Decision {
        file: path.display().to_string(),
        source: path.to_path_buf(),
        action,
        reasons,
        warnings,
        kpi,
        age_hours,
    }
}

/// Fill in economic defaults and compute the margin rate.
fn apply_economics(
    kpi: &mut Kpi,
    config: &GateConfig,
    reasons: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    let revenue = kpi.revenue_usdc.unwrap_or(config.default_revenue_usdc);
    let token_cost = kpi.token_cost_usdc.unwrap_or(config.default_token_cost_usdc);

    let margin_rate = if revenue < 0.0 || token_cost < 0.0 {
        reasons.push(ECON_INVALID_NEGATIVE_VALUES.into());
        None
    } else if revenue == 0.0 {
        None
    } else {
        let rate = (revenue - token_cost) / revenue;
        if rate < config.min_margin_rate {
            warnings.push(KPI_MARGIN_RATE_FAIL.into());
        }
        Some(rate)
    };

    kpi.revenue_usdc = Some(revenue);
    kpi.token_cost_usdc = Some(token_cost);
    kpi.margin_rate = margin_rate;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_proposal;

    fn passing() -> ParsedMetadata {
        ParsedMetadata {
            has_approval: true,
            has_approval_integrity: true,
            has_evidence: true,
            has_eval: true,
            has_learn: true,
            kpi: Kpi {
                success_rate: Some(0.95),
                drift: Some(0.03),
                reproducibility: Some(1.0),
                revenue_usdc: Some(3.0),
                token_cost_usdc: Some(0.5),
                margin_rate: None,
            },
        }
    }

    fn run(parsed: &ParsedMetadata, config: &GateConfig) -> Decision {
        evaluate(Path::new("inbox/PRJ-A_v1.md"), "PRJ-A_v1.md", parsed, 1.0, config)
    }

    #[test]
    fn clean_proposal_promotes() {
        let d = run(&passing(), &GateConfig::default());
        assert_eq!(d.action, Action::Promote);
        assert!(d.reasons.is_empty());
        assert!(d.warnings.is_empty());
        let margin = d.kpi.margin_rate.unwrap();
        assert!((margin - (2.5 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn missing_approval_demotes() {
        let mut parsed = passing();
        parsed.has_approval = false;
        parsed.has_approval_integrity = false;
        let d = run(&parsed, &GateConfig::default());
        assert_eq!(d.action, Action::Demote);
        assert_eq!(d.reasons, vec![MISSING_APPROVAL_ID, APPROVAL_INTEGRITY_FAIL]);
    }

    #[test]
    fn all_gates_report_in_order() {
        let parsed = parse_proposal("nothing useful here\n");
        let config = GateConfig::default();
        let d = evaluate(Path::new("x/notes.md"), "notes.md", &parsed, 48.0, &config);
        assert_eq!(
            d.reasons,
            vec![
                "sla_exceeded>24.0h",
                PREFIX_RULE_FAIL,
                MISSING_APPROVAL_ID,
                APPROVAL_INTEGRITY_FAIL,
                MISSING_EVIDENCE,
                MISSING_EVAL,
                MISSING_LEARN,
                KPI_SUCCESS_RATE_FAIL,
                KPI_DRIFT_FAIL,
                KPI_REPRODUCIBILITY_FAIL,
            ]
        );
        assert_eq!(d.action, Action::Demote);
        assert_eq!(d.kpi.revenue_usdc, Some(0.0));
        assert_eq!(d.kpi.margin_rate, None);
    }

    #[test]
    fn kpi_thresholds_are_inclusive() {
        let mut parsed = passing();
        parsed.kpi.success_rate = Some(0.90);
        parsed.kpi.drift = Some(0.10);
        parsed.kpi.reproducibility = Some(0.90);
        assert_eq!(run(&parsed, &GateConfig::default()).action, Action::Promote);

        parsed.kpi.drift = Some(0.11);
        let d = run(&parsed, &GateConfig::default());
        assert_eq!(d.reasons, vec![KPI_DRIFT_FAIL]);
    }

    #[test]
    fn sla_boundary_is_exclusive() {
        let config = GateConfig::default();
        let d = evaluate(Path::new("PRJ-A.md"), "PRJ-A.md", &passing(), 24.0, &config);
        assert!(d.reasons.is_empty());
        let d = evaluate(Path::new("PRJ-A.md"), "PRJ-A.md", &passing(), 24.5, &config);
        assert_eq!(d.reasons, vec!["sla_exceeded>24.0h"]);
    }

    #[test]
    fn zero_revenue_leaves_margin_undefined() {
        let mut parsed = passing();
        parsed.kpi.revenue_usdc = Some(0.0);
        let d = run(&parsed, &GateConfig::default());
        assert_eq!(d.kpi.margin_rate, None);
        assert_eq!(d.action, Action::Promote);
    }

    #[test]
    fn low_margin_warns_without_demoting() {
        let mut parsed = passing();
        parsed.kpi.revenue_usdc = Some(10.0);
        parsed.kpi.token_cost_usdc = Some(8.0);
        let config = GateConfig {
            min_margin_rate: 0.3,
            ..GateConfig::default()
        };
        let d = run(&parsed, &config);
        assert_eq!(d.kpi.margin_rate, Some(0.2));
        assert_eq!(d.warnings, vec![KPI_MARGIN_RATE_FAIL]);
        assert_eq!(d.action, Action::Promote);
    }

    #[test]
    fn negative_economics_is_a_reason() {
        let mut parsed = passing();
        parsed.kpi.token_cost_usdc = Some(-1.0);
        let d = run(&parsed, &GateConfig::default());
        assert_eq!(d.reasons, vec![ECON_INVALID_NEGATIVE_VALUES]);
        assert_eq!(d.kpi.margin_rate, None);
        assert_eq!(d.action, Action::Demote);
    }

    #[test]
    fn economic_defaults_fill_gaps() {
        let mut parsed = passing();
        parsed.kpi.revenue_usdc = None;
        parsed.kpi.token_cost_usdc = None;
        let config = GateConfig {
            default_revenue_usdc: 4.0,
            default_token_cost_usdc: 1.0,
            ..GateConfig::default()
        };
        let d = run(&parsed, &config);
        assert_eq!(d.kpi.revenue_usdc, Some(4.0));
        assert_eq!(d.kpi.token_cost_usdc, Some(1.0));
        assert_eq!(d.kpi.margin_rate, Some(0.75));
    }

    #[test]
    fn demote_iff_reasons() {
        let inputs = [
            passing(),
            parse_proposal(""),
            parse_proposal("approval_id: APR-1\nevidence: x\n"),
        ];
        for parsed in &inputs {
            let d = run(parsed, &GateConfig::default());
            assert_eq!(d.action == Action::Demote, !d.reasons.is_empty());
        }
    }
}
