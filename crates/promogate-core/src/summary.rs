//! Aggregate report for one pipeline run.

use serde::Serialize;

use crate::decision::{Action, DecisionRecord};
use crate::gates::KPI_MARGIN_RATE_FAIL;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// RFC 3339 UTC time the summary was built.
    pub time_utc: String,
    pub dry_run: bool,
    pub counts: Counts,
    pub economics: Economics,
    pub margin_warnings: MarginWarnings,
    pub decisions: Vec<DecisionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Counts {
    pub total: usize,
    pub promote: usize,
    pub demote: usize,
    pub hold: usize,
    /// Decisions carrying at least one warning.
    pub warn: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Economics {
    pub total_revenue_usdc: f64,
    pub total_token_cost_usdc: f64,
    pub total_net_margin_usdc: f64,
    /// Mean over decisions with a defined margin rate.
    pub avg_margin_rate: Option<f64>,
    pub min_margin_rate_advisory: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarginWarnings {
    pub count: usize,
    /// Base names of files below the advisory margin.
    pub files: Vec<String>,
}

impl RunSummary {
    pub fn build(
        time_utc: String,
        dry_run: bool,
        min_margin_rate: f64,
        decisions: Vec<DecisionRecord>,
    ) -> Self {
        let count_action = |action: Action| {
            decisions
                .iter()
                .filter(|r| r.decision.action == action)
                .count()
        };
        let counts = Counts {
            total: decisions.len(),
            promote: count_action(Action::Promote),
            demote: count_action(Action::Demote),
            hold: count_action(Action::Hold),
            warn: decisions
                .iter()
                .filter(|r| !r.decision.warnings.is_empty())
                .count(),
        };

        let total_revenue_usdc: f64 = decisions
            .iter()
            .map(|r| r.decision.kpi.revenue_usdc.unwrap_or(0.0))
            .sum();
        let total_token_cost_usdc: f64 = decisions
            .iter()
            .map(|r| r.decision.kpi.token_cost_usdc.unwrap_or(0.0))
            .sum();
        let margins: Vec<f64> = decisions
            .iter()
            .filter_map(|r| r.decision.kpi.margin_rate)
            .collect();
        let avg_margin_rate = if margins.is_empty() {
            None
        } else {
            Some(margins.iter().sum::<f64>() / margins.len() as f64)
        };

        let files: Vec<String> = decisions
            .iter()
            .filter(|r| r.decision.has_warning(KPI_MARGIN_RATE_FAIL))
            .map(|r| r.decision.file_name())
            .collect();

        Self {
            time_utc,
            dry_run,
            counts,
            economics: Economics {
                total_revenue_usdc,
                total_token_cost_usdc,
                total_net_margin_usdc: total_revenue_usdc - total_token_cost_usdc,
                avg_margin_rate,
                min_margin_rate_advisory: min_margin_rate,
            },
            margin_warnings: MarginWarnings {
                count: files.len(),
                files,
            },
            decisions,
        }
    }
}
