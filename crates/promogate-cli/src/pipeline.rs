//! One pipeline run: scan, evaluate, consult the policy gate, apply, summarise.

use std::path::PathBuf;

use promogate_core::{
    ConfigError, Decision, GateRequest, PipelineConfig, PolicyGate, PolicyGateError, RunMode,
    RunSummary, evaluate, parse_proposal, resolve_gate_action,
};
use promogate_store::{Executor, RunClock, StoreError, scan_inbox, seed_samples, write_summary};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("policy gate blocked {file} ({requested_action}): {source}")]
    Gate {
        file: String,
        requested_action: String,
        #[source]
        source: PolicyGateError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct RunOutcome {
    pub summary: RunSummary,
    pub summary_path: PathBuf,
}

/// Run the pipeline once over the inbox.
///
/// In a real run every decision is reviewed by `gate` before any file moves;
/// the first gate failure aborts the run with nothing applied.
pub fn run(
    config: &PipelineConfig,
    gate: Option<&dyn PolicyGate>,
    clock: RunClock,
) -> Result<RunOutcome, PipelineError> {
    config.validate()?;
    let dry_run = config.mode.is_dry_run();
    info!(dry_run, workspace_id = %config.workspace_id, "pipeline run starting");

    if config.seed_samples {
        seed_samples(&config.dirs.inbox)?;
    }

    let executor = Executor::new(&config.dirs, config.mode, clock);
    executor.prepare_dirs()?;

    let mut decisions: Vec<Decision> = scan_inbox(&config.dirs.inbox)?
        .into_iter()
        .map(|file| {
            let parsed = parse_proposal(&file.text);
            let age_hours = clock.age_hours(file.modified);
            evaluate(&file.path, &file.name, &parsed, age_hours, &config.gates)
        })
        .collect();

    if config.mode == RunMode::Real {
        let gate = gate.ok_or(ConfigError::PolicyGateRequired)?;
        consult_gate(gate, &config.workspace_id, &mut decisions)?;
    }

    let mut records = Vec::with_capacity(decisions.len());
    for decision in decisions {
        records.push(executor.apply(decision)?);
    }

    let summary = RunSummary::build(
        clock.time_utc(),
        dry_run,
        config.gates.min_margin_rate,
        records,
    );
    let summary_path = write_summary(&config.dirs.log, &summary, &clock)?;
    info!(
        total = summary.counts.total,
        promote = summary.counts.promote,
        demote = summary.counts.demote,
        "pipeline run finished"
    );

    Ok(RunOutcome {
        summary,
        summary_path,
    })
}

/// Ask the gate about every decision, applying overrides in place.
fn consult_gate(
    gate: &dyn PolicyGate,
    workspace_id: &str,
    decisions: &mut [Decision],
) -> Result<(), PipelineError> {
    for decision in decisions.iter_mut() {
        let request = GateRequest::from_decision(workspace_id, decision);
        let resolved = gate
            .review(&request)
            .and_then(|verdict| resolve_gate_action(decision.action, &verdict))
            .map_err(|source| PipelineError::Gate {
                file: decision.file_name(),
                requested_action: decision.action.to_string(),
                source,
            })?;

        let local = decision.action;
        if decision.apply_override(resolved) {
            warn!(
                file = %decision.file_name(),
                from = %local,
                to = %resolved,
                "policy gate overrode local decision"
            );
        }
    }
    Ok(())
}
