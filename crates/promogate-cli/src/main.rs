use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use promogate_core::config::{DEFAULT_PREFIX_PATTERN, normalize_workspace_id};
use promogate_core::{
    ConfigError, Directories, GateConfig, PipelineConfig, PolicyGate, PolicyGateError,
    PolicyGateSettings, RunMode,
};
use promogate_gate::HttpPolicyGate;
use promogate_store::RunClock;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

mod pipeline;

use pipeline::PipelineError;

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_POLICY_GATE_FAILED: u8 = 3;
const EXIT_POLICY_GATE_MISSING: u8 = 4;

/// Evaluate proposal files against approval, evidence, and KPI gates, then
/// file each into the applied or demoted directory.
#[derive(Parser, Debug)]
#[command(name = "promogate", version, about)]
struct Cli {
    #[arg(long, default_value = "promoted/inbox")]
    inbox_dir: PathBuf,

    #[arg(long, default_value = "promoted/applied")]
    applied_dir: PathBuf,

    #[arg(long, default_value = "tmp/archive/demoted")]
    demoted_dir: PathBuf,

    #[arg(long, default_value = "memory/incidents")]
    incidents_dir: PathBuf,

    #[arg(long, default_value = "tmp/export")]
    log_dir: PathBuf,

    /// Perform real file moves
    #[arg(long)]
    real_run: bool,

    /// Mandatory second flag for --real-run
    #[arg(long)]
    confirm_real_run: bool,

    /// Write sample proposals into the inbox first
    #[arg(long)]
    seed_samples: bool,

    /// Filename prefix regex gate
    #[arg(long, default_value = DEFAULT_PREFIX_PATTERN)]
    require_prefix: String,

    #[arg(long, default_value_t = 24.0)]
    sla_hours: f64,

    #[arg(long, default_value_t = 0.90)]
    min_success: f64,

    #[arg(long, default_value_t = 0.10)]
    max_drift: f64,

    #[arg(long, default_value_t = 0.90)]
    min_repro: f64,

    #[arg(long, default_value_t = 0.0)]
    default_revenue_usdc: f64,

    #[arg(long, default_value_t = 0.0)]
    default_token_cost_usdc: f64,

    /// Advisory threshold only (warning), 0.0-1.0, e.g. 0.2 means 20%
    #[arg(long, default_value_t = 0.0)]
    min_margin_rate: f64,

    #[arg(long, env = "PIPELINE_WORKSPACE_ID", default_value = "ws_dev")]
    workspace_id: String,

    /// Required for --real-run. Policy gate endpoint approving promote/demote
    #[arg(long, env = "PIPELINE_POLICY_GATE_URL", default_value = "")]
    policy_gate_url: String,

    #[arg(long, default_value_t = 5.0)]
    policy_gate_timeout_sec: f64,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<PipelineConfig, ConfigError> {
        let mode = RunMode::from_flags(self.real_run, self.confirm_real_run)?;
        let gates = GateConfig {
            sla_hours: self.sla_hours,
            min_success: self.min_success,
            max_drift: self.max_drift,
            min_repro: self.min_repro,
            default_revenue_usdc: self.default_revenue_usdc,
            default_token_cost_usdc: self.default_token_cost_usdc,
            min_margin_rate: self.min_margin_rate,
            ..GateConfig::with_prefix(&self.require_prefix)?
        };
        let config = PipelineConfig {
            dirs: Directories {
                inbox: self.inbox_dir,
                applied: self.applied_dir,
                demoted: self.demoted_dir,
                incidents: self.incidents_dir,
                log: self.log_dir,
            },
            gates,
            mode,
            workspace_id: normalize_workspace_id(&self.workspace_id),
            policy_gate: PolicyGateSettings::new(
                &self.policy_gate_url,
                self.policy_gate_timeout_sec,
            ),
            seed_samples: self.seed_samples,
        };
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "promogate=debug,promogate_core=debug,promogate_gate=debug,promogate_store=debug"
    } else {
        "promogate=info,promogate_core=info,promogate_gate=info,promogate_store=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(_) => println!("{value}"),
    }
}

fn config_exit_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::PolicyGateRequired => EXIT_POLICY_GATE_MISSING,
        _ => EXIT_CONFIG,
    }
}

fn config_report(err: &ConfigError) -> Value {
    json!({ "error": err.code(), "hint": err.hint() })
}

fn gate_blocked_report(file: &str, requested_action: &str, reason: &PolicyGateError) -> Value {
    json!({
        "error": "policy_gate_blocked_transition",
        "file": file,
        "requested_action": requested_action,
        "reason": reason.to_string(),
    })
}

/// Process exit status for a failed run.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::Config(config_err)) => config_exit_code(config_err),
        Some(PipelineError::Gate { .. }) => EXIT_POLICY_GATE_FAILED,
        _ if err.is::<PolicyGateError>() => EXIT_POLICY_GATE_FAILED,
        _ => EXIT_FAILURE,
    }
}

/// JSON printed on stdout for a failed run, if the failure has one.
fn failure_report(err: &anyhow::Error) -> Option<Value> {
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::Config(config_err)) => Some(config_report(config_err)),
        Some(PipelineError::Gate {
            file,
            requested_action,
            source,
        }) => Some(gate_blocked_report(file, requested_action, source)),
        _ => err
            .downcast_ref::<PolicyGateError>()
            .map(|gate_err| gate_blocked_report("", "", gate_err)),
    }
}

fn execute(config: &PipelineConfig) -> anyhow::Result<()> {
    let http_gate = match (config.mode, &config.policy_gate) {
        (RunMode::Real, Some(settings)) => Some(HttpPolicyGate::new(settings)?),
        _ => None,
    };
    let gate = http_gate.as_ref().map(|g| g as &dyn PolicyGate);

    let outcome = pipeline::run(config, gate, RunClock::now())?;
    let rendered =
        serde_json::to_string_pretty(&outcome.summary).context("serialising run summary")?;
    println!("{rendered}");
    println!("\nlog_file={}", outcome.summary_path.display());
    Ok(())
}

fn failure_exit(err: &anyhow::Error) -> ExitCode {
    match failure_report(err) {
        Some(report) => print_json(&report),
        None => {
            tracing::error!(error = %err, "pipeline run failed");
            eprintln!("error: {err:#}");
        }
    }
    ExitCode::from(exit_code(err))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    tracing::debug!("promogate v{}", env!("CARGO_PKG_VERSION"));

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(err) => {
            print_json(&config_report(&err));
            return ExitCode::from(config_exit_code(&err));
        }
    };

    match execute(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => failure_exit(&err),
    }
}
