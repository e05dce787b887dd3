//! Run configuration, resolved once from the command line and threaded by
//! reference through every stage.

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

pub const DEFAULT_PREFIX_PATTERN: &str = "^(PRJ|IDEA|LOG)-";
pub const DEFAULT_WORKSPACE_ID: &str = "ws_dev";
pub const MIN_POLICY_GATE_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration problems detected before any file is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--real-run was given without --confirm-real-run")]
    RealRunRequiresConfirm,

    #[error("a policy gate URL is required for a real run")]
    PolicyGateRequired,

    #[error("invalid filename prefix pattern {pattern:?}: {source}")]
    InvalidPrefixPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl ConfigError {
    /// Stable machine-readable code, printed as the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RealRunRequiresConfirm => "real_run_requires_confirm_flag",
            Self::PolicyGateRequired => "policy_gate_required_for_real_run",
            Self::InvalidPrefixPattern { .. } => "invalid_prefix_pattern",
        }
    }

    pub fn hint(&self) -> String {
        match self {
            Self::RealRunRequiresConfirm => "Use both --real-run and --confirm-real-run".into(),
            Self::PolicyGateRequired => {
                "Set --policy-gate-url (or PIPELINE_POLICY_GATE_URL) for real-run".into()
            }
            Self::InvalidPrefixPattern { source, .. } => {
                format!("Fix --require-prefix: {source}")
            }
        }
    }
}

/// Whether the run may move files and call the policy gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    DryRun,
    Real,
}

impl RunMode {
    /// Both flags are needed to leave dry-run mode.
    pub fn from_flags(real_run: bool, confirm_real_run: bool) -> Result<Self, ConfigError> {
        match (real_run, confirm_real_run) {
            (true, true) => Ok(Self::Real),
            (true, false) => Err(ConfigError::RealRunRequiresConfirm),
            (false, _) => Ok(Self::DryRun),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun)
    }
}

/// Filesystem locations used by a run.
#[derive(Debug, Clone)]
pub struct Directories {
    pub inbox: PathBuf,
    pub applied: PathBuf,
    pub demoted: PathBuf,
    pub incidents: PathBuf,
    pub log: PathBuf,
}

impl Default for Directories {
    fn default() -> Self {
        Self {
            inbox: PathBuf::from("promoted/inbox"),
            applied: PathBuf::from("promoted/applied"),
            demoted: PathBuf::from("tmp/archive/demoted"),
            incidents: PathBuf::from("memory/incidents"),
            log: PathBuf::from("tmp/export"),
        }
    }
}

/// Thresholds and defaults for the local gates.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Filename rule; must match at the start of the file name.
    pub prefix: Regex,
    pub sla_hours: f64,
    pub min_success: f64,
    pub max_drift: f64,
    pub min_repro: f64,
    pub default_revenue_usdc: f64,
    pub default_token_cost_usdc: f64,
    /// Advisory only: falling below it warns, never demotes.
    pub min_margin_rate: f64,
}

impl GateConfig {
    pub fn with_prefix(pattern: &str) -> Result<Self, ConfigError> {
        let prefix = compile_prefix(pattern)?;
        Ok(Self {
            prefix,
            ..Self::default()
        })
    }

    /// Whether `name` satisfies the prefix rule.
    pub fn prefix_matches(&self, name: &str) -> bool {
        self.prefix.find(name).is_some_and(|m| m.start() == 0)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            prefix: Regex::new(DEFAULT_PREFIX_PATTERN).expect("default prefix pattern is valid"),
            sla_hours: 24.0,
            min_success: 0.90,
            max_drift: 0.10,
            min_repro: 0.90,
            default_revenue_usdc: 0.0,
            default_token_cost_usdc: 0.0,
            min_margin_rate: 0.0,
        }
    }
}

pub fn compile_prefix(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPrefixPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Where and how to reach the remote policy gate.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyGateSettings {
    pub url: String,
    pub timeout: Duration,
}

impl PolicyGateSettings {
    /// Trims the URL and clamps the timeout to at least 100 ms. Values too
    /// large for a `Duration` saturate to `Duration::MAX`.
    ///
    /// Returns `None` for a blank URL.
    pub fn new(url: &str, timeout_secs: f64) -> Option<Self> {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        let timeout = if timeout_secs.is_nan() || timeout_secs <= 0.0 {
            MIN_POLICY_GATE_TIMEOUT
        } else {
            Duration::try_from_secs_f64(timeout_secs)
                .unwrap_or(Duration::MAX)
                .max(MIN_POLICY_GATE_TIMEOUT)
        };
        Some(Self {
            url: url.to_string(),
            timeout,
        })
    }
}

/// Everything a run needs to know.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub dirs: Directories,
    pub gates: GateConfig,
    pub mode: RunMode,
    pub workspace_id: String,
    pub policy_gate: Option<PolicyGateSettings>,
    pub seed_samples: bool,
}

impl PipelineConfig {
    /// Check cross-field rules. A real run must have a policy gate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mode == RunMode::Real && self.policy_gate.is_none() {
            return Err(ConfigError::PolicyGateRequired);
        }
        Ok(())
    }
}

/// Blank workspace ids fall back to [`DEFAULT_WORKSPACE_ID`].
pub fn normalize_workspace_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        DEFAULT_WORKSPACE_ID.to_string()
    } else {
        trimmed.to_string()
    }
}
