//! Per-proposal decisions and the KPI snapshot they carry.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// What the pipeline does with a proposal file.
///
/// Local evaluation only ever produces `Promote` or `Demote`. `Hold` exists so
/// a future gate can park a file in the inbox without changing the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Move into the applied directory.
    Promote,
    /// Move into the demoted archive.
    Demote,
    /// Leave in the inbox.
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Promote => "promote",
            Self::Demote => "demote",
            Self::Hold => "hold",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// KPI values for one proposal.
///
/// Ratios are normalised to 0.0–1.0. After evaluation `revenue_usdc` and
/// `token_cost_usdc` are always set (configured defaults fill the gaps) and
/// `margin_rate` is set whenever it is defined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub success_rate: Option<f64>,
    pub drift: Option<f64>,
    pub reproducibility: Option<f64>,
    pub revenue_usdc: Option<f64>,
    pub token_cost_usdc: Option<f64>,
    pub margin_rate: Option<f64>,
}

/// Outcome of evaluating one proposal file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Path of the proposal as scanned, for display and records.
    pub file: String,
    /// The scanned path itself. Unlike `file` it survives names that are not
    /// valid UTF-8.
    #[serde(skip)]
    pub source: PathBuf,
    pub action: Action,
    /// Failure codes. Non-empty means the local evaluator demoted the file.
    pub reasons: Vec<String>,
    /// Advisory codes that never force demotion.
    pub warnings: Vec<String>,
    pub kpi: Kpi,
    pub age_hours: f64,
}

impl Decision {
    /// Base name of the proposal file; the only part of the path that leaves
    /// the machine.
    pub fn file_name(&self) -> String {
        Path::new(&self.file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file.clone())
    }

    /// File name without its extension, used to name incident records.
    pub fn file_stem(&self) -> String {
        Path::new(&self.file)
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_name())
    }

    /// Path to move the proposal from. Falls back to `file` for decisions
    /// that did not come from a scan.
    pub fn source_path(&self) -> &Path {
        if self.source.as_os_str().is_empty() {
            Path::new(&self.file)
        } else {
            &self.source
        }
    }

    pub fn has_warning(&self, code: &str) -> bool {
        self.warnings.iter().any(|w| w == code)
    }

    /// Replace the action with a remote verdict, flagging the change.
    ///
    /// Returns `true` if the action changed.
    pub fn apply_override(&mut self, action: Action) -> bool {
        if action == self.action {
            return false;
        }
        self.warnings.push(crate::policy::OVERRIDE_WARNING.to_string());
        self.action = action;
        true
    }
}

/// A decision after execution: where the file went and which incident
/// record (written, or would-be in a dry run) it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    #[serde(flatten)]
    pub decision: Decision,
    pub destination: String,
    pub incident: Option<String>,
}
