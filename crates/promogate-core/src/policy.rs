//! Remote policy gate contract.
//!
//! In a real run each decision is sent to a remote authority which may
//! confirm or override it. The transport lives in `promogate-gate`; this
//! module holds the request shape, the error taxonomy, and the rule that
//! turns a response into an action.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::decision::{Action, Decision, Kpi};

/// Warning appended when the remote gate changes the local action.
pub const OVERRIDE_WARNING: &str = "policy_gate_action_override";

/// Failures talking to the policy gate. All of them abort the run.
#[derive(Debug, Error)]
pub enum PolicyGateError {
    #[error("policy_gate_unreachable:{0}")]
    Unreachable(String),

    #[error("policy_gate_http_{0}")]
    HttpStatus(u16),

    #[error("policy_gate_invalid_json{}", detail_suffix(.detail))]
    InvalidJson { detail: Option<String> },

    #[error("policy_gate_missing_allow_or_action")]
    MissingAllowOrAction,
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(":{d}")).unwrap_or_default()
}

/// Body POSTed to the policy gate for one decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateRequest {
    pub workspace_id: String,
    /// Base name only; directory layout stays local.
    pub file: String,
    pub requested_action: Action,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
    pub kpi: Kpi,
    pub age_hours: f64,
}

impl GateRequest {
    pub fn from_decision(workspace_id: &str, decision: &Decision) -> Self {
        Self {
            workspace_id: workspace_id.to_string(),
            file: decision.file_name(),
            requested_action: decision.action,
            reasons: decision.reasons.clone(),
            warnings: decision.warnings.clone(),
            kpi: decision.kpi.clone(),
            age_hours: decision.age_hours,
        }
    }
}

/// A remote authority that reviews decisions before they are applied.
pub trait PolicyGate {
    /// Send one request and return the decoded JSON object.
    fn review(&self, request: &GateRequest) -> Result<Map<String, Value>, PolicyGateError>;
}

/// Resolve the action to apply from a gate response.
///
/// 1. `allow: false` demotes, whatever `action` says.
/// 2. `action: "promote" | "demote"` wins next.
/// 3. `allow: true` passes the local action through.
/// 4. Anything else breaks the contract.
pub fn resolve_gate_action(
    local: Action,
    response: &Map<String, Value>,
) -> Result<Action, PolicyGateError> {
    let allow = response.get("allow").and_then(Value::as_bool);
    if allow == Some(false) {
        return Ok(Action::Demote);
    }
    match response.get("action").and_then(Value::as_str) {
        Some("promote") => return Ok(Action::Promote),
        Some("demote") => return Ok(Action::Demote),
        _ => {}
    }
    if allow == Some(true) {
        return Ok(local);
    }
    Err(PolicyGateError::MissingAllowOrAction)
}
