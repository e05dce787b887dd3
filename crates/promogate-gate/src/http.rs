//! Blocking HTTP client for the remote policy gate.

use std::time::Instant;

use promogate_core::config::PolicyGateSettings;
use promogate_core::policy::{GateRequest, PolicyGate, PolicyGateError};
use reqwest::blocking::Client;
use serde_json::{Map, Value};
use tracing::{debug, info};

const WORKSPACE_HEADER: &str = "x-workspace-id";

/// POSTs each decision to a single gate endpoint and returns its verdict.
pub struct HttpPolicyGate {
    client: Client,
    url: String,
}

impl HttpPolicyGate {
    /// Build a client with the configured request timeout. A timeout too
    /// large to schedule a deadline for means no timeout.
    pub fn new(settings: &PolicyGateSettings) -> Result<Self, PolicyGateError> {
        let timeout = Instant::now()
            .checked_add(settings.timeout)
            .map(|_| settings.timeout);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PolicyGateError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            url: settings.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl PolicyGate for HttpPolicyGate {
    fn review(&self, request: &GateRequest) -> Result<Map<String, Value>, PolicyGateError> {
        info!(
            url = %self.url,
            file = %request.file,
            requested_action = %request.requested_action,
            "consulting policy gate"
        );
        let resp = self
            .client
            .post(&self.url)
            .header(WORKSPACE_HEADER, &request.workspace_id)
            .json(request)
            .send()
            .map_err(|e| PolicyGateError::Unreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PolicyGateError::HttpStatus(status.as_u16()));
        }

        let raw = resp
            .text()
            .map_err(|e| PolicyGateError::Unreachable(e.to_string()))?;
        debug!(bytes = raw.len(), "policy gate responded");
        decode_response(&raw)
    }
}

/// Decode a gate response body. A blank body reads as `{}`.
pub fn decode_response(raw: &str) -> Result<Map<String, Value>, PolicyGateError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(PolicyGateError::InvalidJson { detail: None }),
        Err(e) => Err(PolicyGateError::InvalidJson {
            detail: Some(e.to_string()),
        }),
    }
}
