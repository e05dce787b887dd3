//! Core types for the promotion pipeline: proposal parsing, gate evaluation,
//! decisions, policy-gate resolution, and run summaries.
//!
//! Nothing in this crate touches the filesystem or the network.

pub mod config;
pub mod decision;
pub mod gates;
pub mod parser;
pub mod policy;
pub mod summary;

pub use config::{ConfigError, Directories, GateConfig, PipelineConfig, PolicyGateSettings, RunMode};
pub use decision::{Action, Decision, DecisionRecord, Kpi};
pub use gates::evaluate;
pub use parser::{NumberScale, ParsedMetadata, ProposalFields, parse_number, parse_proposal};
pub use policy::{GateRequest, PolicyGate, PolicyGateError, resolve_gate_action};
pub use summary::RunSummary;
