//! opa-gate: a blocking compliance step for build and deploy pipelines.
//!
//! Evaluates one or more input documents (typically synthesized
//! CloudFormation templates) against a directory of OPA policies and settles
//! on a single verdict. Each document is evaluated by running
//! `opa eval` once; every boolean leaf named `compliant` in the resulting data
//! tree is one rule result, identified by its dotted package path.
//!
//! # Architecture
//!
//! - **[`rules`]** — Rule bundle: the policy directory, checked but never parsed.
//! - **[`engine`]** — Evaluation invoker: argv-based `opa eval` with a timeout.
//! - **[`eval`]** — Result aggregation: envelope parsing and leaf discovery.
//! - **[`gate`]** — Controller: ordered per-document loop and final verdict.
//! - **[`config`]** — Configuration loading: embedded defaults + user overlay merge.
//! - **[`logging`]** — stderr and optional file logging via simplelog.
//!
//! Exit codes: `0` pass, `1` policy violation, `2` configuration or tooling error.

/// Configuration types, loading, overlay merge, and validation.
pub mod config;
/// Policy engine trait, OPA implementation, and subprocess handling.
pub mod engine;
/// Error taxonomy and exit codes.
pub mod error;
/// Engine output parsing, leaf discovery, verdict types.
pub mod eval;
/// Gate controller and run report.
pub mod gate;
/// Logger setup.
pub mod logging;
/// Policy bundle checks.
pub mod rules;

use std::path::PathBuf;

use config::GateConfig;
use engine::OpaEngine;
use error::GateError;
use gate::{Gate, GateReport};
use rules::RuleBundle;

/// Run the gate with the OPA engine described by `config`.
///
/// This is the main entry point for the binary and for embedding.
pub fn check(
    config: &GateConfig,
    bundle: &RuleBundle,
    documents: &[PathBuf],
) -> Result<GateReport, GateError> {
    let gate = Gate::new(OpaEngine::new(config), config.leaf.clone());
    gate.run(bundle, documents)
}
