//! Evaluation invoker: runs the policy engine for one document.
//!
//! [`PolicyEngine`] is the seam the gate controller depends on. [`OpaEngine`]
//! is the real implementation; tests substitute canned engines.

/// `opa eval` invocation.
pub mod opa;
/// Subprocess execution with timeout and captured output.
pub mod process;

pub use opa::OpaEngine;

use std::path::{Path, PathBuf};

use crate::error::GateError;
use crate::rules::RuleBundle;

/// Unparsed output of one successful engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEngineOutput {
    /// Document the engine evaluated.
    pub document: PathBuf,
    pub stdout: String,
    pub stderr: String,
}

/// Trait for policy engines.
///
/// An implementation evaluates one document against one rule bundle and
/// returns the engine's raw output, or an `EngineInvocation` error if the
/// engine could not run to a clean exit.
pub trait PolicyEngine {
    fn evaluate(&self, bundle: &RuleBundle, document: &Path) -> Result<RawEngineOutput, GateError>;
}
