//! Error taxonomy for the gate.
//!
//! A policy violation is not an error: it is [`Verdict::Fail`](crate::eval::Verdict::Fail).
//! Everything here means the gate could not reach a verdict and exits with
//! [`TOOLING_EXIT_CODE`] so callers can tell "policy violated" from "tooling broken".

use std::path::PathBuf;

/// Exit status for every [`GateError`].
pub const TOOLING_EXIT_CODE: i32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("policy engine invocation failed for {}: {reason}", document.display())]
    EngineInvocation { document: PathBuf, reason: String },

    #[error("unparseable policy engine output for {}: {reason}", document.display())]
    EngineOutput {
        document: PathBuf,
        reason: String,
        stdout: String,
        stderr: String,
    },

    #[error("cannot write report {}: {source}", path.display())]
    Report {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl GateError {
    pub fn config(msg: impl Into<String>) -> Self {
        GateError::Configuration(msg.into())
    }

    /// Process exit status for this error. Always distinct from a compliance failure.
    pub fn exit_code(&self) -> i32 {
        TOOLING_EXIT_CODE
    }
}
