//! Rule repository: the policy bundle handed whole to the engine.

use std::path::{Path, PathBuf};

use crate::error::GateError;

/// A directory of policy files. Rules inside are never parsed here; their
/// identities are recovered from engine output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleBundle {
    dir: PathBuf,
}

impl RuleBundle {
    /// Check that `dir` exists and is a readable directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, GateError> {
        let dir = dir.into();
        let meta = std::fs::metadata(&dir).map_err(|e| {
            GateError::config(format!("rule directory {}: {e}", dir.display()))
        })?;
        if !meta.is_dir() {
            return Err(GateError::config(format!(
                "rule directory {} is not a directory",
                dir.display()
            )));
        }
        std::fs::read_dir(&dir).map_err(|e| {
            GateError::config(format!("rule directory {} is not readable: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}
