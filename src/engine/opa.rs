use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::config::GateConfig;
use crate::engine::process::{self, RunError};
use crate::engine::{PolicyEngine, RawEngineOutput};
use crate::error::GateError;
use crate::rules::RuleBundle;

/// Query handed to `opa eval`. The whole data tree comes back and compliance
/// leaves are located by [`crate::eval::collect_leaves`].
pub const QUERY: &str = "data";

/// Runs the OPA binary as `opa eval --format json --data <rules> --input <doc> [extra] data`.
#[derive(Debug, Clone)]
pub struct OpaEngine {
    binary: PathBuf,
    extra_args: Vec<String>,
    timeout: Option<Duration>,
}

impl OpaEngine {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            binary: config.engine_path.clone(),
            extra_args: config.extra_args.clone(),
            timeout: config.timeout,
        }
    }

    /// Argument vector after the binary. Paths are passed as-is, never through a shell.
    pub fn args(&self, bundle: &RuleBundle, document: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "eval".into(),
            "--format".into(),
            "json".into(),
            "--data".into(),
            bundle.path().into(),
            "--input".into(),
            document.into(),
        ];
        args.extend(self.extra_args.iter().map(OsString::from));
        args.push(QUERY.into());
        args
    }

    fn command(&self, bundle: &RuleBundle, document: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.args(bundle, document));
        cmd
    }

    /// Shell-quoted rendering of the invocation, for logs only.
    fn display_command(&self, bundle: &RuleBundle, document: &Path) -> String {
        let words: Vec<String> = std::iter::once(self.binary.as_os_str().to_owned())
            .chain(self.args(bundle, document))
            .map(|w| w.to_string_lossy().into_owned())
            .collect();
        shlex::try_join(words.iter().map(String::as_str)).unwrap_or_else(|_| words.join(" "))
    }
}

impl PolicyEngine for OpaEngine {
    fn evaluate(&self, bundle: &RuleBundle, document: &Path) -> Result<RawEngineOutput, GateError> {
        log::debug!("running {}", self.display_command(bundle, document));

        let invocation_error = |reason: String| GateError::EngineInvocation {
            document: document.to_path_buf(),
            reason,
        };

        let captured = process::run(&mut self.command(bundle, document), self.timeout).map_err(
            |e| match e {
                RunError::Spawn(err) => {
                    invocation_error(format!("cannot start {}: {err}", self.binary.display()))
                }
                other => invocation_error(format!("{} {other}", self.binary.display())),
            },
        )?;

        let stdout = String::from_utf8_lossy(&captured.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&captured.stderr).into_owned();

        if !captured.status.success() {
            log::error!("engine stdout for {}:\n{stdout}", document.display());
            log::error!("engine stderr for {}:\n{stderr}", document.display());
            let reason = match captured.status.code() {
                Some(code) => format!("engine exited with status {code}"),
                None => "engine was terminated by a signal".to_string(),
            };
            return Err(invocation_error(reason));
        }

        log::debug!("engine stdout for {}: {stdout}", document.display());
        Ok(RawEngineOutput {
            document: document.to_path_buf(),
            stdout,
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(extra: &[&str]) -> OpaEngine {
        OpaEngine {
            binary: PathBuf::from("/opt/opa/bin/opa"),
            extra_args: extra.iter().map(|s| s.to_string()).collect(),
            timeout: None,
        }
    }

    fn bundle() -> (tempfile::TempDir, RuleBundle) {
        let dir = tempfile::tempdir().unwrap();
        let bundle = RuleBundle::open(dir.path()).unwrap();
        (dir, bundle)
    }

    #[test]
    fn args_keep_paths_as_single_words() {
        let (_dir, bundle) = bundle();
        let doc = Path::new("cdk out/My App; rm -rf.template.json");
        let args = engine(&[]).args(&bundle, doc);
        assert_eq!(args[0], "eval");
        assert_eq!(args[3], "--data");
        assert_eq!(args[4], bundle.path().as_os_str());
        assert_eq!(args[5], "--input");
        assert_eq!(args[6], doc.as_os_str());
        assert_eq!(args.last().unwrap(), QUERY);
    }

    #[test]
    fn extra_args_precede_query() {
        let (_dir, bundle) = bundle();
        let args = engine(&["--v0-compatible"]).args(&bundle, Path::new("a.json"));
        let n = args.len();
        assert_eq!(args[n - 2], "--v0-compatible");
        assert_eq!(args[n - 1], "data");
    }

    #[test]
    fn display_command_quotes_spaces() {
        let (_dir, bundle) = bundle();
        let shown = engine(&[]).display_command(&bundle, Path::new("my template.json"));
        assert!(shown.starts_with("/opt/opa/bin/opa eval --format json"));
        let words = shlex::split(&shown).unwrap();
        assert!(words.iter().any(|w| w == "my template.json"));
    }

    #[test]
    fn missing_binary_is_invocation_error() {
        let (_dir, bundle) = bundle();
        let err = engine(&[])
            .evaluate(&bundle, Path::new("a.json"))
            .unwrap_err();
        assert!(matches!(err, GateError::EngineInvocation { .. }));
        assert!(err.to_string().contains("cannot start"));
    }
}
