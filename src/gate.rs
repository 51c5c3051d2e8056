//! Gate controller: evaluates documents in order and settles on one verdict.

use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::Serialize;

use crate::engine::PolicyEngine;
use crate::error::GateError;
use crate::eval::{self, EvaluationResult, Verdict};
use crate::rules::RuleBundle;

/// Results for one input document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub path: PathBuf,
    pub results: Vec<EvaluationResult>,
}

impl DocumentReport {
    pub fn verdict(&self) -> Verdict {
        Verdict::of(&self.results)
    }
}

/// Outcome of a gate run that reached a verdict.
#[derive(Debug, Clone, Serialize)]
pub struct GateReport {
    pub verdict: Verdict,
    /// Evaluated documents, in the order supplied.
    pub documents: Vec<DocumentReport>,
    /// Documents not evaluated because an earlier one failed.
    pub skipped: Vec<PathBuf>,
}

impl GateReport {
    pub fn exit_code(&self) -> i32 {
        self.verdict.exit_code()
    }

    /// Number of rule results across all evaluated documents.
    pub fn result_count(&self) -> usize {
        self.documents.iter().map(|d| d.results.len()).sum()
    }
}

pub struct Gate<E> {
    engine: E,
    leaf: String,
}

impl<E: PolicyEngine> Gate<E> {
    pub fn new(engine: E, leaf: impl Into<String>) -> Self {
        Self {
            engine,
            leaf: leaf.into(),
        }
    }

    /// Evaluate `documents` one at a time against `bundle`.
    ///
    /// Every result of a document is logged before deciding. The first document
    /// with a non-compliant result ends the run with [`Verdict::Fail`]; later
    /// documents are reported as skipped. Engine errors abort immediately.
    pub fn run(&self, bundle: &RuleBundle, documents: &[PathBuf]) -> Result<GateReport, GateError> {
        let mut report = GateReport {
            verdict: Verdict::Pass,
            documents: Vec::with_capacity(documents.len()),
            skipped: Vec::new(),
        };

        if documents.is_empty() {
            warn!("No input files received; nothing was checked");
            return Ok(report);
        }

        for (i, document) in documents.iter().enumerate() {
            let doc_report = self.evaluate_document(bundle, document)?;
            let verdict = doc_report.verdict();
            report.documents.push(doc_report);

            if verdict == Verdict::Fail {
                report.verdict = Verdict::Fail;
                report.skipped = documents[i + 1..].to_vec();
                if !report.skipped.is_empty() {
                    warn!(
                        "Skipping {} remaining input file(s) after policy failure on {}",
                        report.skipped.len(),
                        document.display()
                    );
                }
                return Ok(report);
            }
        }

        info!("All OPA policy checks succeeded");
        Ok(report)
    }

    fn evaluate_document(
        &self,
        bundle: &RuleBundle,
        document: &Path,
    ) -> Result<DocumentReport, GateError> {
        let raw = self.engine.evaluate(bundle, document)?;
        let results = eval::aggregate(&raw, &self.leaf).inspect_err(log_raw_output)?;

        if results.is_empty() {
            warn!(
                "No `{}` rules evaluated on input file {}",
                self.leaf,
                document.display()
            );
        }
        for result in &results {
            if result.compliant {
                info!(
                    "OPA policy {} {} on input file {}",
                    result.package,
                    result.outcome(),
                    document.display()
                );
            } else {
                error!(
                    "OPA policy {} {} on input file {}",
                    result.package,
                    result.outcome(),
                    document.display()
                );
            }
        }

        Ok(DocumentReport {
            path: document.to_path_buf(),
            results,
        })
    }
}

fn log_raw_output(err: &GateError) {
    if let GateError::EngineOutput {
        document,
        stdout,
        stderr,
        ..
    } = err
    {
        error!("Raw engine stdout for {}:\n{stdout}", document.display());
        error!("Raw engine stderr for {}:\n{stderr}", document.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RawEngineOutput;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Engine that replays canned stdout per document and records call order.
    struct CannedEngine {
        outputs: HashMap<PathBuf, String>,
        calls: RefCell<Vec<PathBuf>>,
    }

    impl CannedEngine {
        fn new(outputs: Vec<(&str, String)>) -> Self {
            Self {
                outputs: outputs
                    .into_iter()
                    .map(|(p, o)| (PathBuf::from(p), o))
                    .collect(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl PolicyEngine for &CannedEngine {
        fn evaluate(
            &self,
            _bundle: &RuleBundle,
            document: &Path,
        ) -> Result<RawEngineOutput, GateError> {
            self.calls.borrow_mut().push(document.to_path_buf());
            match self.outputs.get(document) {
                Some(stdout) => Ok(RawEngineOutput {
                    document: document.to_path_buf(),
                    stdout: stdout.clone(),
                    stderr: String::new(),
                }),
                None => Err(GateError::EngineInvocation {
                    document: document.to_path_buf(),
                    reason: "engine was terminated by a signal".into(),
                }),
            }
        }
    }

    fn opa(value: &str) -> String {
        format!(r#"{{"result":[{{"expressions":[{{"value":{value}}}]}}]}}"#)
    }

    fn docs(paths: &[&str]) -> Vec<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    fn run(engine: &CannedEngine, documents: &[&str]) -> Result<GateReport, GateError> {
        let dir = tempfile::tempdir().unwrap();
        let bundle = RuleBundle::open(dir.path()).unwrap();
        Gate::new(engine, "compliant").run(&bundle, &docs(documents))
    }

    const PASSING: &str = r#"{"s3_bucket_encryption":{"compliant":true}}"#;
    const FAILING: &str = r#"{"s3_bucket_encryption":{"compliant":false},"tags":{"compliant":false}}"#;

    #[test]
    fn no_documents_passes() {
        let engine = CannedEngine::new(vec![]);
        let report = run(&engine, &[]).unwrap();
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(report.result_count(), 0);
        assert!(engine.calls.borrow().is_empty());
    }

    #[test]
    fn all_compliant_passes() {
        let engine = CannedEngine::new(vec![("a.json", opa(PASSING)), ("b.json", opa(PASSING))]);
        let report = run(&engine, &["a.json", "b.json"]).unwrap();
        assert_eq!(report.verdict, Verdict::Pass);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.documents.len(), 2);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn violation_fails_and_keeps_every_result_of_the_document() {
        let engine = CannedEngine::new(vec![("a.json", opa(FAILING))]);
        let report = run(&engine, &["a.json"]).unwrap();
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.documents[0].results.len(), 2);
    }

    #[test]
    fn documents_after_a_failure_are_skipped() {
        let engine = CannedEngine::new(vec![
            ("a.json", opa(PASSING)),
            ("b.json", opa(FAILING)),
            ("c.json", opa(PASSING)),
        ]);
        let report = run(&engine, &["a.json", "b.json", "c.json"]).unwrap();
        assert_eq!(report.verdict, Verdict::Fail);
        assert_eq!(*engine.calls.borrow(), docs(&["a.json", "b.json"]));
        assert_eq!(report.skipped, docs(&["c.json"]));
    }

    #[test]
    fn empty_engine_result_is_not_an_error() {
        let engine = CannedEngine::new(vec![("a.json", "{}".into())]);
        let report = run(&engine, &["a.json"]).unwrap();
        assert_eq!(report.verdict, Verdict::Pass);
        assert!(report.documents[0].results.is_empty());
    }

    #[test]
    fn invocation_error_aborts_the_run() {
        let engine = CannedEngine::new(vec![("a.json", opa(PASSING))]);
        let err = run(&engine, &["a.json", "missing.json", "a.json"]).unwrap_err();
        assert!(matches!(err, GateError::EngineInvocation { .. }));
        assert_eq!(engine.calls.borrow().len(), 2);
    }

    #[test]
    fn malformed_output_is_a_tooling_error() {
        let engine = CannedEngine::new(vec![("a.json", "Error: truncated".into())]);
        let err = run(&engine, &["a.json"]).unwrap_err();
        assert!(matches!(err, GateError::EngineOutput { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn rerun_is_idempotent() {
        let engine = CannedEngine::new(vec![("a.json", opa(PASSING)), ("b.json", opa(FAILING))]);
        let first = run(&engine, &["a.json", "b.json"]).unwrap();
        let second = run(&engine, &["a.json", "b.json"]).unwrap();
        assert_eq!(first.verdict, second.verdict);
        for (x, y) in first.documents.iter().zip(&second.documents) {
            assert_eq!(x.results, y.results);
        }
    }

    #[test]
    fn report_serializes_verdict_lowercase() {
        let engine = CannedEngine::new(vec![("a.json", opa(FAILING))]);
        let report = run(&engine, &["a.json"]).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["verdict"], "fail");
        assert_eq!(json["documents"][0]["path"], "a.json");
        assert_eq!(
            json["documents"][0]["results"][0]["package"],
            "s3_bucket_encryption"
        );
    }
}
