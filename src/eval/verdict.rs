use serde::Serialize;

/// Compliance judgment for one package against one input document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationResult {
    /// Dotted path of the package that produced the leaf, e.g. `s3_bucket_encryption`.
    pub package: String,
    pub compliant: bool,
}

impl EvaluationResult {
    pub fn outcome(&self) -> &'static str {
        if self.compliant { "succeeded" } else { "failed" }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    /// Fold results into a verdict. An empty slice passes.
    pub fn of(results: &[EvaluationResult]) -> Self {
        if results.iter().all(|r| r.compliant) {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Pass => 0,
            Verdict::Fail => 1,
        }
    }
}
