pub mod verdict;
pub mod walk;

pub use verdict::{EvaluationResult, Verdict};
pub use walk::{LeafError, collect_leaves};

use serde::Deserialize;

use crate::engine::RawEngineOutput;
use crate::error::GateError;

/// `opa eval --format json` envelope. An undefined query prints `{}`.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Vec<QueryResult>,
    #[serde(default)]
    errors: Vec<EngineMessage>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    expressions: Vec<Expression>,
}

#[derive(Debug, Deserialize)]
struct Expression {
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct EngineMessage {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
}

/// Turn raw engine output into per-package results, in engine order.
///
/// Results are neither sorted nor deduplicated. Anything that does not fit the
/// envelope, or a leaf that is not a boolean, is an `EngineOutput` error
/// carrying the raw stdout and stderr.
pub fn aggregate(raw: &RawEngineOutput, leaf: &str) -> Result<Vec<EvaluationResult>, GateError> {
    let malformed = |reason: String| GateError::EngineOutput {
        document: raw.document.clone(),
        reason,
        stdout: raw.stdout.clone(),
        stderr: raw.stderr.clone(),
    };

    let envelope: Envelope = serde_json::from_str(&raw.stdout)
        .map_err(|e| malformed(format!("expected opa eval JSON: {e}")))?;

    if !envelope.errors.is_empty() {
        let messages: Vec<String> = envelope
            .errors
            .iter()
            .map(|m| match &m.code {
                Some(code) => format!("{code}: {}", m.message),
                None => m.message.clone(),
            })
            .collect();
        return Err(malformed(format!(
            "engine reported errors: {}",
            messages.join("; ")
        )));
    }

    let mut results = Vec::new();
    for query_result in &envelope.result {
        for expr in &query_result.expressions {
            let found = collect_leaves(&expr.value, leaf).map_err(|e| malformed(e.to_string()))?;
            results.extend(found);
        }
    }
    Ok(results)
}
