//! Structural discovery of compliance leaves in the engine's data tree.

use serde_json::Value;

use super::EvaluationResult;

#[derive(Debug, thiserror::Error)]
#[error("`{leaf}` under `{package}` is {found}, expected a boolean")]
pub struct LeafError {
    pub leaf: String,
    pub package: String,
    pub found: &'static str,
}

/// Collect every object entry named `leaf`, depth-first in document order.
///
/// The package of a leaf is the dotted path of its ancestor keys; array
/// elements contribute their index. Leaves are not descended into.
pub fn collect_leaves(value: &Value, leaf: &str) -> Result<Vec<EvaluationResult>, LeafError> {
    let mut path = Vec::new();
    let mut out = Vec::new();
    walk(value, leaf, &mut path, &mut out)?;
    Ok(out)
}

fn walk(
    value: &Value,
    leaf: &str,
    path: &mut Vec<String>,
    out: &mut Vec<EvaluationResult>,
) -> Result<(), LeafError> {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == leaf {
                    let package = path.join(".");
                    match child {
                        Value::Bool(compliant) => out.push(EvaluationResult {
                            package,
                            compliant: *compliant,
                        }),
                        other => {
                            return Err(LeafError {
                                leaf: leaf.to_string(),
                                package,
                                found: type_name(other),
                            });
                        }
                    }
                } else {
                    path.push(key.clone());
                    walk(child, leaf, path, out)?;
                    path.pop();
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                path.push(i.to_string());
                walk(item, leaf, path, out)?;
                path.pop();
            }
        }
        _ => {}
    }
    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
