//! Existence, JSON validity and schema checks

use serde_json::Value;

use super::CheckResult;
use crate::artifact::{Artifact, Field, LoadOutcome};
use crate::contracts::{check_schema, SchemaContract};

/// `<kind>_exists`: a file is present at the declared path
///
/// A malformed file still exists; its JSON validity is reported separately.
pub fn existence(outcome: &LoadOutcome) -> CheckResult {
    let mut result = CheckResult::from_bool(outcome.exists())
        .with("path", outcome.path().display().to_string())
        .with("reason", outcome.reason());

    if let Some(artifact) = outcome.artifact() {
        result = result
            .with("sha256", artifact.sha256.clone())
            .with("bytes", artifact.size);
        if let Some(generated_at) = artifact.generated_at() {
            result = result.with("generated_at", generated_at);
        }
    }
    result
}

/// `<kind>_json_valid`: the file parsed as JSON
pub fn json_valid(outcome: &LoadOutcome) -> CheckResult {
    let result = CheckResult::from_bool(outcome.artifact().is_some()).with("reason", outcome.reason());
    match outcome {
        LoadOutcome::Malformed { error, .. } | LoadOutcome::Unreadable { error, .. } => {
            result.with("error", error.clone())
        }
        _ => result,
    }
}

fn field_value(field: Field<'_>) -> Value {
    match field {
        Field::Present(value) => value.clone(),
        Field::Absent => Value::Null,
    }
}

/// Schema identity against the registry contract
pub fn schema(artifact: &Artifact, contract: &SchemaContract) -> CheckResult {
    let check = check_schema(artifact, contract);
    let header = artifact.schema();

    let mut result = CheckResult::from_bool(check.ok)
        .with("reason", check.reason.to_string())
        .with("schema_id", field_value(header.id))
        .with("schema_version", field_value(header.version));

    if let Some(pattern) = &contract.def.schema_id_pattern {
        result = result.with("expected_pattern", pattern.clone());
    }
    if let Some(id) = &contract.def.schema_id {
        result = result.with("expected_id", id.clone());
    }
    if let Some(version) = contract.def.schema_version {
        result = result.with("expected_version", version);
    }
    result
}
