//! Field-level checks on a single artifact

use serde_json::Value;

use super::CheckResult;
use crate::artifact::Field;

/// Exit code a shell reports when a command is not installed
pub const EXIT_DEPENDENCY_MISSING: i64 = 127;

/// A field equals an expected value; an absent field fails
pub fn field_equals(pointer: &str, field: Field<'_>, expected: &Value) -> CheckResult {
    let (ok, actual) = match field {
        Field::Present(value) => (value == expected, value.clone()),
        Field::Absent => (false, Value::Null),
    };

    CheckResult::from_bool(ok)
        .with("pointer", pointer)
        .with("present", field.is_present())
        .with("expected", expected.clone())
        .with("actual", actual)
}

/// A recorded exit code must be zero
///
/// [`EXIT_DEPENDENCY_MISSING`] means the tool never ran; it becomes a skip
/// that passes but is reported, so missing tooling alone never blocks.
pub fn exit_status(code: i64) -> CheckResult {
    match code {
        0 => CheckResult::pass().with("exit_code", code),
        EXIT_DEPENDENCY_MISSING => {
            CheckResult::skip("optional_dependency_missing").with("exit_code", code)
        }
        _ => CheckResult::fail().with("exit_code", code),
    }
}
