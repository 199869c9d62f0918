//! Invariant Checker Library
//!
//! Every checker is a pure function from already-loaded artifact data to a
//! [`CheckResult`]. Checkers never read the environment, never touch the
//! network and never write anything; the guard runner extracts their inputs
//! from the [`ArtifactSet`](crate::artifact::ArtifactSet) and the
//! [`Configuration`](crate::config::Configuration).

pub mod fields;
pub mod freshness;
pub mod links;
pub mod presence;
pub mod sets;
pub mod threshold;

pub use fields::{exit_status, field_equals, EXIT_DEPENDENCY_MISSING};
pub use freshness::staleness;
pub use links::{cross_references, markers, LinkClass};
pub use presence::{existence, json_valid, schema};
pub use sets::{drift, subset, uniqueness};
pub use threshold::{threshold, Comparison};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CheckError;

/// Result of one named invariant
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CheckResult {
    pub ok: bool,
    pub details: Map<String, Value>,
    /// Detail lists whose lengths are published in the verdict `counts`
    #[serde(skip)]
    pub counted: Vec<String>,
    /// An injected fault decided (or could have decided) this result
    #[serde(skip)]
    pub forced: bool,
    /// Skipped because an optional dependency was absent
    #[serde(skip)]
    pub skipped: bool,
}

/// What a checker hands to the verdict builder
pub type CheckOutcome = Result<CheckResult, CheckError>;

impl CheckResult {
    pub fn from_bool(ok: bool) -> Self {
        Self {
            ok,
            ..Default::default()
        }
    }

    pub fn pass() -> Self {
        Self::from_bool(true)
    }

    pub fn fail() -> Self {
        Self::from_bool(false)
    }

    /// Attach a detail value
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Attach a detail list and publish its length in `counts`
    pub fn with_list(mut self, key: &str, items: Vec<String>) -> Self {
        self.details.insert(
            key.to_string(),
            Value::Array(items.into_iter().map(Value::String).collect()),
        );
        if !self.counted.iter().any(|k| k == key) {
            self.counted.push(key.to_string());
        }
        self
    }

    /// Mark as decided by fault injection; `details.forced` is always set
    pub fn with_forced(mut self, forced: bool) -> Self {
        self.forced = forced;
        self.details.insert("forced".to_string(), Value::Bool(forced));
        self
    }

    /// Mark as a tolerated skip (passes, but is reported)
    pub fn skip(reason: &str) -> Self {
        Self {
            ok: true,
            skipped: true,
            ..Default::default()
        }
        .with("skipped", true)
        .with("reason", reason)
    }
}

/// Sorted, de-duplicated copy of a list of ids
pub(crate) fn sorted_unique(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = items.into_iter().collect();
    out.sort();
    out.dedup();
    out
}
