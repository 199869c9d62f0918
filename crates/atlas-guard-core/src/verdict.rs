//! Verdict Builder
//!
//! Aggregates named check results into the canonical verdict document:
//!
//! ```json
//! {"ok": false, "guard": "chip_propagation", "mode": "HINT",
//!  "checks": {"filter_chips_exists": true, "chip_apply_drift": false},
//!  "counts": {"missing_count": 1, "extra_count": 0},
//!  "details": {"chip_apply_drift": {"missing": ["chip:b"], "extra": []}},
//!  "generated_at": "2026-05-01T00:00:00Z"}
//! ```
//!
//! `ok` is always the AND of `checks` and `counts` is always derived from the
//! detail lists checkers flagged as counted. Neither is ever set by hand.
//!
//! A list published by a single check is counted as `<field>_count`. When
//! several checks publish the same field, every one of them is counted as
//! `<check>_<field>_count`, so a key never depends on check order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use chrono::SecondsFormat;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::checks::{CheckOutcome, CheckResult};
use crate::enforcement::EnforcementMode;
use crate::error::{CheckError, GuardError, Result};
use crate::staleness::Clock;

/// Canonical result of one guard invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// AND over every `checks` entry
    pub ok: bool,
    /// Guard identity
    pub guard: String,
    /// Enforcement mode the verdict was produced under
    pub mode: EnforcementMode,
    /// Check name to pass/fail, in declared order
    pub checks: IndexMap<String, bool>,
    /// Lengths of counted detail lists
    pub counts: IndexMap<String, u64>,
    /// Check name to payload
    pub details: IndexMap<String, Value>,
    /// Present and true when an injected fault decided any check
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub forced: bool,
    /// Checks that passed only because an optional dependency was absent
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    /// RFC3339 build time; the only field that differs between identical runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

impl Verdict {
    /// Names of failing checks, in declared order
    pub fn failures(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// `ok` matches the AND of `checks`
    pub fn is_consistent(&self) -> bool {
        self.ok == self.checks.values().all(|ok| *ok)
    }

    /// Copy without the build timestamp, for comparing runs
    pub fn without_timestamp(&self) -> Self {
        Self {
            generated_at: None,
            ..self.clone()
        }
    }

    /// Pretty JSON document as printed and persisted
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GuardError::SerializationError(e.to_string()))
    }

    /// Parse a persisted verdict
    pub fn from_json(content: &str) -> Result<Self> {
        let verdict: Verdict = serde_json::from_str(content)?;
        if !verdict.is_consistent() {
            return Err(GuardError::invalid_input(format!(
                "verdict for '{}' is inconsistent: ok does not match its checks",
                verdict.guard
            )));
        }
        Ok(verdict)
    }

    /// Read a persisted verdict file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GuardError::FileError(format!("Failed to read verdict '{}': {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }
}

/// Incrementally assembles a [`Verdict`]
#[derive(Debug)]
pub struct VerdictBuilder {
    guard: String,
    checks: IndexMap<String, bool>,
    counted: Vec<CountedList>,
    details: IndexMap<String, Value>,
    forced: bool,
    skipped: Vec<String>,
}

#[derive(Debug)]
struct CountedList {
    check: String,
    field: String,
    len: u64,
}

impl VerdictBuilder {
    pub fn new(guard: impl Into<String>) -> Self {
        Self {
            guard: guard.into(),
            checks: IndexMap::new(),
            counted: Vec::new(),
            details: IndexMap::new(),
            forced: false,
            skipped: Vec::new(),
        }
    }

    /// Record a checker outcome; an error becomes a failing check with `details.error`
    pub fn record(&mut self, name: &str, outcome: CheckOutcome) -> &mut Self {
        let result = outcome.unwrap_or_else(|err| {
            tracing::warn!(guard = %self.guard, check = name, error = %err, "check errored");
            error_result(&err)
        });
        self.add(name, result)
    }

    /// Run a checker, converting both errors and panics into a failing check
    pub fn evaluate<F>(&mut self, name: &str, checker: F) -> &mut Self
    where
        F: FnOnce() -> CheckOutcome,
    {
        match catch_unwind(AssertUnwindSafe(checker)) {
            Ok(outcome) => self.record(name, outcome),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "checker panicked".to_string());
                tracing::error!(guard = %self.guard, check = name, %message, "check panicked");
                self.add(name, CheckResult::fail().with("error", message))
            }
        }
    }

    fn add(&mut self, name: &str, result: CheckResult) -> &mut Self {
        for field in &result.counted {
            let len = match result.details.get(field) {
                Some(Value::Array(items)) => items.len() as u64,
                _ => 0,
            };
            self.counted.retain(|c| !(c.check == name && c.field == *field));
            self.counted.push(CountedList {
                check: name.to_string(),
                field: field.clone(),
                len,
            });
        }

        if result.forced {
            self.forced = true;
        }
        if result.skipped && !self.skipped.iter().any(|s| s == name) {
            self.skipped.push(name.to_string());
        }

        tracing::debug!(guard = %self.guard, check = name, ok = result.ok, "check recorded");
        self.checks.insert(name.to_string(), result.ok);
        self.details.insert(name.to_string(), Value::Object(result.details));
        self
    }

    /// Seal the verdict
    pub fn build(self, mode: EnforcementMode, clock: &dyn Clock) -> Verdict {
        let ok = self.checks.values().all(|ok| *ok);
        let counts = count_keys(&self.counted);
        Verdict {
            ok,
            guard: self.guard,
            mode,
            checks: self.checks,
            counts,
            details: self.details,
            forced: self.forced,
            skipped: self.skipped,
            generated_at: Some(clock.now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

fn count_keys(counted: &[CountedList]) -> IndexMap<String, u64> {
    let mut publishers: IndexMap<&str, usize> = IndexMap::new();
    for list in counted {
        *publishers.entry(list.field.as_str()).or_default() += 1;
    }

    counted
        .iter()
        .map(|list| {
            let shared = publishers.get(list.field.as_str()).copied().unwrap_or(0) > 1;
            let key = if shared {
                format!("{}_{}_count", list.check, list.field)
            } else {
                format!("{}_count", list.field)
            };
            (key, list.len)
        })
        .collect()
}

fn error_result(err: &CheckError) -> CheckResult {
    let mut details = Map::new();
    details.insert("error".to_string(), Value::String(err.to_string()));
    if let CheckError::ArtifactUnavailable { kind, reason } = err {
        details.insert("artifact".to_string(), Value::String(kind.clone()));
        details.insert("reason".to_string(), Value::String(reason.clone()));
    }
    CheckResult {
        ok: false,
        details,
        ..Default::default()
    }
}
