//! Fault Injection Harness
//!
//! Drift, staleness and threshold checks consult a [`FaultInjector`] passed
//! explicitly by the caller. Production wiring uses [`NoFaults`]; tests use
//! [`ScriptedFaults`]. The `<DOMAIN>_FORCE*` environment surface is
//! translated into [`EnvFaults`] at the CLI boundary only.
//!
//! Whatever an injector supplies is echoed into the check's details so a test
//! can assert on both `ok=false` and the exact injected value.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::config::{parse_bool, Configuration};

/// Overrides consulted by fault-aware checks
pub trait FaultInjector: Send + Sync {
    /// Value forcing the named drift check to fail
    fn drift(&self, _check: &str) -> Option<Value> {
        None
    }

    /// Whether the named staleness check is forced stale
    fn stale(&self, _check: &str) -> bool {
        false
    }

    /// Injected threshold for the named check; the check fails whichever way it compares
    fn threshold(&self, _check: &str) -> Option<f64> {
        None
    }
}

/// Injector that never injects
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaults;

impl FaultInjector for NoFaults {}

/// Per-check overrides set up explicitly by tests
#[derive(Debug, Clone, Default)]
pub struct ScriptedFaults {
    drift: BTreeMap<String, Value>,
    stale: BTreeSet<String>,
    thresholds: BTreeMap<String, f64>,
}

impl ScriptedFaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn force_drift(mut self, check: impl Into<String>, injected: impl Into<Value>) -> Self {
        self.drift.insert(check.into(), injected.into());
        self
    }

    pub fn force_stale(mut self, check: impl Into<String>) -> Self {
        self.stale.insert(check.into());
        self
    }

    pub fn override_threshold(mut self, check: impl Into<String>, threshold: f64) -> Self {
        self.thresholds.insert(check.into(), threshold);
        self
    }
}

impl FaultInjector for ScriptedFaults {
    fn drift(&self, check: &str) -> Option<Value> {
        self.drift.get(check).cloned()
    }

    fn stale(&self, check: &str) -> bool {
        self.stale.contains(check)
    }

    fn threshold(&self, check: &str) -> Option<f64> {
        self.thresholds.get(check).copied()
    }
}

/// Guard-wide overrides read from `<DOMAIN>_FORCE`, `<DOMAIN>_FORCE_STALE`
/// and `<DOMAIN>_FORCE_THRESHOLD`
///
/// `<DOMAIN>_FORCE` accepts a boolean (the raw text is injected) or any other
/// string, which is injected verbatim. A false value disables injection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvFaults {
    pub drift: Option<Value>,
    pub stale: bool,
    pub threshold: Option<f64>,
}

impl EnvFaults {
    pub fn from_config(config: &Configuration, domain: &str) -> Self {
        let params = config.params(domain);

        let drift = params.var("FORCE").and_then(|raw| match parse_bool(raw) {
            Some(false) => None,
            Some(true) | None => Some(Value::String(raw.trim().to_string())),
        });
        let stale = params.get_bool("FORCE_STALE").unwrap_or(false);
        let threshold = params.get_f64_opt("FORCE_THRESHOLD");

        let faults = Self {
            drift,
            stale,
            threshold,
        };
        if faults.is_active() {
            tracing::info!(guard = domain, ?faults, "fault injection active");
        }
        faults
    }

    pub fn is_active(&self) -> bool {
        self.drift.is_some() || self.stale || self.threshold.is_some()
    }
}

impl FaultInjector for EnvFaults {
    fn drift(&self, _check: &str) -> Option<Value> {
        self.drift.clone()
    }

    fn stale(&self, _check: &str) -> bool {
        self.stale
    }

    fn threshold(&self, _check: &str) -> Option<f64> {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_faults() {
        assert_eq!(NoFaults.drift("x"), None);
        assert!(!NoFaults.stale("x"));
        assert_eq!(NoFaults.threshold("x"), None);
    }

    #[test]
    fn test_scripted_faults_are_per_check() {
        let faults = ScriptedFaults::new()
            .force_drift("chip_apply_drift", "chip:ghost")
            .force_stale("rollup_fresh")
            .override_threshold("query_count", 1e9);

        assert_eq!(faults.drift("chip_apply_drift"), Some(json!("chip:ghost")));
        assert_eq!(faults.drift("other"), None);
        assert!(faults.stale("rollup_fresh"));
        assert_eq!(faults.threshold("query_count"), Some(1e9));
    }

    #[test]
    fn test_env_faults() {
        let config = Configuration::from_vars([
            ("CHIP_PROPAGATION_FORCE", "1"),
            ("GRAPH_ROLLUP_FORCE_STALE", "true"),
            ("SEARCH_EVAL_FORCE_THRESHOLD", "1000"),
            ("ATLAS_LINKS_FORCE", "0"),
            ("TV_RECEIPT_FORCE", "chip:injected"),
        ]);

        let chips = EnvFaults::from_config(&config, "chip_propagation");
        assert_eq!(chips.drift, Some(json!("1")));

        assert!(EnvFaults::from_config(&config, "graph_rollup").stale);
        assert_eq!(
            EnvFaults::from_config(&config, "search_eval").threshold,
            Some(1000.0)
        );
        assert!(!EnvFaults::from_config(&config, "atlas_links").is_active());
        assert_eq!(
            EnvFaults::from_config(&config, "tv_receipt").drift,
            Some(json!("chip:injected"))
        );
    }
}
