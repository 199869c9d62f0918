//! Numeric threshold check

use std::fmt;

use serde::{Deserialize, Serialize};

use super::CheckResult;

/// Direction of a threshold comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// measured >= threshold
    #[serde(alias = "min", alias = "gte")]
    AtLeast,
    /// measured <= threshold
    #[serde(alias = "max", alias = "lte")]
    AtMost,
}

impl Comparison {
    pub fn holds(&self, measured: f64, threshold: f64) -> bool {
        match self {
            Comparison::AtLeast => measured >= threshold,
            Comparison::AtMost => measured <= threshold,
        }
    }

    /// `candidate` if `measured` already violates it, otherwise the nearest
    /// threshold past `measured` in the failing direction
    pub fn violating(&self, measured: f64, candidate: f64) -> f64 {
        if !self.holds(measured, candidate) {
            return candidate;
        }
        let step = measured.abs().max(1.0);
        match self {
            Comparison::AtLeast => measured + step,
            Comparison::AtMost => measured - step,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::AtLeast => write!(f, "at_least"),
            Comparison::AtMost => write!(f, "at_most"),
        }
    }
}

/// Compare a measurement against a threshold
///
/// An injected threshold always fails the check: when the injected value would
/// still hold, it is moved past `measured` in the failing direction. The
/// threshold actually used is echoed as `details.threshold`, the raw injected
/// value as `details.injected_threshold`.
pub fn threshold(
    measured: f64,
    comparison: Comparison,
    configured: f64,
    injected: Option<f64>,
) -> CheckResult {
    let used = match injected {
        Some(value) => comparison.violating(measured, value),
        None => configured,
    };

    let result = CheckResult::from_bool(injected.is_none() && comparison.holds(measured, used))
        .with("measured", measured)
        .with("comparison", comparison.to_string())
        .with("threshold", used)
        .with("configured_threshold", configured);
    match injected {
        Some(value) => result.with("injected_threshold", value).with_forced(true),
        None => result.with_forced(false),
    }
}
