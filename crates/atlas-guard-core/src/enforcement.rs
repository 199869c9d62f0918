//! Enforcement Mode Controller
//!
//! Check logic is identical under both modes; only the exit code differs.
//!
//! Resolution order: explicit flag > `STRICT_<NAME>` > `STRICT_MODE` > HINT.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{env_name, Configuration};
use crate::error::GuardError;
use crate::verdict::Verdict;

/// Global strictness toggle
pub const STRICT_MODE_VAR: &str = "STRICT_MODE";

/// Advisory or blocking enforcement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnforcementMode {
    /// Advisory: always exits 0
    #[default]
    Hint,
    /// Blocking: exit reflects `ok`
    Strict,
}

impl EnforcementMode {
    /// Resolve the mode for one guard
    pub fn resolve(config: &Configuration, guard: &str) -> Self {
        if let Some(mode) = config.mode_override {
            return mode;
        }
        let per_guard = env_name("STRICT", guard);
        let strict = config
            .get_bool(&per_guard)
            .or_else(|| config.get_bool(STRICT_MODE_VAR))
            .unwrap_or(false);
        if strict {
            EnforcementMode::Strict
        } else {
            EnforcementMode::Hint
        }
    }

    /// Exit status a verdict maps to under this mode
    ///
    /// Skipped checks count as passing; they are reported in the verdict only.
    pub fn exit_for(&self, verdict: &Verdict) -> GuardExit {
        match self {
            EnforcementMode::Hint => GuardExit::Pass,
            EnforcementMode::Strict if !verdict.ok => GuardExit::Failed,
            EnforcementMode::Strict => GuardExit::Pass,
        }
    }
}

impl fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnforcementMode::Hint => write!(f, "HINT"),
            EnforcementMode::Strict => write!(f, "STRICT"),
        }
    }
}

impl FromStr for EnforcementMode {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hint" => Ok(EnforcementMode::Hint),
            "strict" => Ok(EnforcementMode::Strict),
            other => Err(GuardError::invalid_input(format!(
                "unknown enforcement mode '{}' (expected hint or strict)",
                other
            ))),
        }
    }
}

/// Process exit status of a guard invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum GuardExit {
    /// Passed, or any HINT result
    Pass = 0,
    /// STRICT and `ok=false`
    Failed = 1,
    /// Usage or configuration error; no verdict was produced
    Usage = 2,
}

impl From<GuardExit> for i32 {
    fn from(code: GuardExit) -> Self {
        code as i32
    }
}
