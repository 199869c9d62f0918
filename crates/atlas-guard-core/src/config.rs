//! Invocation configuration
//!
//! A [`Configuration`] is built once per guard invocation from a snapshot of
//! the process environment plus command-line overrides, then passed
//! explicitly to the runner. Nothing below this module reads the environment.
//!
//! # Variable naming
//!
//! Guard parameters follow `<DOMAIN>_<PARAM>`, where the domain is the guard
//! name uppercased with `-`, `.` and `/` folded to `_`:
//!
//! - guard="graph_rollup", param="STALE_THRESHOLD_SECONDS" -> `GRAPH_ROLLUP_STALE_THRESHOLD_SECONDS`
//! - guard="search-eval", param="min_queries" -> `SEARCH_EVAL_MIN_QUERIES`
//!
//! Every getter takes a default and never fails: malformed values are logged
//! and the default is used.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::enforcement::EnforcementMode;

/// Root directory artifacts are resolved against
pub const ROOT_VAR: &str = "ATLAS_GUARD_ROOT";
/// Directory verdict files are written to
pub const EVIDENCE_DIR_VAR: &str = "ATLAS_GUARD_EVIDENCE_DIR";
/// Size of the artifact loading pool
pub const WORKERS_VAR: &str = "ATLAS_GUARD_WORKERS";

pub const DEFAULT_EVIDENCE_DIR: &str = "evidence";
pub const DEFAULT_WORKERS: usize = 4;

/// Build an environment variable name from a guard domain and a parameter
pub fn env_name(domain: &str, param: &str) -> String {
    let mut name = if domain.is_empty() {
        param.to_string()
    } else {
        format!("{}_{}", domain, param)
    };
    name = name.replace(['-', '.', '/'], "_");
    name.to_uppercase()
}

/// Lenient boolean parsing shared by every toggle
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Configuration for one guard invocation
#[derive(Debug, Clone)]
pub struct Configuration {
    vars: BTreeMap<String, String>,
    /// Directory relative artifact paths are resolved against
    pub root: PathBuf,
    /// Flat directory receiving `<guard>.verdict.json`
    pub evidence_dir: PathBuf,
    /// Explicit verdict output path (overrides the evidence directory)
    pub output_path: Option<PathBuf>,
    /// Upper bound on concurrently loaded artifacts
    pub workers: usize,
    /// Mode requested by an explicit flag; wins over any environment toggle
    pub mode_override: Option<EnforcementMode>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::from_vars(std::iter::empty::<(String, String)>())
    }
}

impl Configuration {
    /// Snapshot the current process environment
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build from an explicit set of variables
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut config = Self {
            vars,
            root: PathBuf::from("."),
            evidence_dir: PathBuf::from(DEFAULT_EVIDENCE_DIR),
            output_path: None,
            workers: DEFAULT_WORKERS,
            mode_override: None,
        };

        let root = config.non_empty(ROOT_VAR);
        if let Some(root) = root {
            config.root = root;
        }
        let evidence_dir = config.non_empty(EVIDENCE_DIR_VAR);
        if let Some(dir) = evidence_dir {
            config.evidence_dir = dir;
        }
        config.workers = config.get_u64(WORKERS_VAR, DEFAULT_WORKERS as u64).max(1) as usize;
        config
    }

    /// Set the artifact root
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Set the evidence directory
    pub fn with_evidence_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.evidence_dir = dir.into();
        self
    }

    /// Set an explicit verdict output path
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Force the enforcement mode, ignoring environment toggles
    pub fn with_mode(mut self, mode: EnforcementMode) -> Self {
        self.mode_override = Some(mode);
        self
    }

    /// Set a variable after construction (tests and CLI overrides)
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Raw variable lookup
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    fn non_empty(&self, name: &str) -> Option<PathBuf> {
        self.var(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    /// Boolean toggle; `None` when unset or unparseable
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        let raw = self.var(name)?;
        let parsed = parse_bool(raw);
        if parsed.is_none() {
            tracing::warn!(variable = name, value = raw, "ignoring malformed boolean");
        }
        parsed
    }

    /// Boolean toggle with a default
    pub fn get_flag(&self, name: &str, default: bool) -> bool {
        self.get_bool(name).unwrap_or(default)
    }

    /// Non-negative integer with a default
    pub fn get_u64(&self, name: &str, default: u64) -> u64 {
        match self.var(name) {
            Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                tracing::warn!(variable = name, value = raw, default, "ignoring malformed integer");
                default
            }),
            None => default,
        }
    }

    /// Optional float; `None` when unset or unparseable
    pub fn get_f64_opt(&self, name: &str) -> Option<f64> {
        let raw = self.var(name)?;
        match raw.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => Some(value),
            _ => {
                tracing::warn!(variable = name, value = raw, "ignoring malformed number");
                None
            }
        }
    }

    /// Float with a default
    pub fn get_f64(&self, name: &str, default: f64) -> f64 {
        self.get_f64_opt(name).unwrap_or(default)
    }

    /// Comma-separated list; empty entries are dropped
    ///
    /// A variable with no non-empty entries counts as unset.
    pub fn get_list(&self, name: &str) -> Option<Vec<String>> {
        let raw = self.var(name)?;
        let items: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        if items.is_empty() {
            tracing::warn!(variable = name, value = raw, "ignoring empty list");
            return None;
        }
        Some(items)
    }

    /// Parameters scoped to one guard domain
    pub fn params<'a>(&'a self, domain: &'a str) -> GuardParams<'a> {
        GuardParams {
            config: self,
            domain,
        }
    }

    /// Resolve an artifact path against the root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// View of [`Configuration`] that prefixes every lookup with a guard domain
#[derive(Debug, Clone, Copy)]
pub struct GuardParams<'a> {
    config: &'a Configuration,
    domain: &'a str,
}

impl<'a> GuardParams<'a> {
    /// Full variable name for a parameter of this domain
    pub fn name(&self, param: &str) -> String {
        env_name(self.domain, param)
    }

    pub fn var(&self, param: &str) -> Option<&'a str> {
        self.config.var(&self.name(param))
    }

    pub fn get_bool(&self, param: &str) -> Option<bool> {
        self.config.get_bool(&self.name(param))
    }

    pub fn get_u64(&self, param: &str, default: u64) -> u64 {
        self.config.get_u64(&self.name(param), default)
    }

    pub fn get_f64_opt(&self, param: &str) -> Option<f64> {
        self.config.get_f64_opt(&self.name(param))
    }

    pub fn get_list(&self, param: &str) -> Option<Vec<String>> {
        self.config.get_list(&self.name(param))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_name() {
        assert_eq!(
            env_name("graph_rollup", "STALE_THRESHOLD_SECONDS"),
            "GRAPH_ROLLUP_STALE_THRESHOLD_SECONDS"
        );
        assert_eq!(env_name("search-eval", "min_queries"), "SEARCH_EVAL_MIN_QUERIES");
        assert_eq!(env_name("", "STRICT_MODE"), "STRICT_MODE");
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool(" Yes "), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_malformed_values_fall_back_to_defaults() {
        let config = Configuration::from_vars([
            ("SEARCH_EVAL_MIN_QUERIES", "ten"),
            ("SEARCH_EVAL_MAX_RERANK_GAP", "NaN"),
            ("STRICT_MODE", "perhaps"),
        ]);
        assert_eq!(config.get_u64("SEARCH_EVAL_MIN_QUERIES", 10), 10);
        assert_eq!(config.get_f64("SEARCH_EVAL_MAX_RERANK_GAP", 0.4), 0.4);
        assert_eq!(config.get_bool("STRICT_MODE"), None);
        assert!(!config.get_flag("STRICT_MODE", false));
    }

    #[test]
    fn test_builtin_variables() {
        let config = Configuration::from_vars([
            (ROOT_VAR, "/srv/atlas"),
            (EVIDENCE_DIR_VAR, "out/evidence"),
            (WORKERS_VAR, "0"),
        ]);
        assert_eq!(config.root, PathBuf::from("/srv/atlas"));
        assert_eq!(config.evidence_dir, PathBuf::from("out/evidence"));
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn test_scoped_params_and_lists() {
        let config = Configuration::from_vars([("ATLAS_LINKS_WHITELIST", "a.html, ,b.html")]);
        let params = config.params("atlas_links");
        assert_eq!(
            params.get_list("WHITELIST"),
            Some(vec!["a.html".to_string(), "b.html".to_string()])
        );
        assert_eq!(params.get_list("MISSING"), None);

        let blank = Configuration::from_vars([("ATLAS_BACKLINKS_MARKERS", " , ")]);
        assert_eq!(blank.params("atlas_backlinks").get_list("MARKERS"), None);
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let config = Configuration::default().with_root("/repo");
        assert_eq!(
            config.resolve(Path::new("share/x.json")),
            PathBuf::from("/repo/share/x.json")
        );
        assert_eq!(config.resolve(Path::new("/abs/x.json")), PathBuf::from("/abs/x.json"));
    }
}
