//! Declarative guards and the runner that evaluates them
//!
//! A guard is a short composition: the artifacts it requires and an ordered
//! list of named checks over them. The runner loads every declared artifact,
//! emits `<kind>_exists` (and `<kind>_json_valid` for JSON artifacts) for each
//! one, then evaluates the checks in declared order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifact::{ArtifactFormat, ArtifactSet, ArtifactStore};
use crate::checks::{self, CheckOutcome, Comparison};
use crate::config::{Configuration, GuardParams};
use crate::contracts::ContractRegistry;
use crate::enforcement::EnforcementMode;
use crate::error::{CheckError, GuardError, Result};
use crate::fault::{FaultInjector, NoFaults};
use crate::staleness::{Clock, StalenessPolicy, SystemClock};
use crate::verdict::{Verdict, VerdictBuilder};

/// Default parameter read for staleness thresholds
pub const STALE_THRESHOLD_PARAM: &str = "STALE_THRESHOLD_SECONDS";
/// One day
pub const DEFAULT_STALE_THRESHOLD_SECONDS: u64 = 86_400;

fn default_id_field() -> String {
    "id".to_string()
}

fn default_stale_param() -> String {
    STALE_THRESHOLD_PARAM.to_string()
}

fn default_stale_threshold() -> u64 {
    DEFAULT_STALE_THRESHOLD_SECONDS
}

/// An artifact a guard requires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Logical kind; also the prefix of the synthetic presence checks
    pub kind: String,
    /// Path relative to the configured root (overridable via `<DOMAIN>_<KIND>_PATH`)
    pub path: PathBuf,
    #[serde(default)]
    pub format: ArtifactFormat,
}

impl ArtifactSpec {
    pub fn json(kind: &str, path: &str) -> Self {
        Self {
            kind: kind.to_string(),
            path: PathBuf::from(path),
            format: ArtifactFormat::Json,
        }
    }

    pub fn text(kind: &str, path: &str) -> Self {
        Self {
            kind: kind.to_string(),
            path: PathBuf::from(path),
            format: ArtifactFormat::Text,
        }
    }
}

/// Where a list of ids comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdSource {
    pub artifact: String,
    /// Pointer (or dotted path) to the item array
    pub items: String,
    /// Field read from each item
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

impl IdSource {
    pub fn new(artifact: &str, items: &str, id_field: &str) -> Self {
        Self {
            artifact: artifact.to_string(),
            items: items.to_string(),
            id_field: id_field.to_string(),
        }
    }
}

/// The invariant a named check evaluates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum CheckSpec {
    /// Schema identity against the contract registry
    Schema { artifact: String },
    /// Every id of `subset` appears in `superset`
    Subset { subset: IdSource, superset: IdSource },
    /// No duplicate ids in one list
    Unique { source: IdSource },
    /// Two views of one logical set are equal
    Drift { expected: IdSource, observed: IdSource },
    /// Internal links resolve, are whitelisted, or are absolute
    Links {
        artifact: String,
        items: String,
        field: String,
        /// Directory links resolve against; defaults to the artifact's directory
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base: Option<PathBuf>,
        /// Extended by `<DOMAIN>_WHITELIST`
        #[serde(default)]
        whitelist: Vec<String>,
    },
    /// Literal markers present in a text artifact (replaced by `<DOMAIN>_MARKERS`)
    Markers {
        artifact: String,
        #[serde(default)]
        markers: Vec<String>,
    },
    /// Artifact mtime within a threshold
    Staleness {
        artifact: String,
        #[serde(default = "default_stale_threshold")]
        threshold_seconds: u64,
        #[serde(default = "default_stale_param")]
        param: String,
    },
    /// Numeric measurement against a threshold
    Threshold {
        artifact: String,
        pointer: String,
        /// Measure the length of the array at `pointer` instead of its value
        #[serde(default)]
        length: bool,
        comparison: Comparison,
        threshold: f64,
        /// Parameter overriding the default threshold
        #[serde(default, skip_serializing_if = "Option::is_none")]
        param: Option<String>,
    },
    /// A field equals an expected value
    FieldEquals {
        artifact: String,
        pointer: String,
        expected: Value,
    },
    /// A recorded exit code is zero (127 is a skip)
    ExitStatus { artifact: String, pointer: String },
}

impl CheckSpec {
    /// Artifact kinds this check reads
    pub fn artifacts(&self) -> Vec<&str> {
        match self {
            CheckSpec::Subset { subset, superset } => {
                vec![subset.artifact.as_str(), superset.artifact.as_str()]
            }
            CheckSpec::Unique { source } => vec![source.artifact.as_str()],
            CheckSpec::Drift { expected, observed } => {
                vec![expected.artifact.as_str(), observed.artifact.as_str()]
            }
            CheckSpec::Schema { artifact }
            | CheckSpec::Links { artifact, .. }
            | CheckSpec::Markers { artifact, .. }
            | CheckSpec::Staleness { artifact, .. }
            | CheckSpec::Threshold { artifact, .. }
            | CheckSpec::FieldEquals { artifact, .. }
            | CheckSpec::ExitStatus { artifact, .. } => vec![artifact.as_str()],
        }
    }

    /// Format the check's artifacts must be loaded as
    pub fn required_format(&self) -> ArtifactFormat {
        match self {
            CheckSpec::Markers { .. } => ArtifactFormat::Text,
            _ => ArtifactFormat::Json,
        }
    }

    /// Check family name, as used in the `check` tag
    pub fn family(&self) -> &'static str {
        match self {
            CheckSpec::Schema { .. } => "schema",
            CheckSpec::Subset { .. } => "subset",
            CheckSpec::Unique { .. } => "unique",
            CheckSpec::Drift { .. } => "drift",
            CheckSpec::Links { .. } => "links",
            CheckSpec::Markers { .. } => "markers",
            CheckSpec::Staleness { .. } => "staleness",
            CheckSpec::Threshold { .. } => "threshold",
            CheckSpec::FieldEquals { .. } => "field_equals",
            CheckSpec::ExitStatus { .. } => "exit_status",
        }
    }
}

/// A check with the name it is reported under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCheck {
    pub name: String,
    #[serde(flatten)]
    pub check: CheckSpec,
}

impl NamedCheck {
    pub fn new(name: &str, check: CheckSpec) -> Self {
        Self {
            name: name.to_string(),
            check,
        }
    }
}

/// Declarative definition of one guard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardSpec {
    /// Guard identity; names the verdict file and the `<DOMAIN>_*` variables
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub artifacts: Vec<ArtifactSpec>,
    #[serde(default)]
    pub checks: Vec<NamedCheck>,
}

impl GuardSpec {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            artifacts: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn artifact(mut self, spec: ArtifactSpec) -> Self {
        self.artifacts.push(spec);
        self
    }

    pub fn check(mut self, name: &str, check: CheckSpec) -> Self {
        self.checks.push(NamedCheck::new(name, check));
        self
    }

    fn find_artifact(&self, kind: &str) -> Option<&ArtifactSpec> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    /// Names of every check the verdict will carry, in order
    pub fn check_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for artifact in &self.artifacts {
            names.push(format!("{}_exists", artifact.kind));
            if artifact.format == ArtifactFormat::Json {
                names.push(format!("{}_json_valid", artifact.kind));
            }
        }
        names.extend(self.checks.iter().map(|c| c.name.clone()));
        names
    }

    /// Validate the plan against a contract registry before anything is loaded
    pub fn validate(&self, contracts: &ContractRegistry) -> Result<()> {
        let invalid = |message: String| GuardError::invalid_guard(&self.name, message);

        if self.name.trim().is_empty() {
            return Err(GuardError::invalid_input("guard name must not be empty"));
        }
        if self.artifacts.is_empty() {
            return Err(invalid("no artifacts declared".to_string()));
        }

        let mut kinds = HashSet::new();
        for artifact in &self.artifacts {
            if artifact.kind.trim().is_empty() {
                return Err(invalid("artifact kind must not be empty".to_string()));
            }
            if !kinds.insert(artifact.kind.as_str()) {
                return Err(invalid(format!("artifact '{}' declared twice", artifact.kind)));
            }
        }

        let mut names = HashSet::new();
        for name in self.check_names() {
            if !names.insert(name.clone()) {
                return Err(invalid(format!("check name '{}' is not unique", name)));
            }
        }

        for named in &self.checks {
            if named.name.trim().is_empty() {
                return Err(invalid("check name must not be empty".to_string()));
            }
            for kind in named.check.artifacts() {
                let artifact = self.find_artifact(kind).ok_or_else(|| {
                    invalid(format!(
                        "check '{}' reads undeclared artifact '{}'",
                        named.name, kind
                    ))
                })?;
                if artifact.format != named.check.required_format() {
                    return Err(invalid(format!(
                        "check '{}' ({}) cannot read {:?} artifact '{}'",
                        named.name,
                        named.check.family(),
                        artifact.format,
                        kind
                    )));
                }
            }
            if let CheckSpec::Schema { artifact } = &named.check {
                contracts.get(artifact)?;
            }
        }
        Ok(())
    }
}

/// Evaluates guard specs against the filesystem
pub struct GuardRunner {
    config: Configuration,
    contracts: ContractRegistry,
    faults: Arc<dyn FaultInjector>,
    clock: Arc<dyn Clock>,
}

impl GuardRunner {
    /// Runner with built-in contracts, no fault injection and the wall clock
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            contracts: ContractRegistry::builtin(),
            faults: Arc::new(NoFaults),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_contracts(mut self, contracts: ContractRegistry) -> Self {
        self.contracts = contracts;
        self
    }

    pub fn with_faults(mut self, faults: Arc<dyn FaultInjector>) -> Self {
        self.faults = faults;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Path an artifact is loaded from after overrides and root resolution
    pub fn artifact_path(&self, guard: &str, artifact: &ArtifactSpec) -> PathBuf {
        let params = self.config.params(guard);
        let declared = params
            .var(&format!("{}_PATH", artifact.kind))
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| artifact.path.clone());
        self.config.resolve(&declared)
    }

    /// Run one guard; only plan errors abort without a verdict
    pub async fn run(&self, spec: &GuardSpec) -> Result<Verdict> {
        spec.validate(&self.contracts)?;
        let mode = EnforcementMode::resolve(&self.config, &spec.name);
        tracing::info!(guard = %spec.name, %mode, "running guard");

        let requests = spec
            .artifacts
            .iter()
            .map(|a| (a.kind.clone(), self.artifact_path(&spec.name, a), a.format))
            .collect();
        let artifacts = ArtifactStore::load_all(requests, self.config.workers).await;

        let mut builder = VerdictBuilder::new(&spec.name);
        for artifact in &spec.artifacts {
            if let Some(outcome) = artifacts.get(&artifact.kind) {
                builder.record(&format!("{}_exists", artifact.kind), Ok(checks::existence(outcome)));
                if artifact.format == ArtifactFormat::Json {
                    builder.record(
                        &format!("{}_json_valid", artifact.kind),
                        Ok(checks::json_valid(outcome)),
                    );
                }
            }
        }

        let ctx = RunContext {
            params: self.config.params(&spec.name),
            artifacts: &artifacts,
        };
        for named in &spec.checks {
            builder.evaluate(&named.name, || self.evaluate(&named.name, &named.check, &ctx));
        }

        let verdict = builder.build(mode, self.clock.as_ref());
        tracing::info!(
            guard = %spec.name,
            ok = verdict.ok,
            failures = verdict.failures().len(),
            forced = verdict.forced,
            "guard finished"
        );
        Ok(verdict)
    }

    fn evaluate(&self, name: &str, check: &CheckSpec, ctx: &RunContext<'_>) -> CheckOutcome {
        let params = ctx.params;
        let artifacts = ctx.artifacts;

        match check {
            CheckSpec::Schema { artifact } => {
                let contract = self
                    .contracts
                    .get(artifact)
                    .map_err(|e| CheckError::Predicate(e.to_string()))?;
                Ok(checks::schema(artifacts.artifact(artifact)?, contract))
            }
            CheckSpec::Subset { subset, superset } => Ok(checks::subset(
                &ids(artifacts, subset)?,
                &ids(artifacts, superset)?,
            )),
            CheckSpec::Unique { source } => Ok(checks::uniqueness(&ids(artifacts, source)?)),
            CheckSpec::Drift { expected, observed } => Ok(checks::drift(
                &ids(artifacts, expected)?,
                &ids(artifacts, observed)?,
                self.faults.drift(name),
            )),
            CheckSpec::Links {
                artifact,
                items,
                field,
                base,
                whitelist,
            } => {
                let loaded = artifacts.artifact(artifact)?;
                let links = loaded.strings_in(items, field)?;
                let mut allowed = whitelist.clone();
                allowed.extend(params.get_list("WHITELIST").unwrap_or_default());

                let base = match base {
                    Some(dir) => self.config.resolve(dir),
                    None => loaded
                        .path
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.config.root.clone()),
                };
                let resolves = |target: &str| base.join(target).exists();
                Ok(checks::cross_references(&links, &allowed, &resolves))
            }
            CheckSpec::Markers { artifact, markers } => {
                let loaded = artifacts.artifact(artifact)?;
                let text = loaded.text().ok_or_else(|| {
                    CheckError::Predicate(format!("artifact '{}' is not a text document", artifact))
                })?;
                let markers = params.get_list("MARKERS").unwrap_or_else(|| markers.clone());
                Ok(checks::markers(text, &markers))
            }
            CheckSpec::Staleness {
                artifact,
                threshold_seconds,
                param,
            } => {
                let loaded = artifacts.artifact(artifact)?;
                let threshold = params.get_u64(param, *threshold_seconds);
                let policy = StalenessPolicy::new(threshold).forced(self.faults.stale(name));
                Ok(checks::staleness(loaded.mtime, policy, self.clock.as_ref()))
            }
            CheckSpec::Threshold {
                artifact,
                pointer,
                length,
                comparison,
                threshold,
                param,
            } => {
                let loaded = artifacts.artifact(artifact)?;
                let measured = if *length {
                    loaded.array_at(pointer)?.len() as f64
                } else {
                    loaded.f64_at(pointer)?
                };
                let configured = param
                    .as_deref()
                    .and_then(|p| params.get_f64_opt(p))
                    .unwrap_or(*threshold);
                Ok(
                    checks::threshold(measured, *comparison, configured, self.faults.threshold(name))
                        .with("pointer", pointer.as_str()),
                )
            }
            CheckSpec::FieldEquals {
                artifact,
                pointer,
                expected,
            } => {
                let loaded = artifacts.artifact(artifact)?;
                Ok(checks::field_equals(pointer, loaded.field(pointer), expected))
            }
            CheckSpec::ExitStatus { artifact, pointer } => {
                let code = artifacts.artifact(artifact)?.i64_at(pointer)?;
                Ok(checks::exit_status(code).with("pointer", pointer.as_str()))
            }
        }
    }
}

struct RunContext<'a> {
    params: GuardParams<'a>,
    artifacts: &'a ArtifactSet,
}

fn ids(artifacts: &ArtifactSet, source: &IdSource) -> std::result::Result<Vec<String>, CheckError> {
    Ok(artifacts
        .artifact(&source.artifact)?
        .ids(&source.items, &source.id_field)?)
}
