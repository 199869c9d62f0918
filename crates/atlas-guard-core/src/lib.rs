//! Atlas Guard Core
//!
//! Verification engine behind the Atlas pipeline's CI guards. A guard loads
//! one or more versioned JSON artifacts, checks declared invariants over them
//! and emits one canonical verdict:
//!
//! ```json
//! {"ok": true, "guard": "tv_receipt", "mode": "HINT",
//!  "checks": {"receipt_exists": true, "receipt_json_valid": true,
//!             "tv_suite_ok": true, "pytest_exit_zero": true},
//!  "counts": {}, "details": {...}, "generated_at": "2026-05-01T00:00:00Z"}
//! ```
//!
//! ## Architecture
//!
//! 1. **Artifacts** (`artifact`): load JSON and text artifacts; missing and
//!    malformed files are ordinary outcomes, never errors.
//! 2. **Contracts** (`contracts`): per-kind schema id, version and required fields.
//! 3. **Checks** (`checks`): pure invariant functions returning a `CheckResult`.
//! 4. **Verdicts** (`verdict`): ordered aggregation with derived `ok` and `counts`.
//! 5. **Enforcement** (`enforcement`): HINT/STRICT resolution and exit mapping.
//! 6. **Guards** (`guard`, `catalog`): declarative guard specs and the runner.
//! 7. **Sink** (`sink`): atomic persistence plus stdout.
//!
//! Staleness (`staleness`) and fault injection (`fault`) are injected into the
//! runner explicitly, so tests drive the failing branches deterministically.
//!
//! ## Example
//!
//! ```rust,no_run
//! use atlas_guard_core::{Configuration, GuardCatalog, GuardRunner, VerdictSink};
//!
//! #[tokio::main]
//! async fn main() -> atlas_guard_core::Result<()> {
//!     let config = Configuration::from_env();
//!     let catalog = GuardCatalog::builtin();
//!     let guard = catalog.get("chip_propagation")?;
//!
//!     let verdict = GuardRunner::new(config.clone()).run(guard).await?;
//!     let sink = VerdictSink::for_guard(&config, &guard.name);
//!     sink.print(&verdict, &mut std::io::stdout())?;
//!     sink.persist(&verdict)?;
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod catalog;
pub mod checks;
pub mod config;
pub mod contracts;
pub mod enforcement;
pub mod error;
pub mod fault;
pub mod guard;
pub mod sink;
pub mod staleness;
pub mod verdict;

use std::path::Path;

use serde::de::DeserializeOwned;

pub use artifact::{Artifact, ArtifactFormat, ArtifactSet, ArtifactStore, Field, LoadOutcome};
pub use catalog::GuardCatalog;
pub use checks::{CheckOutcome, CheckResult};
pub use config::Configuration;
pub use contracts::{check_schema, ContractDef, ContractRegistry, SchemaContract, SchemaReason};
pub use enforcement::{EnforcementMode, GuardExit};
pub use error::{AccessError, CheckError, GuardError, Result};
pub use fault::{EnvFaults, FaultInjector, NoFaults, ScriptedFaults};
pub use guard::{ArtifactSpec, CheckSpec, GuardRunner, GuardSpec, IdSource, NamedCheck};
pub use sink::VerdictSink;
pub use staleness::{Clock, FixedClock, StalenessPolicy, SystemClock};
pub use verdict::{Verdict, VerdictBuilder};

/// Engine name recorded in logs
pub const ENGINE_NAME: &str = "atlas-guard";

/// Engine version
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse a guard or contract definition file; the format follows the extension
///
/// Supported extensions: `json`, `yaml`, `yml`, `toml`.
pub fn parse_definition_file<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "json" => serde_json::from_str(content)
            .map_err(|e| GuardError::parse_error(format!("Invalid JSON in {}: {}", path.display(), e))),
        "yaml" | "yml" => serde_yaml::from_str(content)
            .map_err(|e| GuardError::parse_error(format!("Invalid YAML in {}: {}", path.display(), e))),
        "toml" => {
            let toml_value: toml::Value = toml::from_str(content)
                .map_err(|e| GuardError::parse_error(format!("Invalid TOML in {}: {}", path.display(), e)))?;
            // Route through JSON so all three formats share one set of serde rules.
            let json_value = serde_json::to_value(&toml_value)
                .map_err(|e| GuardError::SerializationError(e.to_string()))?;
            serde_json::from_value(json_value)
                .map_err(|e| GuardError::parse_error(format!("Invalid definition in {}: {}", path.display(), e)))
        }
        _ => Err(GuardError::invalid_input(format!(
            "Unsupported file format: {}. Supported formats: json, yaml, yml, toml",
            extension
        ))),
    }
}
