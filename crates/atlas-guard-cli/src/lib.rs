//! Atlas Guard CLI
//!
//! Command-line front end for [`atlas_guard_core`]. Each `run` invocation is
//! an independent one-shot batch process: it snapshots the environment,
//! evaluates one guard, persists `evidence/<guard>.verdict.json` and prints
//! the same JSON document to stdout. Logs go to stderr.
//!
//! ## Usage
//!
//! ```bash
//! # Advisory run (always exits 0)
//! atlas-guard run chip_propagation
//!
//! # Blocking run
//! STRICT_MODE=1 atlas-guard run graph_rollup
//! atlas-guard run tv_receipt --strict --out /tmp/receipt.verdict.json
//!
//! # Force the drift check to fail for a self-test
//! CHIP_PROPAGATION_FORCE=1 atlas-guard run chip_propagation --strict
//!
//! # Catalog and rendering
//! atlas-guard list
//! atlas-guard render evidence/graph_rollup.verdict.json --format table
//! ```
//!
//! ## Exit Codes
//!
//! - 0: pass, or any HINT result (checks skipped for missing tooling still pass)
//! - 1: STRICT failure
//! - 2: usage or configuration error (no verdict is produced)

pub mod cli;
pub mod error;

pub use cli::{AtlasGuardCli, ExitCode, GuardCommands};
pub use error::CliError;

/// Run the CLI and map any error to its exit code
pub async fn run_cli(cli: AtlasGuardCli) -> ExitCode {
    match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "guard invocation failed");
            eprintln!("Error: {}", e);
            if e.is_usage_error() {
                ExitCode::UsageError
            } else {
                ExitCode::Failure
            }
        }
    }
}
