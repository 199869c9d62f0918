//! CLI command definitions for the guard runner

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use atlas_guard_core::{
    Configuration, ContractRegistry, EnforcementMode, EnvFaults, GuardCatalog, GuardExit,
    GuardRunner, Verdict, VerdictSink,
};
use clap::{Args, Parser, Subcommand};

use super::output::{self, CatalogListing, RenderFormat};
use super::ExitCode;
use crate::error::Result;

/// Atlas guard runner
///
/// Loads pipeline artifacts, checks their invariants and prints one verdict
/// JSON document. Logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "atlas-guard")]
#[command(about = "Atlas guard runner - verify pipeline artifacts and emit verdicts", long_about = None)]
#[command(version)]
pub struct AtlasGuardCli {
    /// Log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG applies otherwise
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: GuardCommands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum GuardCommands {
    /// Run one guard, persist its verdict and print it
    Run(RunArgs),

    /// Print the guard catalog as JSON
    List {
        /// Additional guard definitions (JSON, YAML or TOML)
        #[arg(long)]
        guards: Option<PathBuf>,
    },

    /// Render a persisted verdict for humans
    Render {
        /// Path to a `<guard>.verdict.json` file
        verdict: PathBuf,

        /// Rendering
        #[arg(long, value_enum, default_value = "markdown")]
        format: RenderFormat,
    },
}

/// Arguments of `atlas-guard run`
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Guard name (see `atlas-guard list`)
    pub guard: String,

    /// Root directory artifacts are resolved against [env: ATLAS_GUARD_ROOT]
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Write the verdict here instead of `<evidence-dir>/<guard>.verdict.json`
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Directory receiving verdict files [env: ATLAS_GUARD_EVIDENCE_DIR]
    #[arg(long)]
    pub evidence_dir: Option<PathBuf>,

    /// Blocking mode: exit 1 when the verdict fails
    #[arg(long, conflicts_with = "hint")]
    pub strict: bool,

    /// Advisory mode: always exit 0
    #[arg(long)]
    pub hint: bool,

    /// Additional guard definitions (JSON, YAML or TOML)
    #[arg(long)]
    pub guards: Option<PathBuf>,

    /// Additional schema contracts (JSON, YAML or TOML)
    #[arg(long)]
    pub contracts: Option<PathBuf>,
}

impl RunArgs {
    /// Invocation configuration: environment snapshot plus flag overrides
    pub fn configuration(&self) -> Configuration {
        let mut config = Configuration::from_env();
        if let Some(root) = &self.root {
            config = config.with_root(root);
        }
        if let Some(dir) = &self.evidence_dir {
            config = config.with_evidence_dir(dir);
        }
        if let Some(out) = &self.out {
            config = config.with_output_path(out);
        }
        if self.strict {
            config = config.with_mode(EnforcementMode::Strict);
        } else if self.hint {
            config = config.with_mode(EnforcementMode::Hint);
        }
        config
    }
}

fn load_catalog(guards: Option<&PathBuf>) -> Result<GuardCatalog> {
    let catalog = GuardCatalog::builtin();
    Ok(match guards {
        Some(path) => catalog.merge(GuardCatalog::from_file(path)?),
        None => catalog,
    })
}

fn load_contracts(contracts: Option<&PathBuf>) -> Result<ContractRegistry> {
    let registry = ContractRegistry::builtin();
    Ok(match contracts {
        Some(path) => registry.merge(ContractRegistry::from_file(path)?),
        None => registry,
    })
}

/// Execute the run command
pub async fn execute_run(args: RunArgs) -> Result<ExitCode> {
    let config = args.configuration();
    let catalog = load_catalog(args.guards.as_ref())?;
    let contracts = load_contracts(args.contracts.as_ref())?;
    let guard = catalog.get(&args.guard)?;

    let faults = EnvFaults::from_config(&config, &guard.name);
    let runner = GuardRunner::new(config.clone())
        .with_contracts(contracts)
        .with_faults(Arc::new(faults));
    let verdict = runner.run(guard).await?;

    let sink = VerdictSink::for_guard(&config, &guard.name);
    let mut stdout = std::io::stdout().lock();
    sink.print(&verdict, &mut stdout)?;

    let exit = match sink.persist(&verdict) {
        Ok(()) => verdict.mode.exit_for(&verdict),
        Err(e) => {
            tracing::error!(
                guard = %guard.name,
                path = %sink.path().display(),
                error = %e,
                "verdict printed but not persisted"
            );
            // A STRICT gate without its evidence file fails; HINT stays advisory.
            match verdict.mode {
                EnforcementMode::Hint => GuardExit::Pass,
                EnforcementMode::Strict => GuardExit::Failed,
            }
        }
    };
    tracing::info!(
        guard = %guard.name,
        mode = %verdict.mode,
        ok = verdict.ok,
        exit = i32::from(exit),
        path = %sink.path().display(),
        "verdict emitted"
    );
    Ok(exit.into())
}

/// Execute the list command
pub fn execute_list(guards: Option<PathBuf>) -> Result<ExitCode> {
    let catalog = load_catalog(guards.as_ref())?;
    let listing = CatalogListing::from_catalog(&catalog);
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", serde_json::to_string_pretty(&listing)?)?;
    Ok(ExitCode::Success)
}

/// Execute the render command
pub fn execute_render(path: PathBuf, format: RenderFormat) -> Result<ExitCode> {
    let verdict = Verdict::from_file(&path)?;
    let rendered = match format {
        RenderFormat::Markdown => output::markdown(&verdict),
        RenderFormat::Table => output::table(&verdict),
    };
    let mut stdout = std::io::stdout().lock();
    write!(stdout, "{}", rendered)?;
    Ok(ExitCode::Success)
}
