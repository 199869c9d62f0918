//! Atlas guard runner entry point
//!
//! Stdout carries exactly one JSON document per invocation; all logging is
//! written to stderr.

use anyhow::Context;
use atlas_guard_cli::{run_cli, AtlasGuardCli};
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(verbose: u8, json: bool) -> anyhow::Result<()> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let (json_layer, text_layer) = if json {
        (Some(fmt::layer().json().with_writer(std::io::stderr)), None)
    } else {
        (
            None,
            Some(fmt::layer().with_target(false).with_writer(std::io::stderr)),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .context("failed to install tracing subscriber")
}

fn main() -> anyhow::Result<()> {
    let cli = AtlasGuardCli::parse();
    init_tracing(cli.verbose, cli.log_json)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let exit_code = runtime.block_on(run_cli(cli));
    std::process::exit(exit_code.into());
}
