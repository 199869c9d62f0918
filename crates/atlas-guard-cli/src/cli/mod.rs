//! CLI module for the guard runner
//!
//! `run` evaluates one guard and prints its verdict, `list` prints the guard
//! catalog, and `render` turns a persisted verdict into a human-readable view.

pub mod commands;
pub mod output;

pub use commands::{AtlasGuardCli, GuardCommands, RunArgs};
pub use output::{CatalogListing, RenderFormat};

use atlas_guard_core::GuardExit;

use crate::error::Result;

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Guard passed, any HINT result, or a non-guard command succeeded
    Success = 0,
    /// STRICT guard failed, or an internal error occurred
    Failure = 1,
    /// Invalid arguments, unknown guard or missing contract
    UsageError = 2,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<GuardExit> for ExitCode {
    fn from(exit: GuardExit) -> Self {
        match exit {
            GuardExit::Pass => ExitCode::Success,
            GuardExit::Failed => ExitCode::Failure,
            GuardExit::Usage => ExitCode::UsageError,
        }
    }
}

/// Run the CLI with the given arguments and return the exit code
pub async fn run(cli: AtlasGuardCli) -> Result<ExitCode> {
    match cli.command {
        GuardCommands::Run(args) => commands::execute_run(args).await,
        GuardCommands::List { guards } => commands::execute_list(guards),
        GuardCommands::Render { verdict, format } => commands::execute_render(verdict, format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_conversion() {
        assert_eq!(i32::from(ExitCode::Success), 0);
        assert_eq!(i32::from(ExitCode::Failure), 1);
        assert_eq!(i32::from(ExitCode::UsageError), 2);
    }

    #[test]
    fn test_exit_code_from_guard_exit() {
        assert_eq!(ExitCode::from(GuardExit::Pass), ExitCode::Success);
        assert_eq!(ExitCode::from(GuardExit::Failed), ExitCode::Failure);
        assert_eq!(ExitCode::from(GuardExit::Usage), ExitCode::UsageError);
    }
}
