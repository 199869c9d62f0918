//! Verdict Sink
//!
//! Prints a verdict to stdout and persists the same document exactly once
//! under `<evidence_dir>/<guard>.verdict.json` (or an explicit output path).
//! Printing comes first so a failed write never leaves stdout empty.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Configuration;
use crate::error::{GuardError, Result};
use crate::verdict::Verdict;

/// File name suffix of persisted verdicts
pub const VERDICT_SUFFIX: &str = ".verdict.json";

/// Destination of one guard's verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictSink {
    path: PathBuf,
}

impl VerdictSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Explicit output path, or the guard's file in the evidence directory
    pub fn for_guard(config: &Configuration, guard: &str) -> Self {
        let path = match &config.output_path {
            Some(path) => path.clone(),
            None => config
                .resolve(&config.evidence_dir)
                .join(format!("{}{}", guard, VERDICT_SUFFIX)),
        };
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the verdict atomically: temp file in the target directory, then rename
    pub fn persist(&self, verdict: &Verdict) -> Result<()> {
        let mut json = verdict.to_json_pretty()?;
        json.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                GuardError::FileError(format!(
                    "Failed to create evidence directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let temp_path = self.path.with_extension(format!("tmp.{}", std::process::id()));
        std::fs::write(&temp_path, json.as_bytes()).map_err(|e| {
            GuardError::FileError(format!("Failed to write '{}': {}", temp_path.display(), e))
        })?;
        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(GuardError::FileError(format!(
                "Failed to move verdict into '{}': {}",
                self.path.display(),
                e
            )));
        }

        tracing::debug!(guard = %verdict.guard, path = %self.path.display(), "verdict persisted");
        Ok(())
    }

    /// Print the document [`persist`](Self::persist) writes, byte for byte
    pub fn print(&self, verdict: &Verdict, out: &mut dyn Write) -> Result<()> {
        let json = verdict.to_json_pretty()?;
        writeln!(out, "{}", json)?;
        out.flush()?;
        Ok(())
    }
}
