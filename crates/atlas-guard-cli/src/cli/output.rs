//! Output formatting for the guard CLI
//!
//! `run` always prints the raw verdict JSON. Human-readable views are a
//! separate pass over a persisted verdict: a Markdown summary for CI job
//! pages, or a colored terminal table.

use std::fmt::Write;

use atlas_guard_core::{ArtifactFormat, GuardCatalog, Verdict};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;

/// Rendering options for `atlas-guard render`
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum RenderFormat {
    /// Markdown summary
    #[default]
    Markdown,
    /// Colored terminal table
    Table,
}

/// One guard in `atlas-guard list`
#[derive(Debug, Clone, Serialize)]
pub struct GuardListing {
    pub name: String,
    pub description: String,
    pub artifacts: Vec<ArtifactListing>,
    /// Every check the verdict will carry, in order
    pub checks: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactListing {
    pub kind: String,
    pub path: String,
    pub format: ArtifactFormat,
}

/// Document printed by `atlas-guard list`
#[derive(Debug, Clone, Serialize)]
pub struct CatalogListing {
    pub engine: &'static str,
    pub version: &'static str,
    pub guards: Vec<GuardListing>,
}

impl CatalogListing {
    pub fn from_catalog(catalog: &GuardCatalog) -> Self {
        let guards = catalog
            .iter()
            .map(|guard| GuardListing {
                name: guard.name.clone(),
                description: guard.description.clone(),
                artifacts: guard
                    .artifacts
                    .iter()
                    .map(|a| ArtifactListing {
                        kind: a.kind.clone(),
                        path: a.path.display().to_string(),
                        format: a.format,
                    })
                    .collect(),
                checks: guard.check_names(),
            })
            .collect();

        Self {
            engine: atlas_guard_core::ENGINE_NAME,
            version: atlas_guard_core::ENGINE_VERSION,
            guards,
        }
    }
}

fn status_word(ok: bool) -> &'static str {
    if ok {
        "PASS"
    } else {
        "FAIL"
    }
}

/// Short one-line summary of a check's details
fn detail_summary(details: Option<&Value>) -> String {
    let Some(Value::Object(map)) = details else {
        return String::new();
    };
    if let Some(Value::String(error)) = map.get("error") {
        return error.clone();
    }

    let mut parts = Vec::new();
    for (key, value) in map {
        match value {
            Value::Array(items) if !items.is_empty() => {
                let shown: Vec<String> = items
                    .iter()
                    .take(3)
                    .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                    .collect();
                let more = if items.len() > 3 {
                    format!(", +{}", items.len() - 3)
                } else {
                    String::new()
                };
                parts.push(format!("{}: {}{}", key, shown.join(", "), more));
            }
            Value::String(s) if key == "reason" && s != "ok" => parts.push(format!("reason: {}", s)),
            Value::Bool(true) if key == "forced" || key == "skipped" => parts.push(key.clone()),
            _ => {}
        }
    }
    parts.join("; ")
}

/// Markdown summary of a verdict
pub fn markdown(verdict: &Verdict) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "## Guard `{}`: {} ({})",
        verdict.guard,
        status_word(verdict.ok),
        verdict.mode
    );
    out.push('\n');
    if let Some(generated_at) = &verdict.generated_at {
        let _ = writeln!(out, "Generated at {}", generated_at);
        out.push('\n');
    }
    if verdict.forced {
        out.push_str("> Fault injection was active for this run.\n\n");
    }

    out.push_str("| Check | Result | Details |\n");
    out.push_str("|---|---|---|\n");
    for (name, ok) in &verdict.checks {
        let result = if verdict.skipped.iter().any(|s| s == name) {
            "SKIP"
        } else {
            status_word(*ok)
        };
        let summary = detail_summary(verdict.details.get(name)).replace('|', "\\|");
        let _ = writeln!(out, "| `{}` | {} | {} |", name, result, summary);
    }

    let nonzero: Vec<_> = verdict.counts.iter().filter(|(_, n)| **n > 0).collect();
    if !nonzero.is_empty() {
        out.push_str("\n**Counts**\n\n");
        for (name, count) in nonzero {
            let _ = writeln!(out, "- `{}`: {}", name, count);
        }
    }
    out
}

/// Colored terminal table of a verdict
pub fn table(verdict: &Verdict) -> String {
    let mut out = String::new();
    let width = verdict
        .checks
        .keys()
        .map(|k| k.len())
        .max()
        .unwrap_or(0)
        .max(5);

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} {} [{}]",
        "Guard".cyan().bold(),
        verdict.guard.bold(),
        verdict.mode
    );
    let _ = writeln!(out, "{}", "=".repeat(width + 40));

    for (name, ok) in &verdict.checks {
        let status = if verdict.skipped.iter().any(|s| s == name) {
            "SKIP".yellow()
        } else if *ok {
            "PASS".green()
        } else {
            "FAIL".red()
        };
        let summary = detail_summary(verdict.details.get(name));
        let _ = writeln!(out, "  {:<width$}  {}  {}", name, status, summary.dimmed(), width = width);
    }

    let _ = writeln!(out, "{}", "-".repeat(width + 40));
    let overall = if verdict.ok {
        "PASS".green().bold()
    } else {
        "FAIL".red().bold()
    };
    let failures = verdict.failures().len();
    let _ = writeln!(
        out,
        "  {} {} of {} checks failed{}",
        overall,
        failures,
        verdict.checks.len(),
        if verdict.forced { " (forced)" } else { "" }
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_guard_core::{CheckResult, EnforcementMode, FixedClock, VerdictBuilder};

    fn verdict() -> Verdict {
        let mut builder = VerdictBuilder::new("chip_propagation");
        builder.record("filter_chips_exists", Ok(CheckResult::pass()));
        builder.record(
            "chip_apply_drift",
            Ok(CheckResult::fail()
                .with_list("missing", vec!["chip:b".to_string()])
                .with_list("extra", vec![])
                .with_forced(false)),
        );
        builder.record("pytest_exit_zero", Ok(CheckResult::skip("optional_dependency_missing")));
        let clock = FixedClock("2026-05-01T00:00:00Z".parse().unwrap());
        builder.build(EnforcementMode::Strict, &clock)
    }

    #[test]
    fn test_markdown() {
        let rendered = markdown(&verdict());
        assert!(rendered.starts_with("## Guard `chip_propagation`: FAIL (STRICT)"));
        assert!(rendered.contains("| `chip_apply_drift` | FAIL | missing: chip:b |"));
        assert!(rendered.contains("| `pytest_exit_zero` | SKIP |"));
        assert!(rendered.contains("- `missing_count`: 1"));
        assert!(!rendered.contains("extra_count"));
    }

    #[test]
    fn test_table_lists_every_check() {
        colored::control::set_override(false);
        let rendered = table(&verdict());
        assert!(rendered.contains("filter_chips_exists"));
        assert!(rendered.contains("PASS"));
        assert!(rendered.contains("1 of 3 checks failed"));
    }

    #[test]
    fn test_listing_includes_presence_checks() {
        let listing = CatalogListing::from_catalog(&GuardCatalog::builtin());
        let receipt = listing.guards.iter().find(|g| g.name == "tv_receipt").unwrap();
        assert_eq!(receipt.checks[0], "receipt_exists");
        assert_eq!(listing.guards.len(), 6);
    }
}
