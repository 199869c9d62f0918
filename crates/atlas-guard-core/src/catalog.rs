//! Built-in guard catalog
//!
//! | Guard              | Artifacts                        | Parameters                                   |
//! |--------------------|----------------------------------|----------------------------------------------|
//! | `chip_propagation` | `filter_chips`, `filter_apply`   | `CHIP_PROPAGATION_FORCE`                     |
//! | `tv_receipt`       | `receipt`                        |                                              |
//! | `graph_rollup`     | `graph_rollup`                   | `GRAPH_ROLLUP_STALE_THRESHOLD_SECONDS`       |
//! | `atlas_links`      | `sitemap`                        | `ATLAS_LINKS_WHITELIST`                      |
//! | `atlas_backlinks`  | `atlas_index` (text)             | `ATLAS_BACKLINKS_MARKERS`                    |
//! | `search_eval`      | `search_eval`                    | `SEARCH_EVAL_MIN_QUERIES`, `SEARCH_EVAL_MAX_RERANK_GAP` |
//!
//! Every guard also honours `<DOMAIN>_<KIND>_PATH` and the `<DOMAIN>_FORCE*`
//! fault variables.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checks::Comparison;
use crate::error::{GuardError, Result};
use crate::guard::{
    ArtifactSpec, CheckSpec, GuardSpec, IdSource, DEFAULT_STALE_THRESHOLD_SECONDS,
    STALE_THRESHOLD_PARAM,
};

pub const DEFAULT_MIN_QUERIES: f64 = 10.0;
pub const DEFAULT_MAX_RERANK_GAP: f64 = 0.40;
pub const DEFAULT_BACKLINK_MARKERS: &[&str] = &["atlas-backlinks", "Back to Atlas"];

#[derive(Debug, Deserialize)]
struct GuardFile {
    guards: Vec<GuardSpec>,
}

/// Guards addressable by name
#[derive(Debug, Clone, Default, Serialize)]
pub struct GuardCatalog {
    guards: IndexMap<String, GuardSpec>,
}

impl GuardCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The guards shipped with the engine
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for guard in [
            chip_propagation(),
            tv_receipt(),
            graph_rollup(),
            atlas_links(),
            atlas_backlinks(),
            search_eval(),
        ] {
            catalog.insert(guard);
        }
        catalog
    }

    /// Load guard definitions (`guards = [...]`); the format follows the extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GuardError::FileError(format!("Failed to read guard file '{}': {}", path.display(), e))
        })?;
        let file: GuardFile = crate::parse_definition_file(path, &content)?;

        let mut catalog = Self::empty();
        for guard in file.guards {
            if catalog.guards.contains_key(&guard.name) {
                return Err(GuardError::invalid_guard(&guard.name, "defined twice in guard file"));
            }
            catalog.insert(guard);
        }
        tracing::debug!(path = %path.display(), guards = catalog.len(), "loaded guard file");
        Ok(catalog)
    }

    pub fn insert(&mut self, guard: GuardSpec) {
        self.guards.insert(guard.name.clone(), guard);
    }

    /// Overlay another catalog; its guards win on conflicts
    pub fn merge(mut self, other: GuardCatalog) -> Self {
        for (_, guard) in other.guards {
            self.insert(guard);
        }
        self
    }

    pub fn get(&self, name: &str) -> Result<&GuardSpec> {
        self.guards
            .get(name)
            .ok_or_else(|| GuardError::UnknownGuard(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.guards.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GuardSpec> {
        self.guards.values()
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

fn chip_propagation() -> GuardSpec {
    let chips = IdSource::new("filter_chips", "items", "id");
    let applied = IdSource::new("filter_apply", "items", "chip_id");

    GuardSpec::new(
        "chip_propagation",
        "Filter chips on the index page propagate to the applied-filter view",
    )
    .artifact(ArtifactSpec::json("filter_chips", "share/atlas/filter_chips.json"))
    .artifact(ArtifactSpec::json("filter_apply", "share/atlas/filter_apply.json"))
    .check("chip_ids_unique", CheckSpec::Unique { source: chips.clone() })
    .check(
        "applied_chips_known",
        CheckSpec::Subset {
            subset: applied.clone(),
            superset: chips.clone(),
        },
    )
    .check(
        "chip_apply_drift",
        CheckSpec::Drift {
            expected: chips,
            observed: applied,
        },
    )
}

fn tv_receipt() -> GuardSpec {
    GuardSpec::new("tv_receipt", "Test-vector suite receipt reports a clean run")
        .artifact(ArtifactSpec::json("receipt", "evidence/tv_receipt.json"))
        .check(
            "tv_suite_ok",
            CheckSpec::FieldEquals {
                artifact: "receipt".to_string(),
                pointer: "/ok".to_string(),
                expected: Value::Bool(true),
            },
        )
        .check(
            "pytest_exit_zero",
            CheckSpec::ExitStatus {
                artifact: "receipt".to_string(),
                pointer: "/pytest_exit_code".to_string(),
            },
        )
}

fn graph_rollup() -> GuardSpec {
    GuardSpec::new("graph_rollup", "Graph rollup export is well-formed and fresh")
        .artifact(ArtifactSpec::json("graph_rollup", "share/atlas/graph_rollup.json"))
        .check(
            "graph_rollup_schema",
            CheckSpec::Schema {
                artifact: "graph_rollup".to_string(),
            },
        )
        .check(
            "node_ids_unique",
            CheckSpec::Unique {
                source: IdSource::new("graph_rollup", "nodes", "id"),
            },
        )
        .check(
            "graph_rollup_fresh",
            CheckSpec::Staleness {
                artifact: "graph_rollup".to_string(),
                threshold_seconds: DEFAULT_STALE_THRESHOLD_SECONDS,
                param: STALE_THRESHOLD_PARAM.to_string(),
            },
        )
}

fn atlas_links() -> GuardSpec {
    GuardSpec::new("atlas_links", "Atlas sitemap pages link only to pages that exist")
        .artifact(ArtifactSpec::json("sitemap", "share/atlas/sitemap.json"))
        .check(
            "sitemap_schema",
            CheckSpec::Schema {
                artifact: "sitemap".to_string(),
            },
        )
        .check(
            "page_ids_unique",
            CheckSpec::Unique {
                source: IdSource::new("sitemap", "pages", "id"),
            },
        )
        .check(
            "page_links_resolve",
            CheckSpec::Links {
                artifact: "sitemap".to_string(),
                items: "pages".to_string(),
                field: "links".to_string(),
                base: None,
                whitelist: Vec::new(),
            },
        )
}

fn atlas_backlinks() -> GuardSpec {
    GuardSpec::new("atlas_backlinks", "Atlas index page carries its backlink markers")
        .artifact(ArtifactSpec::text("atlas_index", "docs/atlas/index.html"))
        .check(
            "backlink_markers",
            CheckSpec::Markers {
                artifact: "atlas_index".to_string(),
                markers: DEFAULT_BACKLINK_MARKERS.iter().map(|m| m.to_string()).collect(),
            },
        )
}

fn search_eval() -> GuardSpec {
    GuardSpec::new("search_eval", "Search evaluation covers enough queries and reranking stays close")
        .artifact(ArtifactSpec::json("search_eval", "share/eval/search_eval.json"))
        .check(
            "search_eval_schema",
            CheckSpec::Schema {
                artifact: "search_eval".to_string(),
            },
        )
        .check(
            "query_count",
            CheckSpec::Threshold {
                artifact: "search_eval".to_string(),
                pointer: "queries".to_string(),
                length: true,
                comparison: Comparison::AtLeast,
                threshold: DEFAULT_MIN_QUERIES,
                param: Some("MIN_QUERIES".to_string()),
            },
        )
        .check(
            "rerank_gap",
            CheckSpec::Threshold {
                artifact: "search_eval".to_string(),
                pointer: "rerank.max_gap".to_string(),
                length: false,
                comparison: Comparison::AtMost,
                threshold: DEFAULT_MAX_RERANK_GAP,
                param: Some("MAX_RERANK_GAP".to_string()),
            },
        )
}
