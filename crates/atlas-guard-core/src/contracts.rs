//! Schema Contract Registry
//!
//! Maps an artifact kind to the schema identity it must declare: an exact
//! schema id or a version-tolerant pattern, an optional pinned schema
//! version, and the fields that must be present.
//!
//! Registries are built in, or loaded from JSON, YAML or TOML files shaped as
//! `{ "contracts": [ { "kind": ..., "schema_id_pattern": ... } ] }`.

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::artifact::{Artifact, Field};
use crate::error::{GuardError, Result};

/// Serializable contract definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDef {
    /// Artifact kind this contract governs
    pub kind: String,
    /// Exact schema id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<String>,
    /// Regular expression the whole schema id must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id_pattern: Option<String>,
    /// Pinned schema version; when absent any positive integer is accepted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u64>,
    /// Fields (dotted paths or JSON pointers) that must be present
    #[serde(default)]
    pub required_fields: Vec<String>,
}

impl ContractDef {
    pub fn pattern(kind: &str, pattern: &str, required_fields: &[&str]) -> Self {
        Self {
            kind: kind.to_string(),
            schema_id: None,
            schema_id_pattern: Some(pattern.to_string()),
            schema_version: None,
            required_fields: required_fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn exact(kind: &str, id: &str, version: Option<u64>, required_fields: &[&str]) -> Self {
        Self {
            kind: kind.to_string(),
            schema_id: Some(id.to_string()),
            schema_id_pattern: None,
            schema_version: version,
            required_fields: required_fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Compiled contract
#[derive(Debug, Clone)]
pub struct SchemaContract {
    pub def: ContractDef,
    id_pattern: Option<Regex>,
}

impl SchemaContract {
    pub fn compile(def: ContractDef) -> Result<Self> {
        let id_pattern = match &def.schema_id_pattern {
            Some(pattern) => Some(Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                GuardError::parse_error(format!(
                    "contract '{}' has invalid schema_id_pattern: {}",
                    def.kind, e
                ))
            })?),
            None => None,
        };
        Ok(Self { def, id_pattern })
    }

    pub fn kind(&self) -> &str {
        &self.def.kind
    }

    fn id_matches(&self, id: &str) -> bool {
        if let Some(exact) = &self.def.schema_id {
            if exact != id {
                return false;
            }
        }
        match &self.id_pattern {
            Some(pattern) => pattern.is_match(id),
            None => !id.trim().is_empty(),
        }
    }
}

/// Why a schema check passed or failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaReason {
    Ok,
    BadSchemaId,
    BadSchemaVersion,
    MissingField(String),
}

impl fmt::Display for SchemaReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaReason::Ok => write!(f, "ok"),
            SchemaReason::BadSchemaId => write!(f, "bad_schema_id"),
            SchemaReason::BadSchemaVersion => write!(f, "bad_schema_version"),
            SchemaReason::MissingField(name) => write!(f, "missing_field:{}", name),
        }
    }
}

/// Result of checking an artifact against its contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaCheck {
    pub ok: bool,
    pub reason: SchemaReason,
}

impl SchemaCheck {
    fn fail(reason: SchemaReason) -> Self {
        Self { ok: false, reason }
    }
}

fn positive_version(value: &Value) -> Option<u64> {
    value.as_u64().filter(|v| *v >= 1)
}

/// Check an artifact's declared schema header and required fields
///
/// Checks run in order (id, version, fields) and the first failure wins.
pub fn check_schema(artifact: &Artifact, contract: &SchemaContract) -> SchemaCheck {
    let header = artifact.schema();

    let id_ok = match header.id {
        Field::Present(Value::String(id)) => contract.id_matches(id),
        _ => false,
    };
    if !id_ok {
        return SchemaCheck::fail(SchemaReason::BadSchemaId);
    }

    let version = match header.version {
        Field::Present(value) => positive_version(value),
        Field::Absent => None,
    };
    let version_ok = match (version, contract.def.schema_version) {
        (Some(found), Some(expected)) => found == expected,
        (Some(_), None) => true,
        (None, _) => false,
    };
    if !version_ok {
        return SchemaCheck::fail(SchemaReason::BadSchemaVersion);
    }

    for field in &contract.def.required_fields {
        if !artifact.field(field).is_present() {
            return SchemaCheck::fail(SchemaReason::MissingField(field.clone()));
        }
    }

    SchemaCheck {
        ok: true,
        reason: SchemaReason::Ok,
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    contracts: Vec<ContractDef>,
}

/// Contracts keyed by artifact kind
#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    contracts: IndexMap<String, SchemaContract>,
}

impl ContractRegistry {
    /// Empty registry
    pub fn empty() -> Self {
        Self::default()
    }

    /// Contracts for the artifacts the built-in guards read
    pub fn builtin() -> Self {
        let defs = vec![
            ContractDef::pattern("filter_chips", r"atlas\.filter_chips\.v\d+", &["items"]),
            ContractDef::pattern("filter_apply", r"atlas\.filter_apply\.v\d+", &["items"]),
            ContractDef::pattern(
                "graph_rollup",
                r"atlas\.graph\.rollup\.v\d+",
                &["nodes", "generated_at"],
            ),
            ContractDef::pattern("sitemap", r"atlas\.sitemap\.v\d+", &["pages"]),
            ContractDef::exact(
                "search_eval",
                "gemantria.search_eval.v1",
                Some(1),
                &["queries", "rerank.max_gap"],
            ),
        ];
        let mut registry = Self::empty();
        for def in defs {
            // Built-in patterns are literals; a compile failure is a bug caught by tests.
            if let Ok(contract) = SchemaContract::compile(def) {
                registry.insert(contract);
            }
        }
        registry
    }

    /// Build from definitions, rejecting invalid patterns
    pub fn from_defs(defs: impl IntoIterator<Item = ContractDef>) -> Result<Self> {
        let mut registry = Self::empty();
        for def in defs {
            registry.insert(SchemaContract::compile(def)?);
        }
        Ok(registry)
    }

    /// Load a registry file; the format follows the extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GuardError::FileError(format!(
                "Failed to read contract registry '{}': {}",
                path.display(),
                e
            ))
        })?;
        let file: RegistryFile = crate::parse_definition_file(path, &content)?;
        Self::from_defs(file.contracts)
    }

    /// Add or replace a contract
    pub fn insert(&mut self, contract: SchemaContract) {
        self.contracts.insert(contract.kind().to_string(), contract);
    }

    /// Overlay another registry; its contracts win on conflicts
    pub fn merge(mut self, other: ContractRegistry) -> Self {
        for (_, contract) in other.contracts {
            self.insert(contract);
        }
        self
    }

    /// Contract for a kind; absence is a configuration mistake
    pub fn get(&self, kind: &str) -> Result<&SchemaContract> {
        self.contracts
            .get(kind)
            .ok_or_else(|| GuardError::ContractMissing(kind.to_string()))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.contracts.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.contracts.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::json_artifact;
    use serde_json::json;

    fn rollup_contract() -> SchemaContract {
        SchemaContract::compile(ContractDef::pattern(
            "graph_rollup",
            r"atlas\.graph\.rollup\.v\d+",
            &["nodes"],
        ))
        .unwrap()
    }

    #[test]
    fn test_pattern_accepts_any_version_suffix() {
        let contract = rollup_contract();
        for id in ["atlas.graph.rollup.v1", "atlas.graph.rollup.v12"] {
            let artifact = json_artifact(
                "graph_rollup",
                json!({"schema": {"id": id, "version": 1}, "nodes": []}),
            );
            assert_eq!(check_schema(&artifact, &contract).reason, SchemaReason::Ok);
        }
    }

    #[test]
    fn test_pattern_is_anchored() {
        let artifact = json_artifact(
            "graph_rollup",
            json!({"schema": {"id": "x.atlas.graph.rollup.v1.bak", "version": 1}, "nodes": []}),
        );
        let check = check_schema(&artifact, &rollup_contract());
        assert!(!check.ok);
        assert_eq!(check.reason, SchemaReason::BadSchemaId);
    }

    #[test]
    fn test_version_must_be_positive_integer() {
        let contract = rollup_contract();
        for version in [json!(0), json!(-1), json!("1"), json!(1.5)] {
            let artifact = json_artifact(
                "graph_rollup",
                json!({"schema": {"id": "atlas.graph.rollup.v1", "version": version}, "nodes": []}),
            );
            assert_eq!(
                check_schema(&artifact, &contract).reason,
                SchemaReason::BadSchemaVersion
            );
        }
    }

    #[test]
    fn test_pinned_version() {
        let contract = SchemaContract::compile(ContractDef::exact(
            "search_eval",
            "gemantria.search_eval.v1",
            Some(1),
            &[],
        ))
        .unwrap();
        let artifact = json_artifact(
            "search_eval",
            json!({"schema": {"id": "gemantria.search_eval.v1", "version": 2}}),
        );
        assert_eq!(
            check_schema(&artifact, &contract).reason,
            SchemaReason::BadSchemaVersion
        );
    }

    #[test]
    fn test_missing_field_reason() {
        let artifact = json_artifact(
            "graph_rollup",
            json!({"schema": {"id": "atlas.graph.rollup.v1", "version": 1}}),
        );
        let check = check_schema(&artifact, &rollup_contract());
        assert_eq!(check.reason.to_string(), "missing_field:nodes");
    }

    #[test]
    fn test_registry_get_missing_is_usage_error() {
        let registry = ContractRegistry::builtin();
        assert!(registry.contains("graph_rollup"));
        let err = registry.get("unknown_kind").unwrap_err();
        assert!(err.is_usage_error());
    }

    #[test]
    fn test_builtin_contracts_all_compile() {
        let kinds: Vec<_> = ContractRegistry::builtin().kinds().map(String::from).collect();
        assert_eq!(
            kinds,
            vec!["filter_chips", "filter_apply", "graph_rollup", "sitemap", "search_eval"]
        );
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = ContractRegistry::from_defs([ContractDef::pattern("bad", "(", &[])]);
        assert!(matches!(result, Err(GuardError::ParseError(_))));
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("contracts.toml");
        std::fs::write(
            &path,
            r#"
[[contracts]]
kind = "verse_index"
schema_id_pattern = 'gemantria\.verse_index\.v\d+'
required_fields = ["verses"]
"#,
        )
        .unwrap();
        let registry = ContractRegistry::from_file(&path).unwrap();
        assert!(registry.get("verse_index").is_ok());
    }
}
