//! Artifact Store
//!
//! Loads versioned JSON artifacts (and plain-text documents) produced by
//! external generators. Loading never fails with an error: a missing file, an
//! unreadable file and a malformed document are all ordinary [`LoadOutcome`]
//! variants that the verdict builder turns into failing checks.
//!
//! Artifacts are loaded fresh on every invocation and are immutable once
//! loaded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{AccessError, CheckError};

/// How an artifact file is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
    /// A JSON document
    #[default]
    Json,
    /// A text document (HTML, Markdown) scanned for literal markers
    Text,
}

/// Parsed content of a loaded artifact
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Json(Value),
    Text(String),
}

/// A loaded artifact
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Logical kind the guard refers to this artifact by
    pub kind: String,
    /// Path the artifact was read from
    pub path: PathBuf,
    /// Parsed content
    pub content: Content,
    /// Last modification time, when the filesystem reports one
    pub mtime: Option<DateTime<Utc>>,
    /// Hex SHA-256 of the raw bytes
    pub sha256: String,
    /// Size in bytes
    pub size: u64,
}

/// Result of a typed field lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    Present(&'a Value),
    Absent,
}

impl<'a> Field<'a> {
    pub fn is_present(&self) -> bool {
        matches!(self, Field::Present(_))
    }

    /// Convert to a result naming the pointer that was absent
    pub fn require(self, pointer: &str) -> Result<&'a Value, AccessError> {
        match self {
            Field::Present(value) => Ok(value),
            Field::Absent => Err(AccessError::Absent(pointer.to_string())),
        }
    }
}

/// Declared `schema{id, version}` header of a JSON artifact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchemaHeader<'a> {
    pub id: Field<'a>,
    pub version: Field<'a>,
}

/// Normalize `items` or `/items` or `items.0.id` into a JSON pointer
pub fn to_pointer(path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path.replace('.', "/"))
    }
}

/// JSON type name used in access errors
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn wrong_type(pointer: &str, expected: &'static str, found: &Value) -> AccessError {
    AccessError::WrongType {
        pointer: pointer.to_string(),
        expected,
        found: type_name(found),
    }
}

impl Artifact {
    /// Parsed JSON document, if this is a JSON artifact
    pub fn document(&self) -> Option<&Value> {
        match &self.content {
            Content::Json(value) => Some(value),
            Content::Text(_) => None,
        }
    }

    /// Text body, if this is a text artifact
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(text) => Some(text),
            Content::Json(_) => None,
        }
    }

    /// Look up a field by JSON pointer (or dotted path)
    pub fn field(&self, path: &str) -> Field<'_> {
        let pointer = to_pointer(path);
        match self.document().and_then(|doc| doc.pointer(&pointer)) {
            Some(value) => Field::Present(value),
            None => Field::Absent,
        }
    }

    /// Present value or an [`AccessError::Absent`]
    pub fn require(&self, path: &str) -> Result<&Value, AccessError> {
        self.field(path).require(&to_pointer(path))
    }

    pub fn str_at(&self, path: &str) -> Result<&str, AccessError> {
        let value = self.require(path)?;
        value
            .as_str()
            .ok_or_else(|| wrong_type(&to_pointer(path), "string", value))
    }

    pub fn f64_at(&self, path: &str) -> Result<f64, AccessError> {
        let value = self.require(path)?;
        value
            .as_f64()
            .ok_or_else(|| wrong_type(&to_pointer(path), "number", value))
    }

    pub fn i64_at(&self, path: &str) -> Result<i64, AccessError> {
        let value = self.require(path)?;
        value
            .as_i64()
            .ok_or_else(|| wrong_type(&to_pointer(path), "integer", value))
    }

    pub fn array_at(&self, path: &str) -> Result<&Vec<Value>, AccessError> {
        let value = self.require(path)?;
        value
            .as_array()
            .ok_or_else(|| wrong_type(&to_pointer(path), "array", value))
    }

    /// The declared `schema{id, version}` header
    pub fn schema(&self) -> SchemaHeader<'_> {
        SchemaHeader {
            id: self.field("/schema/id"),
            version: self.field("/schema/version"),
        }
    }

    /// The declared `generated_at` timestamp, if any
    pub fn generated_at(&self) -> Option<&str> {
        match self.field("/generated_at") {
            Field::Present(value) => value.as_str(),
            Field::Absent => None,
        }
    }

    /// Collect the string ids of an item list, in document order
    ///
    /// `items` points at an array; `id_field` is read from each element.
    /// Numeric ids are stringified so `1` and `"1"` compare equal.
    pub fn ids(&self, items: &str, id_field: &str) -> Result<Vec<String>, AccessError> {
        let pointer = to_pointer(items);
        let list = self.array_at(items)?;
        let id_pointer = to_pointer(id_field);

        list.iter()
            .enumerate()
            .map(|(index, item)| {
                let location = format!("{}/{}{}", pointer, index, id_pointer);
                match item.pointer(&id_pointer) {
                    Some(Value::String(id)) => Ok(id.clone()),
                    Some(Value::Number(id)) => Ok(id.to_string()),
                    Some(other) => Err(wrong_type(&location, "string", other)),
                    None => Err(AccessError::Absent(location)),
                }
            })
            .collect()
    }

    /// Strings collected from `field` across every element of `items`
    ///
    /// Elements may carry a single string or an array of strings; elements
    /// without the field contribute nothing. Any other value is a
    /// [`AccessError::WrongType`] naming its location.
    pub fn strings_in(&self, items: &str, field: &str) -> Result<Vec<String>, AccessError> {
        let pointer = to_pointer(items);
        let list = self.array_at(items)?;
        let field_pointer = to_pointer(field);
        let mut out = Vec::new();
        for (index, item) in list.iter().enumerate() {
            let location = format!("{}/{}{}", pointer, index, field_pointer);
            match item.pointer(&field_pointer) {
                None => {}
                Some(Value::String(s)) => out.push(s.clone()),
                Some(Value::Array(values)) => {
                    for (position, value) in values.iter().enumerate() {
                        match value {
                            Value::String(s) => out.push(s.clone()),
                            other => {
                                let at = format!("{}/{}", location, position);
                                return Err(wrong_type(&at, "string", other));
                            }
                        }
                    }
                }
                Some(other) => return Err(wrong_type(&location, "string or array", other)),
            }
        }
        Ok(out)
    }
}

/// Outcome of loading one artifact
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// Read and parsed successfully
    Loaded(Artifact),
    /// No file at the path
    Missing { kind: String, path: PathBuf },
    /// File exists but could not be read
    Unreadable {
        kind: String,
        path: PathBuf,
        error: String,
    },
    /// File read but its content is not valid JSON (or not valid UTF-8 text)
    Malformed {
        kind: String,
        path: PathBuf,
        format: ArtifactFormat,
        error: String,
    },
}

impl LoadOutcome {
    pub fn kind(&self) -> &str {
        match self {
            LoadOutcome::Loaded(artifact) => &artifact.kind,
            LoadOutcome::Missing { kind, .. }
            | LoadOutcome::Unreadable { kind, .. }
            | LoadOutcome::Malformed { kind, .. } => kind,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            LoadOutcome::Loaded(artifact) => &artifact.path,
            LoadOutcome::Missing { path, .. }
            | LoadOutcome::Unreadable { path, .. }
            | LoadOutcome::Malformed { path, .. } => path,
        }
    }

    /// Machine-readable reason recorded in verdict details
    pub fn reason(&self) -> &'static str {
        match self {
            LoadOutcome::Loaded(_) => "ok",
            LoadOutcome::Missing { .. } => "missing",
            LoadOutcome::Unreadable { .. } => "unreadable",
            LoadOutcome::Malformed {
                format: ArtifactFormat::Json,
                ..
            } => "invalid_json",
            LoadOutcome::Malformed {
                format: ArtifactFormat::Text,
                ..
            } => "invalid_encoding",
        }
    }

    /// Whether a file exists at the path
    pub fn exists(&self) -> bool {
        !matches!(self, LoadOutcome::Missing { .. })
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            LoadOutcome::Loaded(artifact) => Some(artifact),
            _ => None,
        }
    }
}

/// Reads artifacts from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactStore;

impl ArtifactStore {
    /// Load a single artifact
    pub fn load(kind: &str, path: &Path, format: ArtifactFormat) -> LoadOutcome {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(kind, path = %path.display(), "artifact missing");
                return LoadOutcome::Missing {
                    kind: kind.to_string(),
                    path: path.to_path_buf(),
                };
            }
            Err(e) => {
                tracing::warn!(kind, path = %path.display(), error = %e, "artifact unreadable");
                return LoadOutcome::Unreadable {
                    kind: kind.to_string(),
                    path: path.to_path_buf(),
                    error: e.to_string(),
                };
            }
        };

        let mtime = std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        let sha256 = hex::encode(Sha256::digest(&bytes));
        let size = bytes.len() as u64;

        let content = match format {
            ArtifactFormat::Json => serde_json::from_slice::<Value>(&bytes)
                .map(Content::Json)
                .map_err(|e| format!("invalid JSON: {}", e)),
            ArtifactFormat::Text => String::from_utf8(bytes)
                .map(Content::Text)
                .map_err(|e| format!("invalid UTF-8: {}", e)),
        };

        match content {
            Ok(content) => LoadOutcome::Loaded(Artifact {
                kind: kind.to_string(),
                path: path.to_path_buf(),
                content,
                mtime,
                sha256,
                size,
            }),
            Err(error) => {
                tracing::warn!(kind, path = %path.display(), %error, "artifact malformed");
                LoadOutcome::Malformed {
                    kind: kind.to_string(),
                    path: path.to_path_buf(),
                    format,
                    error,
                }
            }
        }
    }

    /// Load many artifacts on a bounded pool of blocking workers
    ///
    /// Outcomes come back in request order regardless of completion order.
    pub async fn load_all(
        requests: Vec<(String, PathBuf, ArtifactFormat)>,
        workers: usize,
    ) -> ArtifactSet {
        let permits = Arc::new(Semaphore::new(workers.max(1)));
        let mut tasks = JoinSet::new();

        for (index, (kind, path, format)) in requests.iter().cloned().enumerate() {
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let outcome = tokio::task::spawn_blocking(move || {
                    ArtifactStore::load(&kind, &path, format)
                })
                .await;
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<LoadOutcome>> = vec![None; requests.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(outcome))) => slots[index] = Some(outcome),
                Ok((index, Err(e))) => {
                    tracing::error!(error = %e, "artifact loader task failed");
                    let (kind, path, _) = &requests[index];
                    slots[index] = Some(LoadOutcome::Unreadable {
                        kind: kind.clone(),
                        path: path.clone(),
                        error: e.to_string(),
                    });
                }
                Err(e) => tracing::error!(error = %e, "artifact loader task failed"),
            }
        }

        let mut set = ArtifactSet::default();
        for ((kind, path, format), slot) in requests.into_iter().zip(slots) {
            // A slot is only empty if the outer task itself died; retry inline.
            let outcome = slot.unwrap_or_else(|| ArtifactStore::load(&kind, &path, format));
            set.insert(outcome);
        }
        set
    }
}

/// Loaded artifacts of one guard run, keyed by kind in declaration order
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    outcomes: IndexMap<String, LoadOutcome>,
}

impl ArtifactSet {
    pub fn insert(&mut self, outcome: LoadOutcome) {
        self.outcomes.insert(outcome.kind().to_string(), outcome);
    }

    pub fn get(&self, kind: &str) -> Option<&LoadOutcome> {
        self.outcomes.get(kind)
    }

    /// The loaded artifact, or a check error explaining why it is unavailable
    pub fn artifact(&self, kind: &str) -> Result<&Artifact, CheckError> {
        match self.outcomes.get(kind) {
            Some(LoadOutcome::Loaded(artifact)) => Ok(artifact),
            Some(other) => Err(CheckError::ArtifactUnavailable {
                kind: kind.to_string(),
                reason: other.reason().to_string(),
            }),
            None => Err(CheckError::ArtifactUnavailable {
                kind: kind.to_string(),
                reason: "not_declared".to_string(),
            }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadOutcome> {
        self.outcomes.values()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

impl FromIterator<LoadOutcome> for ArtifactSet {
    fn from_iter<T: IntoIterator<Item = LoadOutcome>>(iter: T) -> Self {
        let mut set = ArtifactSet::default();
        for outcome in iter {
            set.insert(outcome);
        }
        set
    }
}

/// Build an in-memory JSON artifact (fixtures and tests)
pub fn json_artifact(kind: &str, document: Value) -> Artifact {
    let bytes = serde_json::to_vec(&document).unwrap_or_default();
    Artifact {
        kind: kind.to_string(),
        path: PathBuf::from(format!("{}.json", kind)),
        sha256: hex::encode(Sha256::digest(&bytes)),
        size: bytes.len() as u64,
        content: Content::Json(document),
        mtime: None,
    }
}
