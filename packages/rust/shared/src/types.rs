//! Core domain types for bulkingest: records, edges, documents and the
//! raw input union the validator consumes.

use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding a document's identifier.
pub const ID_FIELD: &str = "_id";

/// Field holding a text record's merged content once it becomes a document.
pub const TEXT_FIELD: &str = "text";

// ---------------------------------------------------------------------------
// RecordId
// ---------------------------------------------------------------------------

/// Identifier of a logical record or document: integer or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Read an identifier out of a JSON value. Only integers and strings qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// The identifier as a JSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(i) => Value::from(*i),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Keyed
// ---------------------------------------------------------------------------

/// An entity with a store key. Entities without a key cannot be upserted.
pub trait Keyed {
    type Key: Eq + Hash + Clone + fmt::Debug;

    /// The entity's key, or `None` if it is missing.
    fn key(&self) -> Option<Self::Key>;
}

// ---------------------------------------------------------------------------
// LogicalRecord
// ---------------------------------------------------------------------------

/// One identifier plus the merged text of every source row sharing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalRecord {
    pub id: RecordId,
    pub text: String,
}

impl LogicalRecord {
    pub fn new(id: impl Into<RecordId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed, weighted relationship between two node identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from_id: i64,
    pub to_id: i64,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

fn default_weight() -> f64 {
    1.0
}

impl Edge {
    /// An unweighted (weight 1.0) edge without an explicit id.
    pub fn new(from_id: i64, to_id: i64) -> Self {
        Self {
            from_id,
            to_id,
            weight: default_weight(),
            id: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

/// Canonical edge key used for dedup and upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub from_id: i64,
    pub to_id: i64,
}

impl Keyed for Edge {
    type Key = EdgeKey;

    fn key(&self) -> Option<EdgeKey> {
        Some(EdgeKey {
            from_id: self.from_id,
            to_id: self.to_id,
        })
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A schemaless document. `_id` is required by the store, not by this type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// The document's `_id`, if present and an integer or string.
    pub fn id(&self) -> Option<RecordId> {
        self.0.get(ID_FIELD).and_then(RecordId::from_value)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Keys are the text form of `_id`, the form the document store indexes
/// by, so `1` and `"1"` collide.
impl Keyed for Document {
    type Key = RecordId;

    fn key(&self) -> Option<RecordId> {
        self.id().map(|id| RecordId::Text(id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// WriteMode / BulkWriteOutcome
// ---------------------------------------------------------------------------

/// How a bulk write treats existing keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Insert only; duplicate keys are rejected by the store.
    Insert,
    /// Update by key, or create when absent.
    #[default]
    Upsert,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => f.write_str("insert"),
            Self::Upsert => f.write_str("upsert"),
        }
    }
}

impl std::str::FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "upsert" => Ok(Self::Upsert),
            other => Err(format!("unknown write mode '{other}': expected 'insert' or 'upsert'")),
        }
    }
}

/// Per-item accounting reported by a store for one bulk write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BulkWriteOutcome {
    pub created: usize,
    pub updated: usize,
    pub rejected: usize,
}

impl BulkWriteOutcome {
    /// Items the store acknowledged as written.
    pub fn committed(&self) -> usize {
        self.created + self.updated
    }
}

impl std::ops::AddAssign for BulkWriteOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.updated += rhs.updated;
        self.rejected += rhs.rejected;
    }
}

// ---------------------------------------------------------------------------
// RawInput
// ---------------------------------------------------------------------------

/// A typed value that can describe itself as a field mapping.
pub trait AsFields {
    fn as_fields(&self) -> Map<String, Value>;
}

impl AsFields for LogicalRecord {
    fn as_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(ID_FIELD.into(), self.id.to_value());
        fields.insert(TEXT_FIELD.into(), Value::from(self.text.as_str()));
        fields
    }
}

impl AsFields for Edge {
    fn as_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("from_id".into(), Value::from(self.from_id));
        fields.insert("to_id".into(), Value::from(self.to_id));
        fields.insert("weight".into(), Value::from(self.weight));
        if let Some(id) = self.id {
            fields.insert("id".into(), Value::from(id));
        }
        fields
    }
}

/// Heterogeneous input accepted at the validation boundary.
pub enum RawInput {
    /// A bare identifier.
    Scalar(RecordId),
    /// A loose field mapping, e.g. a parsed CSV row or JSON object.
    Mapping(Map<String, Value>),
    /// A typed value exposing its fields.
    Structured(Box<dyn AsFields + Send>),
}

impl RawInput {
    pub fn structured(value: impl AsFields + Send + 'static) -> Self {
        Self::Structured(Box::new(value))
    }
}

impl fmt::Debug for RawInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(id) => f.debug_tuple("Scalar").field(id).finish(),
            Self::Mapping(map) => f.debug_tuple("Mapping").field(map).finish(),
            Self::Structured(s) => f.debug_tuple("Structured").field(&s.as_fields()).finish(),
        }
    }
}

impl From<LogicalRecord> for RawInput {
    fn from(record: LogicalRecord) -> Self {
        Self::structured(record)
    }
}

impl From<Map<String, Value>> for RawInput {
    fn from(map: Map<String, Value>) -> Self {
        Self::Mapping(map)
    }
}

impl From<RecordId> for RawInput {
    fn from(id: RecordId) -> Self {
        Self::Scalar(id)
    }
}
