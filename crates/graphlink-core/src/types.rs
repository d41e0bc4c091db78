//! Normalized value model shared by the client and its callers.
//!
//! Everything a query returns is expressed with these types. Driver-native
//! representations are converted at the client boundary and never appear
//! here.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CoreError;

// ── Values ───────────────────────────────────────────────────────

/// Named query parameters.
pub type Params = BTreeMap<String, Value>;

/// One result row: column name → normalized value.
pub type Record = BTreeMap<String, Value>;

/// A normalized value. This is the closed set of kinds a query result can
/// contain once it has left the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Node(NormalizedNode),
    Relationship(NormalizedRelationship),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&NormalizedNode> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&NormalizedRelationship> {
        match self {
            Value::Relationship(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(xs) => Some(xs),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a key in a map value. Returns `None` for every other kind.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Consume the value, returning the node it holds.
    pub fn into_node(self) -> Option<NormalizedNode> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Consume the value, returning the relationship it holds.
    pub fn into_relationship(self) -> Option<NormalizedRelationship> {
        match self {
            Value::Relationship(r) => Some(r),
            _ => None,
        }
    }

    /// Short name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Node(_) => "Node",
            Value::Relationship(_) => "Relationship",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(xs: Vec<T>) -> Self {
        Value::List(xs.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(m: BTreeMap<String, Value>) -> Self {
        Value::Map(m)
    }
}

impl From<NormalizedNode> for Value {
    fn from(n: NormalizedNode) -> Self {
        Value::Node(n)
    }
}

impl From<NormalizedRelationship> for Value {
    fn from(r: NormalizedRelationship) -> Self {
        Value::Relationship(r)
    }
}

/// JSON input (CLI parameters, config metadata) maps onto plain kinds only.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(xs) => Value::List(xs.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(m) => {
                Value::Map(m.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

// ── Graph Records ────────────────────────────────────────────────

/// A node as seen by callers: identity, labels, and normalized properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedNode {
    pub id: String,
    pub labels: BTreeSet<String>,
    pub properties: BTreeMap<String, Value>,
}

impl NormalizedNode {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// A directed, typed relationship with normalized properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRelationship {
    pub id: String,
    #[serde(rename = "type")]
    pub rel_type: String,
    pub properties: BTreeMap<String, Value>,
    pub start_node_id: String,
    pub end_node_id: String,
}

impl NormalizedRelationship {
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

// ── Queries ──────────────────────────────────────────────────────

/// Cypher text plus its parameters, as handed to a driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub text: String,
    pub params: Params,
}

impl Statement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Params::new(),
        }
    }

    /// Bind a named parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }
}

/// Timing and provenance of an executed query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySummary {
    pub query_text: String,
    pub parameters: Params,
    /// Milliseconds until the first result was available.
    pub server_time_ms: u64,
    /// Milliseconds spent consuming the result stream.
    pub client_time_ms: u64,
}

/// Normalized records plus the summary of the query that produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub records: Vec<Record>,
    pub summary: QuerySummary,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Values of one column across all records, skipping records without it.
    pub fn column<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.records.iter().filter_map(move |r| r.get(name))
    }

    /// Deserialize every record into `T` through its JSON form.
    pub fn records_as<T: DeserializeOwned>(&self) -> Result<Vec<T>, CoreError> {
        self.records
            .iter()
            .map(|r| -> Result<T, CoreError> {
                Ok(serde_json::from_value(serde_json::to_value(r)?)?)
            })
            .collect()
    }
}

// ── Identifiers ──────────────────────────────────────────────────

/// Whether `name` is a plain Cypher identifier (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// Labels and relationship types are spliced into query text, so anything
/// else should come from a trusted source.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
