use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Generic runtime value produced by input sources and consumed by validators.
///
/// Supports all JSON-compatible types plus binary data. Serializes untagged,
/// so a `Value` renders as the JSON it represents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// JSON null. Also stands for "absent" once an input lookup misses.
    #[default]
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON integer (signed 64-bit).
    Int(i64),
    /// JSON floating-point (64-bit IEEE 754).
    Float(f64),
    /// JSON string (UTF-8).
    String(String),
    /// JSON array (ordered sequence of values).
    Array(Vec<Value>),
    /// JSON object (ordered map of string keys to values).
    /// Uses `BTreeMap` for deterministic iteration order.
    Map(BTreeMap<String, Value>),
    /// Binary data (not directly representable in JSON).
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the string payload, if this is a [`Value::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the map payload, if this is a [`Value::Map`].
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Short lowercase name of the variant, used in validation messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Walks a dotted path (`"images.preview"`, `"uploads.1.name"`).
    ///
    /// Map segments match keys, array segments must be decimal indices.
    /// A key containing `.` is addressed with the dot escaped as `\.` (see
    /// [`escape_segment`]). An empty path returns `self`. Returns `None` as
    /// soon as a segment cannot be followed.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(self);
        }
        split_path(path).iter().try_fold(self, |current, segment| match current {
            Self::Map(map) => map.get(segment.as_ref()),
            Self::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Inserts `value` at a dotted path, creating intermediate maps.
    ///
    /// Non-map intermediates are replaced by maps.
    pub fn insert_path(&mut self, path: &str, value: Value) {
        let mut current = self;
        let mut segments = split_path(path).into_iter().peekable();
        while let Some(segment) = segments.next() {
            if !matches!(current, Self::Map(_)) {
                *current = Self::Map(BTreeMap::new());
            }
            let Self::Map(map) = current else {
                unreachable!("current was just replaced by a map");
            };
            if segments.peek().is_none() {
                map.insert(segment.into_owned(), value);
                return;
            }
            current = map.entry(segment.into_owned()).or_insert(Self::Null);
        }
    }

    /// Returns `true` when no non-null leaf exists anywhere in this value.
    ///
    /// Empty strings count as input; only structural emptiness does not.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Array(items) => items.iter().all(Value::is_blank),
            Self::Map(map) => map.values().all(Value::is_blank),
            _ => false,
        }
    }
}

/// Escapes one path segment so that [`Value::lookup`] reads it as a single
/// key even when it contains `.` or `\`.
#[must_use]
pub fn escape_segment(segment: &str) -> Cow<'_, str> {
    if !segment.contains(['.', '\\']) {
        return Cow::Borrowed(segment);
    }
    let mut escaped = String::with_capacity(segment.len() + 2);
    for c in segment.chars() {
        if matches!(c, '.' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

/// Splits a dotted path on unescaped dots.
fn split_path(path: &str) -> Vec<Cow<'_, str>> {
    if !path.contains('\\') {
        return path.split('.').map(Cow::Borrowed).collect();
    }
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.push(chars.next().unwrap_or('\\')),
            '.' => segments.push(Cow::Owned(std::mem::take(&mut current))),
            _ => current.push(c),
        }
    }
    segments.push(Cow::Owned(current));
    segments
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Int(i) => Self::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f).map_or(Self::Null, Self::Number),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Map(map) => Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
            Value::Bytes(bytes) => Self::Array(bytes.into_iter().map(Self::from).collect()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Authentication principal carried in a [`ValidationContext`](crate::ValidationContext).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique identifier for the authenticated entity.
    pub id: String,
    /// Roles assigned to this principal for authorization checks.
    pub roles: Vec<String>,
}
