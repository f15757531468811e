use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field errors keyed by field name (or, once mapped, by public input path).
///
/// A missing key means the field is valid.
pub type ErrorMap = BTreeMap<String, ErrorValue>;

/// A single field's error: a message, or the errors of a nested filter.
///
/// Serializes untagged, so an error map renders as plain nested JSON objects
/// of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorValue {
    Message(String),
    Nested(ErrorMap),
}

impl ErrorValue {
    /// Returns the message, if this is a leaf error.
    #[must_use]
    pub fn as_message(&self) -> Option<&str> {
        match self {
            Self::Message(m) => Some(m),
            Self::Nested(_) => None,
        }
    }

    /// Returns the nested map, if this is a nested error.
    #[must_use]
    pub fn as_nested(&self) -> Option<&ErrorMap> {
        match self {
            Self::Message(_) => None,
            Self::Nested(map) => Some(map),
        }
    }
}

impl From<&str> for ErrorValue {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<String> for ErrorValue {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<ErrorMap> for ErrorValue {
    fn from(map: ErrorMap) -> Self {
        Self::Nested(map)
    }
}

/// Counts leaf messages in an error map, descending into nested maps.
#[must_use]
pub fn count_messages(errors: &ErrorMap) -> usize {
    errors
        .values()
        .map(|value| match value {
            ErrorValue::Message(_) => 1,
            ErrorValue::Nested(nested) => count_messages(nested),
        })
        .sum()
}
