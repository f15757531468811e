//! Bound field storage of a filter.

use std::collections::BTreeMap;

use crate::filter::Filter;
use crate::types::Value;

/// Value held by one field of a bound filter.
#[derive(Debug)]
pub enum FieldValue {
    /// A plain value (possibly `Null` when nothing was passed).
    Scalar(Value),
    /// A nested filter.
    Nested(Box<Filter>),
    /// Nested filters keyed by their element key in the input
    /// (array index or map key), in input order.
    Collection(Vec<(String, Filter)>),
}

impl FieldValue {
    /// Flattened value of this field.
    #[must_use]
    pub fn value(&self) -> Value {
        match self {
            Self::Scalar(value) => value.clone(),
            Self::Nested(filter) => filter.value(),
            Self::Collection(items) => collection_value(items),
        }
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

/// Arrays come back as arrays; anything keyed otherwise becomes a map.
fn collection_value(items: &[(String, Filter)]) -> Value {
    let sequential = items
        .iter()
        .enumerate()
        .all(|(i, (key, _))| key.parse::<usize>() == Ok(i));
    if sequential {
        Value::Array(items.iter().map(|(_, filter)| filter.value()).collect())
    } else {
        Value::Map(
            items
                .iter()
                .map(|(key, filter)| (key.clone(), filter.value()))
                .collect::<BTreeMap<_, _>>(),
        )
    }
}

/// Ordered field mapping of a bound filter.
///
/// Declared fields keep schema order; fields set later are appended.
#[derive(Debug, Default)]
pub struct Entity {
    fields: Vec<(String, FieldValue)>,
}

impl Entity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.fields
            .iter_mut()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Replaces the value of `name`, or appends it.
    pub fn set(&mut self, name: &str, value: FieldValue) {
        match self.get_mut(name) {
            Some(slot) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        let index = self.fields.iter().position(|(field, _)| field == name)?;
        Some(self.fields.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut FieldValue)> {
        self.fields
            .iter_mut()
            .map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Flattened value-set: a map of every field to its value.
    #[must_use]
    pub fn value(&self) -> Value {
        Value::Map(
            self.fields
                .iter()
                .map(|(name, value)| (name.clone(), value.value()))
                .collect(),
        )
    }
}
