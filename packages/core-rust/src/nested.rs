//! Nested validation: descends into nested filters and collections and
//! merges their errors into the parent's flat error map.
//!
//! Rules, applied per top-level field in declaration order:
//!
//! 1. A field that already has an error is not inspected further; the
//!    parent-level error wins.
//! 2. A single nested filter that is optional and received no input is
//!    skipped. Otherwise its non-empty errors are stored under the field.
//! 3. Each element of a collection is tested the same way, keyed by its
//!    element key. Valid elements are left out, so the result is sparse.

use std::collections::BTreeMap;

use crate::entity::{Entity, FieldValue};
use crate::error_map::{ErrorMap, ErrorValue};
use crate::schema::Schema;
use crate::traits::FilterLike;

/// Per-field binding facts consulted during nested validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub optional: bool,
}

/// Optional flags per field, plus one entry per collection element
/// (`"uploads.0"`, `"uploads.1"`, …) added when the collection is bound.
///
/// Built once while binding and never changed afterwards.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    entries: BTreeMap<String, Mapping>,
}

impl MappingTable {
    /// Seeds the table with every field of `schema`.
    #[must_use]
    pub fn from_schema(schema: &Schema) -> Self {
        let entries = schema
            .fields()
            .iter()
            .map(|spec| {
                (
                    spec.name.clone(),
                    Mapping {
                        optional: spec.optional,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Records the runtime expansion of a wildcard binding.
    pub(crate) fn expand(&mut self, field: &str, key: &str, optional: bool) {
        self.entries
            .insert(element_key(field, key), Mapping { optional });
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Mapping> {
        self.entries.get(key).copied()
    }

    /// Unknown keys are treated as required.
    #[must_use]
    pub fn is_optional(&self, key: &str) -> bool {
        self.get(key).is_some_and(|mapping| mapping.optional)
    }
}

pub(crate) fn element_key(field: &str, key: &str) -> String {
    format!("{field}.{key}")
}

/// Merges nested filter errors into `errors`.
///
/// `errors` holds the flat errors reported by the validator for the parent.
#[must_use]
pub fn augment(mut errors: ErrorMap, entity: &mut Entity, table: &MappingTable) -> ErrorMap {
    for (name, value) in entity.iter_mut() {
        if errors.contains_key(name) {
            continue;
        }
        match value {
            FieldValue::Scalar(_) => {}
            FieldValue::Nested(filter) => {
                if let Some(nested) = nested_errors(filter.as_mut(), table.is_optional(name)) {
                    errors.insert(name.to_string(), ErrorValue::Nested(nested));
                }
            }
            FieldValue::Collection(items) => {
                let mut indexed = ErrorMap::new();
                for (key, filter) in items.iter_mut() {
                    let optional = table.is_optional(&element_key(name, key));
                    if let Some(nested) = nested_errors(filter, optional) {
                        indexed.insert(key.clone(), ErrorValue::Nested(nested));
                    }
                }
                if !indexed.is_empty() {
                    errors.insert(name.to_string(), ErrorValue::Nested(indexed));
                }
            }
        }
    }
    errors
}

fn nested_errors<F: FilterLike + ?Sized>(filter: &mut F, optional: bool) -> Option<ErrorMap> {
    if optional && !filter.has_input() {
        return None;
    }
    let errors = filter.errors();
    if errors.is_empty() {
        None
    } else {
        Some(errors.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    /// Minimal `FilterLike` stand-in with fixed errors and input.
    struct Stub {
        errors: ErrorMap,
        value: Value,
        calls: usize,
    }

    impl FilterLike for Stub {
        fn errors(&mut self) -> &ErrorMap {
            self.calls += 1;
            &self.errors
        }

        fn value(&self) -> Value {
            self.value.clone()
        }
    }

    fn stub(errors: &[(&str, &str)], value: Value) -> Stub {
        Stub {
            errors: errors
                .iter()
                .map(|(k, v)| ((*k).to_string(), ErrorValue::from(*v)))
                .collect(),
            value,
            calls: 0,
        }
    }

    #[test]
    fn optional_without_input_is_skipped_without_validating() {
        let mut s = stub(&[("city", "required")], Value::Null);
        assert!(nested_errors(&mut s, true).is_none());
        assert_eq!(s.calls, 0);
    }

    #[test]
    fn optional_with_input_is_validated() {
        let mut s = stub(&[("city", "required")], Value::from("x"));
        assert!(nested_errors(&mut s, true).is_some());
    }

    #[test]
    fn required_is_always_validated() {
        let mut s = stub(&[("city", "required")], Value::Null);
        let errors = nested_errors(&mut s, false).unwrap();
        assert_eq!(errors["city"].as_message(), Some("required"));
    }

    #[test]
    fn valid_nested_contributes_nothing() {
        let mut s = stub(&[], Value::from("x"));
        assert!(nested_errors(&mut s, false).is_none());
    }

    #[test]
    fn mapping_table_lookups() {
        let mut table = MappingTable::default();
        table.expand("uploads", "0", true);
        assert!(table.is_optional("uploads.0"));
        assert!(!table.is_optional("uploads.1"));
        assert_eq!(table.get("uploads.0"), Some(Mapping { optional: true }));
    }
}
