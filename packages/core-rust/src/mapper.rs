//! Rewrites error keys from internal field names to public input paths.

use std::collections::BTreeMap;

use crate::error_map::ErrorMap;
use crate::schema::Schema;

/// Field name -> public path table of one schema.
///
/// A field bound from `file:images.preview` reports its errors under
/// `images.preview`. Keys without a recorded origin are left unchanged, and
/// error payloads (including nested maps) are never touched: nested filters
/// map their own levels before handing their errors up.
#[derive(Debug, Clone, Default)]
pub struct ErrorMapper {
    paths: BTreeMap<String, String>,
}

impl ErrorMapper {
    #[must_use]
    pub fn new(schema: &Schema) -> Self {
        let paths = schema
            .fields()
            .iter()
            .filter(|spec| spec.public_path() != spec.name)
            .map(|spec| (spec.name.clone(), spec.public_path().to_string()))
            .collect();
        Self { paths }
    }

    /// Public path of `field`, or the field itself when it has none.
    #[must_use]
    pub fn path_of<'a>(&'a self, field: &'a str) -> &'a str {
        self.paths.get(field).map_or(field, String::as_str)
    }

    /// Rekeys `errors` by public path.
    ///
    /// Compiled schemas give every field its own path, so only a key the
    /// validator invented can clash with a field's path. The invented key
    /// keeps its place and the field falls back to its own name.
    #[must_use]
    pub fn map_errors(&self, errors: ErrorMap) -> ErrorMap {
        if self.paths.is_empty() {
            return errors;
        }
        let (fields, mut mapped): (ErrorMap, ErrorMap) = errors
            .into_iter()
            .partition(|(key, _)| self.paths.contains_key(key));
        for (field, value) in fields {
            let path = self.path_of(&field).to_string();
            if mapped.contains_key(&path) {
                tracing::warn!(field = %field, path = %path, "error key already taken, keeping field name");
                mapped.insert(field, value);
            } else {
                mapped.insert(path, value);
            }
        }
        mapped
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::error_map::ErrorValue;
    use crate::schema::{compile, FilterType};

    fn mapper() -> ErrorMapper {
        let ft = FilterType::builder("T")
            .field("preview", "file:images.preview")
            .field("name", "post:name")
            .field("verb", "method")
            .collection("files", "Up", "uploads")
            .build();
        ErrorMapper::new(&compile(&ft, |n| n == "Up").unwrap())
    }

    #[test]
    fn keys_follow_origin_paths() {
        let m = mapper();
        assert_eq!(m.path_of("preview"), "images.preview");
        assert_eq!(m.path_of("name"), "name");
        assert_eq!(m.path_of("verb"), "verb");
        assert_eq!(m.path_of("files"), "uploads");
        assert_eq!(m.path_of("synthetic"), "synthetic");
    }

    #[test]
    fn payloads_and_nesting_are_preserved() {
        let mut nested = ErrorMap::new();
        nested.insert("1".into(), ErrorValue::from("bad"));
        let mut errors = ErrorMap::new();
        errors.insert("preview".into(), "too large".into());
        errors.insert("files".into(), nested.clone().into());
        errors.insert("extra".into(), "x".into());

        let mapped = mapper().map_errors(errors);
        assert_eq!(mapped["images.preview"], ErrorValue::from("too large"));
        assert_eq!(mapped["uploads"], ErrorValue::Nested(nested));
        assert_eq!(mapped["extra"], ErrorValue::from("x"));
        assert!(!mapped.contains_key("preview"));
    }

    #[test]
    fn invented_key_is_never_overwritten() {
        let mut errors = ErrorMap::new();
        errors.insert("preview".into(), "too large".into());
        errors.insert("images.preview".into(), "checked elsewhere".into());

        let mapped = mapper().map_errors(errors);
        assert_eq!(crate::error_map::count_messages(&mapped), 2);
        assert_eq!(mapped["images.preview"], ErrorValue::from("checked elsewhere"));
        assert_eq!(mapped["preview"], ErrorValue::from("too large"));
    }

    proptest! {
        #[test]
        fn unknown_keys_map_to_themselves(keys in prop::collection::btree_set("[a-z]{1,8}", 0..10)) {
            let m = ErrorMapper::default();
            let errors: ErrorMap = keys.iter().map(|k| (k.clone(), ErrorValue::from("e"))).collect();
            prop_assert_eq!(m.map_errors(errors.clone()), errors);
        }

        #[test]
        fn mapping_never_changes_the_message_count(keys in prop::collection::btree_set("[a-z]{1,8}", 0..10)) {
            let errors: ErrorMap = keys.iter().map(|k| (k.clone(), ErrorValue::from("e"))).collect();
            let mapped = mapper().map_errors(errors.clone());
            prop_assert_eq!(
                crate::error_map::count_messages(&mapped),
                crate::error_map::count_messages(&errors)
            );
        }
    }
}
