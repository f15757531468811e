//! Message translation for error maps.
//!
//! Validators wrap translatable messages in `[[...]]` markers, e.g.
//! `"[[This field is required]]"`. A marked message is looked up in the
//! translator by its inner text; when the catalog has no entry the inner
//! text is used as-is. Unmarked messages are never translated.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error_map::{ErrorMap, ErrorValue};
use crate::traits::Translator;

const OPEN: &str = "[[";
const CLOSE: &str = "]]";

/// Inner text of a `[[...]]` marker, if `message` is one.
#[must_use]
pub fn marker_text(message: &str) -> Option<&str> {
    message.strip_prefix(OPEN)?.strip_suffix(CLOSE)
}

/// Translates one message.
#[must_use]
pub fn translate_message(message: &str, translator: &dyn Translator) -> String {
    match marker_text(message) {
        Some(key) => translator.translate(key).unwrap_or_else(|| key.to_string()),
        None => message.to_string(),
    }
}

/// Translates every message in `errors`, descending into nested maps.
#[must_use]
pub fn translate_errors(errors: ErrorMap, translator: &dyn Translator) -> ErrorMap {
    errors
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                ErrorValue::Message(message) => {
                    ErrorValue::Message(translate_message(&message, translator))
                }
                ErrorValue::Nested(nested) => {
                    ErrorValue::Nested(translate_errors(nested, translator))
                }
            };
            (key, value)
        })
        .collect()
}

/// Static message catalog.
///
/// Deserializes from a flat `{ "message": "translation" }` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct CatalogTranslator {
    entries: BTreeMap<String, String>,
}

impl CatalogTranslator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one entry.
    #[must_use]
    pub fn with(mut self, message: impl Into<String>, translation: impl Into<String>) -> Self {
        self.entries.insert(message.into(), translation.into());
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Translator for CatalogTranslator {
    fn translate(&self, message: &str) -> Option<String> {
        self.entries.get(message).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> CatalogTranslator {
        CatalogTranslator::new().with("This field is required", "Dieses Feld ist erforderlich")
    }

    #[test]
    fn marked_messages_are_translated() {
        assert_eq!(
            translate_message("[[This field is required]]", &catalog()),
            "Dieses Feld ist erforderlich"
        );
    }

    #[test]
    fn missing_entry_strips_the_marker() {
        assert_eq!(translate_message("[[Too short]]", &catalog()), "Too short");
    }

    #[test]
    fn unmarked_messages_pass_through() {
        assert_eq!(
            translate_message("This field is required", &catalog()),
            "This field is required"
        );
        assert_eq!(translate_message("[[half open", &catalog()), "[[half open");
    }

    #[test]
    fn nested_maps_are_translated() {
        let mut inner = ErrorMap::new();
        inner.insert("city".into(), "[[This field is required]]".into());
        let mut errors = ErrorMap::new();
        errors.insert("address".into(), inner.into());
        errors.insert("name".into(), "[[Too short]]".into());

        let translated = translate_errors(errors, &catalog());
        let address = translated["address"].as_nested().unwrap();
        assert_eq!(address["city"].as_message(), Some("Dieses Feld ist erforderlich"));
        assert_eq!(translated["name"].as_message(), Some("Too short"));
    }

    #[test]
    fn catalog_deserializes_from_json() {
        let catalog: CatalogTranslator =
            serde_json::from_str(r#"{"Too short":"Zu kurz"}"#).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.translate("Too short").as_deref(), Some("Zu kurz"));
        assert_eq!(catalog.translate("Too long"), None);
    }
}
