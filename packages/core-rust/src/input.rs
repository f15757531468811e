//! Input scoping and an in-memory resolver.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ResolveError;
use crate::origin::Source;
use crate::traits::InputResolver;
use crate::types::Value;

/// A resolver narrowed to a path prefix.
///
/// Nested filters see their parent's input through a scope prefixed with the
/// nested field's origin path, so `city` inside `address` resolves as
/// `address.city`. Scalar sources are not prefixed.
#[derive(Clone)]
pub struct InputScope {
    resolver: Arc<dyn InputResolver>,
    prefix: Option<String>,
}

impl InputScope {
    /// Creates an unprefixed scope over `resolver`.
    #[must_use]
    pub fn new(resolver: Arc<dyn InputResolver>) -> Self {
        Self {
            resolver,
            prefix: None,
        }
    }

    /// Returns a child scope whose prefix is extended by `path`.
    #[must_use]
    pub fn with_prefix(&self, path: &str) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            prefix: Some(self.full_path(path)),
        }
    }

    /// Current prefix, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Joins `path` onto the current prefix.
    #[must_use]
    pub fn full_path(&self, path: &str) -> String {
        match &self.prefix {
            Some(prefix) if !path.is_empty() => format!("{prefix}.{path}"),
            Some(prefix) => prefix.clone(),
            None => path.to_string(),
        }
    }

    /// Resolves a value through the underlying resolver.
    ///
    /// # Errors
    ///
    /// Propagates the resolver's [`ResolveError`].
    pub fn resolve(&self, source: Source, path: &str) -> Result<Option<Value>, ResolveError> {
        if source.is_keyed() {
            let full = self.full_path(path);
            tracing::trace!(%source, path = %full, "resolving input");
            self.resolver.resolve(source, &full)
        } else {
            self.resolver.resolve(source, path)
        }
    }
}

impl fmt::Debug for InputScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputScope")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// In-memory input: one [`Value`] per source.
///
/// Keyed sources hold a map looked up by dotted path; scalar sources hold
/// the value returned as-is.
///
/// # Examples
///
/// ```
/// use filterkit_core::{InputResolver, Source, StaticInput, Value};
///
/// let input = StaticInput::new()
///     .with_value(Source::Post, "name", "Ann")
///     .with_source(Source::Method, "POST");
/// assert_eq!(input.resolve(Source::Post, "name").unwrap(), Some(Value::from("Ann")));
/// assert_eq!(input.resolve(Source::Method, "ignored").unwrap(), Some(Value::from("POST")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticInput {
    bags: HashMap<Source, Value>,
}

impl StaticInput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole bag (or scalar) for `source`.
    #[must_use]
    pub fn with_source(mut self, source: Source, value: impl Into<Value>) -> Self {
        self.bags.insert(source, value.into());
        self
    }

    /// Sets one value at a dotted path inside a keyed source.
    #[must_use]
    pub fn with_value(mut self, source: Source, path: &str, value: impl Into<Value>) -> Self {
        self.bags
            .entry(source)
            .or_insert(Value::Null)
            .insert_path(path, value.into());
        self
    }
}

impl InputResolver for StaticInput {
    fn resolve(&self, source: Source, path: &str) -> Result<Option<Value>, ResolveError> {
        let Some(bag) = self.bags.get(&source) else {
            return Ok(None);
        };
        if source.is_keyed() {
            Ok(bag.lookup(path).cloned())
        } else {
            Ok(Some(bag.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> Arc<dyn InputResolver> {
        Arc::new(
            StaticInput::new()
                .with_source(
                    Source::Post,
                    Value::from(serde_json::json!({ "address": { "city": "Oslo" } })),
                )
                .with_source(Source::Method, "PUT"),
        )
    }

    #[test]
    fn prefixed_scope_resolves_below_prefix() {
        let scope = InputScope::new(input()).with_prefix("address");
        assert_eq!(scope.prefix(), Some("address"));
        assert_eq!(
            scope.resolve(Source::Post, "city").unwrap(),
            Some(Value::from("Oslo"))
        );
    }

    #[test]
    fn scalar_sources_ignore_prefix() {
        let scope = InputScope::new(input()).with_prefix("address");
        assert_eq!(
            scope.resolve(Source::Method, "verb").unwrap(),
            Some(Value::from("PUT"))
        );
    }

    #[test]
    fn prefixes_compose() {
        let scope = InputScope::new(input()).with_prefix("a").with_prefix("b");
        assert_eq!(scope.full_path("c"), "a.b.c");
        assert_eq!(scope.full_path(""), "a.b");
    }

    #[test]
    fn missing_source_is_absent() {
        let scope = InputScope::new(input());
        assert_eq!(scope.resolve(Source::Cookie, "sid").unwrap(), None);
        assert_eq!(scope.resolve(Source::Post, "nope").unwrap(), None);
    }
}
