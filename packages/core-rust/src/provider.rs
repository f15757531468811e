//! Entry point for building bound filters.

use std::fmt;
use std::sync::Arc;

use crate::binder::{build_filter, BindContext};
use crate::config::ProviderConfig;
use crate::context::ValidationContext;
use crate::error::{FilterError, SchemaError};
use crate::filter::Filter;
use crate::input::InputScope;
use crate::registry::FilterRegistry;
use crate::traits::{InputResolver, Translator};

/// Builds filters from a shared registry.
///
/// Cheap to clone; clones share the registry and translator.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use filterkit_core::{
///     FilterProvider, FilterRegistry, FilterType, ProviderConfig, Rule, RuleValidator, Source,
///     StaticInput,
/// };
///
/// let registry = Arc::new(FilterRegistry::new());
/// registry
///     .register(
///         FilterType::builder("LoginFilter")
///             .field("email", "post:email")
///             .validator(RuleValidator::new().rule("email", Rule::Required))
///             .build(),
///     )
///     .unwrap();
/// let provider = FilterProvider::new(registry, ProviderConfig::default()).unwrap();
///
/// let input = StaticInput::new().with_value(Source::Post, "email", "ann@example.org");
/// let mut filter = provider.create("LoginFilter", Arc::new(input)).unwrap();
/// assert!(filter.is_valid());
/// ```
#[derive(Clone)]
pub struct FilterProvider {
    registry: Arc<FilterRegistry>,
    translator: Option<Arc<dyn Translator>>,
    context: Option<ValidationContext>,
    config: ProviderConfig,
}

impl FilterProvider {
    /// Creates a provider after compiling every registered filter type.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`] found in the registry.
    pub fn new(registry: Arc<FilterRegistry>, config: ProviderConfig) -> Result<Self, SchemaError> {
        registry.compile_all()?;
        tracing::info!(
            filters = registry.names().len(),
            max_depth = config.max_depth,
            "filter provider ready"
        );
        Ok(Self {
            registry,
            translator: None,
            context: None,
            config,
        })
    }

    /// Translates error messages of every filter created from now on.
    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Binds every filter created from now on to `context`.
    #[must_use]
    pub fn with_context(mut self, context: ValidationContext) -> Self {
        self.context = Some(context);
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<FilterRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Builds the filter type `name` and binds `input` onto it.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Configuration`] for an unknown type and
    /// [`FilterError::Binding`] when the input cannot be read or nesting is
    /// too deep.
    pub fn create(&self, name: &str, input: Arc<dyn InputResolver>) -> Result<Filter, FilterError> {
        let ctx = BindContext {
            registry: self.registry.as_ref(),
            max_depth: self.config.max_depth,
            translator: self.translator.as_ref(),
            context: self.context.as_ref(),
            depth: 0,
        };
        build_filter(name, &InputScope::new(input), ctx)
    }
}

impl fmt::Debug for FilterProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterProvider")
            .field("filters", &self.registry.names())
            .field("translator", &self.translator.is_some())
            .field("context", &self.context)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::StaticInput;
    use crate::schema::FilterType;

    #[test]
    fn new_rejects_broken_registry() {
        let registry = Arc::new(FilterRegistry::new());
        registry
            .register(FilterType::builder("Broken").field("x", "nowhere:x").build())
            .unwrap();
        assert!(matches!(
            FilterProvider::new(registry, ProviderConfig::default()),
            Err(SchemaError::UnknownSource { .. })
        ));
    }

    #[test]
    fn create_unknown_filter() {
        let provider =
            FilterProvider::new(Arc::new(FilterRegistry::new()), ProviderConfig::default()).unwrap();
        let err = provider.create("Missing", Arc::new(StaticInput::new())).unwrap_err();
        assert!(matches!(
            err,
            FilterError::Configuration(SchemaError::UnregisteredFilter { .. })
        ));
    }

    #[test]
    fn provider_context_reaches_created_filters() {
        let registry = Arc::new(FilterRegistry::new());
        registry
            .register(FilterType::builder("F").field("a", "post:a").build())
            .unwrap();
        let context = ValidationContext::default().with_attribute("locale", "de");
        let provider = FilterProvider::new(registry, ProviderConfig::default())
            .unwrap()
            .with_context(context.clone());
        let filter = provider.create("F", Arc::new(StaticInput::new())).unwrap();
        assert_eq!(filter.context(), Some(&context));
    }
}
