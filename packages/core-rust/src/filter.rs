//! The filter facade: a bound filter instance and its lazily computed,
//! cached errors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::context::ValidationContext;
use crate::entity::{Entity, FieldValue};
use crate::error_map::{count_messages, ErrorMap};
use crate::mapper::ErrorMapper;
use crate::nested::{self, MappingTable};
use crate::schema::{FilterType, Schema};
use crate::traits::{FilterLike, Translator, Validator};
use crate::translate::translate_errors;
use crate::types::Value;

static NO_ERRORS: ErrorMap = BTreeMap::new();

/// Validation cache of a filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ValidationState {
    /// Nothing computed since construction or the last mutation.
    #[default]
    Unvalidated,
    /// Errors are being computed.
    Validating,
    /// Errors computed and cached.
    Validated(ErrorMap),
}

impl ValidationState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unvalidated => "unvalidated",
            Self::Validating => "validating",
            Self::Validated(_) => "validated",
        }
    }
}

/// Snapshot of a filter for logs and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct FilterDescription {
    pub name: String,
    pub values: Value,
    pub state: &'static str,
    /// Cached errors, if validated. Describing never triggers validation.
    pub errors: Option<ErrorMap>,
}

/// A filter type bound to one request's input.
///
/// Construct through [`FilterProvider::create`](crate::FilterProvider::create).
/// Errors are computed on the first call to [`errors`](Self::errors) and
/// cached until the filter is mutated, its context changes, or it is
/// [`reset`](Self::reset).
pub struct Filter {
    filter_type: Arc<FilterType>,
    schema: Arc<Schema>,
    entity: Entity,
    mapping: MappingTable,
    mapper: ErrorMapper,
    validator: Arc<dyn Validator>,
    translator: Option<Arc<dyn Translator>>,
    state: ValidationState,
}

impl Filter {
    pub(crate) fn from_parts(
        filter_type: Arc<FilterType>,
        schema: Arc<Schema>,
        entity: Entity,
        mapping: MappingTable,
        translator: Option<Arc<dyn Translator>>,
        context: Option<ValidationContext>,
    ) -> Self {
        let validator = match context {
            Some(context) => filter_type.validator().with_context(context),
            None => filter_type.validator(),
        };
        let mapper = ErrorMapper::new(&schema);
        Self {
            filter_type,
            schema,
            entity,
            mapping,
            mapper,
            validator,
            translator,
            state: ValidationState::Unvalidated,
        }
    }

    /// Name of the filter type.
    #[must_use]
    pub fn name(&self) -> &str {
        self.filter_type.name()
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Error map of this filter, keyed by public input path.
    ///
    /// Computed on first use: validator errors, then nested filter errors,
    /// then key remapping and translation. Later calls return the cache.
    pub fn errors(&mut self) -> &ErrorMap {
        if !matches!(self.state, ValidationState::Validated(_)) {
            self.state = ValidationState::Validating;
            let errors = self.compute();
            self.state = ValidationState::Validated(errors);
        }
        match &self.state {
            ValidationState::Validated(errors) => errors,
            _ => &NO_ERRORS,
        }
    }

    pub fn is_valid(&mut self) -> bool {
        self.errors().is_empty()
    }

    /// Flattened value-set of every field.
    #[must_use]
    pub fn value(&self) -> Value {
        self.entity.value()
    }

    /// Whether any request data reached this filter.
    ///
    /// Fields bound from scalar sources (`method`, `isSecure`, ...) describe
    /// the request rather than carry input, so they are not counted.
    #[must_use]
    pub fn has_input(&self) -> bool {
        self.entity.iter().any(|(name, value)| match value {
            FieldValue::Scalar(value) => self.reads_input(name) && !value.is_blank(),
            FieldValue::Nested(filter) => filter.has_input(),
            FieldValue::Collection(items) => items.iter().any(|(_, filter)| filter.has_input()),
        })
    }

    /// Undeclared fields were set by hand and count as input.
    fn reads_input(&self, field: &str) -> bool {
        self.schema
            .field(field)
            .is_none_or(|spec| spec.origin.source.is_keyed())
    }

    #[must_use]
    pub fn state(&self) -> &ValidationState {
        &self.state
    }

    fn compute(&mut self) -> ErrorMap {
        let data = self.entity.value();
        let flat = self.validator.with_data(&data).errors();
        let augmented = nested::augment(flat, &mut self.entity, &self.mapping);
        let mapped = self.mapper.map_errors(augmented);
        let errors = match &self.translator {
            Some(translator) => translate_errors(mapped, translator.as_ref()),
            None => mapped,
        };
        tracing::debug!(
            filter = self.filter_type.name(),
            errors = count_messages(&errors),
            "computed filter errors"
        );
        errors
    }

    fn invalidate(&mut self) {
        self.state = ValidationState::Unvalidated;
    }

    // -- field access -------------------------------------------------------

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.entity.get(name)
    }

    /// Plain value of a scalar field.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<&Value> {
        self.field(name).and_then(FieldValue::as_scalar)
    }

    #[must_use]
    pub fn nested(&self, name: &str) -> Option<&Filter> {
        match self.field(name)? {
            FieldValue::Nested(filter) => Some(filter),
            _ => None,
        }
    }

    /// Mutable access to a nested filter. Invalidates this filter when one
    /// is returned.
    pub fn nested_mut(&mut self, name: &str) -> Option<&mut Filter> {
        if !matches!(self.entity.get(name), Some(FieldValue::Nested(_))) {
            return None;
        }
        self.invalidate();
        match self.entity.get_mut(name)? {
            FieldValue::Nested(filter) => Some(filter),
            _ => None,
        }
    }

    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&[(String, Filter)]> {
        match self.field(name)? {
            FieldValue::Collection(items) => Some(items),
            _ => None,
        }
    }

    /// Sets a field to a plain value, declared or not.
    ///
    /// With `apply_setter`, the field's declared setter runs first; a value
    /// the setter rejects is stored unchanged.
    pub fn set_field(&mut self, name: &str, value: impl Into<Value>, apply_setter: bool) {
        let mut value = value.into();
        if apply_setter {
            if let Some(setter) = self.schema.field(name).and_then(|spec| spec.setter.as_ref()) {
                match setter.apply(&value) {
                    Ok(converted) => value = converted,
                    Err(err) => tracing::debug!(
                        filter = self.filter_type.name(),
                        field = name,
                        error = %err,
                        "setter rejected value, keeping raw input"
                    ),
                }
            }
        }
        self.entity.set(name, FieldValue::Scalar(value));
        self.invalidate();
    }

    /// Removes a field, returning its previous value.
    pub fn unset_field(&mut self, name: &str) -> Option<FieldValue> {
        let removed = self.entity.remove(name);
        self.invalidate();
        removed
    }

    // -- context ------------------------------------------------------------

    /// Rebinds the validator of this filter and every nested filter to
    /// `context`, then invalidates all of them.
    pub fn set_context(&mut self, context: ValidationContext) {
        for (_, value) in self.entity.iter_mut() {
            match value {
                FieldValue::Scalar(_) => {}
                FieldValue::Nested(filter) => filter.set_context(context.clone()),
                FieldValue::Collection(items) => {
                    for (_, filter) in items.iter_mut() {
                        filter.set_context(context.clone());
                    }
                }
            }
        }
        self.validator = self.filter_type.validator().with_context(context);
        self.invalidate();
    }

    #[must_use]
    pub fn context(&self) -> Option<&ValidationContext> {
        self.validator.context()
    }

    /// Drops the cached errors of this filter and all nested filters.
    pub fn reset(&mut self) {
        for (_, value) in self.entity.iter_mut() {
            match value {
                FieldValue::Scalar(_) => {}
                FieldValue::Nested(filter) => filter.reset(),
                FieldValue::Collection(items) => {
                    items.iter_mut().for_each(|(_, filter)| filter.reset());
                }
            }
        }
        self.invalidate();
    }

    #[must_use]
    pub fn describe(&self) -> FilterDescription {
        FilterDescription {
            name: self.name().to_string(),
            values: self.value(),
            state: self.state.as_str(),
            errors: match &self.state {
                ValidationState::Validated(errors) => Some(errors.clone()),
                _ => None,
            },
        }
    }
}

impl FilterLike for Filter {
    fn errors(&mut self) -> &ErrorMap {
        Filter::errors(self)
    }

    fn is_valid(&mut self) -> bool {
        Filter::is_valid(self)
    }

    fn value(&self) -> Value {
        Filter::value(self)
    }

    fn has_input(&self) -> bool {
        Filter::has_input(self)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("name", &self.name())
            .field("entity", &self.entity)
            .field("state", &self.state.as_str())
            .finish_non_exhaustive()
    }
}
