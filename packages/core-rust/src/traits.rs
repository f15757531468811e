use std::sync::Arc;

use crate::context::ValidationContext;
use crate::error::ResolveError;
use crate::error_map::ErrorMap;
use crate::origin::Source;
use crate::types::Value;

/// Fetches raw values for a request from its input bags.
///
/// `Ok(None)` (or `Ok(Some(Value::Null))`) means the value is absent, which is
/// a normal outcome. `Err` is reserved for a request context that cannot be
/// read at all and aborts filter construction.
pub trait InputResolver: Send + Sync {
    /// Resolve `path` inside `source`. Scalar sources ignore `path`.
    fn resolve(&self, source: Source, path: &str) -> Result<Option<Value>, ResolveError>;
}

/// Validation backend invoked with a filter's bound data.
///
/// Implementations may be stateful per call: the engine asks for a fresh
/// [`BoundValidator`] every time it computes errors and never reuses one.
pub trait Validator: Send + Sync {
    /// Binds the flattened filter value, returning a single-use validator.
    fn with_data(&self, data: &Value) -> Box<dyn BoundValidator>;

    /// Returns a validator carrying `context`. The receiver is left untouched.
    fn with_context(&self, context: ValidationContext) -> Arc<dyn Validator>;

    /// Context this validator was built with.
    fn context(&self) -> Option<&ValidationContext>;
}

/// A validator bound to one data set.
pub trait BoundValidator {
    /// Flat field errors for the bound data.
    fn errors(&self) -> ErrorMap;
}

/// Message translation. Returns `None` when the catalog has no entry.
pub trait Translator: Send + Sync {
    fn translate(&self, message: &str) -> Option<String>;
}

/// Capability shared by everything that can sit in a nested filter slot.
pub trait FilterLike {
    /// Field errors, computed lazily and cached until the next mutation.
    fn errors(&mut self) -> &ErrorMap;

    /// `true` when [`errors`](FilterLike::errors) is empty.
    fn is_valid(&mut self) -> bool {
        self.errors().is_empty()
    }

    /// Flattened value-set of the filter.
    fn value(&self) -> Value;

    /// Whether any input at all reached this filter.
    fn has_input(&self) -> bool {
        !self.value().is_blank()
    }
}
