//! Fault taxonomy.
//!
//! Only misconfiguration and broken input plumbing are errors. An invalid
//! request is not: its field errors are data returned by
//! [`Filter::errors`](crate::Filter::errors).

use crate::origin::Origin;

/// Compile-time failure of a filter type's schema declaration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("filter {filter}: field `{field}` uses unknown input source `{source_name}`")]
    UnknownSource {
        filter: String,
        field: String,
        source_name: String,
    },
    #[error("filter {filter}: field `{field}` has malformed origin `{origin}`: {reason}")]
    MalformedOrigin {
        filter: String,
        field: String,
        origin: String,
        reason: &'static str,
    },
    #[error("filter {filter}: field `{field}` references `{target}`, which is neither an input source nor a registered filter")]
    UnresolvedDeclaration {
        filter: String,
        field: String,
        target: String,
    },
    #[error("filter {filter}: field `{field}` references unregistered filter `{target}`")]
    UnknownFilter {
        filter: String,
        field: String,
        target: String,
    },
    #[error("filter {filter}: field `{field}` binding must have 2 or 3 elements, got {len}")]
    MalformedBinding {
        filter: String,
        field: String,
        len: usize,
    },
    #[error("filter {filter}: `{field}` is listed as {role} but is not declared")]
    UndeclaredField {
        filter: String,
        field: String,
        role: &'static str,
    },
    #[error("filter {filter}: field `{field}` is declared twice")]
    DuplicateField { filter: String, field: String },
    #[error("filter {filter}: fields `{field}` and `{other}` both report errors under `{path}`")]
    AmbiguousErrorKey {
        filter: String,
        field: String,
        other: String,
        path: String,
    },
    #[error("filter type `{name}` is not registered")]
    UnregisteredFilter { name: String },
    #[error("filter type `{name}` is already registered")]
    DuplicateFilter { name: String },
}

/// Failure reported by an [`InputResolver`](crate::InputResolver) when the
/// request context itself is broken, as opposed to a value being absent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ResolveError {
    pub message: String,
}

impl ResolveError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Construction-time failure while binding input onto a filter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error("filter {filter}: cannot resolve field `{field}` from {origin}: {source}")]
    Resolve {
        filter: String,
        field: String,
        origin: Origin,
        #[source]
        source: ResolveError,
    },
    #[error("filter {filter}: nesting depth {depth} exceeds the configured maximum")]
    DepthExceeded { filter: String, depth: usize },
}

/// Errors surfaced when constructing a filter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("filter configuration error: {0}")]
    Configuration(#[from] SchemaError),
    #[error("filter binding error: {0}")]
    Binding(#[from] BindingError),
}
