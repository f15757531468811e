//! `filterkit` core: declarative request filters.
//!
//! A filter type declares which request input each of its fields is read
//! from, which fields hold nested filters, and which validator checks the
//! bound values. Binding a filter to a request produces a [`Filter`] whose
//! [`errors`](Filter::errors) are computed lazily, merged across nested
//! filters, keyed by public input path, and translated.

mod binder;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod error_map;
pub mod filter;
pub mod input;
pub mod mapper;
pub mod nested;
pub mod origin;
pub mod provider;
pub mod registry;
pub mod rules;
pub mod schema;
pub mod setter;
pub mod traits;
pub mod translate;
pub mod types;

pub use config::ProviderConfig;
pub use context::ValidationContext;
pub use entity::{Entity, FieldValue};
pub use error::{BindingError, FilterError, ResolveError, SchemaError};
pub use error_map::{ErrorMap, ErrorValue};
pub use filter::{Filter, FilterDescription, ValidationState};
pub use input::{InputScope, StaticInput};
pub use mapper::ErrorMapper;
pub use nested::MappingTable;
pub use origin::{Origin, Source, UnknownSource};
pub use provider::FilterProvider;
pub use registry::FilterRegistry;
pub use rules::{Rule, RuleValidator};
pub use schema::{FieldDecl, FieldSpec, FilterType, FilterTypeBuilder, NestedKind, Schema, SchemaDecl};
pub use setter::Setter;
pub use traits::{BoundValidator, FilterLike, InputResolver, Translator, Validator};
pub use translate::CatalogTranslator;
pub use types::{Principal, Value};
