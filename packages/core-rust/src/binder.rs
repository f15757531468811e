//! Entity binder: fills a filter's fields from request input.
//!
//! Binding happens once, when the filter is built. Plain fields resolve
//! through the input scope and pass through their setter. Nested fields
//! build a child filter over a scope prefixed with the field's origin path.
//! Collections build one child per element found at the base path.

use std::sync::Arc;

use crate::context::ValidationContext;
use crate::entity::{Entity, FieldValue};
use crate::error::{BindingError, FilterError, SchemaError};
use crate::filter::Filter;
use crate::input::InputScope;
use crate::nested::MappingTable;
use crate::origin::Origin;
use crate::registry::FilterRegistry;
use crate::schema::{FieldSpec, NestedKind, Schema};
use crate::traits::Translator;
use crate::types::{escape_segment, Value};

/// Everything a filter and its nested children are built with.
#[derive(Clone, Copy)]
pub(crate) struct BindContext<'a> {
    pub registry: &'a FilterRegistry,
    pub max_depth: usize,
    pub translator: Option<&'a Arc<dyn Translator>>,
    pub context: Option<&'a ValidationContext>,
    pub depth: usize,
}

impl BindContext<'_> {
    fn deeper(self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self
        }
    }
}

/// Builds and binds the filter type `name`.
pub(crate) fn build_filter(
    name: &str,
    scope: &InputScope,
    ctx: BindContext<'_>,
) -> Result<Filter, FilterError> {
    if ctx.depth > ctx.max_depth {
        return Err(BindingError::DepthExceeded {
            filter: name.to_string(),
            depth: ctx.depth,
        }
        .into());
    }
    let filter_type = ctx
        .registry
        .get(name)
        .ok_or_else(|| SchemaError::UnregisteredFilter {
            name: name.to_string(),
        })?;
    let schema = ctx.registry.schema(name)?;
    let (entity, mapping) = bind(&schema, scope, ctx)?;
    tracing::trace!(
        filter = name,
        depth = ctx.depth,
        prefix = scope.prefix().unwrap_or(""),
        "bound filter"
    );
    Ok(Filter::from_parts(
        filter_type,
        schema,
        entity,
        mapping,
        ctx.translator.cloned(),
        ctx.context.cloned(),
    ))
}

/// Binds every field of `schema`, in declaration order.
pub(crate) fn bind(
    schema: &Schema,
    scope: &InputScope,
    ctx: BindContext<'_>,
) -> Result<(Entity, MappingTable), FilterError> {
    let mut entity = Entity::new();
    let mut mapping = MappingTable::from_schema(schema);

    for spec in schema.fields() {
        let value = match spec.nested {
            NestedKind::None => FieldValue::Scalar(bind_scalar(schema, spec, scope)?),
            NestedKind::Single => {
                let nested = nested_filter(schema, spec)?;
                let child = build_filter(nested, &scope.with_prefix(&spec.origin.path), ctx.deeper())?;
                FieldValue::Nested(Box::new(child))
            }
            NestedKind::Collection => {
                let nested = nested_filter(schema, spec)?;
                let items = bind_collection(schema, spec, nested, scope, ctx)?;
                for (key, _) in &items {
                    mapping.expand(&spec.name, key, spec.optional);
                }
                FieldValue::Collection(items)
            }
        };
        entity.set(&spec.name, value);
    }
    Ok((entity, mapping))
}

fn nested_filter<'a>(schema: &Schema, spec: &'a FieldSpec) -> Result<&'a str, SchemaError> {
    spec.nested_filter
        .as_deref()
        .ok_or_else(|| SchemaError::UnresolvedDeclaration {
            filter: schema.filter().to_string(),
            field: spec.name.clone(),
            target: spec.origin.to_string(),
        })
}

fn resolve(
    schema: &Schema,
    spec: &FieldSpec,
    scope: &InputScope,
) -> Result<Value, BindingError> {
    let Origin { source, path } = &spec.origin;
    match scope.resolve(*source, path) {
        Ok(value) => Ok(value.unwrap_or(Value::Null)),
        Err(err) => {
            tracing::warn!(
                filter = schema.filter(),
                field = %spec.name,
                origin = %spec.origin,
                error = %err,
                "input resolution failed"
            );
            Err(BindingError::Resolve {
                filter: schema.filter().to_string(),
                field: spec.name.clone(),
                origin: spec.origin.clone(),
                source: err,
            })
        }
    }
}

fn bind_scalar(schema: &Schema, spec: &FieldSpec, scope: &InputScope) -> Result<Value, BindingError> {
    let raw = resolve(schema, spec, scope)?;
    let Some(setter) = &spec.setter else {
        return Ok(raw);
    };
    match setter.apply(&raw) {
        Ok(value) => Ok(value),
        Err(err) => {
            // Left for the validator to reject.
            tracing::debug!(
                filter = schema.filter(),
                field = %spec.name,
                error = %err,
                "setter rejected value, keeping raw input"
            );
            Ok(raw)
        }
    }
}

fn bind_collection(
    schema: &Schema,
    spec: &FieldSpec,
    nested: &str,
    scope: &InputScope,
    ctx: BindContext<'_>,
) -> Result<Vec<(String, Filter)>, FilterError> {
    let keys: Vec<String> = match resolve(schema, spec, scope)? {
        Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        Value::Map(entries) => entries.into_keys().collect(),
        Value::Null => Vec::new(),
        other => {
            tracing::debug!(
                filter = schema.filter(),
                field = %spec.name,
                found = other.type_name(),
                "collection input is not a list or map, binding no elements"
            );
            Vec::new()
        }
    };

    let base = &spec.origin.path;
    keys.into_iter()
        .map(|key| -> Result<(String, Filter), FilterError> {
            let segment = escape_segment(&key);
            let path = if base.is_empty() {
                segment.into_owned()
            } else {
                format!("{base}.{segment}")
            };
            let child = build_filter(nested, &scope.with_prefix(&path), ctx.deeper())?;
            Ok((key, child))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ResolveError;
    use crate::input::StaticInput;
    use crate::origin::Source;
    use crate::schema::FilterType;
    use crate::setter::Setter;
    use crate::traits::InputResolver;

    fn registry() -> FilterRegistry {
        let registry = FilterRegistry::new();
        registry
            .register(
                FilterType::builder("Address")
                    .field("city", "post:city")
                    .build(),
            )
            .unwrap();
        registry
            .register(
                FilterType::builder("Upload")
                    .field("name", "file:name")
                    .build(),
            )
            .unwrap();
        registry
            .register(
                FilterType::builder("User")
                    .field("name", "post:name")
                    .field("age", "post:age")
                    .field("verb", "method")
                    .nested("address", "Address")
                    .collection("uploads", "Upload", "uploads")
                    .setter("age", Setter::Integer)
                    .build(),
            )
            .unwrap();
        registry
    }

    fn ctx(registry: &FilterRegistry) -> BindContext<'_> {
        BindContext {
            registry,
            max_depth: 8,
            translator: None,
            context: None,
            depth: 0,
        }
    }

    fn scope(input: StaticInput) -> InputScope {
        InputScope::new(Arc::new(input))
    }

    #[test]
    fn binds_scalars_nested_and_collections() {
        let registry = registry();
        let input = StaticInput::new()
            .with_source(
                Source::Post,
                Value::from(json!({ "name": "Ann", "age": "41", "address": { "city": "Oslo" } })),
            )
            .with_source(Source::Method, "POST");
        let schema = registry.schema("User").unwrap();
        let (entity, mapping) = bind(&schema, &scope(input), ctx(&registry)).unwrap();

        assert_eq!(
            serde_json::Value::from(entity.value()),
            json!({
                "name": "Ann",
                "age": 41,
                "verb": "POST",
                "address": { "city": "Oslo" },
                "uploads": [],
            })
        );
        // uploads are bound from the data source, which this input lacks.
        assert!(mapping.get("uploads.0").is_none());
    }

    #[test]
    fn collection_elements_resolve_under_their_key() {
        let registry = FilterRegistry::new();
        registry
            .register(FilterType::builder("Item").field("sku", "data:sku").build())
            .unwrap();
        registry
            .register(
                FilterType::builder("Order")
                    .collection("items", "Item", "items")
                    .optional("items")
                    .build(),
            )
            .unwrap();
        let input = StaticInput::new().with_source(
            Source::Data,
            Value::from(json!({ "items": [{ "sku": "A" }, { "sku": "B" }] })),
        );
        let schema = registry.schema("Order").unwrap();
        let (entity, mapping) = bind(&schema, &scope(input), ctx(&registry)).unwrap();

        let Some(FieldValue::Collection(items)) = entity.get("items") else {
            panic!("items should bind as a collection");
        };
        let keys: Vec<_> = items.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, ["0", "1"]);
        assert_eq!(
            serde_json::Value::from(entity.value()),
            json!({ "items": [{ "sku": "A" }, { "sku": "B" }] })
        );
        assert!(mapping.is_optional("items.1"));
    }

    #[test]
    fn map_keys_with_dots_bind_their_own_element() {
        let registry = FilterRegistry::new();
        registry
            .register(FilterType::builder("Item").field("sku", "data:sku").build())
            .unwrap();
        registry
            .register(
                FilterType::builder("Catalog")
                    .collection("items", "Item", "items")
                    .build(),
            )
            .unwrap();
        let input = StaticInput::new().with_source(
            Source::Data,
            Value::from(json!({ "items": { "v1.2": { "sku": "A" }, "v2": { "sku": "B" } } })),
        );
        let schema = registry.schema("Catalog").unwrap();
        let (entity, _) = bind(&schema, &scope(input), ctx(&registry)).unwrap();
        assert_eq!(
            serde_json::Value::from(entity.value()),
            json!({ "items": { "v1.2": { "sku": "A" }, "v2": { "sku": "B" } } })
        );
    }

    #[test]
    fn setter_failure_keeps_raw_value() {
        let registry = registry();
        let input = StaticInput::new().with_value(Source::Post, "age", "old");
        let schema = registry.schema("User").unwrap();
        let (entity, _) = bind(&schema, &scope(input), ctx(&registry)).unwrap();
        assert_eq!(
            entity.get("age").and_then(FieldValue::as_scalar),
            Some(&Value::from("old"))
        );
    }

    #[test]
    fn absent_input_binds_null() {
        let registry = registry();
        let schema = registry.schema("User").unwrap();
        let (entity, _) = bind(&schema, &scope(StaticInput::new()), ctx(&registry)).unwrap();
        assert_eq!(entity.get("name").and_then(FieldValue::as_scalar), Some(&Value::Null));
        assert!(entity.value().is_blank());
    }

    struct Broken;

    impl InputResolver for Broken {
        fn resolve(&self, _: Source, _: &str) -> Result<Option<Value>, ResolveError> {
            Err(ResolveError::new("request body already consumed"))
        }
    }

    #[test]
    fn resolver_failure_aborts_binding() {
        let registry = registry();
        let schema = registry.schema("User").unwrap();
        let err = bind(&schema, &InputScope::new(Arc::new(Broken)), ctx(&registry)).unwrap_err();
        assert!(matches!(
            err,
            FilterError::Binding(BindingError::Resolve { ref field, .. }) if field == "name"
        ));
    }

    #[test]
    fn self_referencing_type_hits_depth_limit() {
        let registry = FilterRegistry::new();
        registry
            .register(
                FilterType::builder("Node")
                    .field("label", "data:label")
                    .nested("child", "Node")
                    .build(),
            )
            .unwrap();
        let err = build_filter("Node", &scope(StaticInput::new()), ctx(&registry)).unwrap_err();
        assert!(matches!(
            err,
            FilterError::Binding(BindingError::DepthExceeded { depth: 9, .. })
        ));
    }

    #[test]
    fn unknown_type_is_a_configuration_error() {
        let registry = registry();
        let err = build_filter("Nope", &scope(StaticInput::new()), ctx(&registry)).unwrap_err();
        assert!(matches!(
            err,
            FilterError::Configuration(SchemaError::UnregisteredFilter { .. })
        ));
    }
}
