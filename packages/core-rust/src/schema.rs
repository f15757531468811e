//! Filter type declarations and the schema compiler.
//!
//! A filter type declares, per field, where its value comes from. Each
//! declaration entry is one of:
//!
//! - `"source:path"` or `"source"`: a plain origin (path defaults to the
//!   field name);
//! - `"FilterName"`: a nested filter bound to the same-named path;
//! - `["FilterName", "path"]` or `["FilterName", "path", "source"]`: a nested
//!   filter with an explicit binding. A path ending in `.*` (or `*` alone)
//!   binds a collection with one nested filter per element found there.
//!
//! [`compile`] turns a declaration into an immutable [`Schema`]. It is pure;
//! the registry caches its output per filter type.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SchemaError;
use crate::origin::{is_well_formed_path, Origin, Source};
use crate::rules::RuleValidator;
use crate::setter::Setter;
use crate::traits::Validator;

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// Raw declaration of a single field, before compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldDecl {
    /// An origin string or the name of a nested filter type.
    Origin(String),
    /// `[filter, path]` or `[filter, path, source]`.
    Binding(Vec<String>),
}

impl From<&str> for FieldDecl {
    fn from(s: &str) -> Self {
        Self::Origin(s.to_string())
    }
}

/// Ordered field declarations of a filter type.
///
/// (De)serializes as a JSON-like object; entry order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDecl {
    fields: Vec<(String, FieldDecl)>,
}

impl SchemaDecl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a declaration.
    pub fn push(&mut self, field: impl Into<String>, decl: FieldDecl) {
        self.fields.push((field.into(), decl));
    }

    /// Declared entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDecl)> {
        self.fields.iter().map(|(name, decl)| (name.as_str(), decl))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for SchemaDecl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, decl) in &self.fields {
            map.serialize_entry(field, decl)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SchemaDecl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DeclVisitor;

        impl<'de> Visitor<'de> for DeclVisitor {
            type Value = SchemaDecl;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to origin declarations")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<SchemaDecl, A::Error> {
                let mut decl = SchemaDecl::new();
                while let Some((field, entry)) = access.next_entry::<String, FieldDecl>()? {
                    decl.push(field, entry);
                }
                Ok(decl)
            }
        }

        deserializer.deserialize_map(DeclVisitor)
    }
}

// ---------------------------------------------------------------------------
// FilterType
// ---------------------------------------------------------------------------

/// A named filter type: its declaration, optional fields, setters and the
/// validator applied to its bound data.
#[derive(Clone)]
pub struct FilterType {
    name: String,
    declaration: SchemaDecl,
    optional: BTreeSet<String>,
    setters: BTreeMap<String, Setter>,
    validator: Arc<dyn Validator>,
}

impl FilterType {
    /// Starts building a filter type called `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> FilterTypeBuilder {
        FilterTypeBuilder {
            name: name.into(),
            declaration: SchemaDecl::new(),
            optional: BTreeSet::new(),
            setters: BTreeMap::new(),
            validator: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn declaration(&self) -> &SchemaDecl {
        &self.declaration
    }

    /// Validator applied to bound instances of this type.
    #[must_use]
    pub fn validator(&self) -> Arc<dyn Validator> {
        Arc::clone(&self.validator)
    }
}

impl fmt::Debug for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterType")
            .field("name", &self.name)
            .field("declaration", &self.declaration)
            .field("optional", &self.optional)
            .field("setters", &self.setters)
            .finish_non_exhaustive()
    }
}

/// Builder for [`FilterType`].
///
/// # Examples
///
/// ```
/// use filterkit_core::{FilterType, Setter};
///
/// let user = FilterType::builder("UserFilter")
///     .field("name", "post:name")
///     .field("age", "post")
///     .nested("address", "AddressFilter")
///     .collection("uploads", "UploadFilter", "uploads")
///     .optional("address")
///     .setter("age", Setter::Integer)
///     .build();
/// assert_eq!(user.declaration().len(), 4);
/// ```
pub struct FilterTypeBuilder {
    name: String,
    declaration: SchemaDecl,
    optional: BTreeSet<String>,
    setters: BTreeMap<String, Setter>,
    validator: Option<Arc<dyn Validator>>,
}

impl FilterTypeBuilder {
    /// Declares a field with a raw declaration entry.
    #[must_use]
    pub fn declare(mut self, field: impl Into<String>, decl: FieldDecl) -> Self {
        self.declaration.push(field, decl);
        self
    }

    /// Declares a field from an origin string (or a bare filter name).
    #[must_use]
    pub fn field(self, field: impl Into<String>, origin: &str) -> Self {
        self.declare(field, FieldDecl::from(origin))
    }

    /// Declares a nested filter bound to the same-named path.
    #[must_use]
    pub fn nested(self, field: impl Into<String>, filter: &str) -> Self {
        let field = field.into();
        let binding = vec![filter.to_string(), field.clone()];
        self.declare(field, FieldDecl::Binding(binding))
    }

    /// Declares a collection of nested filters, one per element at `path`.
    #[must_use]
    pub fn collection(self, field: impl Into<String>, filter: &str, path: &str) -> Self {
        let path = if path.ends_with('*') {
            path.to_string()
        } else {
            format!("{path}.*")
        };
        self.declare(field, FieldDecl::Binding(vec![filter.to_string(), path]))
    }

    /// Appends every entry of a declaration.
    #[must_use]
    pub fn declaration(mut self, decl: SchemaDecl) -> Self {
        self.declaration.fields.extend(decl.fields);
        self
    }

    /// Marks a declared field optional.
    #[must_use]
    pub fn optional(mut self, field: impl Into<String>) -> Self {
        self.optional.insert(field.into());
        self
    }

    /// Attaches a setter to a declared field.
    #[must_use]
    pub fn setter(mut self, field: impl Into<String>, setter: Setter) -> Self {
        self.setters.insert(field.into(), setter);
        self
    }

    /// Sets the validator. Defaults to an empty [`RuleValidator`].
    #[must_use]
    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    #[must_use]
    pub fn build(self) -> FilterType {
        FilterType {
            name: self.name,
            declaration: self.declaration,
            optional: self.optional,
            setters: self.setters,
            validator: self
                .validator
                .unwrap_or_else(|| Arc::new(RuleValidator::new())),
        }
    }
}

// ---------------------------------------------------------------------------
// Compiled schema
// ---------------------------------------------------------------------------

/// How a field holds nested filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NestedKind {
    /// A plain value.
    None,
    /// One nested filter.
    Single,
    /// An ordered collection of nested filters.
    Collection,
}

/// Compiled, immutable description of one field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    /// For collections, `path` is the base path without the wildcard.
    pub origin: Origin,
    pub optional: bool,
    pub nested: NestedKind,
    pub nested_filter: Option<String>,
    pub setter: Option<Setter>,
}

impl FieldSpec {
    /// Key under which this field's errors are reported.
    #[must_use]
    pub fn public_path(&self) -> &str {
        self.origin.public_path(&self.name)
    }
}

/// Compiled schema of a filter type.
#[derive(Debug, Clone)]
pub struct Schema {
    filter: String,
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Name of the filter type this schema was compiled from.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Field specs in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }
}

/// Compiles a filter type's declaration.
///
/// `is_filter` answers whether a name refers to a registered filter type.
///
/// # Errors
///
/// Returns [`SchemaError`] for unknown source keywords, malformed origins or
/// bindings, references to unregistered filters, duplicate fields, and
/// optional/setter entries that name undeclared fields.
pub fn compile(
    filter_type: &FilterType,
    is_filter: impl Fn(&str) -> bool,
) -> Result<Schema, SchemaError> {
    let filter = filter_type.name();
    let mut fields: Vec<FieldSpec> = Vec::with_capacity(filter_type.declaration.len());

    for (name, decl) in filter_type.declaration.iter() {
        if fields.iter().any(|spec| spec.name == name) {
            return Err(SchemaError::DuplicateField {
                filter: filter.to_string(),
                field: name.to_string(),
            });
        }
        let mut spec = compile_field(filter, name, decl, &is_filter)?;
        spec.optional = filter_type.optional.contains(name);
        spec.setter = filter_type.setters.get(name).cloned();
        fields.push(spec);
    }

    let declared = |field: &str| fields.iter().any(|spec| spec.name == field);
    let undeclared = |field: &String, role| SchemaError::UndeclaredField {
        filter: filter.to_string(),
        field: field.clone(),
        role,
    };
    if let Some(field) = filter_type.optional.iter().find(|f| !declared(f.as_str())) {
        return Err(undeclared(field, "optional"));
    }
    if let Some(field) = filter_type.setters.keys().find(|f| !declared(f.as_str())) {
        return Err(undeclared(field, "a setter target"));
    }
    check_error_keys(filter, &fields)?;

    tracing::debug!(filter, fields = fields.len(), "compiled filter schema");
    Ok(Schema {
        filter: filter.to_string(),
        fields,
    })
}

/// Every field must own its public path: no other field may report under it,
/// and no other field may be named like it.
fn check_error_keys(filter: &str, fields: &[FieldSpec]) -> Result<(), SchemaError> {
    for (i, spec) in fields.iter().enumerate() {
        let path = spec.public_path();
        let clash = fields
            .iter()
            .enumerate()
            .find(|&(j, other)| j != i && (other.public_path() == path || other.name == path));
        if let Some((_, other)) = clash {
            return Err(SchemaError::AmbiguousErrorKey {
                filter: filter.to_string(),
                field: spec.name.clone(),
                other: other.name.clone(),
                path: path.to_string(),
            });
        }
    }
    Ok(())
}

fn compile_field(
    filter: &str,
    name: &str,
    decl: &FieldDecl,
    is_filter: &impl Fn(&str) -> bool,
) -> Result<FieldSpec, SchemaError> {
    let malformed = |origin: &str, reason| SchemaError::MalformedOrigin {
        filter: filter.to_string(),
        field: name.to_string(),
        origin: origin.to_string(),
        reason,
    };
    let unknown_source = |keyword: &str| SchemaError::UnknownSource {
        filter: filter.to_string(),
        field: name.to_string(),
        source_name: keyword.to_string(),
    };
    let spec = |origin, nested, nested_filter: Option<&str>| FieldSpec {
        name: name.to_string(),
        origin,
        optional: false,
        nested,
        nested_filter: nested_filter.map(str::to_string),
        setter: None,
    };

    match decl {
        FieldDecl::Origin(raw) => {
            if let Some((keyword, path)) = raw.split_once(':') {
                let source = keyword.parse::<Source>().map_err(|_| unknown_source(keyword))?;
                if path.contains('*') {
                    return Err(malformed(raw, "wildcard paths require a nested filter binding"));
                }
                if !is_well_formed_path(path) {
                    return Err(malformed(raw, "empty path segment"));
                }
                Ok(spec(Origin::new(source, path), NestedKind::None, None))
            } else if let Ok(source) = raw.parse::<Source>() {
                Ok(spec(Origin::new(source, name), NestedKind::None, None))
            } else if is_filter(raw) {
                Ok(spec(
                    Origin::new(Source::Data, name),
                    NestedKind::Single,
                    Some(raw.as_str()),
                ))
            } else {
                Err(SchemaError::UnresolvedDeclaration {
                    filter: filter.to_string(),
                    field: name.to_string(),
                    target: raw.clone(),
                })
            }
        }
        FieldDecl::Binding(parts) => {
            let (target, path, keyword) = match parts.as_slice() {
                [target, path] => (target, path, None),
                [target, path, keyword] => (target, path, Some(keyword)),
                _ => {
                    return Err(SchemaError::MalformedBinding {
                        filter: filter.to_string(),
                        field: name.to_string(),
                        len: parts.len(),
                    })
                }
            };
            if !is_filter(target) {
                return Err(SchemaError::UnknownFilter {
                    filter: filter.to_string(),
                    field: name.to_string(),
                    target: target.clone(),
                });
            }
            let source = match keyword {
                Some(keyword) => keyword.parse::<Source>().map_err(|_| unknown_source(keyword))?,
                None => Source::Data,
            };
            let (kind, base) = if path == "*" {
                (NestedKind::Collection, "")
            } else if let Some(base) = path.strip_suffix(".*") {
                (NestedKind::Collection, base)
            } else {
                (NestedKind::Single, path.as_str())
            };
            if base.contains('*') {
                return Err(malformed(path, "wildcard allowed only as the last segment"));
            }
            if !(base.is_empty() && kind == NestedKind::Collection) && !is_well_formed_path(base) {
                return Err(malformed(path, "empty path segment"));
            }
            Ok(spec(Origin::new(source, base), kind, Some(target.as_str())))
        }
    }
}
