use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::SchemaError;
use crate::schema::{compile, FilterType, Schema};

// ---------------------------------------------------------------------------
// FilterRegistry
// ---------------------------------------------------------------------------

/// Registry of filter types keyed by name.
///
/// Types are registered once at startup. Schemas compile lazily on first
/// use and are cached; a cached schema is never replaced. Nested filter
/// references resolve against the same registry, so a type may be
/// registered before the types it nests.
pub struct FilterRegistry {
    /// Name-based lookup: filter name -> declared type.
    types: DashMap<String, Arc<FilterType>>,
    /// Compiled schema cache: filter name -> schema.
    schemas: DashMap<String, Arc<Schema>>,
}

impl FilterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: DashMap::new(),
            schemas: DashMap::new(),
        }
    }

    /// Registers a filter type.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateFilter`] if the name is taken.
    pub fn register(&self, filter_type: FilterType) -> Result<(), SchemaError> {
        let name = filter_type.name().to_string();
        match self.types.entry(name) {
            Entry::Occupied(entry) => Err(SchemaError::DuplicateFilter {
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                tracing::debug!(filter = %entry.key(), "registered filter type");
                entry.insert(Arc::new(filter_type));
                Ok(())
            }
        }
    }

    /// Retrieves a filter type by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<FilterType>> {
        self.types.get(name).map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Names of all registered types, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Returns the compiled schema of `name`, compiling it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnregisteredFilter`] for unknown names and any
    /// compile error of the declaration.
    pub fn schema(&self, name: &str) -> Result<Arc<Schema>, SchemaError> {
        if let Some(schema) = self.schemas.get(name) {
            return Ok(Arc::clone(schema.value()));
        }
        let filter_type = self.get(name).ok_or_else(|| SchemaError::UnregisteredFilter {
            name: name.to_string(),
        })?;
        let compiled = Arc::new(compile(&filter_type, |target| self.contains(target))?);
        // A concurrent caller may have compiled the same type; keep the first.
        let entry = self
            .schemas
            .entry(name.to_string())
            .or_insert(compiled);
        Ok(Arc::clone(entry.value()))
    }

    /// Compiles every registered type.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`] encountered, in name order.
    pub fn compile_all(&self) -> Result<(), SchemaError> {
        for name in self.names() {
            self.schema(&name)?;
        }
        Ok(())
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
