use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{Principal, Value};

/// Context handed to validators alongside the bound data.
///
/// Carries identity and tenancy of the caller plus free-form attributes so
/// rules can depend on who is asking (e.g. "owner must match principal").
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationContext {
    /// Tenant scope. `None` for single-tenant deployments.
    pub tenant_id: Option<String>,
    /// Authenticated principal, if the request is authenticated.
    pub principal: Option<Principal>,
    /// Arbitrary attributes available to custom rules.
    pub attributes: BTreeMap<String, Value>,
}

impl ValidationContext {
    /// Returns a copy with one attribute set.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Looks up an attribute by name.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}
