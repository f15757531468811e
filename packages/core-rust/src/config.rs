//! Configuration types for filter construction.

use serde::Deserialize;

/// Default maximum nesting depth of bound filters.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Settings applied by a [`FilterProvider`](crate::FilterProvider).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Deepest nesting level binding may reach. The root filter is level 0.
    /// Self-referencing filter types stop here with
    /// [`BindingError::DepthExceeded`](crate::BindingError::DepthExceeded).
    pub max_depth: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_config_defaults() {
        let config = ProviderConfig::default();
        assert_eq!(config.max_depth, 16);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: ProviderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ProviderConfig::default());

        let config: ProviderConfig = serde_json::from_str(r#"{"max_depth":4}"#).unwrap();
        assert_eq!(config.max_depth, 4);
    }
}
