//! Configuration types for the HTTP adapter.

use filterkit_core::ProviderConfig;
use serde::Deserialize;

/// Settings for binding filters to HTTP requests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Largest request body read before binding, in bytes.
    pub max_body_bytes: usize,
    /// Honour `X-Forwarded-Proto` when deciding `isSecure`. Enable only
    /// behind a proxy that sets the header.
    pub trust_forwarded_proto: bool,
    /// Filter construction settings.
    pub provider: ProviderConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2 MB
            trust_forwarded_proto: false,
            provider: ProviderConfig::default(),
        }
    }
}
