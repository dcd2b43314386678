use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};
use crate::schema::CacheFrequency;

/// Catalog-client configuration, one instance per connection factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Cache frequency applied when a statement does not declare one.
    /// The unbounded default mirrors the "always validate" posture of a
    /// fresh deployment.
    #[serde(default = "default_update_cache_frequency")]
    pub default_update_cache_frequency: CacheFrequency,

    /// How many times a backend version conflict is retried locally
    /// before surfacing to the caller.
    #[serde(default = "default_conflict_retry_limit")]
    pub conflict_retry_limit: u32,

    /// Upper bound on any entity's effective cache-refresh budget, in
    /// milliseconds. Caps the window during which a client may keep
    /// operating against a definition deleted out-of-band. 0 = uncapped.
    #[serde(default)]
    pub stale_handle_window_ms: u64,
}

fn default_update_cache_frequency() -> CacheFrequency {
    CacheFrequency::Always
}

fn default_conflict_retry_limit() -> u32 {
    1
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_update_cache_frequency: default_update_cache_frequency(),
            conflict_retry_limit: default_conflict_retry_limit(),
            stale_handle_window_ms: 0,
        }
    }
}

impl CatalogConfig {
    /// Parse a `[catalog]`-style TOML fragment.
    pub fn from_toml_str(raw: &str) -> CatalogResult<Self> {
        toml::from_str(raw).map_err(|e| CatalogError::Internal(format!("config parse: {}", e)))
    }

    /// An entity's refresh budget with the factory-wide staleness cap
    /// applied.
    pub fn effective_refresh(&self, declared: CacheFrequency) -> CacheFrequency {
        match (declared, self.stale_handle_window_ms) {
            (freq, 0) => freq,
            (CacheFrequency::Always, _) => CacheFrequency::Always,
            (CacheFrequency::Millis(ms), cap) => CacheFrequency::Millis(ms.min(cap)),
        }
    }
}
