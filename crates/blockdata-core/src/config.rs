//! Pipeline configuration
//!
//! Replaces site-wide toggles with one explicit struct handed to the
//! pipeline builder. Every field has a default, so partial JSON or TOML
//! documents load.

use crate::cache::CacheScope;
use crate::error::{ExtractError, ExtractResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default nesting limit for `query` sub-schemas
pub const DEFAULT_MAX_QUERY_DEPTH: usize = 8;

/// Shape of the deployment the pipeline runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Deployment {
    /// Whether several sites share the cache backend
    pub multisite: bool,
    /// Identifier of the current site
    pub site_id: u64,
}

/// Pipeline toggles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Whether results are cached at all
    pub cache_enabled: bool,
    /// Partition the cache per site; `None` follows the deployment
    pub multi_tenant_cache: Option<bool>,
    /// Entry lifetime in seconds; 0 never expires
    pub cache_expiration_secs: u64,
    /// Maximum nesting of `query` sub-schemas resolved
    pub max_query_depth: usize,
    /// Deployment description
    pub deployment: Deployment,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            multi_tenant_cache: None,
            cache_expiration_secs: 0,
            max_query_depth: DEFAULT_MAX_QUERY_DEPTH,
            deployment: Deployment::default(),
        }
    }
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML document
    ///
    /// # Errors
    /// Returns `ExtractError::Config` on malformed input
    pub fn from_toml_str(source: &str) -> ExtractResult<Self> {
        toml::from_str(source).map_err(|e| ExtractError::Config(e.to_string()))
    }

    /// Load from a JSON document
    ///
    /// # Errors
    /// Returns `ExtractError::Config` on malformed input
    pub fn from_json_str(source: &str) -> ExtractResult<Self> {
        serde_json::from_str(source).map_err(|e| ExtractError::Config(e.to_string()))
    }

    /// With caching on or off
    #[inline]
    #[must_use]
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// With explicit multi-tenant partitioning
    #[inline]
    #[must_use]
    pub fn with_multi_tenant_cache(mut self, enabled: bool) -> Self {
        self.multi_tenant_cache = Some(enabled);
        self
    }

    /// With entry lifetime in seconds (0 = never expire)
    #[inline]
    #[must_use]
    pub fn with_cache_expiration_secs(mut self, secs: u64) -> Self {
        self.cache_expiration_secs = secs;
        self
    }

    /// With `query` nesting limit
    #[inline]
    #[must_use]
    pub fn with_max_query_depth(mut self, depth: usize) -> Self {
        self.max_query_depth = depth;
        self
    }

    /// With deployment description
    #[inline]
    #[must_use]
    pub fn with_deployment(mut self, deployment: Deployment) -> Self {
        self.deployment = deployment;
        self
    }

    /// Cache partition for this deployment
    ///
    /// Site partitioning needs a multisite deployment; the explicit toggle
    /// can only turn it off.
    #[must_use]
    pub fn cache_scope(&self) -> CacheScope {
        let partitioned =
            self.deployment.multisite && self.multi_tenant_cache.unwrap_or(true);
        if partitioned {
            CacheScope::Site(self.deployment.site_id)
        } else {
            CacheScope::Global
        }
    }

    /// Entry lifetime, `None` for never
    #[must_use]
    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_expiration_secs > 0).then(|| Duration::from_secs(self.cache_expiration_secs))
    }
}
