//! Feature Flag Manager
//!
//! Resolves boolean feature flags at runtime:
//!
//! 1. Local in-process cache (bounded, entries expire after the cache TTL)
//! 2. Override in the shared store (`flag:<name>`)
//! 3. Static default from the flag registry
//!
//! The resolved value is always cached before returning. Reading a flag never
//! fails: a store error falls through to the default. The [`FlagResolution`]
//! returned by [`FeatureFlagManager::resolve_flag`] records which path
//! produced the value, so callers can tell "no override" apart from "store
//! unreachable".
//!
//! Writes are validated against the registry and against the production
//! safety rule: a safety-critical flag can never be set to `false` while the
//! environment is production.

mod dependencies;

pub use dependencies::dependency_warnings;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::metrics::FlagMetrics;
use crate::settings::{Environment, FlagRegistry, Settings};
use crate::store::{
    flag_key, flag_name_from_key, KeyTtl, OverrideStore, StoreError, FLAG_KEY_PATTERN,
};

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const DEFAULT_CACHE_CAPACITY: u64 = 1024;

/// Errors surfaced by the `try_*` write operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlagError {
    #[error("Unknown feature flag: {0}")]
    UnknownFlag(String),

    #[error("Cannot disable safety-critical flag '{flag}' in production")]
    ProductionSafety { flag: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where a resolved flag value came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum FlagSource {
    /// Served from the local cache
    LocalCache,
    /// Read from an override in the store
    Override,
    /// No override present; static default used
    Default,
    /// An override existed but could not be parsed; static default used
    DefaultAfterMalformedOverride,
    /// The store failed; static default used
    DefaultAfterStoreError(String),
}

impl FlagSource {
    /// Whether the store failed during this resolution
    pub fn is_store_error(&self) -> bool {
        matches!(self, FlagSource::DefaultAfterStoreError(_))
    }
}

/// A resolved flag value and how it was obtained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagResolution {
    pub name: String,
    pub value: bool,
    pub source: FlagSource,
}

/// Inventory entry returned by [`FeatureFlagManager::get_all_flags`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagStatus {
    pub current_value: bool,
    pub default_value: bool,
    pub has_override: bool,
    /// Seconds until the override expires; `None` when absent or permanent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub safety_critical: bool,
}

/// Encode a flag value for the override store
pub fn encode_flag_value(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Decode a stored override; only lowercase `true`/`false` are accepted
pub fn decode_flag_value(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Runtime feature flag manager
pub struct FeatureFlagManager {
    store: Arc<dyn OverrideStore>,
    registry: FlagRegistry,
    environment: Environment,
    search_backend: String,
    cache_ttl: Duration,
    cache_capacity: u64,
    default_override_ttl_minutes: u32,
    cache: Cache<String, bool>,
    /// Bumped by every write; a resolution that saw it change drops what it cached
    generation: AtomicU64,
    metrics: Option<FlagMetrics>,
}

fn build_cache(ttl: Duration, capacity: u64) -> Cache<String, bool> {
    Cache::builder()
        .max_capacity(capacity)
        .time_to_live(ttl)
        .build()
}

impl std::fmt::Debug for FeatureFlagManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureFlagManager")
            .field("store", &self.store.provider_name())
            .field("environment", &self.environment)
            .field("flags", &self.registry.len())
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_capacity", &self.cache_capacity)
            .field("cached_entries", &self.cache.entry_count())
            .finish()
    }
}

impl FeatureFlagManager {
    /// Create a manager over an explicit registry
    pub fn new(
        store: Arc<dyn OverrideStore>,
        registry: FlagRegistry,
        environment: Environment,
    ) -> Self {
        Self {
            store,
            registry,
            environment,
            search_backend: "pgvector".to_string(),
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            default_override_ttl_minutes: 60,
            cache: build_cache(DEFAULT_CACHE_TTL, DEFAULT_CACHE_CAPACITY),
            generation: AtomicU64::new(0),
            metrics: None,
        }
    }

    /// Create a manager configured from application settings
    pub fn from_settings(
        settings: &Settings,
        store: Arc<dyn OverrideStore>,
        metrics: Option<FlagMetrics>,
    ) -> Self {
        let mut manager = Self::new(store, settings.flag_registry(), settings.environment)
            .with_cache_ttl(settings.flag_cache.ttl())
            .with_cache_capacity(settings.flag_cache.max_entries)
            .with_default_override_ttl(settings.flag_cache.default_override_ttl_minutes)
            .with_search_backend(settings.search_backend.clone());
        manager.metrics = metrics;
        manager
    }

    /// Set the local cache TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self.cache = build_cache(self.cache_ttl, self.cache_capacity);
        self
    }

    /// Bound the number of locally cached values
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self.cache = build_cache(self.cache_ttl, self.cache_capacity);
        self
    }

    /// Set the TTL applied by callers that do not choose one
    pub fn with_default_override_ttl(mut self, minutes: u32) -> Self {
        self.default_override_ttl_minutes = minutes;
        self
    }

    /// Set the configured retrieval backend used by dependency checks
    pub fn with_search_backend(mut self, backend: impl Into<String>) -> Self {
        self.search_backend = backend.into();
        self
    }

    /// Attach a metrics sink for flag writes
    pub fn with_metrics(mut self, metrics: FlagMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &FlagRegistry {
        &self.registry
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn default_override_ttl_minutes(&self) -> u32 {
        self.default_override_ttl_minutes
    }

    /// Current value of a flag
    pub async fn get_flag(&self, name: &str) -> bool {
        self.resolve_flag(name).await.value
    }

    /// Resolve a flag, recording which source produced the value
    pub async fn resolve_flag(&self, name: &str) -> FlagResolution {
        if let Some(value) = self.cache.get(name).await {
            debug!(flag = name, value, "Flag cache hit");
            return FlagResolution {
                name: name.to_string(),
                value,
                source: FlagSource::LocalCache,
            };
        }

        let default = self.registry.default_value(name).unwrap_or(false);
        let generation = self.generation.load(Ordering::SeqCst);

        let (value, source) = match self.store.get(&flag_key(name)).await {
            Ok(Some(raw)) => match decode_flag_value(&raw) {
                Some(value) => (value, FlagSource::Override),
                None => {
                    warn!(flag = name, raw = %raw, "Ignoring malformed flag override");
                    (default, FlagSource::DefaultAfterMalformedOverride)
                }
            },
            Ok(None) => (default, FlagSource::Default),
            Err(e) => {
                warn!(flag = name, error = %e, "Override store unavailable, using default");
                (default, FlagSource::DefaultAfterStoreError(e.to_string()))
            }
        };

        self.cache.insert(name.to_string(), value).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            // A write landed while the store was read; the value may predate it
            self.cache.invalidate(name).await;
        }

        FlagResolution {
            name: name.to_string(),
            value,
            source,
        }
    }

    /// Set an override. Returns false when the change was not applied.
    ///
    /// `ttl_minutes` of `None` or `Some(0)` makes the override permanent.
    pub async fn set_flag(&self, name: &str, value: bool, ttl_minutes: Option<u32>) -> bool {
        match self.try_set_flag(name, value, ttl_minutes).await {
            Ok(()) => true,
            Err(e) => {
                warn!(flag = name, value, error = %e, "Flag update rejected");
                false
            }
        }
    }

    /// Set an override, explaining any refusal
    pub async fn try_set_flag(
        &self,
        name: &str,
        value: bool,
        ttl_minutes: Option<u32>,
    ) -> Result<(), FlagError> {
        let definition = self
            .registry
            .get(name)
            .ok_or_else(|| FlagError::UnknownFlag(name.to_string()))?;

        if self.environment.is_production() && definition.safety_critical && !value {
            return Err(FlagError::ProductionSafety {
                flag: name.to_string(),
            });
        }

        let ttl = ttl_minutes
            .filter(|minutes| *minutes > 0)
            .map(|minutes| Duration::from_secs(u64::from(minutes) * 60));

        self.store
            .set(&flag_key(name), encode_flag_value(value), ttl)
            .await?;

        self.invalidate(name).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_flag_change(name, value);
        }

        info!(
            flag = name,
            value,
            ttl_minutes = ?ttl_minutes.filter(|m| *m > 0),
            environment = %self.environment,
            "Feature flag override set"
        );
        Ok(())
    }

    /// Remove a flag's override. Returns false on unknown flags or store errors.
    pub async fn delete_flag(&self, name: &str) -> bool {
        match self.try_delete_flag(name).await {
            Ok(_) => true,
            Err(e) => {
                warn!(flag = name, error = %e, "Flag override delete failed");
                false
            }
        }
    }

    /// Remove a flag's override, returning whether one existed
    pub async fn try_delete_flag(&self, name: &str) -> Result<bool, FlagError> {
        if !self.registry.contains(name) {
            return Err(FlagError::UnknownFlag(name.to_string()));
        }

        let removed = self.store.delete(&[flag_key(name)]).await?;
        self.invalidate(name).await;

        info!(flag = name, existed = removed > 0, "Feature flag override deleted");
        Ok(removed > 0)
    }

    /// Remove every override in one batch, returning how many were removed
    pub async fn clear_overrides(&self) -> u64 {
        match self.try_clear_overrides().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Failed to clear flag overrides");
                0
            }
        }
    }

    /// Remove every override, surfacing store errors
    pub async fn try_clear_overrides(&self) -> Result<u64, FlagError> {
        let result = async {
            let keys = self.store.keys(FLAG_KEY_PATTERN).await?;
            self.store.delete(&keys).await
        }
        .await;

        self.clear_local_cache();

        let count = result?;
        info!(count, "Cleared all feature flag overrides");
        Ok(count)
    }

    /// Drop every locally cached value
    pub fn clear_local_cache(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate_all();
    }

    /// Inventory of every known flag
    ///
    /// Registered flags are always listed. If the store cannot enumerate
    /// overrides, dynamic flags are missing and `has_override` is false.
    pub async fn get_all_flags(&self) -> BTreeMap<String, FlagStatus> {
        match self.try_get_all_flags().await {
            Ok(flags) => flags,
            Err(e) => {
                warn!(error = %e, "Could not enumerate flag overrides");
                let mut flags = BTreeMap::new();
                for name in self.registry.names() {
                    let value = self.get_flag(name).await;
                    flags.insert(name.to_string(), self.flag_status(name, value, false, None));
                }
                flags
            }
        }
    }

    /// Inventory of every known flag, failing if overrides cannot be listed
    pub async fn try_get_all_flags(&self) -> Result<BTreeMap<String, FlagStatus>, FlagError> {
        let override_keys = self.store.keys(FLAG_KEY_PATTERN).await?;
        let overridden: BTreeSet<&str> = override_keys
            .iter()
            .filter_map(|key| flag_name_from_key(key))
            .collect();

        let names: BTreeSet<&str> = self
            .registry
            .names()
            .chain(overridden.iter().copied())
            .collect();

        let mut flags = BTreeMap::new();
        for name in names {
            let has_override = overridden.contains(name);
            let ttl_seconds = if has_override {
                self.store
                    .ttl(&flag_key(name))
                    .await
                    .ok()
                    .and_then(|ttl| ttl.seconds())
            } else {
                None
            };
            let value = self.get_flag(name).await;
            let status = self.flag_status(name, value, has_override, ttl_seconds);
            flags.insert(name.to_string(), status);
        }

        Ok(flags)
    }

    /// Check resolved flag values for inconsistent combinations
    pub async fn validate_flag_dependencies(&self) -> Vec<String> {
        let mut values = BTreeMap::new();
        for name in self.registry.names() {
            values.insert(name.to_string(), self.get_flag(name).await);
        }
        dependency_warnings(
            &values,
            &self.registry.safety_critical_flags(),
            &self.search_backend,
            self.environment,
        )
    }

    /// Status of one flag together with how its value was resolved
    ///
    /// The flag is resolved before anything else reads it, so the source
    /// reflects this request. Returns `None` for a name that is neither
    /// registered nor overridden.
    pub async fn describe_flag(&self, name: &str) -> Option<(FlagStatus, FlagResolution)> {
        let resolution = self.resolve_flag(name).await;

        let ttl = match self.store.ttl(&flag_key(name)).await {
            Ok(ttl) => ttl,
            Err(e) => {
                debug!(flag = name, error = %e, "Override TTL unavailable");
                KeyTtl::Missing
            }
        };
        let has_override = !matches!(ttl, KeyTtl::Missing);

        if !has_override && !self.registry.contains(name) {
            return None;
        }

        let status = self.flag_status(name, resolution.value, has_override, ttl.seconds());
        Some((status, resolution))
    }

    fn flag_status(
        &self,
        name: &str,
        current_value: bool,
        has_override: bool,
        ttl_seconds: Option<u64>,
    ) -> FlagStatus {
        let definition = self.registry.get(name);
        FlagStatus {
            current_value,
            default_value: definition.map(|d| d.default).unwrap_or(false),
            has_override,
            ttl_seconds,
            description: definition.map(|d| d.description.clone()),
            safety_critical: definition.map(|d| d.safety_critical).unwrap_or(false),
        }
    }

    async fn invalidate(&self, name: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate(name).await;
    }

    #[cfg(test)]
    async fn cached_entries(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}
