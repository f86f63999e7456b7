//! Static configuration
//!
//! Settings are assembled once at startup from three layers, later layers
//! winning:
//!
//! 1. Built-in defaults
//! 2. An optional TOML, YAML, or JSON file (chosen by extension)
//! 3. `EDBOT_*` environment variables
//!
//! # Example
//!
//! ```toml
//! environment = "production"
//! search_backend = "hybrid"
//!
//! [redis]
//! url = "redis://cache.internal:6379/0"
//!
//! [flags]
//! enable_hybrid_search = true
//! ```

mod flags;

pub use flags::{FlagDefinition, FlagRegistry};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Prefix for all environment variable overrides
pub const ENV_PREFIX: &str = "EDBOT_";

/// Errors raised while loading settings
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported settings file extension: {0}")]
    UnsupportedFormat(String),

    #[error("Unknown feature flag in settings: {0}")]
    UnknownFlag(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl From<serde_json::Error> for SettingsError {
    fn from(err: serde_json::Error) -> Self {
        SettingsError::Parse(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for SettingsError {
    fn from(err: serde_yaml::Error) -> Self {
        SettingsError::Parse(format!("YAML error: {}", err))
    }
}

impl From<toml::de::Error> for SettingsError {
    fn from(err: toml::de::Error) -> Self {
        SettingsError::Parse(format!("TOML error: {}", err))
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(SettingsError::InvalidValue {
                key: "environment".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Override store connection
///
/// `memory://` selects the in-process store instead of Redis. Overrides made
/// there are visible to this process only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    pub url: String,
}

impl RedisSettings {
    /// Scheme that selects the in-process override store
    pub const IN_PROCESS_SCHEME: &'static str = "memory://";

    pub fn is_in_process(&self) -> bool {
        self.url.starts_with(Self::IN_PROCESS_SCHEME)
    }
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
        }
    }
}

/// Relational database connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

/// Keyword search engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticsearchSettings {
    pub url: Option<String>,
    pub index: String,
}

impl Default for ElasticsearchSettings {
    fn default() -> Self {
        Self {
            url: None,
            index: "edbot_documents".to_string(),
        }
    }
}

/// LLM backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Backend name, e.g. `ollama` or `vllm`
    pub backend: Option<String>,
    pub url: Option<String>,
}

/// Local flag cache and override defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagCacheSettings {
    pub ttl_seconds: u64,
    /// Upper bound on locally cached flag values
    pub max_entries: u64,
    pub default_override_ttl_minutes: u32,
}

impl Default for FlagCacheSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            max_entries: 1024,
            default_override_ttl_minutes: 60,
        }
    }
}

impl FlagCacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Health monitor tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub probe_timeout_ms: u64,
    pub history_capacity: usize,
    pub database_latency_threshold_ms: u64,
    pub cache_latency_threshold_ms: u64,
    pub trend_window_minutes: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5000,
            history_capacity: 100,
            database_latency_threshold_ms: 1000,
            cache_latency_threshold_ms: 500,
            trend_window_minutes: 60,
        }
    }
}

impl HealthSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Metrics collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub environment: Environment,

    /// Retrieval backend: `pgvector` or `hybrid`
    pub search_backend: String,

    pub redis: RedisSettings,
    pub database: DatabaseSettings,
    pub elasticsearch: ElasticsearchSettings,
    pub llm: LlmSettings,
    pub flag_cache: FlagCacheSettings,
    pub health: HealthSettings,
    pub metrics: MetricsSettings,
    pub server: ServerSettings,

    /// Replacement defaults for registered flags
    pub flags: BTreeMap<String, bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            search_backend: "pgvector".to_string(),
            redis: RedisSettings::default(),
            database: DatabaseSettings::default(),
            elasticsearch: ElasticsearchSettings::default(),
            llm: LlmSettings::default(),
            flag_cache: FlagCacheSettings::default(),
            health: HealthSettings::default(),
            metrics: MetricsSettings::default(),
            server: ServerSettings::default(),
            flags: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional file, and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.check_flags()?;
        Ok(settings)
    }

    /// Parse a settings file, choosing the format by extension
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();

        let settings: Settings = match extension.as_str() {
            "toml" => toml::from_str(&content)?,
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            other => return Err(SettingsError::UnsupportedFormat(other.to_string())),
        };

        settings.check_flags()?;
        Ok(settings)
    }

    /// Apply `EDBOT_*` overrides using the given variable lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(value) = var("ENVIRONMENT") {
            self.environment = value.parse()?;
        }
        if let Some(value) = var("SEARCH_BACKEND") {
            self.search_backend = value;
        }
        if let Some(value) = var("REDIS_URL") {
            self.redis.url = value;
        }
        if let Some(value) = var("DATABASE_URL") {
            self.database.url = Some(value);
        }
        if let Some(value) = var("ELASTICSEARCH_URL") {
            self.elasticsearch.url = Some(value);
        }
        if let Some(value) = var("LLM_BACKEND") {
            self.llm.backend = Some(value);
        }
        if let Some(value) = var("LLM_URL") {
            self.llm.url = Some(value);
        }
        if let Some(value) = var("METRICS_ENABLED") {
            self.metrics.enabled = parse_bool("EDBOT_METRICS_ENABLED", &value)?;
        }

        for name in FlagRegistry::builtin().names() {
            let key = format!("{}{}", ENV_PREFIX, name.to_uppercase());
            if let Some(value) = lookup(&key) {
                let enabled = parse_bool(&key, &value)?;
                self.flags.insert(name.to_string(), enabled);
            }
        }

        Ok(())
    }

    /// Reject `flags` entries that do not name a registered flag
    pub fn check_flags(&self) -> Result<(), SettingsError> {
        let registry = FlagRegistry::builtin();
        match self.flags.keys().find(|name| !registry.contains(name)) {
            Some(name) => Err(SettingsError::UnknownFlag(name.clone())),
            None => Ok(()),
        }
    }

    /// Built-in flag registry with this configuration's defaults applied
    pub fn flag_registry(&self) -> FlagRegistry {
        let mut registry = FlagRegistry::builtin();
        for (name, value) in &self.flags {
            if !registry.set_default(name, *value) {
                tracing::warn!(flag = %name, "Ignoring default for unregistered flag");
            }
        }
        registry
    }

    /// Non-fatal configuration warnings
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.environment.is_production() {
            let url = &self.redis.url;
            if self.redis.is_in_process() {
                warnings.push(
                    "Override store is in-process in production; overrides are not shared between replicas"
                        .to_string(),
                );
            } else if url.contains("localhost") || url.contains("127.0.0.1") {
                warnings.push(format!(
                    "Redis URL '{}' points at localhost in production",
                    url
                ));
            }
            if self.database.url.is_none() {
                warnings.push("No database URL configured in production".to_string());
            }
        }

        let elasticsearch_enabled = self.flags.get("enable_elasticsearch").copied().unwrap_or(false);
        if elasticsearch_enabled && self.elasticsearch.url.is_none() {
            warnings.push(
                "enable_elasticsearch is set but no Elasticsearch URL is configured".to_string(),
            );
        }

        if self.llm.backend.is_some() && self.llm.url.is_none() {
            warnings.push("An LLM backend is named but has no URL".to_string());
        }

        if !matches!(self.search_backend.as_str(), "pgvector" | "hybrid") {
            warnings.push(format!("Unrecognized search backend '{}'", self.search_backend));
        }

        warnings
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, SettingsError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
