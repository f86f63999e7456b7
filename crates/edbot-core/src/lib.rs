//! ED Bot operations core
//!
//! Runtime feature flags and system health monitoring for the ED Bot
//! medical-information retrieval service.
//!
//! ## Architecture
//!
//! 1. **Settings** (`settings/`): Static configuration, including the explicit
//!    registry of flags with their defaults and safety-critical markers.
//!
//! 2. **Store** (`store/`): The override store interface with Redis and
//!    in-memory backends.
//!
//! 3. **Flags** (`flags/`): The Feature Flag Manager. Resolves flags through a
//!    local TTL cache, then the override store, then the static default, and
//!    refuses to disable safety-critical flags in production.
//!
//! 4. **Metrics** (`metrics/`): Prometheus metrics for flag writes and health.
//!
//! 5. **Health** (`health/`): Concurrent component probes aggregated into a
//!    weighted system health score with a bounded history.
//!
//! Nothing in this crate is a global. The application builds each component
//! at startup and shares it through `Arc`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use edbot_core::{FeatureFlagManager, MemoryStore, Settings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = Settings::default();
//!     let store = Arc::new(MemoryStore::new());
//!     let flags = FeatureFlagManager::from_settings(&settings, store, None);
//!
//!     flags.set_flag("enable_hybrid_search", true, Some(30)).await;
//!     assert!(flags.get_flag("enable_hybrid_search").await);
//! }
//! ```

pub mod flags;
pub mod health;
pub mod metrics;
pub mod settings;
pub mod store;

pub use flags::{
    dependency_warnings, FeatureFlagManager, FlagError, FlagResolution, FlagSource, FlagStatus,
};
pub use health::{
    calculate_health_score, determine_overall_status, ClusterHealth, ClusterStatus,
    ComponentHealthCheck, ComponentType, DatabaseClient, ElasticsearchClient, HealthDependencies,
    HealthMonitor, HealthStatus, HealthTrend, HealthTrends, Liveness, PgDatabase, ProbeError,
    Readiness, SearchEngineClient, SystemHealth,
};
pub use metrics::{FlagMetrics, HealthMetrics, MetricsError, MetricsRegistry};
pub use settings::{Environment, FlagDefinition, FlagRegistry, Settings, SettingsError};
pub use store::{KeyTtl, MemoryStore, OverrideStore, RedisStore, StoreError, StoreResult};

/// Crate version (from Cargo.toml)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
