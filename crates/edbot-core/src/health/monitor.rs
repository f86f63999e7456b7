//! Health monitor
//!
//! Runs component probes concurrently, each under its own timeout and panic
//! guard, and keeps a bounded history of comprehensive snapshots.

use super::probes::{elapsed_ms, probe_llm_backend};
use super::{
    compute_trends, ClusterStatus, ComponentHealthCheck, ComponentType, DatabaseClient,
    HealthStatus, HealthTrends, SearchEngineClient, SystemHealth,
};
use crate::flags::FeatureFlagManager;
use crate::metrics::{MetricsError, MetricsRegistry};
use crate::settings::{HealthSettings, LlmSettings};
use crate::store::OverrideStore;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

const CACHE_MARKER_TTL: Duration = Duration::from_secs(60);

/// Everything the monitor probes
#[derive(Clone)]
pub struct HealthDependencies {
    pub cache: Arc<dyn OverrideStore>,
    pub flags: Arc<FeatureFlagManager>,
    pub metrics: Arc<MetricsRegistry>,
    /// `None` when no database is configured
    pub database: Option<Arc<dyn DatabaseClient>>,
    /// `None` when no search engine is configured
    pub search_engine: Option<Arc<dyn SearchEngineClient>>,
    pub search_index: String,
    pub llm: LlmSettings,
}

/// Liveness answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Liveness {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub started_at: DateTime<Utc>,
}

/// Readiness answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Readiness {
    pub ready: bool,
    pub checks: Vec<ComponentHealthCheck>,
    pub timestamp: DateTime<Utc>,
}

/// Health monitor
pub struct HealthMonitor {
    deps: HealthDependencies,
    settings: HealthSettings,
    http: reqwest::Client,
    started: Instant,
    started_at: DateTime<Utc>,
    history: Mutex<VecDeque<SystemHealth>>,
    last: RwLock<Option<SystemHealth>>,
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("settings", &self.settings)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl HealthMonitor {
    pub fn new(deps: HealthDependencies, settings: HealthSettings) -> Self {
        let http = reqwest::Client::builder()
            .timeout(settings.probe_timeout())
            .build()
            .unwrap_or_default();

        Self::with_http_client(deps, settings, http)
    }

    /// Create with a caller-supplied HTTP client for the LLM probe
    pub fn with_http_client(
        deps: HealthDependencies,
        settings: HealthSettings,
        http: reqwest::Client,
    ) -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(settings.history_capacity)),
            deps,
            settings,
            http,
            started: Instant::now(),
            started_at: Utc::now(),
            last: RwLock::new(None),
        }
    }

    pub fn settings(&self) -> &HealthSettings {
        &self.settings
    }

    /// Trivial round-trip query plus best-effort size and connection counts
    pub async fn check_database_health(&self) -> ComponentHealthCheck {
        let component = ComponentType::Database;
        let Some(database) = &self.deps.database else {
            return ComponentHealthCheck::unknown(component, "Database not configured");
        };

        let start = Instant::now();
        if let Err(e) = database.ping().await {
            return ComponentHealthCheck::unhealthy(
                component,
                elapsed_ms(start),
                format!("Database connection failed: {}", e),
            );
        }
        let response_time = elapsed_ms(start);

        let mut details = BTreeMap::new();
        match database.database_size_bytes().await {
            Ok(size) => {
                details.insert("database_size_bytes".to_string(), serde_json::json!(size));
            }
            Err(e) => debug!(error = %e, "Database size unavailable"),
        }
        match database.active_connections().await {
            Ok(count) => {
                details.insert("active_connections".to_string(), serde_json::json!(count));
            }
            Err(e) => debug!(error = %e, "Active connection count unavailable"),
        }

        let threshold = self.settings.database_latency_threshold_ms as f64;
        let check = if response_time < threshold {
            ComponentHealthCheck::healthy(component, response_time, "Database responding normally")
        } else {
            ComponentHealthCheck::degraded(
                component,
                response_time,
                format!("Database responding slowly ({:.0}ms)", response_time),
            )
        };
        check.with_details(details)
    }

    /// Set/get/delete round trip with a unique marker
    pub async fn check_cache_health(&self) -> ComponentHealthCheck {
        let component = ComponentType::Cache;
        let cache = &self.deps.cache;
        let key = format!("health_check:{}", Uuid::new_v4());
        let marker = Uuid::new_v4().to_string();

        let start = Instant::now();
        let round_trip = async {
            cache.set(&key, &marker, Some(CACHE_MARKER_TTL)).await?;
            let read = cache.get(&key).await?;
            cache.delete(std::slice::from_ref(&key)).await?;
            Ok::<_, crate::store::StoreError>(read)
        };

        let read = match round_trip.await {
            Ok(read) => read,
            Err(e) => {
                return ComponentHealthCheck::unhealthy(
                    component,
                    elapsed_ms(start),
                    format!("Cache operation failed: {}", e),
                )
            }
        };
        let response_time = elapsed_ms(start);

        if read.as_deref() != Some(marker.as_str()) {
            return ComponentHealthCheck::unhealthy(
                component,
                response_time,
                "Cache read-after-write mismatch",
            );
        }

        let mut details: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        details.insert(
            "provider".to_string(),
            serde_json::json!(cache.provider_name()),
        );
        match cache.info().await {
            Ok(info) => {
                details.extend(info.into_iter().map(|(k, v)| (k, serde_json::json!(v))));
            }
            Err(e) => debug!(error = %e, "Cache server info unavailable"),
        }

        let threshold = self.settings.cache_latency_threshold_ms as f64;
        let check = if response_time < threshold {
            ComponentHealthCheck::healthy(component, response_time, "Cache responding normally")
        } else {
            ComponentHealthCheck::degraded(
                component,
                response_time,
                format!("Cache responding slowly ({:.0}ms)", response_time),
            )
        };
        check.with_details(details)
    }

    /// Cluster health mapped green/yellow/red to healthy/degraded/unhealthy
    pub async fn check_search_engine_health(&self) -> ComponentHealthCheck {
        let component = ComponentType::SearchEngine;
        let Some(search) = &self.deps.search_engine else {
            return ComponentHealthCheck::unknown(component, "Search engine not configured");
        };

        let start = Instant::now();
        let cluster = match search.cluster_health().await {
            Ok(cluster) => cluster,
            Err(e) => {
                return ComponentHealthCheck::unhealthy(
                    component,
                    elapsed_ms(start),
                    format!("Search engine check failed: {}", e),
                )
            }
        };
        let response_time = elapsed_ms(start);

        let mut details = BTreeMap::new();
        details.insert("cluster_name".to_string(), serde_json::json!(cluster.cluster_name));
        details.insert("number_of_nodes".to_string(), serde_json::json!(cluster.number_of_nodes));
        details.insert("active_shards".to_string(), serde_json::json!(cluster.active_shards));
        match search.document_count(&self.deps.search_index).await {
            Ok(Some(count)) => {
                details.insert("document_count".to_string(), serde_json::json!(count));
            }
            Ok(None) => {
                details.insert("index_exists".to_string(), serde_json::json!(false));
            }
            Err(e) => debug!(error = %e, "Document count unavailable"),
        }

        let check = match cluster.status {
            ClusterStatus::Green => {
                ComponentHealthCheck::healthy(component, response_time, "Cluster status green")
            }
            ClusterStatus::Yellow => {
                ComponentHealthCheck::degraded(component, response_time, "Cluster status yellow")
            }
            ClusterStatus::Red => {
                ComponentHealthCheck::unhealthy(component, response_time, "Cluster status red")
            }
        };
        check.with_details(details)
    }

    pub async fn check_llm_health(&self) -> ComponentHealthCheck {
        probe_llm_backend(
            &self.http,
            self.deps.llm.backend.as_deref(),
            self.deps.llm.url.as_deref(),
        )
        .await
    }

    /// Resolve one flag and list the inventory through the override store
    pub async fn check_feature_flags_health(&self) -> ComponentHealthCheck {
        let component = ComponentType::FeatureFlags;
        let flags = &self.deps.flags;
        let Some(probe_flag) = flags
            .registry()
            .safety_critical_flags()
            .first()
            .map(|name| name.to_string())
        else {
            return ComponentHealthCheck::unknown(
                component,
                "No safety-critical flag registered to resolve",
            );
        };

        let start = Instant::now();
        let resolution = flags.resolve_flag(&probe_flag).await;
        let inventory = flags.try_get_all_flags().await;
        let response_time = elapsed_ms(start);

        let mut details = BTreeMap::new();
        details.insert("probe_flag".to_string(), serde_json::json!(probe_flag));
        details.insert("probe_value".to_string(), serde_json::json!(resolution.value));

        match inventory {
            Ok(all) if !resolution.source.is_store_error() => {
                let overrides = all.values().filter(|s| s.has_override).count();
                details.insert("total_flags".to_string(), serde_json::json!(all.len()));
                details.insert("active_overrides".to_string(), serde_json::json!(overrides));
                ComponentHealthCheck::healthy(
                    component,
                    response_time,
                    "Feature flags operational",
                )
                .with_details(details)
            }
            Ok(_) => ComponentHealthCheck::degraded(
                component,
                response_time,
                "Override store unreachable; serving defaults",
            )
            .with_details(details),
            Err(e) => ComponentHealthCheck::degraded(
                component,
                response_time,
                format!("Override store unreachable; serving defaults: {}", e),
            )
            .with_details(details),
        }
    }

    /// Render the metrics payload
    pub async fn check_metrics_health(&self) -> ComponentHealthCheck {
        let component = ComponentType::Metrics;
        let start = Instant::now();

        match self.deps.metrics.render() {
            Ok(payload) => {
                let mut details = BTreeMap::new();
                details.insert("payload_bytes".to_string(), serde_json::json!(payload.len()));
                ComponentHealthCheck::healthy(
                    component,
                    elapsed_ms(start),
                    "Metrics collection operational",
                )
                .with_details(details)
            }
            Err(MetricsError::Disabled) => ComponentHealthCheck::degraded(
                component,
                elapsed_ms(start),
                "Metrics collection disabled",
            ),
            Err(e) => ComponentHealthCheck::unhealthy(
                component,
                elapsed_ms(start),
                format!("Metrics rendering failed: {}", e),
            ),
        }
    }

    /// Run the probe for one component without a timeout or panic guard
    pub async fn check_component(&self, component: ComponentType) -> ComponentHealthCheck {
        match component {
            ComponentType::Database => self.check_database_health().await,
            ComponentType::Cache => self.check_cache_health().await,
            ComponentType::SearchEngine => self.check_search_engine_health().await,
            ComponentType::LlmBackend => self.check_llm_health().await,
            ComponentType::FeatureFlags => self.check_feature_flags_health().await,
            ComponentType::Metrics => self.check_metrics_health().await,
            ComponentType::Api => ComponentHealthCheck::healthy(
                component,
                0.0,
                "API process responding",
            ),
        }
    }

    /// Run one probe under the configured timeout, converting panics
    pub async fn guarded_check(&self, component: ComponentType) -> ComponentHealthCheck {
        let start = Instant::now();
        let probe_timeout = self.settings.probe_timeout();
        let probe = AssertUnwindSafe(self.check_component(component)).catch_unwind();

        match timeout(probe_timeout, probe).await {
            Ok(Ok(check)) => check,
            Ok(Err(_)) => {
                warn!(component = %component, "Health probe panicked");
                ComponentHealthCheck::unhealthy(
                    component,
                    elapsed_ms(start),
                    "Health check failed: probe panicked",
                )
            }
            Err(_) => {
                warn!(component = %component, timeout_ms = probe_timeout.as_millis() as u64, "Health probe timed out");
                ComponentHealthCheck::unhealthy(
                    component,
                    elapsed_ms(start),
                    format!("Health check timed out after {}ms", probe_timeout.as_millis()),
                )
            }
        }
    }

    /// Probe every component concurrently and record the snapshot
    pub async fn perform_comprehensive_health_check(&self) -> SystemHealth {
        let start = Instant::now();

        let probes: Vec<_> = ComponentType::PROBED
            .iter()
            .map(|component| self.guarded_check(*component))
            .collect();
        let checks = futures::future::join_all(probes).await;

        let health = SystemHealth::from_checks(checks);

        if self.deps.metrics.is_enabled() {
            self.deps.metrics.health().record_system_health(&health);
        }
        self.record_health_snapshot(health.clone());

        info!(
            status = %health.status,
            score = health.score,
            duration_ms = start.elapsed().as_millis() as u64,
            "Comprehensive health check completed"
        );

        health
    }

    /// Process is running
    pub fn check_liveness(&self) -> Liveness {
        Liveness {
            status: "alive".to_string(),
            version: crate::VERSION.to_string(),
            uptime_seconds: self.started.elapsed().as_secs(),
            started_at: self.started_at,
        }
    }

    /// Database and cache only; ready unless either is unhealthy
    pub async fn check_readiness(&self) -> Readiness {
        let (database, cache) = futures::join!(
            self.guarded_check(ComponentType::Database),
            self.guarded_check(ComponentType::Cache)
        );
        let checks = vec![database, cache];
        let ready = checks.iter().all(|c| c.status != HealthStatus::Unhealthy);

        Readiness {
            ready,
            checks,
            timestamp: Utc::now(),
        }
    }

    pub fn get_last_health_check(&self) -> Option<SystemHealth> {
        self.last
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Up to `limit` most recent snapshots, oldest first
    pub fn get_health_history(&self, limit: usize) -> Vec<SystemHealth> {
        let history = self.history();
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    /// Summary of the snapshots taken within `window`
    pub fn get_health_trends(&self, window: Duration) -> Option<HealthTrends> {
        let cutoff = chrono::Duration::from_std(window)
            .ok()
            .and_then(|w| Utc::now().checked_sub_signed(w));

        let history = self.history();
        let in_window: Vec<&SystemHealth> = history
            .iter()
            .filter(|s| cutoff.map_or(true, |cutoff| s.timestamp >= cutoff))
            .collect();

        compute_trends(&in_window, window.as_secs() / 60)
    }

    /// Append a snapshot, evicting the oldest past capacity
    pub fn record_health_snapshot(&self, snapshot: SystemHealth) {
        *self.last.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());

        let capacity = self.settings.history_capacity;
        if capacity == 0 {
            return;
        }

        let mut history = self.history();
        while history.len() >= capacity {
            history.pop_front();
        }
        history.push_back(snapshot);
    }

    fn history(&self) -> MutexGuard<'_, VecDeque<SystemHealth>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{
        ClusterHealth, HealthTrend, MockDatabaseClient, MockSearchEngineClient, ProbeError,
    };
    use crate::settings::{Environment, FlagDefinition, FlagRegistry};
    use crate::store::MemoryStore;

    fn deps_with(store: Arc<MemoryStore>, metrics_enabled: bool) -> HealthDependencies {
        let metrics = Arc::new(MetricsRegistry::new(metrics_enabled).unwrap());
        let flags = Arc::new(FeatureFlagManager::new(
            store.clone(),
            FlagRegistry::builtin(),
            Environment::Development,
        ));
        HealthDependencies {
            cache: store,
            flags,
            metrics,
            database: None,
            search_engine: None,
            search_index: "edbot_documents".to_string(),
            llm: LlmSettings::default(),
        }
    }

    fn healthy_database() -> MockDatabaseClient {
        let mut db = MockDatabaseClient::new();
        db.expect_ping().returning(|| Ok(()));
        db.expect_database_size_bytes().returning(|| Ok(8_388_608));
        db.expect_active_connections().returning(|| Ok(3));
        db
    }

    fn monitor(deps: HealthDependencies) -> HealthMonitor {
        HealthMonitor::new(deps, HealthSettings::default())
    }

    #[tokio::test]
    async fn test_database_healthy_with_details() {
        let mut deps = deps_with(Arc::new(MemoryStore::new()), true);
        deps.database = Some(Arc::new(healthy_database()));

        let check = monitor(deps).check_database_health().await;
        assert_eq!(check.status, HealthStatus::Healthy);
        let details = check.details.unwrap();
        assert_eq!(details["database_size_bytes"], 8_388_608);
        assert_eq!(details["active_connections"], 3);
    }

    #[tokio::test]
    async fn test_database_failure_is_unhealthy() {
        let mut db = MockDatabaseClient::new();
        db.expect_ping()
            .returning(|| Err(ProbeError::Connection("refused".to_string())));
        let mut deps = deps_with(Arc::new(MemoryStore::new()), true);
        deps.database = Some(Arc::new(db));

        let check = monitor(deps).check_database_health().await;
        assert_eq!(check.status, HealthStatus::Unhealthy);
        assert!(check.message.contains("refused"));
    }

    #[tokio::test]
    async fn test_database_auxiliary_failures_are_ignored() {
        let mut db = MockDatabaseClient::new();
        db.expect_ping().returning(|| Ok(()));
        db.expect_database_size_bytes()
            .returning(|| Err(ProbeError::Query("permission denied".to_string())));
        db.expect_active_connections()
            .returning(|| Err(ProbeError::Query("permission denied".to_string())));
        let mut deps = deps_with(Arc::new(MemoryStore::new()), true);
        deps.database = Some(Arc::new(db));

        let check = monitor(deps).check_database_health().await;
        assert_eq!(check.status, HealthStatus::Healthy);
        assert!(check.details.is_none());
    }

    #[tokio::test]
    async fn test_cache_round_trip_cleans_up() {
        let store = Arc::new(MemoryStore::new());
        let check = monitor(deps_with(store.clone(), true)).check_cache_health().await;

        assert_eq!(check.status, HealthStatus::Healthy);
        assert_eq!(check.details.unwrap()["provider"], "memory");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_cache_unavailable_is_unhealthy() {
        let store = Arc::new(MemoryStore::new());
        store.set_unavailable(true);
        let check = monitor(deps_with(store, true)).check_cache_health().await;
        assert_eq!(check.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_search_engine_status_mapping() {
        for (status, expected) in [
            (ClusterStatus::Green, HealthStatus::Healthy),
            (ClusterStatus::Yellow, HealthStatus::Degraded),
            (ClusterStatus::Red, HealthStatus::Unhealthy),
        ] {
            let mut search = MockSearchEngineClient::new();
            search.expect_cluster_health().returning(move || {
                Ok(ClusterHealth {
                    cluster_name: "edbot".to_string(),
                    status,
                    number_of_nodes: 3,
                    active_shards: 10,
                })
            });
            search.expect_document_count().returning(|_| Ok(Some(42)));

            let mut deps = deps_with(Arc::new(MemoryStore::new()), true);
            deps.search_engine = Some(Arc::new(search));

            let check = monitor(deps).check_search_engine_health().await;
            assert_eq!(check.status, expected);
        }
    }

    #[tokio::test]
    async fn test_unconfigured_components_are_unknown() {
        let monitor = monitor(deps_with(Arc::new(MemoryStore::new()), true));
        assert_eq!(monitor.check_search_engine_health().await.status, HealthStatus::Unknown);
        assert_eq!(monitor.check_llm_health().await.status, HealthStatus::Unknown);
        assert_eq!(monitor.check_database_health().await.status, HealthStatus::Unknown);
    }

    #[tokio::test]
    async fn test_flags_degraded_when_store_down() {
        let store = Arc::new(MemoryStore::new());
        let monitor = monitor(deps_with(store.clone(), true));

        assert_eq!(
            monitor.check_feature_flags_health().await.status,
            HealthStatus::Healthy
        );

        store.set_unavailable(true);
        let check = monitor.check_feature_flags_health().await;
        assert_eq!(check.status, HealthStatus::Degraded);
        assert!(check.message.contains("serving defaults"));
    }

    #[tokio::test]
    async fn test_flags_unknown_without_safety_flags() {
        let store = Arc::new(MemoryStore::new());
        let mut deps = deps_with(store.clone(), true);
        deps.flags = Arc::new(FeatureFlagManager::new(
            store,
            FlagRegistry::empty().with_flag(FlagDefinition::new(
                "enable_streaming",
                false,
                "Stream tokens as they are generated",
            )),
            Environment::Development,
        ));

        let check = monitor(deps).check_feature_flags_health().await;
        assert_eq!(check.status, HealthStatus::Unknown);
        assert!(check.details.is_none());
    }

    #[tokio::test]
    async fn test_metrics_disabled_is_degraded() {
        let monitor = monitor(deps_with(Arc::new(MemoryStore::new()), false));
        assert_eq!(monitor.check_metrics_health().await.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_comprehensive_check_records_everything() {
        let mut deps = deps_with(Arc::new(MemoryStore::new()), true);
        deps.database = Some(Arc::new(healthy_database()));
        let metrics = deps.metrics.clone();
        let monitor = monitor(deps);

        let health = monitor.perform_comprehensive_health_check().await;

        assert_eq!(health.checks.len(), ComponentType::PROBED.len());
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(monitor.get_last_health_check(), Some(health.clone()));
        assert_eq!(monitor.get_health_history(10).len(), 1);
        assert!((metrics.health().system_score() - health.score).abs() < f64::EPSILON);
    }

    struct StalledDatabase;

    #[async_trait::async_trait]
    impl DatabaseClient for StalledDatabase {
        async fn ping(&self) -> Result<(), ProbeError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        async fn database_size_bytes(&self) -> Result<i64, ProbeError> {
            Ok(0)
        }

        async fn active_connections(&self) -> Result<i64, ProbeError> {
            Ok(0)
        }
    }

    struct PanickingSearch;

    #[async_trait::async_trait]
    impl SearchEngineClient for PanickingSearch {
        async fn cluster_health(&self) -> Result<ClusterHealth, ProbeError> {
            panic!("search client bug");
        }

        async fn document_count(&self, _index: &str) -> Result<Option<u64>, ProbeError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_probe_timeout_becomes_unhealthy() {
        let mut deps = deps_with(Arc::new(MemoryStore::new()), true);
        deps.database = Some(Arc::new(StalledDatabase));

        let settings = HealthSettings {
            probe_timeout_ms: 50,
            ..HealthSettings::default()
        };
        let monitor = HealthMonitor::new(deps, settings);
        let check = monitor.guarded_check(ComponentType::Database).await;
        assert_eq!(check.status, HealthStatus::Unhealthy);
        assert!(check.message.contains("timed out after 50ms"));
    }

    #[tokio::test]
    async fn test_panicking_probe_is_isolated() {
        let mut deps = deps_with(Arc::new(MemoryStore::new()), true);
        deps.search_engine = Some(Arc::new(PanickingSearch));
        let monitor = monitor(deps);

        let health = monitor.perform_comprehensive_health_check().await;
        assert_eq!(health.checks.len(), ComponentType::PROBED.len());

        let search = health.check(ComponentType::SearchEngine).unwrap();
        assert_eq!(search.status, HealthStatus::Unhealthy);
        assert!(search.message.contains("panicked"));
        assert_eq!(
            health.check(ComponentType::Cache).map(|c| c.status),
            Some(HealthStatus::Healthy)
        );
    }

    #[tokio::test]
    async fn test_readiness_ignores_non_critical_components() {
        let store = Arc::new(MemoryStore::new());
        let monitor = monitor(deps_with(store.clone(), true));

        let readiness = monitor.check_readiness().await;
        assert!(readiness.ready);
        assert_eq!(readiness.checks.len(), 2);

        store.set_unavailable(true);
        assert!(!monitor.check_readiness().await.ready);
    }

    #[tokio::test]
    async fn test_liveness() {
        let monitor = monitor(deps_with(Arc::new(MemoryStore::new()), true));
        let liveness = monitor.check_liveness();
        assert_eq!(liveness.status, "alive");
        assert_eq!(liveness.version, crate::VERSION);
    }

    #[test]
    fn test_history_is_bounded_and_chronological() {
        let settings = HealthSettings {
            history_capacity: 3,
            ..HealthSettings::default()
        };
        let monitor = HealthMonitor::new(
            deps_with(Arc::new(MemoryStore::new()), true),
            settings,
        );

        for i in 0..5 {
            let mut snapshot = SystemHealth::from_checks(Vec::new());
            snapshot.score = i as f64 / 10.0;
            monitor.record_health_snapshot(snapshot);
        }

        let scores: Vec<f64> = monitor
            .get_health_history(3)
            .iter()
            .map(|s| s.score)
            .collect();
        assert_eq!(scores, vec![0.2, 0.3, 0.4]);

        let scores: Vec<f64> = monitor
            .get_health_history(2)
            .iter()
            .map(|s| s.score)
            .collect();
        assert_eq!(scores, vec![0.3, 0.4]);
        assert_eq!(monitor.get_last_health_check().map(|s| s.score), Some(0.4));
    }

    #[test]
    fn test_trends_respect_window() {
        let monitor = monitor(deps_with(Arc::new(MemoryStore::new()), true));
        assert!(monitor.get_health_trends(Duration::from_secs(3600)).is_none());

        let mut old = SystemHealth::from_checks(Vec::new());
        old.timestamp = Utc::now() - chrono::Duration::hours(3);
        old.score = 0.1;
        monitor.record_health_snapshot(old);

        let mut first = SystemHealth::from_checks(Vec::new());
        first.score = 0.9;
        monitor.record_health_snapshot(first);
        let mut last = SystemHealth::from_checks(Vec::new());
        last.score = 0.5;
        monitor.record_health_snapshot(last);

        let trends = monitor.get_health_trends(Duration::from_secs(3600)).unwrap();
        assert_eq!(trends.window_minutes, 60);
        assert_eq!(trends.checks_in_window, 2);
        assert_eq!(trends.trend, HealthTrend::Degrading);
    }
}
