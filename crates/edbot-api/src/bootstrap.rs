//! Component wiring
//!
//! Builds every core component from [`Settings`] once at startup.

use edbot_core::settings::RedisSettings;
use edbot_core::{
    DatabaseClient, ElasticsearchClient, FeatureFlagManager, HealthDependencies, HealthMonitor,
    MemoryStore, MetricsError, MetricsRegistry, OverrideStore, PgDatabase, RedisStore,
    SearchEngineClient, Settings, StoreError,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::handler::AppState;

/// Errors that stop the process from starting
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Override store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

/// Connect to the configured override store
///
/// A `memory://` URL selects the in-process store. Any other URL must reach
/// Redis within `connect_timeout`.
pub async fn connect_store(
    url: &str,
    connect_timeout: Duration,
) -> Result<Arc<dyn OverrideStore>, StoreError> {
    if url.starts_with(RedisSettings::IN_PROCESS_SCHEME) {
        warn!("Using in-process override store; overrides stay local to this process");
        return Ok(Arc::new(MemoryStore::new()));
    }

    match tokio::time::timeout(connect_timeout, RedisStore::connect(url)).await {
        Ok(Ok(store)) => {
            info!("Using Redis override store");
            Ok(Arc::new(store))
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(StoreError::Timeout(format!(
            "Redis connection not established within {}ms",
            connect_timeout.as_millis()
        ))),
    }
}

fn database(settings: &Settings) -> Option<Arc<dyn DatabaseClient>> {
    let url = settings.database.url.as_deref()?;
    match PgDatabase::connect_lazy(
        url,
        settings.database.max_connections,
        settings.health.probe_timeout(),
    ) {
        Ok(db) => Some(Arc::new(db)),
        Err(e) => {
            warn!(error = %e, "Database client not created");
            None
        }
    }
}

fn search_engine(settings: &Settings) -> Option<Arc<dyn SearchEngineClient>> {
    let url = settings.elasticsearch.url.as_deref()?;
    match ElasticsearchClient::new(url, settings.health.probe_timeout()) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "Elasticsearch client not created");
            None
        }
    }
}

/// Build application state over an existing override store
pub fn build_state_with_store(
    settings: &Settings,
    store: Arc<dyn OverrideStore>,
) -> Result<AppState, MetricsError> {
    let metrics = Arc::new(MetricsRegistry::new(settings.metrics.enabled)?);

    let flags = Arc::new(FeatureFlagManager::from_settings(
        settings,
        Arc::clone(&store),
        Some(metrics.flags().clone()),
    ));

    let deps = HealthDependencies {
        cache: store,
        flags: Arc::clone(&flags),
        metrics: Arc::clone(&metrics),
        database: database(settings),
        search_engine: search_engine(settings),
        search_index: settings.elasticsearch.index.clone(),
        llm: settings.llm.clone(),
    };
    let monitor = Arc::new(HealthMonitor::new(deps, settings.health.clone()));

    Ok(AppState::new(flags, monitor, metrics))
}

/// Connect to the configured stores and build application state
pub async fn build_state(settings: &Settings) -> Result<AppState, BootstrapError> {
    for warning in settings.validate() {
        warn!(warning = %warning, "Configuration warning");
    }

    let store = connect_store(&settings.redis.url, settings.health.probe_timeout()).await?;
    Ok(build_state_with_store(settings, store)?)
}
