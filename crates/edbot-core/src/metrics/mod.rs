//! Prometheus metrics
//!
//! - `edbot_feature_flag_changes_total` (counter) - Flag writes by flag and new value
//! - `edbot_component_health_status` (gauge) - Per-component health (1.0 healthy .. 0.0 unhealthy)
//! - `edbot_component_response_time_ms` (gauge) - Per-component probe latency
//! - `edbot_system_health_score` (gauge) - Weighted system health score
//! - `edbot_health_checks_total` (counter) - Comprehensive checks by overall status
//!
//! Collection can be disabled administratively; the registry still exists so
//! callers never need to branch, but rendering reports the disabled state.

use prometheus::{CounterVec, Gauge, GaugeVec, Opts, Registry};
use std::sync::Arc;
use thiserror::Error;

use crate::health::SystemHealth;

const NAMESPACE: &str = "edbot";

/// Metrics errors
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Metrics collection is disabled")]
    Disabled,

    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Failed to encode metrics: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, MetricsError>;

/// Feature flag write metrics
#[derive(Clone)]
pub struct FlagMetrics {
    changes_total: CounterVec,
}

impl FlagMetrics {
    /// Create flag metrics and register them with `registry`
    pub fn new(registry: &Registry) -> Result<Self> {
        let changes_total = CounterVec::new(
            Opts::new(
                "feature_flag_changes_total",
                "Total number of runtime feature flag changes",
            )
            .namespace(NAMESPACE),
            &["flag", "value"],
        )?;

        registry.register(Box::new(changes_total.clone()))?;

        Ok(Self { changes_total })
    }

    /// Record a successful flag write
    pub fn record_flag_change(&self, flag: &str, value: bool) {
        let value = if value { "true" } else { "false" };
        self.changes_total.with_label_values(&[flag, value]).inc();
    }

    /// Current count for a flag/value pair
    pub fn flag_change_count(&self, flag: &str, value: bool) -> f64 {
        let value = if value { "true" } else { "false" };
        self.changes_total.with_label_values(&[flag, value]).get()
    }
}

impl std::fmt::Debug for FlagMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlagMetrics").finish_non_exhaustive()
    }
}

/// Health monitor gauges
#[derive(Clone)]
pub struct HealthMetrics {
    component_status: GaugeVec,
    component_response_time: GaugeVec,
    system_score: Gauge,
    checks_total: CounterVec,
}

impl HealthMetrics {
    /// Create health metrics and register them with `registry`
    pub fn new(registry: &Registry) -> Result<Self> {
        let component_status = GaugeVec::new(
            Opts::new(
                "component_health_status",
                "Component health (1.0 healthy, 0.7 degraded, 0.5 unknown, 0.0 unhealthy)",
            )
            .namespace(NAMESPACE),
            &["component"],
        )?;

        let component_response_time = GaugeVec::new(
            Opts::new(
                "component_response_time_ms",
                "Latest component probe response time in milliseconds",
            )
            .namespace(NAMESPACE),
            &["component"],
        )?;

        let system_score = Gauge::with_opts(
            Opts::new(
                "system_health_score",
                "Weighted system health score (0.0 - 1.0)",
            )
            .namespace(NAMESPACE),
        )?;

        let checks_total = CounterVec::new(
            Opts::new(
                "health_checks_total",
                "Total number of comprehensive health checks by overall status",
            )
            .namespace(NAMESPACE),
            &["status"],
        )?;

        registry.register(Box::new(component_status.clone()))?;
        registry.register(Box::new(component_response_time.clone()))?;
        registry.register(Box::new(system_score.clone()))?;
        registry.register(Box::new(checks_total.clone()))?;

        Ok(Self {
            component_status,
            component_response_time,
            system_score,
            checks_total,
        })
    }

    /// Push a comprehensive health snapshot into the gauges
    pub fn record_system_health(&self, health: &SystemHealth) {
        for check in &health.checks {
            let component = check.component.as_str();
            self.component_status
                .with_label_values(&[component])
                .set(check.status.score());
            self.component_response_time
                .with_label_values(&[component])
                .set(check.response_time_ms);
        }
        self.system_score.set(health.score);
        self.checks_total
            .with_label_values(&[health.status.as_str()])
            .inc();
    }

    /// Latest system score gauge value
    pub fn system_score(&self) -> f64 {
        self.system_score.get()
    }
}

impl std::fmt::Debug for HealthMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMetrics").finish_non_exhaustive()
    }
}

/// Registry for all ED Bot metrics
#[derive(Debug)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    enabled: bool,
    flags: FlagMetrics,
    health: HealthMetrics,
}

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new(enabled: bool) -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()), enabled)
    }

    /// Create with an existing Prometheus registry
    pub fn with_registry(registry: Arc<Registry>, enabled: bool) -> Result<Self> {
        let flags = FlagMetrics::new(&registry)?;
        let health = HealthMetrics::new(&registry)?;

        Ok(Self {
            registry,
            enabled,
            flags,
            health,
        })
    }

    /// Whether collection is administratively enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Flag write metrics
    pub fn flags(&self) -> &FlagMetrics {
        &self.flags
    }

    /// Health gauges
    pub fn health(&self) -> &HealthMetrics {
        &self.health
    }

    /// Encode all metrics in the Prometheus text exposition format
    pub fn render(&self) -> Result<Vec<u8>> {
        use prometheus::Encoder;

        if !self.enabled {
            return Err(MetricsError::Disabled);
        }

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::Encoding(e.to_string()))?;
        Ok(buffer)
    }

    /// Content type of [`render`](Self::render) output
    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{ComponentHealthCheck, ComponentType, HealthStatus};

    #[test]
    fn test_record_flag_change() {
        let registry = MetricsRegistry::new(true).unwrap();

        registry.flags().record_flag_change("enable_streaming", true);
        registry.flags().record_flag_change("enable_streaming", true);
        registry.flags().record_flag_change("enable_streaming", false);

        assert_eq!(registry.flags().flag_change_count("enable_streaming", true), 2.0);
        assert_eq!(registry.flags().flag_change_count("enable_streaming", false), 1.0);
    }

    #[test]
    fn test_render_contains_metrics() {
        let registry = MetricsRegistry::new(true).unwrap();
        registry.flags().record_flag_change("enable_hybrid_search", true);

        let text = String::from_utf8(registry.render().unwrap()).unwrap();
        assert!(text.contains("edbot_feature_flag_changes_total"));
        assert!(text.contains("enable_hybrid_search"));
    }

    #[test]
    fn test_render_disabled() {
        let registry = MetricsRegistry::new(false).unwrap();
        assert!(matches!(registry.render(), Err(MetricsError::Disabled)));
    }

    #[test]
    fn test_record_system_health() {
        let registry = MetricsRegistry::new(true).unwrap();
        let health = SystemHealth::from_checks(vec![
            ComponentHealthCheck::new(ComponentType::Database, HealthStatus::Healthy, 12.0, "ok"),
            ComponentHealthCheck::new(ComponentType::Cache, HealthStatus::Degraded, 640.0, "slow"),
        ]);

        registry.health().record_system_health(&health);

        assert!((registry.health().system_score() - health.score).abs() < f64::EPSILON);
        let text = String::from_utf8(registry.render().unwrap()).unwrap();
        assert!(text.contains("edbot_component_health_status{component=\"cache\"} 0.7"));
        assert!(text.contains("edbot_health_checks_total{status=\"degraded\"} 1"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Arc::new(Registry::new());
        FlagMetrics::new(&registry).unwrap();
        assert!(FlagMetrics::new(&registry).is_err());
    }
}
