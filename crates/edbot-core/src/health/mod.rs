//! Health monitoring
//!
//! Independent component probes are run concurrently and aggregated into a
//! [`SystemHealth`] snapshot with a weighted score and an overall status.
//!
//! # Scoring
//!
//! Each component contributes `weight * status_score`, where the status
//! score is 1.0 healthy, 0.7 degraded, 0.5 unknown, 0.0 unhealthy. The total
//! is divided by the sum of the weights actually present, so the score stays
//! in `[0.0, 1.0]` whichever probes ran.
//!
//! # Overall status
//!
//! - `unhealthy` if a critical component (database, LLM backend) is
//!   unhealthy, or more than half of all components are unhealthy
//! - `degraded` if any component is degraded or unhealthy
//! - `healthy` otherwise

mod clients;
mod monitor;
mod probes;

pub use clients::{
    ClusterHealth, ClusterStatus, DatabaseClient, ElasticsearchClient, PgDatabase, ProbeError,
    SearchEngineClient,
};
#[cfg(test)]
pub use clients::{MockDatabaseClient, MockSearchEngineClient};
pub use monitor::{HealthDependencies, HealthMonitor, Liveness, Readiness};
pub use probes::{probe_llm_backend, LlmBackend};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// System component covered by a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Database,
    Cache,
    SearchEngine,
    LlmBackend,
    FeatureFlags,
    Metrics,
    Api,
}

impl ComponentType {
    /// Components probed by a comprehensive check, in report order
    pub const PROBED: [ComponentType; 6] = [
        ComponentType::Database,
        ComponentType::Cache,
        ComponentType::SearchEngine,
        ComponentType::LlmBackend,
        ComponentType::FeatureFlags,
        ComponentType::Metrics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Database => "database",
            ComponentType::Cache => "cache",
            ComponentType::SearchEngine => "search_engine",
            ComponentType::LlmBackend => "llm_backend",
            ComponentType::FeatureFlags => "feature_flags",
            ComponentType::Metrics => "metrics",
            ComponentType::Api => "api",
        }
    }

    /// Contribution weight in the system score
    pub fn weight(&self) -> f64 {
        match self {
            ComponentType::Database => 0.25,
            ComponentType::LlmBackend => 0.25,
            ComponentType::Cache => 0.15,
            ComponentType::SearchEngine => 0.10,
            ComponentType::FeatureFlags => 0.10,
            ComponentType::Metrics => 0.05,
            ComponentType::Api => 0.10,
        }
    }

    /// Whether this component being unhealthy makes the system unhealthy
    pub fn is_critical(&self) -> bool {
        matches!(self, ComponentType::Database | ComponentType::LlmBackend)
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "database" | "db" => Ok(ComponentType::Database),
            "cache" | "redis" => Ok(ComponentType::Cache),
            "search_engine" | "elasticsearch" => Ok(ComponentType::SearchEngine),
            "llm_backend" | "llm" => Ok(ComponentType::LlmBackend),
            "feature_flags" | "flags" => Ok(ComponentType::FeatureFlags),
            "metrics" => Ok(ComponentType::Metrics),
            "api" => Ok(ComponentType::Api),
            other => Err(format!("Unknown component: {}", other)),
        }
    }
}

/// Health status of a component or of the whole system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        }
    }

    /// Contribution of this status to the weighted score
    pub fn score(&self) -> f64 {
        match self {
            HealthStatus::Healthy => 1.0,
            HealthStatus::Degraded => 0.7,
            HealthStatus::Unknown => 0.5,
            HealthStatus::Unhealthy => 0.0,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealthCheck {
    pub component: ComponentType,
    pub status: HealthStatus,
    pub response_time_ms: f64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, serde_json::Value>>,
    pub timestamp: DateTime<Utc>,
}

impl ComponentHealthCheck {
    pub fn new(
        component: ComponentType,
        status: HealthStatus,
        response_time_ms: f64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            component,
            status,
            response_time_ms,
            message: message.into(),
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn healthy(component: ComponentType, response_time_ms: f64, message: impl Into<String>) -> Self {
        Self::new(component, HealthStatus::Healthy, response_time_ms, message)
    }

    pub fn degraded(component: ComponentType, response_time_ms: f64, message: impl Into<String>) -> Self {
        Self::new(component, HealthStatus::Degraded, response_time_ms, message)
    }

    pub fn unhealthy(component: ComponentType, response_time_ms: f64, message: impl Into<String>) -> Self {
        Self::new(component, HealthStatus::Unhealthy, response_time_ms, message)
    }

    pub fn unknown(component: ComponentType, message: impl Into<String>) -> Self {
        Self::new(component, HealthStatus::Unknown, 0.0, message)
    }

    /// Attach structured details; an empty map is dropped
    pub fn with_details(mut self, details: BTreeMap<String, serde_json::Value>) -> Self {
        self.details = if details.is_empty() { None } else { Some(details) };
        self
    }
}

/// Aggregate snapshot of all probes at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub score: f64,
    pub checks: Vec<ComponentHealthCheck>,
    pub timestamp: DateTime<Utc>,
}

impl SystemHealth {
    /// Aggregate a set of checks
    pub fn from_checks(checks: Vec<ComponentHealthCheck>) -> Self {
        Self {
            status: determine_overall_status(&checks),
            score: calculate_health_score(&checks),
            checks,
            timestamp: Utc::now(),
        }
    }

    pub fn is_unhealthy(&self) -> bool {
        self.status == HealthStatus::Unhealthy
    }

    /// Check for one component, if it was probed
    pub fn check(&self, component: ComponentType) -> Option<&ComponentHealthCheck> {
        self.checks.iter().find(|c| c.component == component)
    }
}

/// Weighted, normalized health score in `[0.0, 1.0]`
pub fn calculate_health_score(checks: &[ComponentHealthCheck]) -> f64 {
    let (weighted, total_weight) = checks.iter().fold((0.0, 0.0), |(weighted, total), check| {
        let weight = check.component.weight();
        (weighted + weight * check.status.score(), total + weight)
    });

    if total_weight > 0.0 {
        weighted / total_weight
    } else {
        1.0
    }
}

/// Tri-state overall status for a set of checks
pub fn determine_overall_status(checks: &[ComponentHealthCheck]) -> HealthStatus {
    let unhealthy = checks
        .iter()
        .filter(|c| c.status == HealthStatus::Unhealthy)
        .count();

    let critical_down = checks
        .iter()
        .any(|c| c.component.is_critical() && c.status == HealthStatus::Unhealthy);

    if critical_down || unhealthy * 2 > checks.len() {
        return HealthStatus::Unhealthy;
    }

    let degraded = checks.iter().any(|c| c.status == HealthStatus::Degraded);
    if degraded || unhealthy > 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

/// Direction of the health score over a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTrend {
    Improving,
    Degrading,
    Stable,
}

/// Summary of the snapshots inside a time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthTrends {
    pub window_minutes: u64,
    pub checks_in_window: usize,
    pub average_score: f64,
    /// Percentage of checks in which each component was healthy
    pub component_uptime: BTreeMap<ComponentType, f64>,
    pub trend: HealthTrend,
    pub first_checked_at: DateTime<Utc>,
    pub last_checked_at: DateTime<Utc>,
}

/// Summarize chronologically ordered snapshots; `None` when empty
pub fn compute_trends(snapshots: &[&SystemHealth], window_minutes: u64) -> Option<HealthTrends> {
    let first = snapshots.first()?;
    let last = snapshots.last()?;

    let average_score =
        snapshots.iter().map(|s| s.score).sum::<f64>() / snapshots.len() as f64;

    let mut seen: BTreeMap<ComponentType, (usize, usize)> = BTreeMap::new();
    for snapshot in snapshots {
        for check in &snapshot.checks {
            let entry = seen.entry(check.component).or_default();
            entry.0 += 1;
            if check.status == HealthStatus::Healthy {
                entry.1 += 1;
            }
        }
    }

    let component_uptime = seen
        .into_iter()
        .map(|(component, (total, healthy))| {
            (component, healthy as f64 / total as f64 * 100.0)
        })
        .collect();

    let trend = if last.score > first.score {
        HealthTrend::Improving
    } else if last.score < first.score {
        HealthTrend::Degrading
    } else {
        HealthTrend::Stable
    };

    Some(HealthTrends {
        window_minutes,
        checks_in_window: snapshots.len(),
        average_score,
        component_uptime,
        trend,
        first_checked_at: first.timestamp,
        last_checked_at: last.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn check(component: ComponentType, status: HealthStatus) -> ComponentHealthCheck {
        ComponentHealthCheck::new(component, status, 1.0, "fixture")
    }

    #[test]
    fn test_critical_component_down_is_unhealthy() {
        let checks = vec![
            check(ComponentType::Database, HealthStatus::Healthy),
            check(ComponentType::Cache, HealthStatus::Degraded),
            check(ComponentType::LlmBackend, HealthStatus::Unhealthy),
        ];
        assert_eq!(determine_overall_status(&checks), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_degraded_component_is_degraded() {
        let checks = vec![
            check(ComponentType::Database, HealthStatus::Healthy),
            check(ComponentType::Cache, HealthStatus::Degraded),
            check(ComponentType::LlmBackend, HealthStatus::Healthy),
        ];
        assert_eq!(determine_overall_status(&checks), HealthStatus::Degraded);
    }

    #[test]
    fn test_non_critical_unhealthy_is_degraded() {
        let checks = vec![
            check(ComponentType::Database, HealthStatus::Healthy),
            check(ComponentType::SearchEngine, HealthStatus::Unhealthy),
            check(ComponentType::LlmBackend, HealthStatus::Healthy),
        ];
        assert_eq!(determine_overall_status(&checks), HealthStatus::Degraded);
    }

    #[test]
    fn test_majority_unhealthy_is_unhealthy() {
        let checks = vec![
            check(ComponentType::Cache, HealthStatus::Unhealthy),
            check(ComponentType::SearchEngine, HealthStatus::Unhealthy),
            check(ComponentType::Metrics, HealthStatus::Healthy),
        ];
        assert_eq!(determine_overall_status(&checks), HealthStatus::Unhealthy);

        // Exactly half is not a majority
        let checks = vec![
            check(ComponentType::Cache, HealthStatus::Unhealthy),
            check(ComponentType::Metrics, HealthStatus::Healthy),
        ];
        assert_eq!(determine_overall_status(&checks), HealthStatus::Degraded);
    }

    #[test]
    fn test_unknown_does_not_degrade() {
        let checks = vec![
            check(ComponentType::Database, HealthStatus::Healthy),
            check(ComponentType::SearchEngine, HealthStatus::Unknown),
        ];
        assert_eq!(determine_overall_status(&checks), HealthStatus::Healthy);
    }

    #[test]
    fn test_weighted_score() {
        let checks = vec![
            check(ComponentType::Database, HealthStatus::Healthy),
            check(ComponentType::Cache, HealthStatus::Degraded),
            check(ComponentType::LlmBackend, HealthStatus::Unhealthy),
        ];
        // (0.25 * 1.0 + 0.15 * 0.7 + 0.25 * 0.0) / 0.65
        let expected = (0.25 + 0.105) / 0.65;
        assert!((calculate_health_score(&checks) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_unlisted_component_weight() {
        let checks = vec![
            check(ComponentType::Api, HealthStatus::Unhealthy),
            check(ComponentType::Metrics, HealthStatus::Healthy),
        ];
        // (0.10 * 0.0 + 0.05 * 1.0) / 0.15
        assert!((calculate_health_score(&checks) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_component_type_parsing() {
        assert_eq!("search-engine".parse::<ComponentType>(), Ok(ComponentType::SearchEngine));
        assert_eq!("LLM_BACKEND".parse::<ComponentType>(), Ok(ComponentType::LlmBackend));
        assert!("kafka".parse::<ComponentType>().is_err());
    }

    #[test]
    fn test_serialization_shape() {
        let health = SystemHealth::from_checks(vec![check(
            ComponentType::FeatureFlags,
            HealthStatus::Healthy,
        )]);
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["checks"][0]["component"], "feature_flags");
        assert!(json["checks"][0].get("details").is_none());
    }

    #[test]
    fn test_compute_trends() {
        let mut first = SystemHealth::from_checks(vec![
            check(ComponentType::Database, HealthStatus::Unhealthy),
            check(ComponentType::Cache, HealthStatus::Healthy),
        ]);
        first.timestamp = Utc::now() - chrono::Duration::minutes(10);
        let last = SystemHealth::from_checks(vec![
            check(ComponentType::Database, HealthStatus::Healthy),
            check(ComponentType::Cache, HealthStatus::Healthy),
        ]);

        let trends = compute_trends(&[&first, &last], 60).unwrap();
        assert_eq!(trends.checks_in_window, 2);
        assert_eq!(trends.trend, HealthTrend::Improving);
        assert_eq!(trends.component_uptime[&ComponentType::Database], 50.0);
        assert_eq!(trends.component_uptime[&ComponentType::Cache], 100.0);
        assert!((trends.average_score - (first.score + last.score) / 2.0).abs() < 1e-9);

        let reversed = compute_trends(&[&last, &first], 60).unwrap();
        assert_eq!(reversed.trend, HealthTrend::Degrading);

        let single = compute_trends(&[&last], 60).unwrap();
        assert_eq!(single.trend, HealthTrend::Stable);

        assert!(compute_trends(&[], 60).is_none());
    }

    fn status_strategy() -> impl Strategy<Value = HealthStatus> {
        prop_oneof![
            Just(HealthStatus::Healthy),
            Just(HealthStatus::Degraded),
            Just(HealthStatus::Unhealthy),
            Just(HealthStatus::Unknown),
        ]
    }

    fn component_strategy() -> impl Strategy<Value = ComponentType> {
        prop_oneof![
            Just(ComponentType::Database),
            Just(ComponentType::Cache),
            Just(ComponentType::SearchEngine),
            Just(ComponentType::LlmBackend),
            Just(ComponentType::FeatureFlags),
            Just(ComponentType::Metrics),
            Just(ComponentType::Api),
        ]
    }

    proptest! {
        #[test]
        fn prop_score_is_normalized(
            entries in prop::collection::vec((component_strategy(), status_strategy()), 0..12)
        ) {
            let checks: Vec<_> = entries.into_iter().map(|(c, s)| check(c, s)).collect();
            let score = calculate_health_score(&checks);
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn prop_all_healthy_scores_one(
            components in prop::collection::vec(component_strategy(), 1..8)
        ) {
            let checks: Vec<_> = components
                .into_iter()
                .map(|c| check(c, HealthStatus::Healthy))
                .collect();
            prop_assert!((calculate_health_score(&checks) - 1.0).abs() < 1e-9);
            prop_assert_eq!(determine_overall_status(&checks), HealthStatus::Healthy);
        }
    }
}
