//! Counters for subject-check observability

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::decision::{Decision, Outcome};

/// Engine counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineMetrics {
    /// Total number of decisions
    pub total_decisions: u64,

    pub allowed_decisions: u64,
    pub denied_decisions: u64,
    pub error_decisions: u64,

    /// Decisions that skipped the verifier (bypass flags or no endpoint)
    pub bypassed_decisions: u64,

    pub cache_hits: u64,
    pub cache_misses: u64,

    /// Verifier round trips, successful or not
    pub verifier_calls: u64,

    /// Average verifier latency
    pub avg_verifier_latency_ms: f64,
}

impl EngineMetrics {
    /// Calculate cache hit rate
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

/// Metrics collector with Prometheus-compatible export
pub struct MetricsCollector {
    metrics: Arc<RwLock<EngineMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(EngineMetrics::default())),
        }
    }

    /// Record a cache hit
    pub async fn record_cache_hit(&self) {
        self.metrics.write().await.cache_hits += 1;
    }

    /// Record a cache miss
    pub async fn record_cache_miss(&self) {
        self.metrics.write().await.cache_misses += 1;
    }

    /// Record a finished decision
    pub async fn record_decision(&self, decision: &Decision) {
        let mut metrics = self.metrics.write().await;
        metrics.total_decisions += 1;

        match decision.outcome {
            Outcome::Allow => metrics.allowed_decisions += 1,
            Outcome::Deny => metrics.denied_decisions += 1,
            Outcome::Error => metrics.error_decisions += 1,
        }

        if decision.reason.is_bypass() {
            metrics.bypassed_decisions += 1;
        }
    }

    /// Record one verifier round trip
    pub async fn record_verifier_call(&self, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;
        let mut metrics = self.metrics.write().await;

        let previous = metrics.verifier_calls as f64;
        metrics.verifier_calls += 1;
        metrics.avg_verifier_latency_ms =
            (metrics.avg_verifier_latency_ms * previous + latency_ms) / metrics.verifier_calls as f64;
    }

    /// Get current metrics snapshot
    pub async fn get_metrics(&self) -> EngineMetrics {
        self.metrics.read().await.clone()
    }

    /// Reset all metrics
    pub async fn reset(&self) {
        *self.metrics.write().await = EngineMetrics::default();
    }

    /// Export metrics in Prometheus text format
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.metrics.read().await;

        format!(
            r#"# HELP subcheck_decisions_total Subject-check decisions by outcome
# TYPE subcheck_decisions_total counter
subcheck_decisions_total{{outcome="allow"}} {}
subcheck_decisions_total{{outcome="deny"}} {}
subcheck_decisions_total{{outcome="error"}} {}

# HELP subcheck_bypassed_total Decisions that skipped the verifier
# TYPE subcheck_bypassed_total counter
subcheck_bypassed_total {}

# HELP subcheck_cache_hits_total Verdict cache hits
# TYPE subcheck_cache_hits_total counter
subcheck_cache_hits_total {}

# HELP subcheck_cache_misses_total Verdict cache misses
# TYPE subcheck_cache_misses_total counter
subcheck_cache_misses_total {}

# HELP subcheck_verifier_calls_total Calls made to the external verifier
# TYPE subcheck_verifier_calls_total counter
subcheck_verifier_calls_total {}

# HELP subcheck_verifier_latency_seconds_avg Average verifier latency
# TYPE subcheck_verifier_latency_seconds_avg gauge
subcheck_verifier_latency_seconds_avg {}
"#,
            metrics.allowed_decisions,
            metrics.denied_decisions,
            metrics.error_decisions,
            metrics.bypassed_decisions,
            metrics.cache_hits,
            metrics.cache_misses,
            metrics.verifier_calls,
            metrics.avg_verifier_latency_ms / 1000.0,
        )
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::decision::DecisionReason;

    #[tokio::test]
    async fn test_metrics_creation() {
        let collector = MetricsCollector::new();
        let metrics = collector.get_metrics().await;

        assert_eq!(metrics.total_decisions, 0);
        assert_eq!(metrics.cache_hits, 0);
    }

    #[tokio::test]
    async fn test_record_decision() {
        let collector = MetricsCollector::new();

        collector.record_decision(&Decision::bypass(DecisionReason::ReadsAllowed)).await;
        collector.record_decision(&Decision::from_status(200)).await;
        collector.record_decision(&Decision::from_status(404)).await;
        collector.record_decision(&Decision::error("BOOM!")).await;

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.total_decisions, 4);
        assert_eq!(metrics.allowed_decisions, 2);
        assert_eq!(metrics.denied_decisions, 1);
        assert_eq!(metrics.error_decisions, 1);
        assert_eq!(metrics.bypassed_decisions, 1);
    }

    #[tokio::test]
    async fn test_record_cache() {
        let collector = MetricsCollector::new();

        collector.record_cache_hit().await;
        collector.record_cache_hit().await;
        collector.record_cache_miss().await;

        let metrics = collector.get_metrics().await;
        assert!((metrics.cache_hit_rate() - 0.666).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_verifier_latency_average() {
        let collector = MetricsCollector::new();

        collector.record_verifier_call(Duration::from_millis(5)).await;
        collector.record_verifier_call(Duration::from_millis(15)).await;

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.verifier_calls, 2);
        assert!((metrics.avg_verifier_latency_ms - 10.0).abs() < 0.5);
    }

    #[tokio::test]
    async fn test_prometheus_export() {
        let collector = MetricsCollector::new();
        collector.record_decision(&Decision::from_status(402)).await;

        let prometheus = collector.export_prometheus().await;
        assert!(prometheus.contains(r#"subcheck_decisions_total{outcome="deny"} 1"#));
        assert!(prometheus.contains(r#"subcheck_decisions_total{outcome="allow"} 0"#));
    }

    #[tokio::test]
    async fn test_reset() {
        let collector = MetricsCollector::new();
        collector.record_cache_hit().await;
        collector.reset().await;
        assert_eq!(collector.get_metrics().await.cache_hits, 0);
    }
}
