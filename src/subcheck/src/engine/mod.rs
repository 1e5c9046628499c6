//! Subject-check decision engine
//!
//! Decides whether an already-authenticated request may proceed, consulting
//! the external verifier only when neither a bypass flag nor a fresh cached
//! verdict settles the question.

pub mod decision;
pub mod metrics;

pub use decision::{Decision, DecisionReason, Outcome};
pub use metrics::{EngineMetrics, MetricsCollector};

use http::Method;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, VerdictCache};
use crate::config::{ConfigProvider, SubCheckConfig};
use crate::verifier::SubjectVerifier;

/// Default validity window for cached verdicts
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a verifier verdict is reused
    pub cache_ttl: Duration,

    /// Enable metrics collection
    pub enable_metrics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            enable_metrics: true,
        }
    }
}

/// Subject-check engine
///
/// ```text
/// (method, subject) → bypass flags → endpoint set? → [cache] → verifier
///                          ↓              ↓             ↓         ↓
///                        Allow          Allow       verdict   Allow/Deny/Error
/// ```
///
/// Every collaborator is injected, so tests can swap the configuration, the
/// cache clock and the verifier without touching globals.
pub struct SubjectCheckEngine {
    config: EngineConfig,
    provider: Arc<dyn ConfigProvider>,
    cache: Arc<dyn VerdictCache>,
    verifier: Arc<dyn SubjectVerifier>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl SubjectCheckEngine {
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn ConfigProvider>,
        cache: Arc<dyn VerdictCache>,
        verifier: Arc<dyn SubjectVerifier>,
    ) -> Self {
        let metrics = config
            .enable_metrics
            .then(|| Arc::new(MetricsCollector::new()));

        info!(
            cache_ttl_secs = config.cache_ttl.as_secs(),
            metrics = config.enable_metrics,
            "SubjectCheckEngine initialized"
        );

        Self {
            config,
            provider,
            cache,
            verifier,
            metrics,
        }
    }

    /// Decide whether `subject` may perform `method`
    ///
    /// The subject comes from an already validated token and is trusted as
    /// is. Verifier failures yield [`Outcome::Error`] and are never cached.
    /// Dropping the returned future while the verifier call is pending writes
    /// nothing to the cache.
    pub async fn authorize(&self, method: &Method, subject: &str) -> Decision {
        let settings = self.provider.snapshot();
        let decision = self.evaluate(&settings, method, subject).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_decision(&decision).await;
        }

        match decision.outcome {
            Outcome::Allow => debug!(subject, %method, reason = ?decision.reason, "Subject check passed"),
            Outcome::Deny => info!(subject, %method, reason = ?decision.reason, "Subject check denied"),
            Outcome::Error => warn!(subject, %method, reason = ?decision.reason, "Subject check failed"),
        }

        decision
    }

    async fn evaluate(&self, settings: &SubCheckConfig, method: &Method, subject: &str) -> Decision {
        if *method == Method::GET && settings.allow_reads {
            return Decision::bypass(DecisionReason::ReadsAllowed);
        }

        if *method == Method::DELETE && settings.allow_deletes {
            return Decision::bypass(DecisionReason::DeletesAllowed);
        }

        let Some(endpoint) = settings.active_endpoint() else {
            return Decision::bypass(DecisionReason::CheckDisabled);
        };

        if let Some(verdict) = self.cache.get(subject) {
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_hit().await;
            }
            debug!(subject, %verdict, "Cache hit for subject");
            return Decision::cached(verdict);
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_cache_miss().await;
        }

        // No cache lock is held across the round trip.
        let start = Instant::now();
        let result = self.verifier.check(endpoint, subject).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_verifier_call(start.elapsed()).await;
        }

        let decision = match result {
            Ok(status) => Decision::from_status(status),
            Err(e) => return Decision::error(e.to_string()),
        };

        if let Some(verdict) = decision.verdict() {
            self.cache.set(subject, verdict, self.config.cache_ttl);
        }

        decision
    }

    /// Drop every cached verdict
    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Subject verdict cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Current metrics, if collection is enabled
    pub async fn metrics(&self) -> Option<EngineMetrics> {
        match &self.metrics {
            Some(metrics) => Some(metrics.get_metrics().await),
            None => None,
        }
    }

    /// Metrics in Prometheus text format, if collection is enabled
    pub async fn export_prometheus(&self) -> Option<String> {
        match &self.metrics {
            Some(metrics) => Some(metrics.export_prometheus().await),
            None => None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Configuration the next decision will see
    pub fn settings(&self) -> SubCheckConfig {
        self.provider.snapshot()
    }
}
