//! Request and response bodies

use serde::{Deserialize, Serialize};
use subcheck::{CacheStats, SubCheckConfig};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Body of the protected sample resource
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SecuredResponse {
    pub good: String,
    pub subject: String,
}

/// Live subject-check configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ConfigBody {
    /// Verifier endpoint; omit or null to disable the check
    #[validate(url)]
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub allow_reads: bool,

    #[serde(default)]
    pub allow_deletes: bool,
}

impl ConfigBody {
    /// Treat a blank endpoint as unset, as the environment does
    pub fn normalized(mut self) -> Self {
        self.endpoint = self.endpoint.filter(|e| !e.trim().is_empty());
        self
    }
}

impl From<SubCheckConfig> for ConfigBody {
    fn from(config: SubCheckConfig) -> Self {
        Self {
            endpoint: config.endpoint,
            allow_reads: config.allow_reads,
            allow_deletes: config.allow_deletes,
        }
    }
}

impl From<ConfigBody> for SubCheckConfig {
    fn from(body: ConfigBody) -> Self {
        Self {
            endpoint: body.endpoint.filter(|e| !e.trim().is_empty()),
            allow_reads: body.allow_reads,
            allow_deletes: body.allow_deletes,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CacheStatsResponse {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub hit_rate: f64,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            entries: stats.entries,
            hits: stats.hits,
            misses: stats.misses,
            expirations: stats.expirations,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}
