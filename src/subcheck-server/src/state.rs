use std::sync::Arc;
use std::time::Instant;
use subcheck::{SharedConfig, SubjectCheckEngine};

use crate::auth::TokenValidator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Subject-check decision engine
    pub engine: Arc<SubjectCheckEngine>,

    /// Live configuration handle; the engine reads the same state
    pub config: SharedConfig,

    /// Bearer token validator
    pub validator: Arc<dyn TokenValidator>,

    /// Key required on admin routes, if any
    pub admin_key: Option<String>,

    /// Server start time for uptime calculation
    pub start_time: Instant,

    pub version: String,
}

impl AppState {
    /// `engine` must have been built on `config` for admin updates to apply
    pub fn new(
        engine: SubjectCheckEngine,
        config: SharedConfig,
        validator: Arc<dyn TokenValidator>,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            config,
            validator,
            admin_key: None,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Require `key` in the `x-admin-key` header on admin routes
    pub fn with_admin_key(mut self, key: Option<String>) -> Self {
        self.admin_key = key.filter(|k| !k.is_empty());
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
