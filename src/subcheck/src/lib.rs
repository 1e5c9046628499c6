//! # Subject-check authorization gate
//!
//! Adds a second, externally delegated check on top of bearer-token
//! authentication. Once a token is validated, the subject is sent to an
//! external verifier whose answer is cached per subject for a fixed TTL.
//!
//! ## Features
//!
//! - **Bypass flags** for reads (`GET`) and deletes (`DELETE`)
//! - **Opt-in check**: no endpoint configured means every request passes
//! - **TTL verdict cache** keyed by subject, lazily expired
//! - **Injectable collaborators**: configuration, clock, cache and verifier
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use subcheck::{
//!     EngineConfig, HttpVerifier, SharedConfig, SubCheckConfig, SubjectCache,
//!     SubjectCheckEngine, VerifierConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SharedConfig::new(SubCheckConfig::from_env()?);
//!     let engine = SubjectCheckEngine::new(
//!         EngineConfig::default(),
//!         Arc::new(config.clone()),
//!         Arc::new(SubjectCache::new()),
//!         Arc::new(HttpVerifier::new(VerifierConfig::default())?),
//!     );
//!
//!     let decision = engine.authorize(&http::Method::POST, "me").await;
//!     println!("{} -> {}", decision.outcome, decision.outcome.status_code());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod verifier;

// Re-export commonly used types
pub use cache::{CacheStats, SubjectCache, Verdict, VerdictCache};
pub use clock::{Clock, MockClock, SystemClock};
pub use config::{ConfigProvider, SharedConfig, SubCheckConfig};
pub use engine::{
    Decision, DecisionReason, EngineConfig, EngineMetrics, Outcome, SubjectCheckEngine,
    DEFAULT_CACHE_TTL,
};
pub use error::{Result, SubCheckError};
pub use verifier::{HttpVerifier, SubjectVerifier, VerifierConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
