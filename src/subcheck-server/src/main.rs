//! Subject Check Gate
//!
//! Serves a sample protected resource behind bearer authentication and the
//! cached external subject check.
//!
//! # Usage
//!
//! ```bash
//! # Check disabled: every authenticated request passes
//! cargo run -p subcheck-server -- --token me=secret-token
//!
//! # Delegate to a verifier, let reads through unchecked
//! SUB_CHECK_URL=http://verifier.local/check ALLOW_READS=true \
//!     cargo run -p subcheck-server -- --token me=secret-token
//!
//! # Enable debug logging
//! RUST_LOG=debug cargo run -p subcheck-server
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Logging filter
//! - `SUB_CHECK_URL`: Verifier endpoint (unset disables the check)
//! - `ALLOW_READS` / `ALLOW_DELETES`: Bypass flags for GET / DELETE
//! - `SUBCHECK_TOKENS`: Comma-separated `SUBJECT=TOKEN` bindings
//! - `SUBCHECK_ADMIN_KEY`: Key required on `/admin/*`

use anyhow::Result;
use clap::{ArgAction, Parser};
use std::sync::Arc;
use std::time::Duration;
use subcheck::config::parse_flag;
use subcheck::{
    EngineConfig, HttpVerifier, SharedConfig, SubCheckConfig, SubjectCache, SubjectCheckEngine,
    VerifierConfig,
};
use subcheck_server::{auth::parse_token_binding, AppState, ServerBuilder, StaticTokenValidator};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Subject Check Gate
#[derive(Parser, Debug)]
#[command(
    name = "subcheck-server",
    version,
    about = "Bearer-token gate with a cached external subject check",
    long_about = None
)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "SUBCHECK_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short = 'p', long, default_value = "8080", env = "SUBCHECK_PORT")]
    port: u16,

    /// Request timeout in seconds
    #[arg(long, default_value = "30", env = "SUBCHECK_REQUEST_TIMEOUT")]
    request_timeout: u64,

    /// Verifier endpoint; leave unset to disable the subject check
    #[arg(long, env = "SUB_CHECK_URL")]
    sub_check_url: Option<String>,

    /// Skip the subject check for GET requests (1/0, true/false, yes/no, on/off)
    #[arg(
        long,
        env = "ALLOW_READS",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = flag_value
    )]
    allow_reads: bool,

    /// Skip the subject check for DELETE requests (1/0, true/false, yes/no, on/off)
    #[arg(
        long,
        env = "ALLOW_DELETES",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = flag_value
    )]
    allow_deletes: bool,

    /// How long a verifier verdict is reused, in seconds
    #[arg(long, default_value = "3600", env = "SUBCHECK_CACHE_TTL")]
    cache_ttl_secs: u64,

    /// Verifier request timeout in seconds
    #[arg(long, default_value = "10", env = "SUBCHECK_VERIFIER_TIMEOUT")]
    verifier_timeout_secs: u64,

    /// Accepted bearer token, as SUBJECT=TOKEN (repeatable)
    #[arg(
        long = "token",
        value_parser = parse_token_binding,
        env = "SUBCHECK_TOKENS",
        value_delimiter = ','
    )]
    tokens: Vec<(String, String)>,

    /// Key required in the x-admin-key header on admin routes
    #[arg(long, env = "SUBCHECK_ADMIN_KEY")]
    admin_key: Option<String>,

    /// Disable engine metrics
    #[arg(long)]
    no_metrics: bool,

    /// Enable JSON logging format
    #[arg(long, env = "SUBCHECK_JSON_LOGS")]
    json_logs: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

/// Boolean flag values, read the same way the library reads its environment
fn flag_value(raw: &str) -> std::result::Result<bool, String> {
    parse_flag("flag", raw).map_err(|e| e.to_string())
}

impl Args {
    fn subcheck_config(&self) -> SubCheckConfig {
        SubCheckConfig {
            endpoint: self.sub_check_url.clone().filter(|e| !e.trim().is_empty()),
            allow_reads: self.allow_reads,
            allow_deletes: self.allow_deletes,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args);

    info!("Starting Subject Check Gate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let initial = args.subcheck_config();
    match initial.active_endpoint() {
        Some(endpoint) => info!(endpoint, "Subject check enabled"),
        None => warn!("SUB_CHECK_URL not set; subject check disabled"),
    }
    info!(
        allow_reads = initial.allow_reads,
        allow_deletes = initial.allow_deletes,
        "Bypass flags"
    );

    let config = SharedConfig::new(initial);
    let verifier = HttpVerifier::new(VerifierConfig {
        request_timeout: Duration::from_secs(args.verifier_timeout_secs),
        ..Default::default()
    })?;

    let engine = SubjectCheckEngine::new(
        EngineConfig {
            cache_ttl: Duration::from_secs(args.cache_ttl_secs),
            enable_metrics: !args.no_metrics,
        },
        Arc::new(config.clone()),
        Arc::new(SubjectCache::new()),
        Arc::new(verifier),
    );

    let validator: StaticTokenValidator = args.tokens.iter().cloned().collect();
    if validator.is_empty() {
        warn!("No bearer tokens configured; every protected request will be rejected");
    }

    let state = AppState::new(engine, config, Arc::new(validator))
        .with_admin_key(args.admin_key.clone());

    let server = ServerBuilder::new()
        .host(&args.host)
        .port(args.port)
        .request_timeout(args.request_timeout)
        .state(state)
        .build()?;

    if let Err(e) = server.run().await {
        error!("Server error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize tracing/logging subsystem
fn init_tracing(args: &Args) {
    let log_level = args.log_level.parse::<tracing::Level>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', using 'info'", args.log_level);
        tracing::Level::INFO
    });

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let deps = if log_level <= tracing::Level::DEBUG {
            "info"
        } else {
            "warn"
        };
        format!(
            "subcheck={log_level},subcheck_server={log_level},tower_http={deps},axum={deps}"
        )
        .into()
    });

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}
