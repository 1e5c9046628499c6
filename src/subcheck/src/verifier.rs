//! Client for the external subject verifier
//!
//! The verifier is a black box: a `GET <endpoint>?subject=<subject>` whose
//! status code is the only thing that matters. The body is ignored.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{Result, SubCheckError};

/// Query parameter carrying the subject
pub const SUBJECT_PARAM: &str = "subject";

/// Transport to the external verifier, injectable for testing
#[async_trait]
pub trait SubjectVerifier: Send + Sync {
    /// Ask the verifier about `subject` and return the HTTP status code
    ///
    /// Transport failures and timeouts are errors, never a status.
    async fn check(&self, endpoint: &str, subject: &str) -> Result<u16>;
}

/// Verifier client timeouts
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Whole-request timeout
    pub request_timeout: Duration,

    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(3),
        }
    }
}

/// HTTP verifier client
#[derive(Debug, Clone)]
pub struct HttpVerifier {
    http: reqwest::Client,
    config: VerifierConfig,
}

impl HttpVerifier {
    /// Create a verifier client with the given timeouts
    pub fn new(config: VerifierConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            // Only the verifier's own status counts
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| SubCheckError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }
}

/// Build `<endpoint>?subject=<subject>`, keeping any query already present
pub fn check_url(endpoint: &str, subject: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint.trim())
        .map_err(|e| SubCheckError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
    url.query_pairs_mut().append_pair(SUBJECT_PARAM, subject);
    Ok(url)
}

#[async_trait]
impl SubjectVerifier for HttpVerifier {
    async fn check(&self, endpoint: &str, subject: &str) -> Result<u16> {
        let url = check_url(endpoint, subject)?;

        let response = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SubCheckError::VerifierTimeout(self.config.request_timeout)
            } else {
                SubCheckError::VerifierUnreachable(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        debug!(subject, status, "Verifier responded");
        Ok(status)
    }
}
