//! Error types for the subject-check gate

use thiserror::Error;

/// Subject-check errors
#[derive(Debug, Error)]
pub enum SubCheckError {
    /// Configuration value could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configured verifier endpoint is not a usable URL
    #[error("Invalid verifier endpoint: {0}")]
    InvalidEndpoint(String),

    /// Connection to the verifier failed
    #[error("Verifier unreachable: {0}")]
    VerifierUnreachable(String),

    /// Verifier did not answer within the request timeout
    #[error("Verifier timed out after {0:?}")]
    VerifierTimeout(std::time::Duration),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SubCheckError {
    /// Whether the error came from talking to the verifier
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SubCheckError::VerifierUnreachable(_) | SubCheckError::VerifierTimeout(_)
        )
    }
}

/// Result type for subject-check operations
pub type Result<T> = std::result::Result<T, SubCheckError>;
