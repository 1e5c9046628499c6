//! Bearer-token authentication seam
//!
//! Token validation (signature, issuer, audience, expiry) belongs to an
//! existing token library plugged in through [`TokenValidator`]. The gate
//! only needs the validated subject.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use std::collections::HashMap;
use thiserror::Error;

/// Claims the gate relies on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject identifier, used verbatim as the verdict cache key
    pub sub: String,
}

/// Authentication failures, all answered with 401
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Authorization header is not a bearer token")]
    MalformedHeader,

    #[error("Token rejected: {0}")]
    InvalidToken(String),
}

/// Validates bearer tokens and extracts their claims
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<Claims, AuthError>;
}

/// Extract the token from `Authorization: Bearer <token>`
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedHeader)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }

    Ok(token)
}

/// Validator backed by a fixed table of opaque tokens
///
/// Meant for demos and tests; production deployments plug in a real token
/// library instead.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenValidator {
    tokens: HashMap<String, String>,
}

impl StaticTokenValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as proof of identity for `subject`
    pub fn with_token(mut self, subject: impl Into<String>, token: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), subject.into());
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl FromIterator<(String, String)> for StaticTokenValidator {
    /// Build from `(subject, token)` pairs
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |validator, (subject, token)| {
                validator.with_token(subject, token)
            })
    }
}

#[async_trait]
impl TokenValidator for StaticTokenValidator {
    async fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        match self.tokens.get(token) {
            Some(sub) if !sub.is_empty() => Ok(Claims { sub: sub.clone() }),
            Some(_) => Err(AuthError::InvalidToken("empty subject".to_string())),
            None => Err(AuthError::InvalidToken("unknown token".to_string())),
        }
    }
}

/// Parse a `SUBJECT=TOKEN` binding from the command line
pub fn parse_token_binding(raw: &str) -> Result<(String, String), String> {
    let (subject, token) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SUBJECT=TOKEN, got '{raw}'"))?;

    if subject.is_empty() || token.is_empty() {
        return Err(format!("subject and token must be non-empty in '{raw}'"));
    }

    Ok((subject.to_string(), token.to_string()))
}
