//! Decision types returned by the subject-check engine

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cache::Verdict;

/// Result of evaluating a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Request may proceed
    Allow,
    /// Verifier rejected the subject
    Deny,
    /// Verifier could not be consulted
    Error,
}

impl Outcome {
    /// HTTP status the gate answers with
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Allow => 200,
            Outcome::Deny => 402,
            Outcome::Error => 500,
        }
    }
}

impl From<Verdict> for Outcome {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Allowed => Outcome::Allow,
            Verdict::Denied => Outcome::Deny,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Allow => write!(f, "allow"),
            Outcome::Deny => write!(f, "deny"),
            Outcome::Error => write!(f, "error"),
        }
    }
}

/// Why the engine reached its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionReason {
    /// GET request with `allow_reads` set
    ReadsAllowed,

    /// DELETE request with `allow_deletes` set
    DeletesAllowed,

    /// No verifier endpoint configured
    CheckDisabled,

    /// Fresh verdict reused from the cache
    Cached { verdict: Verdict },

    /// Verifier answered with `status`
    Verified { status: u16 },

    /// Verifier call failed before producing a status
    VerifierFailed { error: String },
}

impl DecisionReason {
    /// Whether the external check was skipped entirely
    pub fn is_bypass(&self) -> bool {
        matches!(
            self,
            DecisionReason::ReadsAllowed
                | DecisionReason::DeletesAllowed
                | DecisionReason::CheckDisabled
        )
    }
}

/// Subject-check decision with its reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub outcome: Outcome,
    pub reason: DecisionReason,
}

impl Decision {
    /// Allow without consulting the verifier
    pub fn bypass(reason: DecisionReason) -> Self {
        Self {
            outcome: Outcome::Allow,
            reason,
        }
    }

    /// Reuse a cached verdict
    pub fn cached(verdict: Verdict) -> Self {
        Self {
            outcome: verdict.into(),
            reason: DecisionReason::Cached { verdict },
        }
    }

    /// Interpret a verifier status code: 200 allows, anything else denies
    pub fn from_status(status: u16) -> Self {
        let outcome = if status == 200 {
            Outcome::Allow
        } else {
            Outcome::Deny
        };
        Self {
            outcome,
            reason: DecisionReason::Verified { status },
        }
    }

    /// Verifier transport failure
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Error,
            reason: DecisionReason::VerifierFailed {
                error: error.into(),
            },
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.outcome == Outcome::Allow
    }

    /// Verdict worth caching, if any; errors are never cached
    pub fn verdict(&self) -> Option<Verdict> {
        match self.outcome {
            Outcome::Allow => Some(Verdict::Allowed),
            Outcome::Deny => Some(Verdict::Denied),
            Outcome::Error => None,
        }
    }
}
