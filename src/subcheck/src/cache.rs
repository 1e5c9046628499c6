//! Per-subject verdict cache with lazy TTL expiry

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::clock::{add_duration, Clock, SystemClock};

/// Cacheable result of an external subject check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Verifier answered 200
    Allowed,
    /// Verifier answered anything else
    Denied,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allowed => write!(f, "allowed"),
            Verdict::Denied => write!(f, "denied"),
        }
    }
}

/// Storage for verdicts keyed by subject
///
/// Implementations must tolerate concurrent `get`/`set` from many request
/// tasks. A stale entry must look exactly like a missing one.
pub trait VerdictCache: Send + Sync {
    /// Fresh verdict for `subject`, if any
    fn get(&self, subject: &str) -> Option<Verdict>;

    /// Insert or overwrite the verdict for `subject`, valid for `ttl` from now
    fn set(&self, subject: &str, verdict: Verdict, ttl: Duration);

    /// Drop every entry
    fn clear(&self);

    /// Number of stored entries, fresh or stale
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit/miss counters
    fn stats(&self) -> CacheStats;
}

/// Cached entry with TTL
#[derive(Debug, Clone)]
struct CachedVerdict {
    verdict: Verdict,
    recorded_at: DateTime<Utc>,
    ttl: Duration,
}

impl CachedVerdict {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < add_duration(self.recorded_at, self.ttl)
    }
}

/// In-memory verdict cache
///
/// Backed by a sharded `DashMap`, so unrelated subjects rarely contend and no
/// lock outlives a single map operation. Expiry is only evaluated on lookup;
/// there is no capacity bound or background sweep.
pub struct SubjectCache {
    entries: DashMap<String, CachedVerdict>,
    clock: Arc<dyn Clock>,
    stats: DashMap<&'static str, usize>,
}

impl SubjectCache {
    /// Create a cache on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a cache that reads time from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            stats: DashMap::new(),
        }
    }

    fn increment_stat(&self, key: &'static str) {
        *self.stats.entry(key).or_insert(0) += 1;
    }

    fn get_stat(&self, key: &'static str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

impl Default for SubjectCache {
    fn default() -> Self {
        Self::new()
    }
}

impl VerdictCache for SubjectCache {
    fn get(&self, subject: &str) -> Option<Verdict> {
        let now = self.clock.now();

        let fresh = match self.entries.get(subject) {
            Some(entry) => entry.is_fresh(now).then_some(entry.verdict),
            None => {
                self.increment_stat("misses");
                return None;
            }
        };

        match fresh {
            Some(verdict) => {
                self.increment_stat("hits");
                Some(verdict)
            }
            None => {
                // A concurrent `set` may have refreshed the entry meanwhile.
                self.entries.remove_if(subject, |_, entry| !entry.is_fresh(now));
                self.increment_stat("expirations");
                self.increment_stat("misses");
                trace!(subject, "Cached verdict expired");
                None
            }
        }
    }

    fn set(&self, subject: &str, verdict: Verdict, ttl: Duration) {
        let entry = CachedVerdict {
            verdict,
            recorded_at: self.clock.now(),
            ttl,
        };
        self.entries.insert(subject.to_string(), entry);
    }

    fn clear(&self) {
        self.entries.clear();
        self.stats.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            expirations: self.get_stat("expirations"),
            entries: self.entries.len(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
