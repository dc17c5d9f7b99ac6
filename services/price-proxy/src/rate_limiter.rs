//! Per-client daily request limiting
//!
//! Counters live in process memory and are keyed by client identity and
//! UTC calendar day. Every running instance keeps its own counters, so with
//! N instances a client can be admitted up to N times the nominal limit.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;

/// Source of the current UTC calendar day
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall-clock UTC day
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Clock pinned to a day until moved explicitly
#[derive(Debug)]
pub struct ManualClock {
    day: RwLock<NaiveDate>,
}

impl ManualClock {
    #[must_use]
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day: RwLock::new(day),
        }
    }

    pub fn set(&self, day: NaiveDate) {
        *self.day.write() = day;
    }

    /// Move forward by whole days
    pub fn advance_days(&self, days: u64) {
        let mut day = self.day.write();
        *day = *day + chrono::Days::new(days);
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.day.read()
    }
}

/// Outcome of a single limiter check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Count for the client's bucket after this check
    pub current_count: u32,
    /// Configured daily limit
    pub limit: u32,
}

impl RateDecision {
    /// Zero-count decision used when the limiter was never consulted
    #[must_use]
    pub const fn placeholder(limit: u32) -> Self {
        Self {
            allowed: true,
            current_count: 0,
            limit,
        }
    }

    /// `max(0, limit - current_count)`
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.current_count)
    }
}

/// Request limiter consulted once per proxied request
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count a request from `client_identity` and decide whether it may proceed
    async fn check(&self, client_identity: &str) -> RateDecision;

    /// Configured daily limit
    fn limit(&self) -> u32;
}

/// Counter bucket key: `identity|YYYY-MM-DD`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub identity: String,
    pub day: NaiveDate,
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.identity, self.day)
    }
}

/// In-memory limiter that resets at each UTC midnight
pub struct DailyRateLimiter {
    buckets: DashMap<BucketKey, u32>,
    limit: u32,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for DailyRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DailyRateLimiter")
            .field("limit", &self.limit)
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

impl DailyRateLimiter {
    /// Create a limiter on the system clock
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a limiter on an injected clock
    #[must_use]
    pub fn with_clock(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: DashMap::new(),
            limit: config.daily_limit,
            clock,
        }
    }

    /// Count a request. The read and increment happen under the bucket's
    /// shard lock, so concurrent callers cannot both take the last slot.
    pub fn check_now(&self, client_identity: &str) -> RateDecision {
        let key = BucketKey {
            identity: client_identity.to_string(),
            day: self.clock.today(),
        };

        let mut count = self.buckets.entry(key.clone()).or_insert(0);
        if *count >= self.limit {
            warn!(bucket = %key, count = *count, "Daily rate limit exceeded");
            return RateDecision {
                allowed: false,
                current_count: *count,
                limit: self.limit,
            };
        }

        *count += 1;
        debug!(bucket = %key, count = *count, "Rate limit check passed");
        RateDecision {
            allowed: true,
            current_count: *count,
            limit: self.limit,
        }
    }

    /// Drop buckets from earlier days; they can never be consulted again
    pub fn purge_expired(&self) -> usize {
        let today = self.clock.today();
        let before = self.buckets.len();
        self.buckets.retain(|key, _| key.day >= today);
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            debug!(removed, "Purged stale rate limit buckets");
        }
        removed
    }

    /// Get current rate limiting statistics
    pub fn stats(&self) -> RateLimitStats {
        let today = self.clock.today();
        let active_clients_today = self
            .buckets
            .iter()
            .filter(|entry| entry.key().day == today)
            .count();

        RateLimitStats {
            daily_limit: self.limit,
            tracked_buckets: self.buckets.len(),
            active_clients_today,
            day: today.to_string(),
        }
    }
}

#[async_trait]
impl RateLimiter for DailyRateLimiter {
    async fn check(&self, client_identity: &str) -> RateDecision {
        self.check_now(client_identity)
    }

    fn limit(&self) -> u32 {
        self.limit
    }
}

/// Rate limiting statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitStats {
    pub daily_limit: u32,
    pub tracked_buckets: usize,
    pub active_clients_today: usize,
    pub day: String,
}
