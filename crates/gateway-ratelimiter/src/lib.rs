//! Per-user admission control (design §4.2).
//!
//! Two independent fixed windows — a 60 s window and a 3600 s window — are
//! tracked per user via [`gateway_core::KvStore::incr_with_expiry`]. A
//! request is admitted only if both post-increment counters are within
//! their limits. The simplicity of fixed windows is intentional: it accepts
//! some burst doubling at window boundaries in exchange for O(1) state and
//! exact TTL semantics the KV store provides natively.

use gateway_core::KvStore;
use std::sync::Arc;
use std::time::Duration;

const MINUTE_WINDOW: Duration = Duration::from_secs(60);
const HOUR_WINDOW: Duration = Duration::from_secs(3600);

/// The outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Allowed,
    Denied {
        reason: &'static str,
        retry_after_s: u64,
    },
}

/// A read-only snapshot of a user's current window counters (design §4.8,
/// "Rate-limit status").
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RateLimitStatus {
    pub minute_used: i64,
    pub minute_remaining: i64,
    pub minute_reset_s: u64,
    pub hour_used: i64,
    pub hour_remaining: i64,
    pub hour_reset_s: u64,
}

/// Configuration for [`RateLimiter`].
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    pub max_per_minute: u32,
    pub max_per_hour: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_per_minute: 10,
            max_per_hour: 100,
        }
    }
}

/// Builder for [`RateLimiterConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimiterConfigBuilder {
    config: RateLimiterConfig,
}

impl RateLimiterConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_per_minute(mut self, n: u32) -> Self {
        self.config.max_per_minute = n;
        self
    }

    pub fn max_per_hour(mut self, n: u32) -> Self {
        self.config.max_per_hour = n;
        self
    }

    pub fn build(self) -> RateLimiterConfig {
        self.config
    }
}

/// Admits or rejects requests for a given user against per-minute and
/// per-hour quotas, fixed-window, KV-backed.
///
/// Fails open on KV unavailability: the gateway prefers availability to
/// strict enforcement (design §4.2).
pub struct RateLimiter {
    kv: Arc<dyn KvStore>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    pub fn new(kv: Arc<dyn KvStore>, config: RateLimiterConfig) -> Self {
        Self { kv, config }
    }

    /// Checks and atomically records one admission attempt for `user_id`.
    ///
    /// Call this only on a cache miss — cache hits bypass admission control
    /// entirely (design §4.7, "do not consult the rate limiter").
    pub async fn check(&self, user_id: &str) -> Admission {
        let minute_key = format!("ratelimit:{user_id}:minute");
        let hour_key = format!("ratelimit:{user_id}:hour");

        let minute_count = match self.kv.incr_with_expiry(&minute_key, MINUTE_WINDOW).await {
            Ok(n) => n,
            Err(_) => return self.fail_open(user_id),
        };
        let hour_count = match self.kv.incr_with_expiry(&hour_key, HOUR_WINDOW).await {
            Ok(n) => n,
            Err(_) => return self.fail_open(user_id),
        };

        if minute_count > self.config.max_per_minute as i64 {
            let retry_after_s = self.kv.ttl_seconds(&minute_key).await.unwrap_or(60);
            return Admission::Denied {
                reason: "minute_quota_exceeded",
                retry_after_s: retry_after_s.max(1),
            };
        }
        if hour_count > self.config.max_per_hour as i64 {
            let retry_after_s = self.kv.ttl_seconds(&hour_key).await.unwrap_or(3600);
            return Admission::Denied {
                reason: "hour_quota_exceeded",
                retry_after_s: retry_after_s.max(1),
            };
        }

        Admission::Allowed
    }

    /// Reads `user_id`'s current window counters without incrementing them.
    pub async fn status(&self, user_id: &str) -> RateLimitStatus {
        let minute_key = format!("ratelimit:{user_id}:minute");
        let hour_key = format!("ratelimit:{user_id}:hour");

        let minute_used = self.kv.peek_counter(&minute_key).await.unwrap_or(0);
        let hour_used = self.kv.peek_counter(&hour_key).await.unwrap_or(0);
        let minute_reset_s = self.kv.ttl_seconds(&minute_key).await.unwrap_or(0);
        let hour_reset_s = self.kv.ttl_seconds(&hour_key).await.unwrap_or(0);

        RateLimitStatus {
            minute_used,
            minute_remaining: (self.config.max_per_minute as i64 - minute_used).max(0),
            minute_reset_s,
            hour_used,
            hour_remaining: (self.config.max_per_hour as i64 - hour_used).max(0),
            hour_reset_s,
        }
    }

    fn fail_open(&self, user_id: &str) -> Admission {
        tracing::warn!(user_id, event = "rate_limiter_fail_open", "key-value store unavailable, admitting request");
        Admission::Allowed
    }
}
