//! The key-value adapter contract (design §4.1).

use crate::error::GatewayError;
use async_trait::async_trait;
use std::time::Duration;

/// Thin, typed facade over the distributed key-value store.
///
/// Every method fails with [`GatewayError::KvUnavailable`] when the store is
/// unreachable; it is up to the caller to decide whether to fail open or
/// fail closed.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Atomically increments `key`, setting `ttl` as its expiry the first
    /// time the counter is created (i.e. when the returned value is `1`),
    /// and leaving any existing TTL untouched on subsequent increments.
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, GatewayError>;

    /// Fetches the string value at `key`, or `None` if it doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError>;

    /// Sets `key` to `value` with the given TTL.
    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), GatewayError>;

    /// Increments `key` by `delta` with no expiry, creating it at `delta` if
    /// absent. Used for usage counters (design §4.6), which accumulate for
    /// the lifetime of the deployment rather than a fixed window.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, GatewayError>;

    /// Sets `key` to `value` with no expiry.
    async fn set(&self, key: &str, value: String) -> Result<(), GatewayError>;

    /// Deletes every key matching `pattern`, returning the number removed.
    async fn delete(&self, pattern: &str) -> Result<u64, GatewayError>;

    /// Returns every key matching `pattern`.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, GatewayError>;

    /// Returns `true` if the store responds to a liveness probe.
    async fn ping(&self) -> bool;

    /// Returns the current integer value of a counter key, or `0` if unset.
    ///
    /// Used by read-only admin views that must not mutate the counter they
    /// inspect.
    async fn peek_counter(&self, key: &str) -> Result<i64, GatewayError> {
        match self.get(key).await? {
            Some(s) => Ok(s.parse().unwrap_or(0)),
            None => Ok(0),
        }
    }

    /// Returns the remaining TTL of `key`, in seconds, or `0` if the key has
    /// no TTL or doesn't exist.
    async fn ttl_seconds(&self, key: &str) -> Result<u64, GatewayError>;
}
