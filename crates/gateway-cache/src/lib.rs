//! Deterministic-fingerprint response cache (design §4.3).
//!
//! Keys are a SHA-256 hex digest over the canonical `(prompt, model,
//! temperature, max_tokens)` string; `user_id` is deliberately excluded so
//! the cache deduplicates across users (design §9, "Cache key does not
//! include user").

use gateway_core::model::{CompletionResult, Request};
use gateway_core::KvStore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

const CACHE_PREFIX: &str = "cache:";

/// KV key the orchestrator increments on every cache hit (design §6, KV key
/// layout: `stats:cache:{hits|misses}`). Shared here so the admin views read
/// the same key the orchestrator writes.
pub const CACHE_HIT_COUNTER_KEY: &str = "stats:cache:hits";
/// KV key the orchestrator increments on every cache miss.
pub const CACHE_MISS_COUNTER_KEY: &str = "stats:cache:misses";

/// Aggregate, read-only view over the cache's KV footprint.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub total_entries: u64,
    pub configured_ttl_s: u64,
}

/// Configuration for [`ResponseCache`].
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Maps a request fingerprint to a previously computed [`CompletionResult`].
///
/// A pure key-value view: hit/miss bookkeeping lives with the orchestrator
/// (design §4.3, "the cache component remains a pure key-value view").
pub struct ResponseCache {
    kv: Arc<dyn KvStore>,
    config: CacheConfig,
}

impl ResponseCache {
    pub fn new(kv: Arc<dyn KvStore>, config: CacheConfig) -> Self {
        Self { kv, config }
    }

    /// Computes the fingerprint key for `req`, independent of `user_id`.
    pub fn fingerprint(req: &Request) -> String {
        let mut hasher = Sha256::new();
        hasher.update(req.fingerprint_input().as_bytes());
        format!("{CACHE_PREFIX}{:x}", hasher.finalize())
    }

    /// Looks up `req`'s fingerprint. On a hit, returns the stored result
    /// with `cached` set and `request_id` replaced by `new_request_id`; the
    /// TTL is left untouched (design §9, Open Question: no refresh-on-hit).
    pub async fn lookup(
        &self,
        req: &Request,
        new_request_id: &str,
    ) -> Result<Option<CompletionResult>, gateway_core::GatewayError> {
        let key = Self::fingerprint(req);
        let Some(raw) = self.kv.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<CompletionResult>(&raw) {
            Ok(mut result) => {
                result.cached = true;
                result.request_id = new_request_id.to_string();
                Ok(Some(result))
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to deserialize cache entry, treating as miss");
                Ok(None)
            }
        }
    }

    /// Stores `result` under `req`'s fingerprint. Failure is non-fatal and
    /// logged; cache writes only ever happen after a successful upstream
    /// call (design invariant: "failed calls never populate the cache").
    pub async fn store(&self, req: &Request, result: &CompletionResult) {
        let key = Self::fingerprint(req);
        let payload = match serde_json::to_string(result) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize completion result for caching");
                return;
            }
        };
        if let Err(e) = self.kv.set_with_ttl(&key, payload, self.config.ttl).await {
            tracing::warn!(error = %e, "failed to write cache entry");
        }
    }

    /// Deletes every cache entry, returning the number removed.
    pub async fn clear(&self) -> Result<u64, gateway_core::GatewayError> {
        self.kv.delete(&format!("{CACHE_PREFIX}*")).await
    }

    /// Read-only aggregate stats over the cache's current footprint.
    pub async fn stats(&self) -> Result<CacheStats, gateway_core::GatewayError> {
        let keys = self.kv.scan(&format!("{CACHE_PREFIX}*")).await?;
        Ok(CacheStats {
            total_entries: keys.len() as u64,
            configured_ttl_s: self.config.ttl.as_secs(),
        })
    }
}
