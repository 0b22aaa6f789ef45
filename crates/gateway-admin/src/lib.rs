//! Read-only health, usage, and cache aggregate views (design §4.8,
//! component C8), consumed directly by the HTTP layer's admin endpoints.

use gateway_cache::{CacheStats, ResponseCache, CACHE_HIT_COUNTER_KEY, CACHE_MISS_COUNTER_KEY};
use gateway_core::{GatewayError, KvStore};
use gateway_cost::{CostTracker, UsageCounters, UsageSummary};
use gateway_providers::ProviderRegistry;
use std::sync::Arc;

/// Coarse liveness classification (design §4.8: "healthy iff KV ping()
/// succeeds and at least one provider binding is configured").
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Liveness report with a per-component breakdown for the degraded case.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub kv_reachable: bool,
    pub providers_registered: bool,
}

/// Cache hit/miss ratio plus the underlying [`CacheStats`] footprint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStatsReport {
    pub total_entries: u64,
    pub configured_ttl_s: u64,
    pub hits: i64,
    pub misses: i64,
    pub hit_ratio: f64,
}

/// Aggregate of per-user and per-model usage plus cache stats
/// (design §4.8, "Summary").
#[derive(Debug, Clone, serde::Serialize)]
pub struct AdminSummary {
    pub usage: UsageSummary,
    pub cache: CacheStatsReport,
}

/// Composes the other components' read-only state into the views the HTTP
/// layer's `/v1/health`, `/v1/usage/{user}`, `/v1/cache/stats`, and
/// `/v1/admin/summary` handlers serve directly.
pub struct AdminViews {
    kv: Arc<dyn KvStore>,
    cache: Arc<ResponseCache>,
    cost: Arc<CostTracker>,
    registry: Arc<ProviderRegistry>,
}

impl AdminViews {
    pub fn new(
        kv: Arc<dyn KvStore>,
        cache: Arc<ResponseCache>,
        cost: Arc<CostTracker>,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        Self {
            kv,
            cache,
            cost,
            registry,
        }
    }

    /// `healthy` iff the KV store responds and at least one provider is
    /// registered; otherwise `degraded` with the component breakdown.
    pub async fn health(&self) -> HealthReport {
        let kv_reachable = self.kv.ping().await;
        let providers_registered = self.registry.has_any_binding();
        let status = if kv_reachable && providers_registered {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };
        HealthReport {
            status,
            kv_reachable,
            providers_registered,
        }
    }

    /// `{requests, tokens, cost}` for `user_id`.
    pub async fn usage_for(&self, user_id: &str) -> Result<UsageCounters, GatewayError> {
        self.cost.usage_for(user_id).await
    }

    /// The cache's raw footprint, independent of hit/miss counters.
    pub async fn cache_raw_stats(&self) -> Result<CacheStats, GatewayError> {
        self.cache.stats().await
    }

    /// The cache's footprint plus the hit/miss ratio the orchestrator
    /// tracks in `stats:cache:{hits|misses}`.
    pub async fn cache_stats(&self) -> Result<CacheStatsReport, GatewayError> {
        let stats = self.cache.stats().await?;
        let hits = self.kv.peek_counter(CACHE_HIT_COUNTER_KEY).await?;
        let misses = self.kv.peek_counter(CACHE_MISS_COUNTER_KEY).await?;
        let total = hits + misses;
        let hit_ratio = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };
        Ok(CacheStatsReport {
            total_entries: stats.total_entries,
            configured_ttl_s: stats.configured_ttl_s,
            hits,
            misses,
            hit_ratio,
        })
    }

    /// Aggregate of per-user/per-model usage and cache stats.
    pub async fn summary(&self) -> Result<AdminSummary, GatewayError> {
        let usage = self.cost.summary().await?;
        let cache = self.cache_stats().await?;
        Ok(AdminSummary { usage, cache })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gateway_cache::CacheConfig;
    use gateway_core::InMemoryKv;
    use gateway_providers::ProviderBinding;

    /// A `KvStore` that fails every call (`ping` included), for S6's
    /// "`/v1/health` reports degraded" assertion under a KV outage.
    struct FailingKv;

    #[async_trait]
    impl KvStore for FailingKv {
        async fn incr_with_expiry(
            &self,
            _key: &str,
            _ttl: std::time::Duration,
        ) -> Result<i64, GatewayError> {
            Err(GatewayError::KvUnavailable("simulated outage".to_string()))
        }
        async fn get(&self, _key: &str) -> Result<Option<String>, GatewayError> {
            Err(GatewayError::KvUnavailable("simulated outage".to_string()))
        }
        async fn set_with_ttl(
            &self,
            _key: &str,
            _value: String,
            _ttl: std::time::Duration,
        ) -> Result<(), GatewayError> {
            Err(GatewayError::KvUnavailable("simulated outage".to_string()))
        }
        async fn incr_by(&self, _key: &str, _delta: i64) -> Result<i64, GatewayError> {
            Err(GatewayError::KvUnavailable("simulated outage".to_string()))
        }
        async fn set(&self, _key: &str, _value: String) -> Result<(), GatewayError> {
            Err(GatewayError::KvUnavailable("simulated outage".to_string()))
        }
        async fn delete(&self, _pattern: &str) -> Result<u64, GatewayError> {
            Err(GatewayError::KvUnavailable("simulated outage".to_string()))
        }
        async fn scan(&self, _pattern: &str) -> Result<Vec<String>, GatewayError> {
            Err(GatewayError::KvUnavailable("simulated outage".to_string()))
        }
        async fn ping(&self) -> bool {
            false
        }
        async fn ttl_seconds(&self, _key: &str) -> Result<u64, GatewayError> {
            Err(GatewayError::KvUnavailable("simulated outage".to_string()))
        }
    }

    async fn views_with_registered_provider() -> AdminViews {
        use async_trait::async_trait;
        use gateway_providers::{ProviderClient, ProviderCompletion};

        struct Stub;
        #[async_trait]
        impl ProviderClient for Stub {
            async fn complete(
                &self,
                _: &str,
                _: f64,
                _: u32,
            ) -> Result<ProviderCompletion, GatewayError> {
                unimplemented!("not exercised in these tests")
            }
        }

        let kv: Arc<dyn KvStore> = Arc::new(InMemoryKv::new());
        let cache = Arc::new(ResponseCache::new(Arc::clone(&kv), CacheConfig::default()));
        let cost = Arc::new(CostTracker::new(Arc::clone(&kv)));
        let mut registry = ProviderRegistry::new();
        registry.register(
            "gpt-3.5-turbo",
            ProviderBinding {
                provider_tag: "openai".to_string(),
                native_model_name: "gpt-3.5-turbo".to_string(),
                price_per_token_usd: 0.000002,
                client: Arc::new(Stub),
            },
        );

        AdminViews::new(kv, cache, cost, Arc::new(registry))
    }

    #[tokio::test]
    async fn health_is_healthy_with_kv_and_a_provider() {
        let views = views_with_registered_provider().await;
        let report = views.health().await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert!(report.kv_reachable);
        assert!(report.providers_registered);
    }

    #[tokio::test]
    async fn health_is_degraded_with_no_providers() {
        let kv: Arc<dyn KvStore> = Arc::new(InMemoryKv::new());
        let cache = Arc::new(ResponseCache::new(Arc::clone(&kv), CacheConfig::default()));
        let cost = Arc::new(CostTracker::new(Arc::clone(&kv)));
        let views = AdminViews::new(kv, cache, cost, Arc::new(ProviderRegistry::new()));

        let report = views.health().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(!report.providers_registered);
    }

    #[tokio::test]
    async fn health_is_degraded_when_kv_is_unreachable() {
        // S6: KV outage -> /v1/health reports degraded even with a provider
        // registered.
        let kv: Arc<dyn KvStore> = Arc::new(FailingKv);
        let cache = Arc::new(ResponseCache::new(Arc::clone(&kv), CacheConfig::default()));
        let cost = Arc::new(CostTracker::new(Arc::clone(&kv)));
        let mut registry = ProviderRegistry::new();
        registry.register(
            "gpt-3.5-turbo",
            ProviderBinding {
                provider_tag: "openai".to_string(),
                native_model_name: "gpt-3.5-turbo".to_string(),
                price_per_token_usd: 0.000002,
                client: Arc::new({
                    use gateway_providers::{ProviderClient, ProviderCompletion};
                    struct Stub;
                    #[async_trait]
                    impl ProviderClient for Stub {
                        async fn complete(
                            &self,
                            _: &str,
                            _: f64,
                            _: u32,
                        ) -> Result<ProviderCompletion, GatewayError> {
                            unimplemented!("not exercised in this test")
                        }
                    }
                    Stub
                }),
            },
        );
        let views = AdminViews::new(kv, cache, cost, Arc::new(registry));

        let report = views.health().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(!report.kv_reachable);
        assert!(report.providers_registered);
    }

    #[tokio::test]
    async fn cache_stats_computes_hit_ratio() {
        let views = views_with_registered_provider().await;
        views.kv.incr_by(CACHE_HIT_COUNTER_KEY, 3).await.unwrap();
        views.kv.incr_by(CACHE_MISS_COUNTER_KEY, 1).await.unwrap();

        let stats = views.cache_stats().await.unwrap();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_ratio - 0.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn cache_stats_ratio_is_zero_with_no_traffic() {
        let views = views_with_registered_provider().await;
        let stats = views.cache_stats().await.unwrap();
        assert_eq!(stats.hit_ratio, 0.0);
    }

    #[tokio::test]
    async fn summary_includes_usage_and_cache() {
        let views = views_with_registered_provider().await;
        views
            .cost
            .record("alice", "gpt-3.5-turbo", 10, 10, gateway_core::Cost::from_micros(5))
            .await;

        let summary = views.summary().await.unwrap();
        assert_eq!(summary.usage.by_user.len(), 1);
        assert_eq!(summary.cache.total_entries, 0);
    }
}
