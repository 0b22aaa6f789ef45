//! Sequences the other components for each request and emits the
//! canonical response envelope (design §4.7, component C7).

use gateway_cache::{ResponseCache, CACHE_HIT_COUNTER_KEY, CACHE_MISS_COUNTER_KEY};
use gateway_core::model::{CompletionResult, Request};
use gateway_core::{GatewayError, KvStore};
use gateway_cost::CostTracker;
use gateway_providers::ProviderRegistry;
use gateway_ratelimiter::{Admission, RateLimiter};
use gateway_retry::{Classification, RetryExecutor, RetryOutcome};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The steps a request moves through, used only for structured logging; the
/// gateway commits no side effects for `Failed` beyond the log event itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Validated,
    CacheHit,
    Admitted,
    Dispatched,
    Completed,
    Failed,
}

/// Tuning knobs for [`GatewayOrchestrator`].
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    /// Total wall-clock budget per request, propagated to the retry executor
    /// (design §5, default 120s).
    pub default_deadline: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_deadline: Duration::from_secs(120),
        }
    }
}

/// Wires the cache, rate limiter, provider registry, retry executor, and
/// cost tracker into the single per-request sequence from design §4.7.
pub struct GatewayOrchestrator {
    kv: Arc<dyn KvStore>,
    cache: Arc<ResponseCache>,
    rate_limiter: RateLimiter,
    registry: Arc<ProviderRegistry>,
    retry: RetryExecutor,
    cost: CostTracker,
    config: OrchestratorConfig,
}

impl GatewayOrchestrator {
    pub fn new(
        kv: Arc<dyn KvStore>,
        cache: Arc<ResponseCache>,
        rate_limiter: RateLimiter,
        registry: Arc<ProviderRegistry>,
        retry: RetryExecutor,
        cost: CostTracker,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            kv,
            cache,
            rate_limiter,
            registry,
            retry,
            cost,
            config,
        }
    }

    pub fn registry(&self) -> Arc<ProviderRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn cache(&self) -> Arc<ResponseCache> {
        Arc::clone(&self.cache)
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn cost(&self) -> CostTracker {
        self.cost.clone()
    }

    pub fn kv(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    /// Runs the full 8-step pipeline for one request.
    pub async fn handle(&self, req: Request) -> Result<CompletionResult, GatewayError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let t0 = Instant::now();
        let user_id = req.user_id.clone();
        let mut state = RequestState::Received;
        tracing::info!(%request_id, %user_id, model = %req.model, ?state, event = "request_received");

        if let Err(msg) = req.validate() {
            self.log_failed(&request_id, &user_id, &msg);
            return Err(GatewayError::InvalidInput(msg));
        }
        state = RequestState::Validated;

        match self.cache.lookup(&req, &request_id).await {
            Ok(Some(mut hit)) => {
                state = RequestState::CacheHit;
                let _ = self.kv.incr_by(CACHE_HIT_COUNTER_KEY, 1).await;
                hit.latency_ms = elapsed_ms(t0);
                tracing::info!(%request_id, %user_id, ?state, event = "cache_hit");
                state = RequestState::Completed;
                tracing::info!(%request_id, %user_id, ?state, event = "response_generated", cached = true);
                return Ok(hit);
            }
            Ok(None) => {
                let _ = self.kv.incr_by(CACHE_MISS_COUNTER_KEY, 1).await;
                tracing::info!(%request_id, %user_id, ?state, event = "cache_miss");
            }
            Err(e) => {
                tracing::warn!(%request_id, %user_id, ?state, error = %e, "cache lookup failed, treating as miss");
            }
        }

        match self.rate_limiter.check(&user_id).await {
            Admission::Allowed => {
                state = RequestState::Admitted;
            }
            Admission::Denied { reason, retry_after_s } => {
                tracing::info!(
                    %request_id,
                    %user_id,
                    ?state,
                    reason,
                    retry_after_s,
                    event = "rate_limit_exceeded"
                );
                self.log_failed(&request_id, &user_id, reason);
                return Err(GatewayError::RateLimitExceeded { retry_after_s });
            }
        }

        let binding = match self.registry.resolve(&req.model) {
            Ok(binding) => binding,
            Err(e) => {
                self.log_failed(&request_id, &user_id, &e.to_string());
                return Err(e);
            }
        };

        state = RequestState::Dispatched;
        let deadline = t0 + self.config.default_deadline;
        tracing::info!(%request_id, %user_id, model = %req.model, ?state, event = "provider_call");

        let dispatch = self
            .retry
            .run(
                deadline,
                || binding.client.complete(&req.prompt, req.temperature, req.max_tokens),
                |e: &GatewayError| {
                    if e.is_retryable() {
                        Classification::Retryable
                    } else {
                        Classification::Terminal
                    }
                },
            )
            .await;

        let completion = match dispatch {
            Ok(completion) => completion,
            Err(RetryOutcome { error, attempts }) => {
                tracing::warn!(
                    %request_id,
                    %user_id,
                    ?state,
                    attempts,
                    error = %error,
                    event = "provider_failure"
                );
                self.log_failed(&request_id, &user_id, &error.to_string());
                return Err(error);
            }
        };

        let prompt_tokens = completion.prompt_tokens.unwrap_or(0);
        let completion_tokens = completion.completion_tokens.unwrap_or(0);
        let total_tokens = prompt_tokens + completion_tokens;
        let cost_usd = self.cost.compute(total_tokens, binding.price_per_token_usd);

        let cost = self.cost.clone();
        let (user_for_cost, model_for_cost) = (user_id.clone(), req.model.clone());
        tokio::spawn(async move {
            cost.record(&user_for_cost, &model_for_cost, prompt_tokens, completion_tokens, cost_usd)
                .await;
        });
        tracing::info!(%request_id, %user_id, ?state, event = "cost_tracked", cost_usd = cost_usd.as_f64());

        let result = CompletionResult::new(
            completion.text,
            req.model.clone(),
            prompt_tokens,
            completion_tokens,
            cost_usd,
            request_id.clone(),
            false,
            elapsed_ms(t0),
        );

        self.cache.store(&req, &result).await;
        state = RequestState::Completed;
        tracing::info!(%request_id, %user_id, ?state, event = "response_generated", cached = false);

        Ok(result)
    }

    fn log_failed(&self, request_id: &str, user_id: &str, reason: &str) {
        let state = RequestState::Failed;
        tracing::warn!(request_id, user_id, ?state, reason, event = "request_failed");
    }
}

fn elapsed_ms(t0: Instant) -> f64 {
    t0.elapsed().as_secs_f64() * 1000.0
}
