//! Per-call cost computation and per-user/per-model usage accounting
//! (design §4.6, component C6).

use gateway_core::{Cost, GatewayError, KvStore};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;

/// `{requests, tokens, cost}` for a single user or model, as read back from
/// the KV store's usage counters.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct UsageCounters {
    pub requests: i64,
    pub tokens: i64,
    pub cost_usd: Cost,
}

/// Per-user and per-model aggregates, as returned by [`CostTracker::summary`].
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct UsageSummary {
    pub by_user: Vec<(String, UsageCounters)>,
    pub by_model: Vec<(String, UsageCounters)>,
}

/// Computes per-call cost and accumulates usage totals in the KV store.
///
/// Counters never expire (design §4.6: "No expiry (until manual reset)");
/// only `record` mutates state, and it is best-effort — a KV failure here
/// is logged and swallowed rather than failing the request that already
/// has its completion in hand.
#[derive(Clone)]
pub struct CostTracker {
    kv: Arc<dyn KvStore>,
}

impl CostTracker {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// `cost_usd = total_tokens * price_per_token_usd`, rounded half-to-even
    /// to 6 decimals via `rust_decimal` rather than raw float arithmetic.
    pub fn compute(&self, total_tokens: u64, price_per_token_usd: f64) -> Cost {
        let tokens = Decimal::from(total_tokens);
        let price = Decimal::try_from(price_per_token_usd).unwrap_or(Decimal::ZERO);
        let raw = tokens * price;
        let rounded = raw.round_dp_with_strategy(6, RoundingStrategy::MidpointNearestEven);
        let micros = (rounded * Decimal::from(1_000_000)).round();
        Cost::from_micros(micros.to_i64().unwrap_or(0))
    }

    /// Accumulates `prompt_tokens + completion_tokens` requests/tokens/cost
    /// into both the per-user and per-model counters. Best-effort: logs and
    /// returns on the first KV failure rather than propagating it, since the
    /// completion has already been returned to the caller by this point.
    pub async fn record(
        &self,
        user_id: &str,
        model: &str,
        prompt_tokens: u64,
        completion_tokens: u64,
        cost_usd: Cost,
    ) {
        let total_tokens = prompt_tokens + completion_tokens;

        if let Err(e) = self
            .accumulate(&format!("usage:{user_id}:"), total_tokens, cost_usd)
            .await
        {
            tracing::warn!(error = %e, user_id, "cost_record_user_failed");
            return;
        }

        if let Err(e) = self
            .accumulate(&format!("model_usage:{model}:"), total_tokens, cost_usd)
            .await
        {
            tracing::warn!(error = %e, model, "cost_record_model_failed");
        }
    }

    async fn accumulate(
        &self,
        prefix: &str,
        total_tokens: u64,
        cost_usd: Cost,
    ) -> Result<(), GatewayError> {
        self.kv.incr_by(&format!("{prefix}requests"), 1).await?;
        self.kv
            .incr_by(&format!("{prefix}tokens"), total_tokens as i64)
            .await?;
        self.kv
            .incr_by(&format!("{prefix}cost"), cost_usd.as_micros())
            .await?;
        Ok(())
    }

    /// Reads back `usage:{user_id}:*` as a `{requests, tokens, cost}` triple.
    pub async fn usage_for(&self, user_id: &str) -> Result<UsageCounters, GatewayError> {
        self.read_counters(&format!("usage:{user_id}:")).await
    }

    /// Reads back `model_usage:{model}:*` as a `{requests, tokens, cost}` triple.
    pub async fn model_usage_for(&self, model: &str) -> Result<UsageCounters, GatewayError> {
        self.read_counters(&format!("model_usage:{model}:")).await
    }

    async fn read_counters(&self, prefix: &str) -> Result<UsageCounters, GatewayError> {
        let requests = self.kv.peek_counter(&format!("{prefix}requests")).await?;
        let tokens = self.kv.peek_counter(&format!("{prefix}tokens")).await?;
        let cost_micros = self.kv.peek_counter(&format!("{prefix}cost")).await?;
        Ok(UsageCounters {
            requests,
            tokens,
            cost_usd: Cost::from_micros(cost_micros),
        })
    }

    /// Scans `usage:*` and `model_usage:*` and aggregates every distinct
    /// user/model into a [`UsageSummary`] (design §4.6).
    pub async fn summary(&self) -> Result<UsageSummary, GatewayError> {
        let by_user = self.aggregate_prefix("usage:").await?;
        let by_model = self.aggregate_prefix("model_usage:").await?;
        Ok(UsageSummary { by_user, by_model })
    }

    async fn aggregate_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, UsageCounters)>, GatewayError> {
        let keys = self.kv.scan(&format!("{prefix}*")).await?;

        let mut names: Vec<String> = keys
            .iter()
            .filter_map(|k| {
                let rest = k.strip_prefix(prefix)?;
                let (name, _field) = rest.rsplit_once(':')?;
                Some(name.to_string())
            })
            .collect();
        names.sort();
        names.dedup();

        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let counters = self.read_counters(&format!("{prefix}{name}:")).await?;
            out.push((name, counters));
        }
        Ok(out)
    }
}
