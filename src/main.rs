//! HTTP surface for the LLM gateway.
//!
//! Wires the `gateway-*` crates into one [`axum::Router`]: one `AppState`,
//! one `tracing_subscriber` init in `main`, handlers thin enough to just
//! call into the orchestrator/admin views and translate the result to JSON.

mod config;
mod error;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, post};
use axum::Router;
use config::GatewayConfig;
use error::ApiError;
use gateway_admin::{AdminViews, HealthStatus};
use gateway_core::{GatewayError, InMemoryKv, KvStore, Request as GatewayRequest};
use gateway_cache::{CacheConfig, ResponseCache};
use gateway_cost::CostTracker;
use gateway_orchestrator::{GatewayOrchestrator, OrchestratorConfig};
use gateway_providers::{AnthropicClient, OpenAiClient, ProviderBinding, ProviderRegistry};
use gateway_ratelimiter::{RateLimiter, RateLimiterConfig};
use gateway_retry::{RetryConfig, RetryExecutor};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<GatewayOrchestrator>,
    admin: Arc<AdminViews>,
    deadline: Duration,
}

#[tokio::main]
async fn main() {
    let config = match GatewayConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8080)));

    let state = build_state(&config).await;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");

    tracing::info!(%addr, "llm-gateway listening");

    axum::serve(listener, app(state).into_make_service())
        .await
        .expect("server error");
}

/// Resolves the KV backend (Redis when `REDIS_URL` is set and reachable,
/// otherwise an in-memory store for local/dev runs per SPEC_FULL §4.1),
/// seeds the provider registry from the configured API keys, and wires
/// every component into one [`AppState`].
async fn build_state(config: &GatewayConfig) -> AppState {
    let kv: Arc<dyn KvStore> = match gateway_core::RedisKv::connect(&config.redis_url).await {
        Ok(redis) => {
            tracing::info!(redis_url = %config.redis_url, "connected to Redis KV store");
            Arc::new(redis)
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to REDIS_URL, falling back to in-memory KV store");
            Arc::new(InMemoryKv::new())
        }
    };

    let registry = Arc::new(build_registry(config));
    let cache = Arc::new(ResponseCache::new(
        Arc::clone(&kv),
        CacheConfig {
            ttl: Duration::from_secs(config.cache_ttl_seconds),
        },
    ));
    let rate_limiter = RateLimiter::new(
        Arc::clone(&kv),
        RateLimiterConfig {
            max_per_minute: config.max_requests_per_minute,
            max_per_hour: config.max_requests_per_hour,
        },
    );
    let retry = RetryExecutor::new(RetryConfig::default());
    let cost = CostTracker::new(Arc::clone(&kv));

    let orchestrator = Arc::new(GatewayOrchestrator::new(
        Arc::clone(&kv),
        cache,
        rate_limiter,
        Arc::clone(&registry),
        retry,
        cost,
        OrchestratorConfig::default(),
    ));

    let admin = Arc::new(AdminViews::new(
        kv,
        orchestrator.cache(),
        Arc::new(orchestrator.cost()),
        registry,
    ));

    AppState {
        orchestrator,
        admin,
        deadline: OrchestratorConfig::default().default_deadline,
    }
}

/// Registers an OpenAI-compatible binding and an Anthropic binding for each
/// API key present in the environment (design §4.5: "a binding whose key is
/// absent from the environment is simply not registered").
fn build_registry(config: &GatewayConfig) -> ProviderRegistry {
    let http = reqwest::Client::new();
    let mut registry = ProviderRegistry::new();

    if let Some(key) = &config.openai_api_key {
        let price_35 = *config.cost_per_token.get("gpt-3.5-turbo").unwrap_or(&0.000002);
        registry.register(
            "gpt-3.5-turbo",
            ProviderBinding {
                provider_tag: "openai".to_string(),
                native_model_name: "gpt-3.5-turbo".to_string(),
                price_per_token_usd: price_35,
                client: Arc::new(OpenAiClient::new(
                    http.clone(),
                    key.clone(),
                    "gpt-3.5-turbo".to_string(),
                )),
            },
        );

        let price_4 = *config.cost_per_token.get("gpt-4").unwrap_or(&0.00003);
        registry.register(
            "gpt-4",
            ProviderBinding {
                provider_tag: "openai".to_string(),
                native_model_name: "gpt-4".to_string(),
                price_per_token_usd: price_4,
                client: Arc::new(OpenAiClient::new(http.clone(), key.clone(), "gpt-4".to_string())),
            },
        );
    }

    if let Some(key) = &config.anthropic_api_key {
        let price = *config.cost_per_token.get("claude-3").unwrap_or(&0.000015);
        registry.register(
            "claude-3",
            ProviderBinding {
                provider_tag: "anthropic".to_string(),
                native_model_name: "claude-3-sonnet-20240229".to_string(),
                price_per_token_usd: price,
                client: Arc::new(AnthropicClient::new(
                    http,
                    key.clone(),
                    "claude-3-sonnet-20240229".to_string(),
                )),
            },
        );
    }

    registry
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/v1/generate", post(generate))
        .route("/v1/health", get(health))
        .route("/v1/models", get(models))
        .route("/v1/usage/:user_id", get(usage))
        .route("/v1/rate-limit/:user_id", get(rate_limit_status))
        .route("/v1/cache/stats", get(cache_stats))
        .route("/v1/cache/clear", delete(cache_clear))
        .route("/v1/admin/summary", get(admin_summary))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn generate(
    State(state): State<AppState>,
    Json(req): Json<GatewayRequest>,
) -> Result<Json<gateway_core::CompletionResult>, ApiError> {
    match tokio::time::timeout(state.deadline, state.orchestrator.handle(req)).await {
        Ok(Ok(result)) => Ok(Json(result)),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(GatewayError::Timeout.into()),
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.admin.health().await;
    let status = match report.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report))
}

async fn models(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.registry().list_models())
}

/// Always 200: usage counters read back as zero for a user who has never
/// made a request, since the KV store has no notion of "known users"
/// distinct from "zero usage" (an Open Question decision, see DESIGN.md).
async fn usage(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<gateway_cost::UsageCounters>, ApiError> {
    Ok(Json(state.admin.usage_for(&user_id).await?))
}

async fn rate_limit_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    Json(state.orchestrator.rate_limiter().status(&user_id).await)
}

async fn cache_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.admin.cache_stats().await?))
}

async fn cache_clear(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let deleted_count = state.orchestrator.cache().clear().await?;
    Ok(Json(json!({ "deleted_count": deleted_count })))
}

async fn admin_summary(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.admin.summary().await?))
}
