//! The gateway's error taxonomy.
//!
//! Every component returns [`GatewayError`] (or converts into it); the
//! orchestrator is the sole translator from this taxonomy to an HTTP status
//! (see the root crate's `error.rs`).

use thiserror::Error;

/// A single, shared error type spanning every gateway component.
///
/// Variants correspond 1:1 to the taxonomy in the design's error handling
/// section. Intermediate components never swallow an error they don't
/// recognize; they log it and re-raise the typed variant.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Schema/validation failure on the inbound request. Terminal, 400.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The requested model has no provider binding. Terminal, 404.
    #[error("unknown model: {0}")]
    InvalidModel(String),

    /// Per-user quota exceeded. Terminal, 429.
    #[error("rate limit exceeded, retry after {retry_after_s}s")]
    RateLimitExceeded {
        /// Seconds until the saturated window resets.
        retry_after_s: u64,
    },

    /// The key-value store is unreachable.
    ///
    /// Callers decide fail-open vs fail-closed; this variant alone doesn't
    /// imply a status code (the rate limiter treats it as "admit", the
    /// health view treats it as "degraded").
    #[error("key-value store unavailable: {0}")]
    KvUnavailable(String),

    /// Upstream failure the caller should retry (5xx, 429, transient network).
    #[error("upstream call failed (retryable): {0}")]
    ProviderRetryable(String),

    /// Upstream failure that must not be retried (4xx other than 429, auth). 502.
    #[error("upstream call failed (terminal): {0}")]
    ProviderTerminal(String),

    /// The per-request deadline elapsed before a result was produced. 504.
    #[error("request timed out")]
    Timeout,

    /// Unexpected internal failure. 500. Message is never surfaced to callers.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// True for errors the retry executor should keep attempting.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::ProviderRetryable(_))
    }

    /// True for errors that must fail fast without further attempts.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GatewayError::ProviderTerminal(_)
                | GatewayError::InvalidInput(_)
                | GatewayError::InvalidModel(_)
        )
    }
}
