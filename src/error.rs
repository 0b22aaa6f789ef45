//! Maps [`GatewayError`] onto HTTP responses (design §7: "the orchestrator
//! is the sole translator to HTTP status").

use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_core::GatewayError;
use serde_json::json;

pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, retry_after_s) = match &self.0 {
            GatewayError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "invalid_input", msg.clone(), None),
            GatewayError::InvalidModel(msg) => (StatusCode::NOT_FOUND, "invalid_model", msg.clone(), None),
            GatewayError::RateLimitExceeded { retry_after_s } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_exceeded",
                self.0.to_string(),
                Some(*retry_after_s),
            ),
            GatewayError::KvUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "kv_unavailable",
                "key-value store unavailable".to_string(),
                None,
            ),
            GatewayError::ProviderRetryable(_) | GatewayError::ProviderTerminal(_) => (
                StatusCode::BAD_GATEWAY,
                "provider_failure",
                "upstream provider call failed".to_string(),
                None,
            ),
            GatewayError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                "request timed out".to_string(),
                None,
            ),
            GatewayError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "internal error".to_string(),
                None,
            ),
        };

        let mut response = (
            status,
            Json(json!({
                "error": code,
                "message": message,
                "retry_after_s": retry_after_s,
            })),
        )
            .into_response();

        if let Some(seconds) = retry_after_s {
            response.headers_mut().insert(
                HeaderName::from_static("retry-after"),
                seconds.to_string().parse().expect("seconds is numeric"),
            );
        }

        response
    }
}
