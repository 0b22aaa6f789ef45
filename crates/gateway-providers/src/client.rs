//! The provider completion call contract (design §4.5).

use async_trait::async_trait;
use gateway_core::GatewayError;

/// A raw completion from an upstream provider, before cost/latency
/// accounting is layered on by the orchestrator.
#[derive(Debug, Clone)]
pub struct ProviderCompletion {
    pub text: String,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

/// Uniform completion call every provider binding implements.
///
/// Errors are already classified into [`GatewayError::ProviderRetryable`] or
/// [`GatewayError::ProviderTerminal`] at this boundary, so the retry
/// executor's `classify` closure is a one-line match.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<ProviderCompletion, GatewayError>;
}

/// Estimates a token count from character length when the upstream response
/// omits it (design §4.5): `ceil(len(text_in_chars) / 4)`.
///
/// Deliberately coarse; the orchestrator treats estimated counts the same
/// as reported ones (design §9, "Token estimation fallback").
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as u64;
    chars.div_ceil(4).max(if text.is_empty() { 0 } else { 1 })
}

/// Classifies an HTTP status code into the gateway's retryable/terminal
/// split (design §4.4's "error classification" note, applied at the
/// provider boundary per design §4.5).
pub fn classify_status(status: u16, body: &str) -> GatewayError {
    match status {
        429 | 500..=599 => GatewayError::ProviderRetryable(format!(
            "upstream returned {status}: {body}"
        )),
        _ => GatewayError::ProviderTerminal(format!("upstream returned {status}: {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_tokens_by_char_length() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
    }

    #[test]
    fn classifies_429_and_5xx_as_retryable() {
        assert!(matches!(
            classify_status(429, "rate limited"),
            GatewayError::ProviderRetryable(_)
        ));
        assert!(matches!(
            classify_status(503, "down"),
            GatewayError::ProviderRetryable(_)
        ));
    }

    #[test]
    fn classifies_other_4xx_as_terminal() {
        assert!(matches!(
            classify_status(400, "bad request"),
            GatewayError::ProviderTerminal(_)
        ));
        assert!(matches!(
            classify_status(401, "unauthorized"),
            GatewayError::ProviderTerminal(_)
        ));
    }
}
