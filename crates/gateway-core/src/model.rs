//! Wire types shared by every gateway component.

use crate::money::Cost;
use serde::{Deserialize, Serialize};

/// An inbound completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Request {
    pub prompt: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    pub user_id: String,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

/// Maximum accepted prompt length, in characters (design §3).
pub const MAX_PROMPT_CHARS: usize = 10_000;
/// Maximum accepted `max_tokens` value (design §3).
pub const MAX_MAX_TOKENS: u32 = 4096;

impl Request {
    /// Validates the structural constraints from design §3.
    ///
    /// Does not check model existence; that's the provider registry's job.
    pub fn validate(&self) -> Result<(), String> {
        if self.prompt.is_empty() {
            return Err("prompt must not be empty".to_string());
        }
        if self.prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(format!(
                "prompt exceeds {MAX_PROMPT_CHARS} characters"
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err("temperature must be within [0, 2]".to_string());
        }
        if self.max_tokens == 0 || self.max_tokens > MAX_MAX_TOKENS {
            return Err(format!(
                "max_tokens must be within (0, {MAX_MAX_TOKENS}]"
            ));
        }
        if self.user_id.is_empty() {
            return Err("user_id must not be empty".to_string());
        }
        Ok(())
    }

    /// The canonical string hashed into the cache fingerprint (design §4.3).
    ///
    /// Temperature is rendered with fixed precision so float noise doesn't
    /// fracture the cache key, and `user_id` is deliberately excluded.
    pub fn fingerprint_input(&self) -> String {
        format!(
            "{}|{}|{:.3}|{}",
            self.prompt, self.model, self.temperature, self.max_tokens
        )
    }
}

/// A completed (or cached) response to a [`Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CompletionResult {
    pub completion: String,
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: Cost,
    pub request_id: String,
    pub cached: bool,
    pub latency_ms: f64,
}

impl CompletionResult {
    /// `total_tokens` is always the sum of its two parts (invariant 1).
    pub fn new(
        completion: String,
        model: String,
        prompt_tokens: u64,
        completion_tokens: u64,
        cost_usd: Cost,
        request_id: String,
        cached: bool,
        latency_ms: f64,
    ) -> Self {
        Self {
            completion,
            model,
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            cost_usd,
            request_id,
            cached,
            latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> Request {
        Request {
            prompt: "hello".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_tokens: 50,
            user_id: "u1".to_string(),
        }
    }

    #[test]
    fn validates_happy_path() {
        assert!(sample_request().validate().is_ok());
    }

    #[test]
    fn rejects_empty_prompt() {
        let mut req = sample_request();
        req.prompt.clear();
        assert!(req.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let mut req = sample_request();
        req.temperature = 2.1;
        assert!(req.validate().is_err());
    }

    #[test]
    fn fingerprint_excludes_user_id() {
        let mut a = sample_request();
        a.user_id = "u1".to_string();
        let mut b = sample_request();
        b.user_id = "u2".to_string();
        assert_eq!(a.fingerprint_input(), b.fingerprint_input());
    }

    #[test]
    fn fingerprint_is_sensitive_to_temperature_precision() {
        let mut a = sample_request();
        a.temperature = 0.70001;
        let b = sample_request();
        // Both round to 0.700 at 3 decimals, so the fingerprint matches.
        assert_eq!(a.fingerprint_input(), b.fingerprint_input());
    }
}
