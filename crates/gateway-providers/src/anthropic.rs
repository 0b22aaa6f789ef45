//! An Anthropic Messages API binding.

use crate::client::{classify_status, estimate_tokens, ProviderClient, ProviderCompletion};
use async_trait::async_trait;
use gateway_core::GatewayError;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Calls the Anthropic `/v1/messages` endpoint.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    native_model_name: String,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client, api_key: String, native_model_name: String) -> Self {
        Self {
            http,
            api_key,
            native_model_name,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<ProviderCompletion, GatewayError> {
        let body = MessagesRequest {
            model: &self.native_model_name,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens,
        };

        let response = self
            .http
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::ProviderRetryable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &text));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::ProviderTerminal(format!("malformed response: {e}")))?;

        let text = parsed
            .content
            .into_iter()
            .next()
            .map(|b| b.text)
            .unwrap_or_default();

        let (prompt_tokens, completion_tokens) = match parsed.usage {
            Some(usage) => (usage.input_tokens, usage.output_tokens),
            None => (None, None),
        };

        let completion_tokens = completion_tokens.or_else(|| Some(estimate_tokens(&text)));
        let prompt_tokens = prompt_tokens.or_else(|| Some(estimate_tokens(prompt)));

        Ok(ProviderCompletion {
            text,
            prompt_tokens,
            completion_tokens,
        })
    }
}
