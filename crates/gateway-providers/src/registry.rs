//! Resolves a model identifier to its provider binding (design §4.5).

use crate::client::ProviderClient;
use gateway_core::GatewayError;
use std::collections::HashMap;
use std::sync::Arc;

/// A model entry suitable for `GET /v1/models`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub provider: String,
    pub price_per_token_usd: f64,
}

/// Immutable (model -> upstream completion function + pricing) record,
/// process-wide lifetime once registered.
pub struct ProviderBinding {
    pub provider_tag: String,
    pub native_model_name: String,
    pub price_per_token_usd: f64,
    pub client: Arc<dyn ProviderClient>,
}

/// Static map seeded at startup; the registry knows nothing about HTTP.
#[derive(Default)]
pub struct ProviderRegistry {
    bindings: HashMap<String, ProviderBinding>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a binding under `model` (the identifier clients send).
    pub fn register(&mut self, model: impl Into<String>, binding: ProviderBinding) {
        self.bindings.insert(model.into(), binding);
    }

    /// Resolves `model` to its binding, or `InvalidModel` if unregistered.
    pub fn resolve(&self, model: &str) -> Result<&ProviderBinding, GatewayError> {
        self.bindings
            .get(model)
            .ok_or_else(|| GatewayError::InvalidModel(model.to_string()))
    }

    /// True if at least one provider binding is configured (used by the
    /// liveness probe, design §4.8).
    pub fn has_any_binding(&self) -> bool {
        !self.bindings.is_empty()
    }

    /// Lists every registered model, for `GET /v1/models`.
    pub fn list_models(&self) -> Vec<ModelInfo> {
        let mut models: Vec<ModelInfo> = self
            .bindings
            .iter()
            .map(|(name, binding)| ModelInfo {
                name: name.clone(),
                provider: binding.provider_tag.clone(),
                price_per_token_usd: binding.price_per_token_usd,
            })
            .collect();
        models.sort_by(|a, b| a.name.cmp(&b.name));
        models
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ProviderCompletion;
    use async_trait::async_trait;

    struct StubClient;

    #[async_trait]
    impl ProviderClient for StubClient {
        async fn complete(
            &self,
            _prompt: &str,
            _temperature: f64,
            _max_tokens: u32,
        ) -> Result<ProviderCompletion, GatewayError> {
            Ok(ProviderCompletion {
                text: "stub".to_string(),
                prompt_tokens: Some(1),
                completion_tokens: Some(1),
            })
        }
    }

    fn binding(tag: &str, price: f64) -> ProviderBinding {
        ProviderBinding {
            provider_tag: tag.to_string(),
            native_model_name: "native".to_string(),
            price_per_token_usd: price,
            client: Arc::new(StubClient),
        }
    }

    #[test]
    fn resolves_registered_model() {
        let mut registry = ProviderRegistry::new();
        registry.register("gpt-3.5-turbo", binding("openai", 0.000002));

        let resolved = registry.resolve("gpt-3.5-turbo").unwrap();
        assert_eq!(resolved.provider_tag, "openai");
    }

    #[test]
    fn unknown_model_is_invalid_model_error() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.resolve("not-a-model"),
            Err(GatewayError::InvalidModel(_))
        ));
    }

    #[test]
    fn has_any_binding_reflects_registrations() {
        let mut registry = ProviderRegistry::new();
        assert!(!registry.has_any_binding());
        registry.register("gpt-3.5-turbo", binding("openai", 0.000002));
        assert!(registry.has_any_binding());
    }

    #[test]
    fn list_models_is_sorted_by_name() {
        let mut registry = ProviderRegistry::new();
        registry.register("gpt-4", binding("openai", 0.00003));
        registry.register("claude-3", binding("anthropic", 0.000015));

        let models = registry.list_models();
        assert_eq!(models[0].name, "claude-3");
        assert_eq!(models[1].name, "gpt-4");
    }
}
