//! Provider Registry - Manages AI provider instances.
//!
//! Providers are kept in registration order, so "first configured" is
//! deterministic.

use std::sync::Arc;

use crate::errors::{AdvisorError, AdvisorResult};

use super::anthropic::AnthropicProvider;
use super::gemini::GeminiProvider;
use super::openai::OpenAIProvider;
use super::provider::AIProvider;

/// Registry of AI providers.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn AIProvider>>,
}

impl ProviderRegistry {
    /// Create an empty provider registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in providers, configured from the
    /// environment. Gemini comes first.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GeminiProvider::from_env()));
        registry.register(Arc::new(AnthropicProvider::from_env()));
        registry.register(Arc::new(OpenAIProvider::from_env()));
        registry
    }

    /// Register a provider, replacing any provider with the same name.
    pub fn register(&mut self, provider: Arc<dyn AIProvider>) {
        match self.providers.iter().position(|p| p.name() == provider.name()) {
            Some(index) => self.providers[index] = provider,
            None => self.providers.push(provider),
        }
    }

    /// Get a provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn AIProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    /// Get the first configured provider.
    pub fn get_configured(&self) -> Option<Arc<dyn AIProvider>> {
        self.providers.iter().find(|p| p.is_configured()).cloned()
    }

    /// Get a configured provider that supports a specific model.
    pub fn get_for_model(&self, model: &str) -> Option<Arc<dyn AIProvider>> {
        self.providers
            .iter()
            .find(|p| p.is_configured() && p.supports_model(model))
            .cloned()
    }

    /// Check if a provider is registered.
    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.iter().any(|p| p.name() == name)
    }

    /// Get all registered provider names.
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Get a provider, returning an error if it is unknown or has no API key.
    pub fn require(&self, name: &str) -> AdvisorResult<Arc<dyn AIProvider>> {
        let provider = self
            .get(name)
            .ok_or_else(|| AdvisorError::Ai(format!("Provider '{name}' not found")))?;
        if !provider.is_configured() {
            return Err(AdvisorError::ProviderNotConfigured {
                provider: format!("{name} ({} not set)", provider.api_key_env_var()),
            });
        }
        Ok(provider)
    }

    /// Get any configured provider, returning an error if none available.
    pub fn require_any(&self) -> AdvisorResult<Arc<dyn AIProvider>> {
        self.get_configured().ok_or_else(|| {
            AdvisorError::Ai(
                "No AI provider is configured. Please set GEMINI_API_KEY, ANTHROPIC_API_KEY or OPENAI_API_KEY"
                    .to_string(),
            )
        })
    }
}
