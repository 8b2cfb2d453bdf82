//! Provider router: builds the completion and embedding backends from config.

use std::sync::Arc;

use turnstile_config::AppConfig;
use turnstile_core::provider::{CompletionProvider, EmbeddingProvider};

use crate::openai_compat::OpenAiCompatProvider;

/// The backends a guard pipeline talks to.
#[derive(Clone)]
pub struct Providers {
    pub completion: Arc<dyn CompletionProvider>,
    pub embedding: Arc<dyn EmbeddingProvider>,
}

impl Providers {
    /// Use one OpenAI-compatible endpoint for both roles.
    pub fn shared(provider: OpenAiCompatProvider) -> Self {
        let provider = Arc::new(provider);
        Self {
            completion: provider.clone(),
            embedding: provider,
        }
    }
}

/// Build providers from configuration.
///
/// The base URL comes from `api_url` when set, otherwise from the provider's
/// well-known endpoint.
pub fn build_from_config(config: &AppConfig) -> Providers {
    let api_key = config.api_key.clone().unwrap_or_default();
    let base_url = config
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(&config.provider));

    tracing::debug!(
        provider = %config.provider,
        base_url = %base_url,
        model = %config.model,
        embedding_model = %config.embedding_model,
        "Building providers"
    );

    Providers::shared(
        OpenAiCompatProvider::new(&config.provider, base_url, api_key)
            .with_embedding_model(&config.embedding_model),
    )
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "groq" => "https://api.groq.com/openai/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "fireworks" => "https://api.fireworks.ai/inference/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("groq").contains("api.groq.com"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_from_default_config() {
        let config = AppConfig::default();
        let providers = build_from_config(&config);
        assert_eq!(providers.completion.name(), "groq");
        assert_eq!(providers.embedding.name(), "groq");
    }

    #[test]
    fn api_url_override_is_used() {
        let config = AppConfig {
            provider: "local".into(),
            api_url: Some("http://localhost:9999/v1".into()),
            ..AppConfig::default()
        };
        let providers = build_from_config(&config);
        assert_eq!(providers.completion.name(), "local");
    }
}
