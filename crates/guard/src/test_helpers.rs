//! Shared test helpers: scripted providers and a deterministic embedder.

use async_trait::async_trait;
use std::sync::Mutex;
use turnstile_config::ModelSettings;
use turnstile_core::{
    CompletionProvider, CompletionRequest, CompletionResponse, EmbeddingProvider, ProviderError,
    Usage, normalize,
};

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue.
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<String>>,
    call_count: Mutex<usize>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| t.to_string()).collect())
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// The most recent request seen by `complete`.
    #[allow(dead_code)]
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionProvider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();

        if *count >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{}, have {})",
                *count,
                responses.len()
            );
        }

        let content = responses[*count].clone();
        *count += 1;
        self.requests.lock().unwrap().push(request);
        Ok(make_response(&content))
    }
}

/// Create a simple text response.
pub fn make_response(text: &str) -> CompletionResponse {
    CompletionResponse {
        content: text.into(),
        model: "mock-model".into(),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    }
}

/// A provider whose every call fails with a network error.
pub struct FailingProvider;

#[async_trait]
impl CompletionProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

#[async_trait]
impl EmbeddingProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

/// Embeds text as keyword-hit counts along fixed axes, then normalizes.
///
/// Text with no hits embeds to the zero vector.
pub struct KeywordEmbedder {
    axes: Vec<Vec<String>>,
    batch_calls: Mutex<usize>,
}

impl KeywordEmbedder {
    pub fn new(axes: &[&[&str]]) -> Self {
        Self {
            axes: axes
                .iter()
                .map(|words| words.iter().map(|w| w.to_lowercase()).collect())
                .collect(),
            batch_calls: Mutex::new(0),
        }
    }

    /// Two axes: in-domain trade vocabulary and colliding-company vocabulary.
    pub fn trade_vs_industry() -> Self {
        Self::new(&[
            &["order", "supplier", "delivery", "wholesale", "inventory", "restaurant"],
            &["plastics", "molding", "safe", "vault", "dental", "construction", "oil"],
        ])
    }

    #[allow(dead_code)]
    pub fn batch_calls(&self) -> usize {
        *self.batch_calls.lock().unwrap()
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = self
            .axes
            .iter()
            .map(|words| words.iter().filter(|w| lower.contains(w.as_str())).count() as f32)
            .collect();
        normalize(&mut v);
        v
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword_embedder"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        *self.batch_calls.lock().unwrap() += 1;
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Auxiliary model settings used by component tests.
pub fn aux_settings() -> ModelSettings {
    ModelSettings {
        model: "mock-aux".into(),
        temperature: 0.0,
        max_tokens: 64,
    }
}
