//! Provider implementations for Turnstile.
//!
//! The OpenAI-compatible backend implements both
//! `turnstile_core::CompletionProvider` and `turnstile_core::EmbeddingProvider`.
//! The router builds it from configuration.

pub mod language;
pub mod openai_compat;
pub mod router;

pub use language::ScriptLanguageDetector;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{Providers, build_from_config, default_base_url};
