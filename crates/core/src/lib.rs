//! # Turnstile Core
//!
//! Domain types, collaborator traits, and error definitions for the Turnstile
//! query guard. This crate has **zero framework dependencies**: it defines the
//! contracts that the guard components consume and that the provider and
//! storage crates implement.
//!
//! ## Collaborators
//!
//! The guard never talks to a model, a vector index, or a database directly.
//! It goes through four traits defined here:
//! - [`CompletionProvider`]: chat completion, plain and streaming
//! - [`EmbeddingProvider`]: unit-vector sentence embeddings
//! - [`LanguageDetector`]: best-effort language tagging
//! - [`MessageStore`]: ordered conversation turns

pub mod error;
pub mod language;
pub mod message;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, StoreError};
pub use language::{DEFAULT_LANGUAGE, FixedLanguage, LanguageDetector};
pub use message::{ConversationId, Role, Turn};
pub use provider::{
    ChunkReceiver, CompletionProvider, CompletionRequest, CompletionResponse, EmbeddingProvider,
    StreamChunk, Usage, normalize,
};
pub use store::MessageStore;
