//! Conversation storage implementations for Turnstile.

pub mod file_backend;
pub mod in_memory;

pub use file_backend::JsonlMessageStore;
pub use in_memory::InMemoryMessageStore;
