//! In-memory message store for tests and ephemeral sessions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use turnstile_core::error::StoreError;
use turnstile_core::message::{ConversationId, Turn};
use turnstile_core::store::MessageStore;

/// A message store that keeps every conversation in a `HashMap`.
/// Useful for tests and sessions where persistence isn't needed.
pub struct InMemoryMessageStore {
    conversations: Arc<RwLock<HashMap<ConversationId, Vec<Turn>>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self {
            conversations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of conversations with at least one turn.
    pub async fn conversation_count(&self) -> usize {
        self.conversations.read().await.len()
    }
}

impl Default for InMemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(&self, conversation: &ConversationId, turn: Turn) -> Result<(), StoreError> {
        self.conversations
            .write()
            .await
            .entry(conversation.clone())
            .or_default()
            .push(turn);
        Ok(())
    }

    async fn history(&self, conversation: &ConversationId) -> Result<Vec<Turn>, StoreError> {
        Ok(self
            .conversations
            .read()
            .await
            .get(conversation)
            .cloned()
            .unwrap_or_default())
    }
}
