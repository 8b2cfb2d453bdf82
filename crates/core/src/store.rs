//! Message store trait: ordered, append-only conversation history.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{ConversationId, Turn};

/// Persistence for conversation turns.
///
/// The guard components only read history. The request pipeline appends the
/// user's turn before generation starts, so an interrupted generation never
/// loses the user's input.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// A human-readable name for this backend (e.g., "in_memory", "jsonl").
    fn name(&self) -> &str;

    /// Append a turn to the end of a conversation, creating it if needed.
    async fn append(&self, conversation: &ConversationId, turn: Turn) -> Result<(), StoreError>;

    /// All turns of a conversation, oldest first. Unknown conversations are empty.
    async fn history(&self, conversation: &ConversationId) -> Result<Vec<Turn>, StoreError>;
}
