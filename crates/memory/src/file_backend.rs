//! JSON-lines message store persisted to a single file.
//!
//! Each line is one JSON-encoded turn tagged with its conversation id.
//! Appends write a single line, so a crash mid-conversation loses at most
//! the turn being written.
//!
//! Storage location: `~/.turnstile/conversations.jsonl`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use turnstile_core::error::StoreError;
use turnstile_core::message::{ConversationId, Turn};
use turnstile_core::store::MessageStore;

/// One line of the JSONL file.
#[derive(Debug, Serialize, Deserialize)]
struct StoredTurn {
    conversation: ConversationId,
    #[serde(flatten)]
    turn: Turn,
}

/// A file-backed message store using JSONL (one turn per line).
///
/// All turns are loaded into memory on creation; appends go to both the
/// in-memory index and the end of the file.
pub struct JsonlMessageStore {
    path: PathBuf,
    conversations: Arc<RwLock<HashMap<ConversationId, Vec<Turn>>>>,
}

impl JsonlMessageStore {
    /// Open a store at the given path.
    ///
    /// If the file exists, turns are loaded from it. If it does not exist,
    /// the store starts empty and the file is created on first append.
    pub fn new(path: PathBuf) -> Self {
        let conversations = Self::load_from_disk(&path);
        debug!(
            path = %path.display(),
            conversations = conversations.len(),
            "JSONL message store loaded"
        );
        Self {
            path,
            conversations: Arc::new(RwLock::new(conversations)),
        }
    }

    /// Default path: `~/.turnstile/conversations.jsonl`
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join(".turnstile")
            .join("conversations.jsonl")
    }

    /// Load turns from a JSONL file, skipping corrupted lines.
    fn load_from_disk(path: &Path) -> HashMap<ConversationId, Vec<Turn>> {
        let mut conversations: HashMap<ConversationId, Vec<Turn>> = HashMap::new();

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return conversations, // not created yet
        };

        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredTurn>(line) {
                Ok(stored) => conversations
                    .entry(stored.conversation)
                    .or_default()
                    .push(stored.turn),
                Err(e) => {
                    warn!(line = line_no + 1, error = %e, "Skipping corrupted conversation turn");
                }
            }
        }

        conversations
    }

    fn append_line(&self, line: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!("Failed to create store directory: {e}"))
            })?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::Storage(format!("Failed to open store file: {e}")))?;

        writeln!(file, "{line}")
            .map_err(|e| StoreError::Storage(format!("Failed to write store file: {e}")))
    }
}

#[async_trait]
impl MessageStore for JsonlMessageStore {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn append(&self, conversation: &ConversationId, turn: Turn) -> Result<(), StoreError> {
        let stored = StoredTurn {
            conversation: conversation.clone(),
            turn,
        };
        let line = serde_json::to_string(&stored)
            .map_err(|e| StoreError::Storage(format!("Failed to serialize turn: {e}")))?;

        // Hold the write lock across the file write so lines never interleave.
        let mut conversations = self.conversations.write().await;
        self.append_line(&line)?;
        conversations
            .entry(stored.conversation)
            .or_default()
            .push(stored.turn);
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
