//! Token counting.
//!
//! With the `bpe` feature the counter uses tiktoken's `cl100k_base`
//! encoding. Without it, or when the encoding fails to load, it falls back
//! to ~4 characters per token.

#[cfg(feature = "bpe")]
use std::sync::Arc;
#[cfg(feature = "bpe")]
use tiktoken_rs::CoreBPE;
use tracing::warn;
use turnstile_core::Turn;

/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.chars().count() + 3) / 4
}

#[derive(Clone)]
pub struct TokenCounter {
    #[cfg(feature = "bpe")]
    bpe: Option<Arc<CoreBPE>>,
    turn_overhead: usize,
}

impl TokenCounter {
    /// BPE counting when available, heuristic otherwise.
    pub fn new(turn_overhead: usize) -> Self {
        #[cfg(feature = "bpe")]
        {
            let bpe = match tiktoken_rs::cl100k_base() {
                Ok(bpe) => Some(Arc::new(bpe)),
                Err(e) => {
                    warn!(error = %e, "cl100k_base unavailable; using approximate token counts");
                    None
                }
            };
            Self { bpe, turn_overhead }
        }
        #[cfg(not(feature = "bpe"))]
        {
            warn!("Built without BPE support; using approximate token counts");
            Self { turn_overhead }
        }
    }

    /// Always uses the character heuristic.
    pub fn heuristic(turn_overhead: usize) -> Self {
        Self {
            #[cfg(feature = "bpe")]
            bpe: None,
            turn_overhead,
        }
    }

    pub fn is_exact(&self) -> bool {
        #[cfg(feature = "bpe")]
        {
            self.bpe.is_some()
        }
        #[cfg(not(feature = "bpe"))]
        {
            false
        }
    }

    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        #[cfg(feature = "bpe")]
        if let Some(bpe) = &self.bpe {
            return bpe.encode_ordinary(text).len();
        }
        estimate_tokens(text)
    }

    /// Content tokens plus the fixed per-turn overhead.
    pub fn count_turn(&self, turn: &Turn) -> usize {
        self.turn_overhead + self.count(&turn.content)
    }

    pub fn count_turns<'a>(&self, turns: impl IntoIterator<Item = &'a Turn>) -> usize {
        turns.into_iter().map(|t| self.count_turn(t)).sum()
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("exact", &self.is_exact())
            .field("turn_overhead", &self.turn_overhead)
            .finish()
    }
}
