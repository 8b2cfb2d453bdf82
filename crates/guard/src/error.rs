//! Guard construction and pipeline errors.
//!
//! Components convert provider failures into their documented fallbacks.
//! The only provider error surfaced here is a generation that produced no
//! output at all.

use thiserror::Error;
use turnstile_core::{ProviderError, StoreError};

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Conversation store failed: {0}")]
    Store(#[from] StoreError),

    #[error("Answer generation failed: {0}")]
    Generation(#[from] ProviderError),
}

pub type Result<T> = std::result::Result<T, GuardError>;

impl From<GuardError> for turnstile_core::Error {
    fn from(e: GuardError) -> Self {
        match e {
            GuardError::Store(e) => turnstile_core::Error::Store(e),
            GuardError::Generation(e) => turnstile_core::Error::Provider(e),
            other => turnstile_core::Error::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pattern_message() {
        let err = GuardError::InvalidPattern {
            pattern: "(".into(),
            reason: "unclosed group".into(),
        };
        assert!(err.to_string().contains("'('"));
    }

    #[test]
    fn store_error_converts_to_core() {
        let err = GuardError::Store(StoreError::Storage("disk full".into()));
        let core: turnstile_core::Error = err.into();
        assert!(matches!(core, turnstile_core::Error::Store(_)));
    }
}
