//! Defense pipeline around a retrieval-augmented support assistant.
//!
//! A query passes through these stages before and after generation:
//!
//! 1. **Disambiguate**: refuse questions about other companies sharing the brand name
//! 2. **Classify**: a cascade of cheap checks, embedding centroids, then LLM arbitration
//! 3. **Reformulate**: rewrite follow-ups into self-contained questions
//! 4. **Budget**: fit the history into the context window (window, summary, truncation)
//! 5. **Localize**: refusals in the user's language, synthesized and cached on demand
//! 6. **Validate**: flag ungrounded, off-topic, or incoherent answers
//!
//! [`GuardPipeline`] sequences them per request.

pub mod budget;
pub mod classifier;
pub mod disambiguator;
pub mod error;
pub mod lexicon;
pub mod localization;
pub mod pipeline;
pub mod reformulator;
pub mod validator;
pub mod verdict;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use budget::{BudgetMetadata, BudgetPlan, PromptEstimate, Strategy, TokenBudgetManager};
pub use classifier::{IntentClassifier, Stage};
pub use disambiguator::{Disambiguation, DisambiguationOutcome, DomainDisambiguator};
pub use error::{GuardError, Result};
pub use localization::{CacheStats, LocalizationCache, MessageKind};
pub use pipeline::{
    Collaborators, GuardPipeline, GuardedResponse, PreparedRequest, QueryContext, RefusalStage,
    Screening,
};
pub use reformulator::{QueryReformulator, Reformulation};
pub use validator::{ResponseValidator, Validation, ValidationReason};
pub use verdict::{Category, ClassificationVerdict, Decision, Query, ReasonCode};

/// First `max` characters of `text`, with "..." appended when cut.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Short form of a query for log lines.
pub(crate) fn preview(text: &str) -> String {
    truncate_chars(text, 50)
}
