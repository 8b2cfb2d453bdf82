//! Token budget management for conversation history.
//!
//! - [`token`]: BPE or heuristic token counting
//! - [`summarizer`]: LLM summary of an elided history prefix
//! - [`manager`]: the staged compaction chain

pub mod manager;
pub mod summarizer;
pub mod token;

pub use manager::{
    BudgetMetadata, BudgetPlan, PlannedTurn, PromptEstimate, Strategy, TokenBudgetManager,
};
pub use summarizer::{HistorySummarizer, SummaryTurn};
pub use token::{TokenCounter, estimate_tokens};
