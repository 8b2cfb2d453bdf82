//! Staged history compaction under a fixed token ceiling.
//!
//! Each stage runs only if the previous one did not fit:
//!
//! 1. full history
//! 2. sliding window of the most recent `recent_keep` turns
//! 3. a summary of everything older than the window, plus the window
//! 4. shrinking windows of `recent_keep`, `recent_keep - step`, ... turns
//! 5. the last two turns, unconditionally
//!
//! The manager never fails: stage 5 always produces a plan.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use turnstile_config::{BudgetConfig, ModelSettings};
use turnstile_core::{CompletionProvider, Turn};

use super::summarizer::{HistorySummarizer, SummaryTurn};
use super::token::TokenCounter;

const EXTREME_FALLBACK_TURNS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    NoneEmpty,
    NoneNeeded,
    SlidingWindow,
    SummarizationHybrid,
    AggressiveTruncation,
    ExtremeFallback,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::NoneEmpty => "none_empty",
            Strategy::NoneNeeded => "none_needed",
            Strategy::SlidingWindow => "sliding_window",
            Strategy::SummarizationHybrid => "summarization_hybrid",
            Strategy::AggressiveTruncation => "aggressive_truncation",
            Strategy::ExtremeFallback => "extreme_fallback",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a budget plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlannedTurn {
    Turn(Turn),
    Summary(SummaryTurn),
}

impl PlannedTurn {
    pub fn to_turn(&self) -> Turn {
        match self {
            PlannedTurn::Turn(turn) => turn.clone(),
            PlannedTurn::Summary(summary) => summary.to_turn(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetMetadata {
    pub strategy: Strategy,
    pub original_turns: usize,
    pub optimized_turns: usize,
    pub original_tokens: usize,
    pub optimized_tokens: usize,
    pub system_tokens: usize,
    /// Tokens available for history after the system prompt
    pub budget: usize,
    /// Original turns dropped outright
    pub dropped_turns: usize,
    /// Original turns folded into a summary
    pub summarized_turns: usize,
}

/// The history to send with one generation call. Recomputed per request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetPlan {
    pub turns: Vec<PlannedTurn>,
    pub metadata: BudgetMetadata,
}

impl BudgetPlan {
    pub fn strategy(&self) -> Strategy {
        self.metadata.strategy
    }

    /// The plan as plain turns, summaries rendered as system turns.
    pub fn to_turns(&self) -> Vec<Turn> {
        self.turns.iter().map(PlannedTurn::to_turn).collect()
    }
}

/// Token accounting for a fully assembled prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptEstimate {
    pub system_tokens: usize,
    pub message_tokens: usize,
    pub total_tokens: usize,
    /// Negative when the prompt is over budget
    pub remaining: i64,
    pub budget_total: usize,
    pub utilization_pct: u32,
}

pub struct TokenBudgetManager {
    config: BudgetConfig,
    counter: TokenCounter,
    summarizer: HistorySummarizer,
}

impl TokenBudgetManager {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        settings: ModelSettings,
        brand: impl Into<String>,
        config: BudgetConfig,
    ) -> Self {
        let counter = TokenCounter::new(config.turn_overhead);
        info!(
            available = config.available_tokens(),
            recent_keep = config.recent_keep,
            exact_tokens = counter.is_exact(),
            "Token budget manager initialized"
        );
        Self {
            summarizer: HistorySummarizer::new(provider, settings, brand, &config),
            counter,
            config,
        }
    }

    /// Replace the token counter.
    pub fn with_counter(mut self, counter: TokenCounter) -> Self {
        self.counter = counter;
        self
    }

    pub fn counter(&self) -> &TokenCounter {
        &self.counter
    }

    /// History budget left once `system_prompt` is counted.
    pub fn budget_for(&self, system_prompt: &str) -> usize {
        self.config
            .available_tokens()
            .saturating_sub(self.counter.count(system_prompt))
    }

    pub async fn optimize(&self, turns: &[Turn], system_prompt: &str) -> BudgetPlan {
        let system_tokens = self.counter.count(system_prompt);
        let budget = self.config.available_tokens().saturating_sub(system_tokens);
        let original_tokens = self.counter.count_turns(turns);

        let plan = |strategy: Strategy,
                    planned: Vec<PlannedTurn>,
                    optimized_tokens: usize,
                    dropped: usize,
                    summarized: usize| {
            BudgetPlan {
                metadata: BudgetMetadata {
                    strategy,
                    original_turns: turns.len(),
                    optimized_turns: planned.len(),
                    original_tokens,
                    optimized_tokens,
                    system_tokens,
                    budget,
                    dropped_turns: dropped,
                    summarized_turns: summarized,
                },
                turns: planned,
            }
        };
        let verbatim = |slice: &[Turn]| -> Vec<PlannedTurn> {
            slice.iter().cloned().map(PlannedTurn::Turn).collect()
        };

        if turns.is_empty() {
            return plan(Strategy::NoneEmpty, Vec::new(), 0, 0, 0);
        }

        if original_tokens <= budget {
            debug!(tokens = original_tokens, budget, "History fits; no optimization needed");
            return plan(Strategy::NoneNeeded, verbatim(turns), original_tokens, 0, 0);
        }

        let keep = self.config.recent_keep;
        if turns.len() > keep {
            let split = turns.len() - keep;
            let (older, recent) = turns.split_at(split);
            let recent_tokens = self.counter.count_turns(recent);

            if recent_tokens <= budget {
                info!(
                    kept = recent.len(),
                    dropped = split,
                    tokens = recent_tokens,
                    budget,
                    "Sliding window applied"
                );
                return plan(Strategy::SlidingWindow, verbatim(recent), recent_tokens, split, 0);
            }

            // A summary turn costs at least its overhead.
            if recent_tokens + self.config.turn_overhead > budget {
                debug!(
                    tokens = recent_tokens,
                    budget,
                    "Window alone leaves no room for a summary; skipping summarization"
                );
            } else {
                let summary = self.summarizer.summarize(older).await;
                let summary_tokens = self.counter.count_turn(&summary.to_turn());
                let hybrid_tokens = summary_tokens + recent_tokens;

                if hybrid_tokens <= budget {
                    info!(
                        summarized = split,
                        kept_full = recent.len(),
                        tokens = hybrid_tokens,
                        budget,
                        "Summarization hybrid applied"
                    );
                    let mut planned = vec![PlannedTurn::Summary(summary)];
                    planned.extend(verbatim(recent));
                    return plan(Strategy::SummarizationHybrid, planned, hybrid_tokens, 0, split);
                }
                debug!(tokens = hybrid_tokens, budget, "Summary plus window does not fit");
            }
        }

        let step = self.config.truncation_step.max(1);
        let mut n = keep;
        while n > 0 {
            let window = &turns[turns.len().saturating_sub(n)..];
            let tokens = self.counter.count_turns(window);
            if tokens <= budget {
                let dropped = turns.len() - window.len();
                warn!(
                    kept = window.len(),
                    dropped,
                    tokens,
                    budget,
                    "Aggressive truncation applied"
                );
                return plan(Strategy::AggressiveTruncation, verbatim(window), tokens, dropped, 0);
            }
            n = n.saturating_sub(step);
        }

        let window = &turns[turns.len().saturating_sub(EXTREME_FALLBACK_TURNS)..];
        let tokens = self.counter.count_turns(window);
        let dropped = turns.len() - window.len();
        error!(
            kept = window.len(),
            dropped,
            tokens,
            budget,
            "Extreme fallback: history cannot fit the budget"
        );
        plan(Strategy::ExtremeFallback, verbatim(window), tokens, dropped, 0)
    }

    /// Token breakdown of a prompt against the configured history budget.
    pub fn estimate_prompt(&self, system_prompt: &str, turns: &[Turn]) -> PromptEstimate {
        let system_tokens = self.counter.count(system_prompt);
        let message_tokens = self.counter.count_turns(turns);
        let total_tokens = system_tokens + message_tokens;
        let budget_total = self.config.available_tokens();
        let utilization_pct = if budget_total == 0 {
            0
        } else {
            (total_tokens * 100 / budget_total) as u32
        };
        PromptEstimate {
            system_tokens,
            message_tokens,
            total_tokens,
            remaining: budget_total as i64 - total_tokens as i64,
            budget_total,
            utilization_pct,
        }
    }
}
