//! LLM summarization of the elided history prefix.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};
use turnstile_config::{BudgetConfig, ModelSettings};
use turnstile_core::{CompletionProvider, CompletionRequest, Turn};

use crate::truncate_chars;

const SYSTEM_PROMPT: &str =
    "You are a precise conversation summarizer. Extract only key facts in bullet points.";

/// A synthetic system turn standing in for a contiguous prefix of history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTurn {
    pub content: String,
    /// How many original turns this summary replaces
    pub covered_count: usize,
}

impl SummaryTurn {
    pub fn to_turn(&self) -> Turn {
        Turn::system(self.content.clone())
    }
}

pub struct HistorySummarizer {
    provider: Arc<dyn CompletionProvider>,
    settings: ModelSettings,
    brand: String,
    input_chars: usize,
    output_chars: usize,
}

impl HistorySummarizer {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        settings: ModelSettings,
        brand: impl Into<String>,
        config: &BudgetConfig,
    ) -> Self {
        Self {
            provider,
            settings,
            brand: brand.into(),
            input_chars: config.summary_input_chars,
            output_chars: config.summary_output_chars,
        }
    }

    /// Summarize `turns` into one system turn. Falls back to a placeholder
    /// naming the elided turn count if the provider fails.
    pub async fn summarize(&self, turns: &[Turn]) -> SummaryTurn {
        let count = turns.len();
        let summary = match self.generate(turns).await {
            Some(summary) => summary,
            None => format!(
                "[Previous conversation: {count} messages. Key context may be incomplete due to summarization failure.]"
            ),
        };
        SummaryTurn {
            content: format!("[Previous Conversation Summary - {count} messages]: {summary}"),
            covered_count: count,
        }
    }

    async fn generate(&self, turns: &[Turn]) -> Option<String> {
        let transcript: String = turns
            .iter()
            .map(|t| format!("{}: {}\n", t.role.transcript_label(), t.content))
            .collect();
        let transcript = if transcript.chars().count() > self.input_chars {
            format!(
                "{}...[truncated]",
                transcript.chars().take(self.input_chars).collect::<String>()
            )
        } else {
            transcript
        };

        let prompt = format!(
            "Summarize the following conversation between a user and the {brand} support assistant.\n\n\
             REQUIREMENTS:\n\
             1. Preserve the KEY FACTS mentioned (suppliers, products, prices, quantities, dates, order details)\n\
             2. Keep the summary under 200 words\n\
             3. Use the SAME LANGUAGE as the conversation\n\
             4. Focus on information, not chit-chat or greetings\n\
             5. Format as concise bullet points\n\n\
             CONVERSATION TO SUMMARIZE:\n{transcript}\n\
             CONCISE SUMMARY (bullet points with key facts only):",
            brand = self.brand
        );

        let request = CompletionRequest::prompt(&self.settings.model, prompt)
            .with_system_prompt(SYSTEM_PROMPT)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);

        match self.provider.complete(request).await {
            Ok(response) => {
                let summary = truncate_chars(response.content.trim(), self.output_chars);
                debug!(chars = summary.chars().count(), "Conversation summary created");
                Some(summary)
            }
            Err(e) => {
                error!(error = %e, turns = turns.len(), "History summarization failed; using placeholder");
                None
            }
        }
    }
}
