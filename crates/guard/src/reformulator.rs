//! Context-aware query rewriting.
//!
//! Follow-up questions like "how much is it?" are rewritten into standalone
//! questions before retrieval. Queries that already name a domain concept and
//! carry no pronoun or continuation marker are left alone without a model call.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use turnstile_config::{DomainProfile, ModelSettings, ReformulationConfig};
use turnstile_core::{CompletionProvider, CompletionRequest, Role, Turn};

use crate::error::Result;
use crate::lexicon::PatternSet;
use crate::{preview, truncate_chars};

const CONTEXT_TURN_CHARS: usize = 200;

const SYSTEM_PROMPT: &str = "You are a precise query reformulation assistant. \
Return ONLY the reformulated question with no extra text or explanation.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reformulation {
    pub original: String,
    pub reformulated: String,
    pub changed: bool,
}

impl Reformulation {
    fn unchanged(query: &str) -> Self {
        Self {
            original: query.to_string(),
            reformulated: query.to_string(),
            changed: false,
        }
    }

    fn rewritten(query: &str, rewrite: String) -> Self {
        let changed = rewrite != query;
        Self {
            original: query.to_string(),
            reformulated: rewrite,
            changed,
        }
    }
}

pub struct QueryReformulator {
    provider: Arc<dyn CompletionProvider>,
    settings: ModelSettings,
    config: ReformulationConfig,
    brand: String,
    dependency: PatternSet,
    entity: PatternSet,
}

impl QueryReformulator {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        settings: ModelSettings,
        config: ReformulationConfig,
        profile: &DomainProfile,
    ) -> Result<Self> {
        Ok(Self {
            provider,
            settings,
            config,
            brand: profile.display_name.clone(),
            dependency: PatternSet::new(&profile.dependency_patterns)?,
            entity: PatternSet::new(&profile.entity_patterns)?,
        })
    }

    pub fn config(&self) -> &ReformulationConfig {
        &self.config
    }

    /// No dependency markers and at least one named domain concept.
    pub fn is_self_contained(&self, query: &str) -> bool {
        let lower = query.to_lowercase();
        !self.dependency.any_match(&lower) && self.entity.any_match(&lower)
    }

    /// Rewrite `query` using up to `max_turns` exchanges of `history`.
    ///
    /// Never fails: on any provider problem the original query comes back.
    pub async fn reformulate(&self, query: &str, history: &[Turn], max_turns: usize) -> Reformulation {
        if !self.config.enabled || query.trim().is_empty() || history.len() < 2 {
            debug!("Reformulation skipped: disabled, empty query or short history");
            return Reformulation::unchanged(query);
        }
        if self.is_self_contained(query) {
            debug!(query = %preview(query), "Reformulation skipped: self-contained");
            return Reformulation::unchanged(query);
        }

        let keep = max_turns.saturating_mul(2);
        let recent = &history[history.len().saturating_sub(keep)..];
        let transcript: String = recent
            .iter()
            .map(|turn| {
                format!(
                    "{}: {}\n",
                    turn.role.transcript_label(),
                    truncate_chars(&turn.content, self.config.max_turn_chars)
                )
            })
            .collect();

        let request = CompletionRequest::prompt(&self.settings.model, self.prompt(query, &transcript))
            .with_system_prompt(SYSTEM_PROMPT)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);

        let rewrite = match self.provider.complete(request).await {
            Ok(response) => response
                .content
                .trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .trim()
                .to_string(),
            Err(e) => {
                warn!(error = %e, "Query reformulation failed; keeping original");
                return Reformulation::unchanged(query);
            }
        };

        if rewrite.is_empty() {
            warn!("Reformulation returned empty text; keeping original");
            return Reformulation::unchanged(query);
        }

        let limit = query.chars().count() * self.config.max_growth_factor;
        let length = rewrite.chars().count();
        if length > limit {
            warn!(original = query.chars().count(), reformulated = length, "Reformulation too long; keeping original");
            return Reformulation::unchanged(query);
        }

        let result = Reformulation::rewritten(query, rewrite);
        if result.changed {
            info!(
                original = %preview(&result.original),
                reformulated = %preview(&result.reformulated),
                "Query reformulated"
            );
        }
        result
    }

    fn prompt(&self, query: &str, transcript: &str) -> String {
        let brand = &self.brand;
        format!(
            "You are a query reformulation assistant.\n\n\
             Given a conversation history and a new user question, rewrite the question so it is \
             SELF-CONTAINED, pulling any missing context from the history.\n\n\
             RULES:\n\
             1. If the question already has all the context it needs, return it UNCHANGED\n\
             2. Replace pronouns and references to earlier turns with the explicit entities\n\
             3. Keep it concise and in the SAME LANGUAGE as the original question\n\
             4. Do NOT answer the question\n\
             5. Return ONLY the rewritten question, with no explanation\n\
             6. Preserve the question type (do not turn \"Where?\" into \"What is the location?\")\n\n\
             EXAMPLE:\n\
             History: User asked \"Which suppliers on {brand} sell olive oil?\" Assistant said \"Al Noor Trading and Gulf Foods\"\n\
             New question: \"What is their minimum order?\"\n\
             Reformulated: \"What is the minimum order for olive oil from Al Noor Trading and Gulf Foods on {brand}?\"\n\n\
             CONVERSATION HISTORY:\n{transcript}\n\
             NEW USER QUESTION: {query}\n\n\
             REFORMULATED QUESTION (same language, no extra text):"
        )
    }

    /// Bullet digest of the last `max_turns` turns for the answer prompt.
    pub fn conversation_context(history: &[Turn], max_turns: usize) -> String {
        let recent = &history[history.len().saturating_sub(max_turns)..];
        recent
            .iter()
            .filter_map(|turn| {
                let content = truncate_chars(&turn.content, CONTEXT_TURN_CHARS);
                match turn.role {
                    Role::User => Some(format!("• User asked: {content}")),
                    Role::Assistant => Some(format!("• Assistant replied: {content}")),
                    Role::System => None,
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
