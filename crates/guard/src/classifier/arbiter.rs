//! One-word LLM arbitration between the in-domain entity, each colliding
//! entity, and a generic off-topic bucket.

use std::sync::Arc;

use tracing::debug;
use turnstile_config::{DomainProfile, ModelSettings};
use turnstile_core::{CompletionProvider, CompletionRequest, ProviderError};

const IN_DOMAIN_LABEL: &str = "IN_DOMAIN";
const OFF_TOPIC_LABEL: &str = "OFFTOPIC";
const UNCLEAR_LABEL: &str = "UNCLEAR";

/// What the arbitration model answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArbiterAnswer {
    InDomain,
    /// Key of the colliding entity named by the model
    Colliding(String),
    OffTopic,
    Unclear,
}

pub struct Arbiter {
    provider: Arc<dyn CompletionProvider>,
    settings: ModelSettings,
    /// (label, entity key) for every colliding entity
    entity_labels: Vec<(String, String)>,
    categories: String,
}

impl Arbiter {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        settings: ModelSettings,
        profile: &DomainProfile,
    ) -> Self {
        let entity_labels: Vec<(String, String)> = profile
            .colliding_entities
            .iter()
            .map(|e| (e.key.to_uppercase(), e.key.clone()))
            .collect();

        let mut categories = format!(
            "{IN_DOMAIN_LABEL}: the question is about {}.\n",
            profile.description
        );
        for (entity, (label, _)) in profile.colliding_entities.iter().zip(&entity_labels) {
            categories.push_str(&format!(
                "{label}: the question is about {}, {}.\n",
                entity.name, entity.description
            ));
        }
        categories.push_str(&format!(
            "{OFF_TOPIC_LABEL}: the question is about something else entirely.\n\
             {UNCLEAR_LABEL}: you cannot tell.\n"
        ));

        Self {
            provider,
            settings,
            entity_labels,
            categories,
        }
    }

    fn label_list(&self) -> String {
        let mut labels = vec![IN_DOMAIN_LABEL.to_string()];
        labels.extend(self.entity_labels.iter().map(|(label, _)| label.clone()));
        labels.push(OFF_TOPIC_LABEL.into());
        labels.push(UNCLEAR_LABEL.into());
        labels.join(", ")
    }

    fn prompt(&self, query: &str) -> String {
        format!(
            "Classify the user's question into exactly one category.\n\n\
             {}\n\
             Question: \"{query}\"\n\n\
             Answer with one word only: {}.",
            self.categories,
            self.label_list()
        )
    }

    /// Ask the model. Provider failures are returned to the caller, which
    /// decides the fallback.
    pub async fn arbitrate(&self, query: &str) -> Result<ArbiterAnswer, ProviderError> {
        let request = CompletionRequest::prompt(&self.settings.model, self.prompt(query))
            .with_system_prompt(format!(
                "You are a precise intent classifier. Answer with one word only: {}.",
                self.label_list()
            ))
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens.min(16));

        let response = self.provider.complete(request).await?;
        let answer = self.parse(&response.content);
        debug!(raw = %response.content.trim(), ?answer, "Arbitration answer");
        Ok(answer)
    }

    /// First recognised label in the reply wins; anything else is unclear.
    fn parse(&self, reply: &str) -> ArbiterAnswer {
        let upper = reply.to_uppercase();
        for token in upper
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|t| !t.is_empty())
        {
            if token == IN_DOMAIN_LABEL {
                return ArbiterAnswer::InDomain;
            }
            if token == OFF_TOPIC_LABEL {
                return ArbiterAnswer::OffTopic;
            }
            if token == UNCLEAR_LABEL {
                return ArbiterAnswer::Unclear;
            }
            if let Some((_, key)) = self.entity_labels.iter().find(|(label, _)| label == token) {
                return ArbiterAnswer::Colliding(key.clone());
            }
        }
        ArbiterAnswer::Unclear
    }
}
