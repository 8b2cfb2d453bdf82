//! Per-request sequencing of the guard components.
//!
//! ```text
//! screen ──► contextualize ──► retrieve ──► prepare ──► persist user turn ──► stream ──► validate ──► persist answer
//!   │
//!   └─ refused: persist user turn + localized refusal
//! ```
//!
//! Steps run strictly in order. Retrieval sees the rewritten query, never the
//! raw follow-up. The user's turn is written before generation starts so an
//! interrupted stream never loses it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use turnstile_config::{AppConfig, DisambiguationConfig, DomainProfile, ModelSettings};
use turnstile_core::{
    CompletionProvider, CompletionRequest, ConversationId, EmbeddingProvider, LanguageDetector,
    MessageStore, Turn,
};

use crate::budget::{BudgetMetadata, BudgetPlan, TokenBudgetManager};
use crate::classifier::IntentClassifier;
use crate::disambiguator::{Disambiguation, DisambiguationOutcome, DomainDisambiguator};
use crate::error::Result;
use crate::localization::{LocalizationCache, MessageKind};
use crate::preview;
use crate::reformulator::{QueryReformulator, Reformulation};
use crate::validator::{ResponseValidator, Validation};
use crate::verdict::{Decision, Query};

/// Turns rendered into the system prompt's conversation digest.
const DIGEST_TURNS: usize = 6;

/// External collaborators the pipeline runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub completion: Arc<dyn CompletionProvider>,
    pub embedding: Arc<dyn EmbeddingProvider>,
    pub detector: Arc<dyn LanguageDetector>,
    pub store: Arc<dyn MessageStore>,
}

/// Why a query was refused.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum RefusalStage {
    Disambiguation(Disambiguation),
    Classification(Decision),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Screening {
    Allowed { decision: Decision },
    Refused { message: String, stage: RefusalStage },
}

impl Screening {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Screening::Allowed { .. })
    }
}

/// History and rewrite for one query.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub history: Vec<Turn>,
    pub reformulation: Reformulation,
}

/// Everything needed for the generation call.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub query: Query,
    pub reformulation: Reformulation,
    pub system_prompt: String,
    pub plan: BudgetPlan,
}

impl PreparedRequest {
    /// Budgeted history followed by the user's original wording.
    pub fn completion_request(&self, settings: &ModelSettings) -> CompletionRequest {
        let mut messages = self.plan.to_turns();
        messages.push(Turn::user(self.query.text.clone()));
        CompletionRequest::new(&settings.model, messages)
            .with_system_prompt(self.system_prompt.clone())
            .with_temperature(settings.temperature)
            .with_max_tokens(settings.max_tokens)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GuardedResponse {
    pub text: String,
    pub language: String,
    pub refused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reformulation: Option<Reformulation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
    /// The stream ended with an error after producing some text
    pub interrupted: bool,
}

pub struct GuardPipeline {
    profile: DomainProfile,
    disambiguation: DisambiguationConfig,
    answer: ModelSettings,
    disambiguator: DomainDisambiguator,
    classifier: IntentClassifier,
    reformulator: QueryReformulator,
    budget: TokenBudgetManager,
    localization: LocalizationCache,
    validator: ResponseValidator,
    collaborators: Collaborators,
}

impl GuardPipeline {
    pub fn new(config: &AppConfig, collaborators: Collaborators) -> Result<Self> {
        let profile = config.profile.clone();
        let aux = config.auxiliary_settings();
        let completion = collaborators.completion.clone();

        let pipeline = Self {
            disambiguator: DomainDisambiguator::new(&profile, &config.disambiguation)?,
            classifier: IntentClassifier::new(
                &profile,
                config.classifier.clone(),
                aux.clone(),
                completion.clone(),
                collaborators.embedding.clone(),
            )?,
            reformulator: QueryReformulator::new(
                completion.clone(),
                aux.clone(),
                config.reformulation.clone(),
                &profile,
            )?,
            budget: TokenBudgetManager::new(
                completion.clone(),
                aux.clone(),
                profile.display_name.clone(),
                config.budget.clone(),
            ),
            localization: LocalizationCache::new(
                completion,
                aux,
                config.localization.clone(),
                &profile,
            ),
            validator: ResponseValidator::new(config.validator.clone(), &profile)?,
            disambiguation: config.disambiguation.clone(),
            answer: config.answer_settings(),
            collaborators,
            profile,
        };

        info!(
            brand = %pipeline.profile.display_name,
            provider = pipeline.collaborators.completion.name(),
            store = pipeline.collaborators.store.name(),
            "Guard pipeline ready"
        );
        Ok(pipeline)
    }

    pub fn disambiguator(&self) -> &DomainDisambiguator {
        &self.disambiguator
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn reformulator(&self) -> &QueryReformulator {
        &self.reformulator
    }

    pub fn budget(&self) -> &TokenBudgetManager {
        &self.budget
    }

    pub fn localization(&self) -> &LocalizationCache {
        &self.localization
    }

    pub fn validator(&self) -> &ResponseValidator {
        &self.validator
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.collaborators.store
    }

    /// Tag `text` with its detected language.
    pub fn query(&self, text: impl Into<String>) -> Query {
        Query::detect(text, self.collaborators.detector.as_ref())
    }

    /// Disambiguation gate, then the intent cascade.
    pub async fn screen(&self, query: &Query) -> Screening {
        if self.disambiguation.enabled {
            let d = self.disambiguator.classify(&query.text);
            if d.outcome == DisambiguationOutcome::Reject
                && d.confidence >= self.disambiguation.reject_threshold
            {
                info!(
                    query = %preview(&query.text),
                    entity = ?d.matched_entity,
                    confidence = d.confidence,
                    "Refused by disambiguation"
                );
                let kind = MessageKind::EntityRefusal {
                    entity: d.matched_entity.clone(),
                };
                let message = self.localization.message(&kind, &query.language).await;
                return Screening::Refused {
                    message,
                    stage: RefusalStage::Disambiguation(d),
                };
            }
        }

        let decision = self.classifier.should_process(&query.text).await;
        if decision.allowed {
            return Screening::Allowed { decision };
        }

        let kind = match &decision.verdict.matched_entity {
            Some(entity) => MessageKind::entity(entity.clone()),
            None => MessageKind::Refusal,
        };
        let message = self.localization.message(&kind, &query.language).await;
        Screening::Refused {
            message,
            stage: RefusalStage::Classification(decision),
        }
    }

    /// Load history and rewrite the query against it.
    pub async fn contextualize(
        &self,
        conversation: &ConversationId,
        query: &Query,
    ) -> Result<QueryContext> {
        let history = self.collaborators.store.history(conversation).await?;
        let max_turns = self.reformulator.config().max_turns;
        let reformulation = self
            .reformulator
            .reformulate(&query.text, &history, max_turns)
            .await;
        Ok(QueryContext {
            history,
            reformulation,
        })
    }

    /// Build the system prompt and fit the history around it.
    pub async fn prepare(
        &self,
        conversation: &ConversationId,
        query: &Query,
        grounding: &str,
    ) -> Result<PreparedRequest> {
        let context = self.contextualize(conversation, query).await?;
        Ok(self.prepare_with(query, context, grounding).await)
    }

    pub async fn prepare_with(
        &self,
        query: &Query,
        context: QueryContext,
        grounding: &str,
    ) -> PreparedRequest {
        let digest = QueryReformulator::conversation_context(&context.history, DIGEST_TURNS);
        let system_prompt = self.system_prompt(&query.language, grounding, &digest);
        let plan = self.budget.optimize(&context.history, &system_prompt).await;
        PreparedRequest {
            query: query.clone(),
            reformulation: context.reformulation,
            system_prompt,
            plan,
        }
    }

    pub fn system_prompt(&self, language: &str, grounding: &str, digest: &str) -> String {
        let brand = &self.profile.display_name;
        let others = self
            .profile
            .colliding_entities
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let grounding = if grounding.trim().is_empty() {
            "(no reference material was found for this question)"
        } else {
            grounding
        };

        let mut prompt = format!(
            "You are a helpful AI assistant for {brand}, {description}.\n\n\
             IMPORTANT RULES:\n\
             1. Answer ONLY based on the provided context below.\n\
             2. If the information is not in the context, say \"I don't have this information in my knowledge base.\"\n\
             3. {instruction}\n\
             4. Be concise and helpful.\n\
             5. If asked about other companies named {brand} ({others}), clarify that you only have information about {brand}.\n\n\
             CONTEXT:\n{grounding}\n",
            description = self.profile.description,
            instruction = LocalizationCache::language_instruction(language),
        );
        if !digest.is_empty() {
            prompt.push_str(&format!("\nRECENT CONVERSATION:\n{digest}\n"));
        }
        prompt.push_str("\nRemember: only use information from the context above.");
        prompt
    }

    /// Run the full request: screen, contextualize, retrieve, generate,
    /// validate, persist.
    ///
    /// `retrieve` is called with the self-contained (reformulated) query and
    /// returns the grounding text; it is skipped for refused queries.
    /// `on_chunk` receives streamed text as it arrives; refusals are delivered
    /// through it in one piece.
    pub async fn respond<R, Fut>(
        &self,
        conversation: &ConversationId,
        query: &Query,
        retrieve: R,
        mut on_chunk: impl FnMut(&str) + Send,
    ) -> Result<GuardedResponse>
    where
        R: FnOnce(String) -> Fut,
        Fut: Future<Output = String>,
    {
        let store = &self.collaborators.store;

        if let Screening::Refused { message, .. } = self.screen(query).await {
            store.append(conversation, Turn::user(query.text.clone())).await?;
            store.append(conversation, Turn::assistant(message.clone())).await?;
            on_chunk(&message);
            return Ok(GuardedResponse {
                text: message,
                language: query.language.clone(),
                refused: true,
                reformulation: None,
                budget: None,
                validation: None,
                interrupted: false,
            });
        }

        let context = self.contextualize(conversation, query).await?;
        let grounding = retrieve(context.reformulation.reformulated.clone()).await;
        debug!(
            query = %preview(&context.reformulation.reformulated),
            chars = grounding.len(),
            "Grounding retrieved"
        );
        let prepared = self.prepare_with(query, context, &grounding).await;
        info!(
            strategy = %prepared.plan.strategy(),
            turns = prepared.plan.metadata.optimized_turns,
            tokens = prepared.plan.metadata.optimized_tokens,
            reformulated = prepared.reformulation.changed,
            "Request prepared"
        );

        store.append(conversation, Turn::user(query.text.clone())).await?;

        let request = prepared.completion_request(&self.answer);
        let mut rx = self.collaborators.completion.stream(request).await?;
        let mut text = String::new();
        let mut interrupted = false;
        while let Some(item) = rx.recv().await {
            match item {
                Ok(chunk) => {
                    if let Some(delta) = chunk.content.as_deref().filter(|d| !d.is_empty()) {
                        on_chunk(delta);
                        text.push_str(delta);
                    }
                    if chunk.done {
                        break;
                    }
                }
                Err(e) if text.is_empty() => return Err(e.into()),
                Err(e) => {
                    warn!(error = %e, chars = text.len(), "Stream interrupted; keeping partial answer");
                    interrupted = true;
                    break;
                }
            }
        }

        let validation = self.validator.validate(&query.text, &text, &grounding);
        if !validation.is_valid {
            warn!(reason = %validation.reason, query = %preview(&query.text), "Response failed validation");
        }

        store.append(conversation, Turn::assistant(text.clone())).await?;

        Ok(GuardedResponse {
            text,
            language: query.language.clone(),
            refused: false,
            reformulation: Some(prepared.reformulation),
            budget: Some(prepared.plan.metadata),
            validation: Some(validation),
            interrupted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::Strategy;
    use crate::error::GuardError;
    use crate::test_helpers::{FailingProvider, SequentialMockProvider};
    use async_trait::async_trait;
    use turnstile_core::{
        ChunkReceiver, CompletionResponse, FixedLanguage, ProviderError, Role, StreamChunk,
    };
    use turnstile_memory::InMemoryMessageStore;

    fn no_grounding(_query: String) -> std::future::Ready<String> {
        std::future::ready(String::new())
    }

    fn pipeline_with(completion: Arc<dyn CompletionProvider>) -> (GuardPipeline, Arc<InMemoryMessageStore>) {
        let store = Arc::new(InMemoryMessageStore::new());
        let pipeline = GuardPipeline::new(
            &AppConfig::default(),
            Collaborators {
                completion,
                embedding: Arc::new(FailingProvider),
                detector: Arc::new(FixedLanguage("en".into())),
                store: store.clone(),
            },
        )
        .unwrap();
        (pipeline, store)
    }

    /// Streams one chunk, then fails.
    struct BrokenStream;

    #[async_trait]
    impl CompletionProvider for BrokenStream {
        fn name(&self) -> &str {
            "broken_stream"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, ProviderError> {
            Err(ProviderError::Network("unused".into()))
        }

        async fn stream(
            &self,
            _request: CompletionRequest,
        ) -> std::result::Result<ChunkReceiver, ProviderError> {
            let (tx, rx) = tokio::sync::mpsc::channel(4);
            let _ = tx
                .send(Ok(StreamChunk {
                    content: Some("Orders can be tracked".into()),
                    done: false,
                    usage: None,
                }))
                .await;
            let _ = tx.send(Err(ProviderError::Network("reset".into()))).await;
            Ok(rx)
        }
    }

    /// Records whether the user's turn was already stored when generation began.
    struct StoreWatcher {
        store: Arc<InMemoryMessageStore>,
        conversation: ConversationId,
        saw_user_turn: std::sync::Mutex<Option<bool>>,
    }

    #[async_trait]
    impl CompletionProvider for StoreWatcher {
        fn name(&self) -> &str {
            "store_watcher"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> std::result::Result<CompletionResponse, ProviderError> {
            let history = self.store.history(&self.conversation).await.unwrap();
            let seen = history.last().is_some_and(|t| t.role == Role::User);
            *self.saw_user_turn.lock().unwrap() = Some(seen);
            Err(ProviderError::Network("down".into()))
        }
    }

    #[tokio::test]
    async fn colliding_entity_gets_entity_refusal() {
        let mock = Arc::new(SequentialMockProvider::new(vec![]));
        let (pipeline, _) = pipeline_with(mock.clone());

        let screening = pipeline
            .screen(&Query::new("Where can I buy a Kaso fireproof safe?", "en"))
            .await;
        match screening {
            Screening::Refused {
                message,
                stage: RefusalStage::Disambiguation(d),
            } => {
                assert_eq!(d.matched_entity.as_deref(), Some("kaso_security"));
                assert!(message.contains("safes company"), "{message}");
            }
            other => panic!("expected disambiguation refusal, got {other:?}"),
        }
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn refusal_follows_query_language() {
        let (pipeline, _) = pipeline_with(Arc::new(SequentialMockProvider::new(vec![])));
        let screening = pipeline.screen(&Query::new("هل تبيع كاسو خزنة أمان؟", "ar")).await;
        let Screening::Refused { message, .. } = screening else {
            panic!("expected refusal");
        };
        assert!(message.starts_with("عذراً"));
    }

    #[tokio::test]
    async fn brand_question_is_answered_and_persisted() {
        let mock = Arc::new(SequentialMockProvider::texts(&[
            "Open the Orders page to follow each delivery.",
        ]));
        let (pipeline, store) = pipeline_with(mock.clone());
        let conversation = ConversationId::from("c1");

        let mut streamed = String::new();
        let response = pipeline
            .respond(
                &conversation,
                &Query::new("How do I track my Kaso order?", "en"),
                |_| async { "Orders are tracked from the Orders page.".to_string() },
                |chunk| streamed.push_str(chunk),
            )
            .await
            .unwrap();

        assert!(!response.refused);
        assert!(!response.interrupted);
        assert_eq!(streamed, response.text);
        assert!(response.validation.as_ref().unwrap().is_valid);
        assert_eq!(response.budget.as_ref().unwrap().strategy, Strategy::NoneEmpty);

        let history = store.history(&conversation).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].content, response.text);

        let request = mock.last_request().unwrap();
        let system = request.system_prompt.unwrap();
        assert!(system.contains("You must respond in English."));
        assert!(system.contains("Orders are tracked from the Orders page."));
        assert_eq!(request.messages.last().unwrap().content, "How do I track my Kaso order?");
    }

    #[tokio::test]
    async fn refusal_is_persisted_with_the_query() {
        let (pipeline, store) = pipeline_with(Arc::new(SequentialMockProvider::new(vec![])));
        let conversation = ConversationId::from("c2");
        let response = pipeline
            .respond(
                &conversation,
                &Query::new("Kaso construction projects in Baghdad", "en"),
                no_grounding,
                |_| {},
            )
            .await
            .unwrap();

        assert!(response.refused);
        assert!(response.budget.is_none());
        let history = store.history(&conversation).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, response.text);
    }

    #[tokio::test]
    async fn user_turn_is_stored_before_generation() {
        let store = Arc::new(InMemoryMessageStore::new());
        let conversation = ConversationId::from("c3");
        let watcher = Arc::new(StoreWatcher {
            store: store.clone(),
            conversation: conversation.clone(),
            saw_user_turn: std::sync::Mutex::new(None),
        });
        let pipeline = GuardPipeline::new(
            &AppConfig::default(),
            Collaborators {
                completion: watcher.clone(),
                embedding: Arc::new(FailingProvider),
                detector: Arc::new(FixedLanguage("en".into())),
                store: store.clone(),
            },
        )
        .unwrap();

        let result = pipeline
            .respond(&conversation, &Query::new("Does Kaso deliver on Fridays?", "en"), no_grounding, |_| {})
            .await;

        assert!(matches!(result, Err(GuardError::Generation(_))));
        assert_eq!(*watcher.saw_user_turn.lock().unwrap(), Some(true));
        assert_eq!(store.history(&conversation).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn interrupted_stream_keeps_partial_text() {
        let (pipeline, store) = pipeline_with(Arc::new(BrokenStream));
        let conversation = ConversationId::from("c4");
        let response = pipeline
            .respond(&conversation, &Query::new("Kaso order tracking?", "en"), no_grounding, |_| {})
            .await
            .unwrap();

        assert!(response.interrupted);
        assert_eq!(response.text, "Orders can be tracked");
        let history = store.history(&conversation).await.unwrap();
        assert_eq!(history.last().unwrap().content, "Orders can be tracked");
    }

    #[tokio::test]
    async fn retrieval_sees_the_rewritten_follow_up() {
        let mock = Arc::new(SequentialMockProvider::texts(&[
            "How do I remove a supplier on Kaso?",
            "Open the supplier and press Remove.",
        ]));
        let (pipeline, store) = pipeline_with(mock.clone());
        let conversation = ConversationId::from("c5");
        store.append(&conversation, Turn::user("How do I add a new supplier on Kaso?")).await.unwrap();
        store.append(&conversation, Turn::assistant("Go to Suppliers and press Add.")).await.unwrap();

        let mut retrieved_for = None;
        let response = pipeline
            .respond(
                &conversation,
                &Query::new("And how do I remove it on Kaso?", "en"),
                |q| {
                    retrieved_for = Some(q);
                    async { "Suppliers are removed from their profile page.".to_string() }
                },
                |_| {},
            )
            .await
            .unwrap();

        assert_eq!(retrieved_for.as_deref(), Some("How do I remove a supplier on Kaso?"));
        assert_eq!(mock.call_count(), 2);
        let request = mock.last_request().unwrap();
        assert!(request.system_prompt.unwrap().contains("removed from their profile page"));
        assert_eq!(request.messages.last().unwrap().content, "And how do I remove it on Kaso?");
        assert!(!response.refused);
    }

    #[test]
    fn system_prompt_lists_colliding_companies() {
        let (pipeline, _) = pipeline_with(Arc::new(SequentialMockProvider::new(vec![])));
        let prompt = pipeline.system_prompt("fr", "", "• User asked: bonjour");
        assert!(prompt.contains("Vous devez répondre en français."));
        assert!(prompt.contains("no reference material"));
        assert!(prompt.contains("RECENT CONVERSATION"));
        for entity in &AppConfig::default().profile.colliding_entities {
            assert!(prompt.contains(&entity.name), "{}", entity.name);
        }
    }
}
