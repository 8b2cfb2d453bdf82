//! Cascading intent classifier.
//!
//! Stages run in a fixed order and the first one that returns a verdict wins:
//!
//! 1. **Length guard**: trivial input is `Uncertain`
//! 2. **Brand mention**: any registered spelling of the brand forces `Accepted`
//! 3. **Greeting**: pattern match yields `Greeting`
//! 4. **Lexical** (opt-in): weighted keyword scores decide at 0.85
//! 5. **Centroid**: relative similarity to the in-domain and colliding centroids
//! 6. **Arbitration**: one-word LLM call, only when the centroid stage was inconclusive
//!
//! When nothing decides, the configured [`AmbiguousPolicy`] applies.

pub mod arbiter;
pub mod centroid;

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use turnstile_config::{AmbiguousPolicy, ClassifierConfig, DomainProfile, ModelSettings};
use turnstile_core::{CompletionProvider, EmbeddingProvider, ProviderError};

use crate::error::Result;
use crate::lexicon::{KeywordTable, PatternSet};
use crate::preview;
use crate::verdict::{Category, ClassificationVerdict, Decision, ReasonCode};

pub use arbiter::{Arbiter, ArbiterAnswer};
pub use centroid::{DomainCentroid, DualCentroid, cosine_similarity};

const TOO_SHORT_CONFIDENCE: f32 = 0.5;
const BRAND_CONFIDENCE: f32 = 0.9;
const GREETING_CONFIDENCE: f32 = 0.95;
const LEXICAL_CONFIDENCE: f32 = 0.85;
const CENTROID_CONFIDENCE: f32 = 0.85;
const ARBITRATION_CONFIDENCE: f32 = 0.9;
const ARBITRATION_FAILED_CONFIDENCE: f32 = 0.5;
const FAIL_OPEN_CONFIDENCE: f32 = 0.6;
const FAIL_CLOSED_CONFIDENCE: f32 = 0.8;

/// Lexical weights: whole-word hits count triple a substring hit.
const LEXICAL_EXACT: f32 = 1.5;
const LEXICAL_PARTIAL: f32 = 0.5;

/// One step of the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LengthGuard,
    BrandMention,
    Greeting,
    Lexical,
    Centroid,
    Arbitration,
}

/// Facts earlier stages leave for later ones.
#[derive(Debug, Default)]
struct CascadeState {
    ambiguous: bool,
    relative: Option<f32>,
}

pub struct IntentClassifier {
    config: ClassifierConfig,
    stages: Vec<Stage>,
    brand_variants: PatternSet,
    greetings: PatternSet,
    in_domain_keywords: KeywordTable,
    off_topic_keywords: KeywordTable,
    in_domain_examples: Vec<String>,
    colliding_examples: Vec<String>,
    embedder: Arc<dyn EmbeddingProvider>,
    arbiter: Arbiter,
    centroids: OnceCell<DualCentroid>,
}

impl IntentClassifier {
    pub fn new(
        profile: &DomainProfile,
        config: ClassifierConfig,
        settings: ModelSettings,
        provider: Arc<dyn CompletionProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let mut stages = vec![Stage::LengthGuard, Stage::BrandMention, Stage::Greeting];
        if config.lexical_enabled {
            stages.push(Stage::Lexical);
        }
        stages.push(Stage::Centroid);
        if config.llm_arbitration {
            stages.push(Stage::Arbitration);
        }

        let classifier = Self {
            stages,
            brand_variants: PatternSet::terms(&profile.brand_variants)?,
            greetings: PatternSet::new(&profile.greeting_patterns)?,
            in_domain_keywords: KeywordTable::from_languages(&profile.in_domain_keywords)?,
            off_topic_keywords: KeywordTable::from_languages(&profile.off_topic_keywords)?,
            in_domain_examples: profile.in_domain_examples.clone(),
            colliding_examples: profile.colliding_examples.clone(),
            embedder,
            arbiter: Arbiter::new(provider, settings, profile),
            centroids: OnceCell::new(),
            config,
        };

        info!(
            stages = ?classifier.stages,
            policy = ?classifier.config.ambiguous_policy,
            "Intent classifier initialized"
        );
        Ok(classifier)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Build both centroids now instead of on the first query.
    pub async fn warm_up(&self) -> std::result::Result<(), ProviderError> {
        self.centroids().await.map(|_| ())
    }

    async fn centroids(&self) -> std::result::Result<&DualCentroid, ProviderError> {
        self.centroids
            .get_or_try_init(|| async {
                let in_domain = self.embedder.embed_batch(&self.in_domain_examples).await?;
                let colliding = self.embedder.embed_batch(&self.colliding_examples).await?;
                let dual = DomainCentroid::from_embeddings(&in_domain)
                    .zip(DomainCentroid::from_embeddings(&colliding))
                    .map(|(in_domain, colliding)| DualCentroid {
                        in_domain,
                        colliding,
                    })
                    .ok_or(ProviderError::EmptyResponse)?;
                info!(
                    dimension = dual.in_domain.dimension(),
                    in_domain_examples = in_domain.len(),
                    colliding_examples = colliding.len(),
                    "Domain centroids built"
                );
                Ok::<_, ProviderError>(dual)
            })
            .await
    }

    pub async fn classify(&self, query: &str) -> ClassificationVerdict {
        let mut state = CascadeState::default();

        for stage in &self.stages {
            let verdict = match stage {
                Stage::LengthGuard => self.length_guard(query),
                Stage::BrandMention => self.brand_mention(query),
                Stage::Greeting => self.greeting(query),
                Stage::Lexical => self.lexical(query),
                Stage::Centroid => self.centroid(query, &mut state).await,
                Stage::Arbitration => self.arbitration(query, &state).await,
            };
            if let Some(verdict) = verdict {
                info!(
                    query = %preview(query),
                    ?stage,
                    category = ?verdict.category,
                    confidence = verdict.confidence,
                    reason = %verdict.reason,
                    "Query classified"
                );
                return verdict;
            }
        }

        let verdict = match self.config.ambiguous_policy {
            AmbiguousPolicy::FailOpen => {
                ClassificationVerdict::accepted(FAIL_OPEN_CONFIDENCE, ReasonCode::AmbiguousDefault)
            }
            AmbiguousPolicy::FailClosed => {
                ClassificationVerdict::refused(FAIL_CLOSED_CONFIDENCE, ReasonCode::AmbiguousDefault)
            }
        };
        info!(
            query = %preview(query),
            relative = ?state.relative,
            category = ?verdict.category,
            "No stage decided; applying ambiguous policy"
        );
        verdict
    }

    /// Classify and apply the publish threshold.
    pub async fn should_process(&self, query: &str) -> Decision {
        let verdict = self.classify(query).await;
        Decision {
            allowed: verdict.admits(self.config.publish_threshold),
            verdict,
        }
    }

    fn length_guard(&self, query: &str) -> Option<ClassificationVerdict> {
        (query.trim().chars().count() < self.config.min_query_chars).then(|| {
            ClassificationVerdict::new(Category::Uncertain, TOO_SHORT_CONFIDENCE, ReasonCode::TooShort)
        })
    }

    fn brand_mention(&self, query: &str) -> Option<ClassificationVerdict> {
        self.brand_variants
            .any_match(query)
            .then(|| ClassificationVerdict::accepted(BRAND_CONFIDENCE, ReasonCode::BrandMention))
    }

    fn greeting(&self, query: &str) -> Option<ClassificationVerdict> {
        let normalized = query.trim().to_lowercase();
        self.greetings.any_match(&normalized).then(|| {
            ClassificationVerdict::new(Category::Greeting, GREETING_CONFIDENCE, ReasonCode::Greeting)
        })
    }

    fn lexical(&self, query: &str) -> Option<ClassificationVerdict> {
        let threshold = self.config.lexical_threshold;
        let in_domain = self
            .in_domain_keywords
            .weighted_score(query, LEXICAL_EXACT, LEXICAL_PARTIAL);
        let off_topic = self
            .off_topic_keywords
            .weighted_score(query, LEXICAL_EXACT, LEXICAL_PARTIAL);
        debug!(in_domain, off_topic, "Lexical scores");

        if in_domain >= threshold {
            Some(ClassificationVerdict::accepted(LEXICAL_CONFIDENCE, ReasonCode::LexicalInDomain))
        } else if off_topic >= threshold {
            Some(ClassificationVerdict::refused(LEXICAL_CONFIDENCE, ReasonCode::LexicalOffTopic))
        } else {
            None
        }
    }

    async fn centroid(&self, query: &str, state: &mut CascadeState) -> Option<ClassificationVerdict> {
        let centroids = match self.centroids().await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Centroids unavailable; deferring to arbitration");
                state.ambiguous = true;
                return None;
            }
        };
        let embedding = match self.embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Query embedding failed; deferring to arbitration");
                state.ambiguous = true;
                return None;
            }
        };

        let relative = centroids.relative(&embedding);
        state.relative = Some(relative);
        debug!(relative, margin = self.config.centroid_margin, "Centroid similarity");

        if relative > self.config.centroid_margin {
            Some(ClassificationVerdict::accepted(CENTROID_CONFIDENCE, ReasonCode::CentroidInDomain))
        } else if relative < -self.config.centroid_margin {
            Some(ClassificationVerdict::refused(CENTROID_CONFIDENCE, ReasonCode::CentroidColliding))
        } else {
            state.ambiguous = true;
            None
        }
    }

    async fn arbitration(&self, query: &str, state: &CascadeState) -> Option<ClassificationVerdict> {
        if !state.ambiguous {
            return None;
        }
        match self.arbiter.arbitrate(query).await {
            Ok(ArbiterAnswer::InDomain) => Some(ClassificationVerdict::accepted(
                ARBITRATION_CONFIDENCE,
                ReasonCode::ArbitrationInDomain,
            )),
            Ok(ArbiterAnswer::Colliding(entity)) => Some(
                ClassificationVerdict::refused(ARBITRATION_CONFIDENCE, ReasonCode::ArbitrationColliding)
                    .with_entity(entity),
            ),
            Ok(ArbiterAnswer::OffTopic) => Some(ClassificationVerdict::refused(
                ARBITRATION_CONFIDENCE,
                ReasonCode::ArbitrationOffTopic,
            )),
            Ok(ArbiterAnswer::Unclear) => None,
            Err(e) => {
                warn!(error = %e, "Arbitration failed; failing open");
                Some(ClassificationVerdict::accepted(
                    ARBITRATION_FAILED_CONFIDENCE,
                    ReasonCode::ArbitrationFailed,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingProvider, KeywordEmbedder, SequentialMockProvider, aux_settings};

    fn profile() -> DomainProfile {
        DomainProfile {
            in_domain_examples: vec![
                "wholesale order from a supplier".into(),
                "restaurant delivery and inventory".into(),
            ],
            colliding_examples: vec![
                "plastics molding factory".into(),
                "fireproof safe and vault".into(),
            ],
            ..DomainProfile::default()
        }
    }

    fn classifier_with(
        config: ClassifierConfig,
        provider: Arc<dyn CompletionProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> IntentClassifier {
        IntentClassifier::new(&profile(), config, aux_settings(), provider, embedder).unwrap()
    }

    fn classifier(provider: Arc<dyn CompletionProvider>) -> IntentClassifier {
        classifier_with(
            ClassifierConfig::default(),
            provider,
            Arc::new(KeywordEmbedder::trade_vs_industry()),
        )
    }

    #[test]
    fn stage_order_follows_flags() {
        let c = classifier(Arc::new(FailingProvider));
        assert_eq!(
            c.stages(),
            &[
                Stage::LengthGuard,
                Stage::BrandMention,
                Stage::Greeting,
                Stage::Centroid,
                Stage::Arbitration
            ]
        );

        let config = ClassifierConfig {
            lexical_enabled: true,
            llm_arbitration: false,
            ..Default::default()
        };
        let c = classifier_with(
            config,
            Arc::new(FailingProvider),
            Arc::new(KeywordEmbedder::trade_vs_industry()),
        );
        assert!(c.stages().contains(&Stage::Lexical));
        assert!(!c.stages().contains(&Stage::Arbitration));
    }

    #[tokio::test]
    async fn trivial_input_is_uncertain_and_allowed() {
        let c = classifier(Arc::new(FailingProvider));
        for q in ["", "  ", "ok"] {
            let d = c.should_process(q).await;
            assert_eq!(d.verdict.category, Category::Uncertain);
            assert_eq!(d.reason(), ReasonCode::TooShort);
            assert!(d.allowed);
        }
    }

    #[tokio::test]
    async fn every_brand_variant_is_accepted() {
        let c = classifier(Arc::new(FailingProvider));
        for variant in &DomainProfile::default().brand_variants {
            let v = c.classify(&format!("tell me the weather near {variant} please")).await;
            assert_eq!(v.category, Category::Accepted, "variant {variant}");
            assert_eq!(v.reason, ReasonCode::BrandMention);
            assert!((v.confidence - 0.9).abs() < f32::EPSILON);
        }
    }

    #[tokio::test]
    async fn brand_match_is_case_insensitive() {
        let c = classifier(Arc::new(FailingProvider));
        let v = c.classify("Does KASO ship to Jeddah?").await;
        assert_eq!(v.reason, ReasonCode::BrandMention);
    }

    #[tokio::test]
    async fn brand_inside_a_longer_word_is_not_a_mention() {
        let c = classifier(Arc::new(FailingProvider));
        let v = c.classify("latest news about the Kasowitz law firm lawsuit").await;
        assert_ne!(v.reason, ReasonCode::BrandMention);
    }

    #[tokio::test]
    async fn greetings_take_the_fast_path() {
        let c = classifier(Arc::new(FailingProvider));
        for q in ["Hello there", "مرحبا", "Good morning!", "bonjour"] {
            let v = c.classify(q).await;
            assert_eq!(v.category, Category::Greeting, "query {q}");
            assert!((v.confidence - 0.95).abs() < f32::EPSILON);
        }
    }

    #[tokio::test]
    async fn lexical_stage_decides_when_enabled() {
        let config = ClassifierConfig {
            lexical_enabled: true,
            ..Default::default()
        };
        let c = classifier_with(
            config,
            Arc::new(FailingProvider),
            Arc::new(KeywordEmbedder::trade_vs_industry()),
        );

        let v = c.classify("Which suppliers handle bulk orders?").await;
        assert_eq!(v.reason, ReasonCode::LexicalInDomain);
        assert!((v.confidence - 0.85).abs() < f32::EPSILON);

        let v = c.classify("Who won the football election?").await;
        assert_eq!(v.reason, ReasonCode::LexicalOffTopic);
        assert_eq!(v.category, Category::Refused);
    }

    #[tokio::test]
    async fn centroid_accepts_and_refuses() {
        let c = classifier(Arc::new(FailingProvider));

        let v = c.classify("Can a supplier handle a wholesale order?").await;
        assert_eq!(v.reason, ReasonCode::CentroidInDomain);
        assert_eq!(v.category, Category::Accepted);

        let v = c.classify("Do you sell a dental vault?").await;
        assert_eq!(v.reason, ReasonCode::CentroidColliding);
        assert_eq!(v.category, Category::Refused);
        assert!(!c.should_process("Do you sell a dental vault?").await.allowed);
    }

    #[tokio::test]
    async fn ambiguous_goes_to_arbitration() {
        let provider = Arc::new(SequentialMockProvider::texts(&["KASO_SECURITY"]));
        let c = classifier(provider.clone());

        // No keywords on either axis: zero vector, relative 0
        let v = c.classify("What are your opening hours?").await;
        assert_eq!(v.reason, ReasonCode::ArbitrationColliding);
        assert_eq!(v.matched_entity.as_deref(), Some("kaso_security"));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn arbitration_failure_fails_open() {
        let c = classifier(Arc::new(FailingProvider));
        let d = c.should_process("What are your opening hours?").await;
        assert_eq!(d.reason(), ReasonCode::ArbitrationFailed);
        assert_eq!(d.verdict.category, Category::Accepted);
        assert!((d.verdict.confidence - 0.5).abs() < f32::EPSILON);
        assert!(d.allowed);
    }

    #[tokio::test]
    async fn unclear_answer_uses_policy() {
        let config = ClassifierConfig {
            ambiguous_policy: AmbiguousPolicy::FailClosed,
            ..Default::default()
        };
        let c = classifier_with(
            config,
            Arc::new(SequentialMockProvider::texts(&["UNCLEAR"])),
            Arc::new(KeywordEmbedder::trade_vs_industry()),
        );
        let d = c.should_process("What are your opening hours?").await;
        assert_eq!(d.reason(), ReasonCode::AmbiguousDefault);
        assert_eq!(d.verdict.category, Category::Refused);
        assert!(!d.allowed);
    }

    #[tokio::test]
    async fn fail_open_default_without_arbitration() {
        let config = ClassifierConfig {
            llm_arbitration: false,
            ..Default::default()
        };
        let c = classifier_with(
            config,
            Arc::new(FailingProvider),
            Arc::new(KeywordEmbedder::trade_vs_industry()),
        );
        let d = c.should_process("What are your opening hours?").await;
        assert_eq!(d.reason(), ReasonCode::AmbiguousDefault);
        assert!((d.verdict.confidence - 0.6).abs() < f32::EPSILON);
        assert!(d.allowed);
    }

    #[tokio::test]
    async fn embedding_outage_defers_to_arbitration() {
        let c = classifier_with(
            ClassifierConfig::default(),
            Arc::new(SequentialMockProvider::texts(&["IN_DOMAIN"])),
            Arc::new(FailingProvider),
        );
        let v = c.classify("Can a supplier handle a wholesale order?").await;
        assert_eq!(v.reason, ReasonCode::ArbitrationInDomain);
        assert!(c.warm_up().await.is_err());
    }

    #[tokio::test]
    async fn centroids_are_built_once() {
        let embedder = Arc::new(KeywordEmbedder::trade_vs_industry());
        let c = classifier_with(
            ClassifierConfig::default(),
            Arc::new(FailingProvider),
            embedder.clone(),
        );
        c.warm_up().await.unwrap();
        assert_eq!(embedder.batch_calls(), 2);

        c.classify("Can a supplier handle a wholesale order?").await;
        c.classify("Do you sell a dental vault?").await;
        // Two example batches plus one single-query batch per classification
        assert_eq!(embedder.batch_calls(), 4);
    }
}
