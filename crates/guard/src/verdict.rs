//! Classification results and the per-request query value.

use serde::Serialize;
use turnstile_core::LanguageDetector;

/// An incoming user query with its detected language.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub text: String,
    pub language: String,
}

impl Query {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
        }
    }

    pub fn detect(text: impl Into<String>, detector: &dyn LanguageDetector) -> Self {
        let text = text.into();
        let language = detector.detect(&text);
        Self { text, language }
    }
}

/// What the classifier decided about a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Accepted,
    Refused,
    Greeting,
    Uncertain,
}

/// Which stage produced a verdict and on what grounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    TooShort,
    BrandMention,
    Greeting,
    LexicalInDomain,
    LexicalOffTopic,
    CentroidInDomain,
    CentroidColliding,
    ArbitrationInDomain,
    ArbitrationColliding,
    ArbitrationOffTopic,
    ArbitrationFailed,
    AmbiguousDefault,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::TooShort => "too_short",
            ReasonCode::BrandMention => "brand_mention",
            ReasonCode::Greeting => "greeting",
            ReasonCode::LexicalInDomain => "lexical_in_domain",
            ReasonCode::LexicalOffTopic => "lexical_off_topic",
            ReasonCode::CentroidInDomain => "centroid_in_domain",
            ReasonCode::CentroidColliding => "centroid_colliding",
            ReasonCode::ArbitrationInDomain => "arbitration_in_domain",
            ReasonCode::ArbitrationColliding => "arbitration_colliding",
            ReasonCode::ArbitrationOffTopic => "arbitration_off_topic",
            ReasonCode::ArbitrationFailed => "arbitration_failed",
            ReasonCode::AmbiguousDefault => "ambiguous_default",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationVerdict {
    pub category: Category,
    pub confidence: f32,
    pub reason: ReasonCode,
    /// Colliding-entity key when the verdict names one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_entity: Option<String>,
}

impl ClassificationVerdict {
    pub fn new(category: Category, confidence: f32, reason: ReasonCode) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
            reason,
            matched_entity: None,
        }
    }

    pub fn accepted(confidence: f32, reason: ReasonCode) -> Self {
        Self::new(Category::Accepted, confidence, reason)
    }

    pub fn refused(confidence: f32, reason: ReasonCode) -> Self {
        Self::new(Category::Refused, confidence, reason)
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.matched_entity = Some(entity.into());
        self
    }

    /// Whether a query with this verdict should be answered.
    ///
    /// Only a refusal above `publish_threshold` blocks; every other category,
    /// and low-confidence refusals, let the query through.
    pub fn admits(&self, publish_threshold: f32) -> bool {
        !(self.category == Category::Refused && self.confidence > publish_threshold)
    }
}

/// Outcome of `IntentClassifier::should_process`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub verdict: ClassificationVerdict,
}

impl Decision {
    pub fn reason(&self) -> ReasonCode {
        self.verdict.reason
    }
}
