//! Brand-collision pre-filter.
//!
//! Runs before any model call. A query with two or more whole-word hits on a
//! colliding entity's keyword list is rejected outright; otherwise a weighted
//! in-domain keyword score decides between accept, reject and unknown.

use serde::Serialize;
use tracing::{debug, info};
use turnstile_config::{DisambiguationConfig, DomainProfile};

use crate::error::Result;
use crate::lexicon::KeywordTable;

const ACCEPT_CONFIDENCE: f32 = 0.9;
const LOW_SCORE_REJECT_CONFIDENCE: f32 = 0.7;
const UNKNOWN_CONFIDENCE: f32 = 0.5;
const ENTITY_KEYWORD_HITS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisambiguationOutcome {
    Accept,
    Reject,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disambiguation {
    pub outcome: DisambiguationOutcome,
    pub confidence: f32,
    /// Key of the colliding entity that triggered a rejection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_entity: Option<String>,
    /// Weighted in-domain keyword score (0 when an entity matched first)
    pub score: f32,
}

struct EntityMatcher {
    key: String,
    description: String,
    keywords: KeywordTable,
    confidence: f32,
}

pub struct DomainDisambiguator {
    entities: Vec<EntityMatcher>,
    in_domain: KeywordTable,
    high_threshold: f32,
    low_threshold: f32,
}

impl DomainDisambiguator {
    pub fn new(profile: &DomainProfile, config: &DisambiguationConfig) -> Result<Self> {
        let entities = profile
            .colliding_entities
            .iter()
            .map(|e| {
                Ok(EntityMatcher {
                    key: e.key.clone(),
                    description: e.description.clone(),
                    keywords: KeywordTable::new(&e.keywords)?,
                    confidence: e.confidence,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let in_domain = KeywordTable::from_languages(&profile.in_domain_keywords)?;

        info!(
            entities = entities.len(),
            in_domain_keywords = in_domain.len(),
            "Domain disambiguator initialized"
        );

        Ok(Self {
            entities,
            in_domain,
            high_threshold: config.high_threshold,
            low_threshold: config.low_threshold,
        })
    }

    pub fn classify(&self, query: &str) -> Disambiguation {
        let lower = query.to_lowercase();

        for entity in &self.entities {
            let hits = entity.keywords.word_matches(&lower);
            if hits >= ENTITY_KEYWORD_HITS {
                info!(entity = %entity.key, hits, "Colliding entity detected");
                return Disambiguation {
                    outcome: DisambiguationOutcome::Reject,
                    confidence: entity.confidence,
                    matched_entity: Some(entity.key.clone()),
                    score: 0.0,
                };
            }
            if hits == 1 {
                debug!(entity = %entity.key, "Weak colliding-entity signal");
            }
        }

        let score = self.in_domain.weighted_score(&lower, 1.0, 0.5);

        let (outcome, confidence) = if score >= self.high_threshold {
            (DisambiguationOutcome::Accept, ACCEPT_CONFIDENCE)
        } else if score < self.low_threshold {
            (DisambiguationOutcome::Reject, LOW_SCORE_REJECT_CONFIDENCE)
        } else {
            (DisambiguationOutcome::Unknown, UNKNOWN_CONFIDENCE)
        };

        debug!(score, ?outcome, "In-domain keyword score");

        Disambiguation {
            outcome,
            confidence,
            matched_entity: None,
            score,
        }
    }

    /// Description of a colliding entity, if the key is known.
    pub fn entity_description(&self, key: &str) -> Option<&str> {
        self.entities
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.description.as_str())
    }
}
