//! Post-generation response checks.
//!
//! The validator only reports; callers decide what to do with an invalid
//! response. Checks run in order and the first decisive one wins:
//! length floor, refusal recognition, off-topic leakage, numeric grounding,
//! coherence.

pub mod grounding;

use serde::Serialize;
use tracing::debug;
use turnstile_config::{BRAND_PLACEHOLDER, DomainProfile, ValidatorConfig};

use crate::error::Result;
use crate::lexicon::PatternSet;
use crate::preview;

pub use grounding::NumericGrounding;

const SENTENCE_MARKERS: &[char] = &['.', '?', '!', '。', '؟', '।', '॥', '？', '！'];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationReason {
    TooShort,
    Refusal,
    OffTopic { language: String },
    Ungrounded { score: f32 },
    Repetitive { unique_ratio: f32 },
    NoSentenceMarkers,
    LowAlphanumeric,
    Passed,
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationReason::TooShort => f.write_str("response too short or empty"),
            ValidationReason::Refusal => f.write_str("valid refusal response"),
            ValidationReason::OffTopic { language } => {
                write!(f, "off-topic content detected ({language})")
            }
            ValidationReason::Ungrounded { score } => {
                write!(f, "numbers not found in context (score: {score:.2})")
            }
            ValidationReason::Repetitive { unique_ratio } => {
                write!(f, "too repetitive (unique ratio: {unique_ratio:.2})")
            }
            ValidationReason::NoSentenceMarkers => {
                f.write_str("long response without sentence punctuation")
            }
            ValidationReason::LowAlphanumeric => f.write_str("too many special characters"),
            ValidationReason::Passed => f.write_str("passed all checks"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validation {
    pub is_valid: bool,
    pub reason: ValidationReason,
}

impl Validation {
    fn valid(reason: ValidationReason) -> Self {
        Self {
            is_valid: true,
            reason,
        }
    }

    fn invalid(reason: ValidationReason) -> Self {
        Self {
            is_valid: false,
            reason,
        }
    }
}

pub struct ResponseValidator {
    config: ValidatorConfig,
    refusal: PatternSet,
    off_topic: Vec<(String, PatternSet)>,
    grounding: NumericGrounding,
}

/// `(?:v1|v2|...)` over the escaped brand variants.
fn brand_alternation(profile: &DomainProfile) -> String {
    let mut variants: Vec<String> = profile
        .brand_variants
        .iter()
        .chain(std::iter::once(&profile.display_name))
        .map(|v| regex::escape(&v.to_lowercase()))
        .filter(|v| !v.is_empty())
        .collect();
    variants.sort();
    variants.dedup();
    format!("(?:{})", variants.join("|"))
}

impl ResponseValidator {
    pub fn new(config: ValidatorConfig, profile: &DomainProfile) -> Result<Self> {
        let brand = brand_alternation(profile);
        let refusal = PatternSet::new(
            profile
                .refusal_patterns
                .iter()
                .map(|p| p.replace(BRAND_PLACEHOLDER, &brand)),
        )?;
        let off_topic = profile
            .off_topic_response_patterns
            .iter()
            .map(|(lang, patterns)| Ok((lang.clone(), PatternSet::new(patterns)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            refusal,
            off_topic,
            grounding: NumericGrounding::new()?,
        })
    }

    pub fn validate(&self, query: &str, response: &str, context: &str) -> Validation {
        let result = self.check(response, context);
        debug!(
            query = %preview(query),
            valid = result.is_valid,
            reason = %result.reason,
            "Response validated"
        );
        result
    }

    fn check(&self, response: &str, context: &str) -> Validation {
        if response.trim().chars().count() < self.config.min_chars {
            return Validation::invalid(ValidationReason::TooShort);
        }

        let lower = response.to_lowercase();
        if self.refusal.count_matches(&lower) >= self.config.refusal_min_matches {
            return Validation::valid(ValidationReason::Refusal);
        }

        if let Some((language, _)) = self
            .off_topic
            .iter()
            .find(|(_, patterns)| patterns.any_match(response))
        {
            return Validation::invalid(ValidationReason::OffTopic {
                language: language.clone(),
            });
        }

        let score = self.grounding.ungrounded_ratio(response, context);
        if score > self.config.hallucination_threshold {
            return Validation::invalid(ValidationReason::Ungrounded { score });
        }

        self.coherence(response)
    }

    fn coherence(&self, response: &str) -> Validation {
        let lower = response.to_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();
        if words.len() > self.config.repetition_min_words {
            let unique = words.iter().collect::<std::collections::HashSet<_>>().len();
            let unique_ratio = unique as f32 / words.len() as f32;
            if unique_ratio < self.config.min_unique_ratio {
                return Validation::invalid(ValidationReason::Repetitive { unique_ratio });
            }
        }

        let length = response.chars().count();
        if length > self.config.punctuation_min_chars && !response.contains(SENTENCE_MARKERS) {
            return Validation::invalid(ValidationReason::NoSentenceMarkers);
        }

        let alphanumeric = response.chars().filter(|c| c.is_alphanumeric()).count();
        if (alphanumeric as f32) < length as f32 * self.config.min_alnum_ratio {
            return Validation::invalid(ValidationReason::LowAlphanumeric);
        }

        Validation::valid(ValidationReason::Passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> ResponseValidator {
        ResponseValidator::new(ValidatorConfig::default(), &DomainProfile::default()).unwrap()
    }

    #[test]
    fn near_empty_is_invalid() {
        let v = validator().validate("q", "   ok.   ", "");
        assert!(!v.is_valid);
        assert_eq!(v.reason, ValidationReason::TooShort);
    }

    #[test]
    fn refusal_wins_over_off_topic_words() {
        let response = "Sorry, I cannot help with the weather forecast. I'm a specialized assistant for Kaso only.";
        let v = validator().validate("what's the weather", response, "");
        assert!(v.is_valid);
        assert_eq!(v.reason, ValidationReason::Refusal);
    }

    #[test]
    fn arabic_refusal_recognised() {
        let response = "عذراً، أنا مساعد خاص بمنصة كاسو فقط. لا يمكنني الإجابة على أسئلة خارج نطاق كاسو.";
        assert_eq!(validator().validate("q", response, "").reason, ValidationReason::Refusal);
    }

    #[test]
    fn single_refusal_marker_is_not_enough() {
        let response = "Sorry for the wait! The weather in Dubai is sunny today.";
        let v = validator().validate("q", response, "");
        assert!(!v.is_valid);
        assert_eq!(v.reason, ValidationReason::OffTopic { language: "en".into() });
    }

    #[test]
    fn off_topic_in_other_scripts() {
        let v = validator().validate("q", "Сегодня хорошая погода в Дубае, но это не важно.", "");
        assert_eq!(v.reason, ValidationReason::OffTopic { language: "ru".into() });
    }

    #[test]
    fn ungrounded_numbers_are_flagged() {
        let v = validator().validate(
            "price?",
            "The price is 42 AED per carton and delivery takes 3 days.",
            "Olive oil is sold by the carton.",
        );
        assert!(!v.is_valid);
        assert!(matches!(v.reason, ValidationReason::Ungrounded { score } if score == 1.0));
    }

    #[test]
    fn grounded_numbers_pass() {
        let v = validator().validate(
            "price?",
            "The price is 42 AED per carton and delivery takes 3 days.",
            "Olive oil: 42 AED per carton. Delivery within 3 days.",
        );
        assert!(v.is_valid);
        assert_eq!(v.reason, ValidationReason::Passed);
    }

    #[test]
    fn repetition_is_incoherent() {
        let response = "order order order order order order order order order order order order.";
        let v = validator().validate("q", response, "");
        assert!(matches!(v.reason, ValidationReason::Repetitive { .. }));
    }

    #[test]
    fn long_text_needs_punctuation() {
        let response = "suppliers list their products and restaurants browse them and place orders all day";
        let v = validator().validate("q", response, "");
        assert_eq!(v.reason, ValidationReason::NoSentenceMarkers);

        let arabic = format!("{}؟", "يمكنك طلب المنتجات من الموردين عبر المنصة بسهولة كبيرة جدا");
        assert!(validator().validate("q", &arabic, "").is_valid);

        let hindi = "आप प्लेटफॉर्म पर आपूर्तिकर्ताओं से थोक ऑर्डर दे सकते हैं। डिलीवरी दो दिनों में होती है।";
        let v = validator().validate("q", hindi, "");
        assert!(v.is_valid, "{:?}", v.reason);

        let fullwidth = "您可以在平台上直接向供应商下批量订单，所有订单都可以在订单页面随时查看和跟踪，配送通常在两天内完成，如有问题请随时联系客服团队！";
        assert!(validator().validate("q", fullwidth, "").is_valid);
    }

    #[test]
    fn symbol_soup_is_incoherent() {
        let v = validator().validate("q", "#### ---- **** !!!!", "");
        assert_eq!(v.reason, ValidationReason::LowAlphanumeric);
    }

    #[test]
    fn reason_display() {
        assert_eq!(
            ValidationReason::Ungrounded { score: 0.9 }.to_string(),
            "numbers not found in context (score: 0.90)"
        );
    }
}
