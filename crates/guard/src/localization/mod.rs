//! Localized refusal copy.
//!
//! Lookups go through three tiers:
//!
//! 1. pre-written templates for a curated language set
//! 2. a bounded cache of previously synthesized messages
//! 3. synthesis by the auxiliary model, inserted into the cache
//!
//! With synthesis disabled, or when it fails, the default language's
//! template is returned instead. Failed syntheses are not cached.

pub mod cache;
pub mod tables;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, warn};
use turnstile_config::{DomainProfile, LocalizationConfig, ModelSettings};
use turnstile_core::{CompletionProvider, CompletionRequest, DEFAULT_LANGUAGE};

use cache::FifoCache;
use tables::{BRAND, ENTITY, ENTITY_DESCRIPTION, ENTITY_REFUSALS, LANGUAGE_INSTRUCTIONS, REFUSALS, RTL_LANGUAGES, lookup};

const SYSTEM_PROMPT: &str = "You are a helpful assistant that generates localized messages.";

/// Which message to produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Generic out-of-scope refusal
    Refusal,
    /// Refusal naming a colliding entity; `None` for an unidentified one
    EntityRefusal { entity: Option<String> },
}

impl MessageKind {
    pub fn entity(key: impl Into<String>) -> Self {
        MessageKind::EntityRefusal {
            entity: Some(key.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub fixed_languages: usize,
    pub synthesized: usize,
}

struct EntityInfo {
    name: String,
    description: String,
}

pub struct LocalizationCache {
    provider: Arc<dyn CompletionProvider>,
    settings: ModelSettings,
    config: LocalizationConfig,
    brand: String,
    brand_description: String,
    entities: HashMap<String, EntityInfo>,
    cache: Mutex<FifoCache<(MessageKind, String), String>>,
    synthesized: AtomicUsize,
}

/// Primary subtag, lowercased: "pt-BR" → "pt".
fn language_tag(lang: &str) -> String {
    lang.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

impl LocalizationCache {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        settings: ModelSettings,
        config: LocalizationConfig,
        profile: &DomainProfile,
    ) -> Self {
        let entities = profile
            .colliding_entities
            .iter()
            .map(|e| {
                (
                    e.key.clone(),
                    EntityInfo {
                        name: e.name.clone(),
                        description: e.description.clone(),
                    },
                )
            })
            .collect();

        info!(
            fixed_languages = REFUSALS.len(),
            capacity = config.cache_capacity,
            synthesis = config.synthesis_enabled,
            "Localization cache initialized"
        );

        Self {
            provider,
            settings,
            brand: profile.display_name.clone(),
            brand_description: profile.description.clone(),
            entities,
            cache: Mutex::new(FifoCache::new(config.cache_capacity)),
            synthesized: AtomicUsize::new(0),
            config,
        }
    }

    pub async fn message(&self, kind: &MessageKind, lang: &str) -> String {
        let lang = language_tag(lang);

        if let Some(text) = self.fixed(kind, &lang) {
            debug!(lang = %lang, "Using pre-written message");
            return text;
        }

        let key = (kind.clone(), lang.clone());
        if let Some(text) = self.cached(&key) {
            debug!(lang = %lang, "Using cached message");
            return text;
        }

        if !self.config.synthesis_enabled {
            warn!(lang = %lang, "No pre-written message and synthesis disabled; using default language");
            return self.fallback(kind);
        }

        let request = CompletionRequest::prompt(&self.settings.model, self.synthesis_prompt(kind, &lang))
            .with_system_prompt(SYSTEM_PROMPT)
            .with_temperature(self.settings.temperature)
            .with_max_tokens(self.settings.max_tokens);

        match self.provider.complete(request).await {
            Ok(response) if !response.content.trim().is_empty() => {
                let text = response.content.trim().to_string();
                self.synthesized.fetch_add(1, Ordering::Relaxed);
                let evicted = self.entries().insert(key, text.clone());
                if let Some((_, old_lang)) = evicted {
                    debug!(lang = %old_lang, "Evicted cached message");
                }
                info!(lang = %lang, text = %crate::preview(&text), "Synthesized localized message");
                text
            }
            Ok(_) => {
                warn!(lang = %lang, "Synthesis returned empty text; using default language");
                self.fallback(kind)
            }
            Err(e) => {
                warn!(lang = %lang, error = %e, "Synthesis failed; using default language");
                self.fallback(kind)
            }
        }
    }

    /// "Respond in X" sentence for the answer prompt.
    pub fn language_instruction(lang: &str) -> String {
        let lang = language_tag(lang);
        match lookup(LANGUAGE_INSTRUCTIONS, &lang) {
            Some(text) => text.to_string(),
            None => format!("You must respond in the language with code '{lang}'."),
        }
    }

    pub fn is_rtl(lang: &str) -> bool {
        RTL_LANGUAGES.contains(&language_tag(lang).as_str())
    }

    pub fn stats(&self) -> CacheStats {
        let (size, capacity) = {
            let entries = self.entries();
            (entries.len(), entries.capacity())
        };
        CacheStats {
            size,
            capacity,
            fixed_languages: REFUSALS.len(),
            synthesized: self.synthesized.load(Ordering::Relaxed),
        }
    }

    fn cached(&self, key: &(MessageKind, String)) -> Option<String> {
        self.entries().get(key).cloned()
    }

    /// The cache holds only finished strings, so a panic elsewhere while the
    /// lock was held cannot leave it half-written.
    fn entries(&self) -> MutexGuard<'_, FifoCache<(MessageKind, String), String>> {
        self.cache.lock().unwrap_or_else(|poisoned| {
            warn!("Localization cache lock was poisoned; recovering");
            self.cache.clear_poison();
            poisoned.into_inner()
        })
    }

    fn fixed(&self, kind: &MessageKind, lang: &str) -> Option<String> {
        match kind {
            MessageKind::Refusal => lookup(REFUSALS, lang).map(|t| t.replace(BRAND, &self.brand)),
            MessageKind::EntityRefusal { entity } => {
                let templates = lookup(ENTITY_REFUSALS, lang)?;
                let known = entity.as_deref().and_then(|key| self.entities.get(key));
                let text = match known {
                    Some(info) => templates
                        .named
                        .replace(ENTITY, &info.name)
                        .replace(ENTITY_DESCRIPTION, &info.description),
                    None => templates.unknown.to_string(),
                };
                Some(text.replace(BRAND, &self.brand))
            }
        }
    }

    /// Default-language template, then English.
    fn fallback(&self, kind: &MessageKind) -> String {
        let default = language_tag(&self.config.default_language);
        self.fixed(kind, &default)
            .or_else(|| self.fixed(kind, DEFAULT_LANGUAGE))
            .unwrap_or_default()
    }

    fn synthesis_prompt(&self, kind: &MessageKind, lang: &str) -> String {
        let brand = &self.brand;
        let subject = match kind {
            MessageKind::Refusal => format!(
                "A user asks a question that is NOT about {brand} ({}).",
                self.brand_description
            ),
            MessageKind::EntityRefusal { entity } => {
                match entity.as_deref().and_then(|key| self.entities.get(key)) {
                    Some(info) => format!(
                        "A user asks about {} ({}), a different company that shares the name {brand}.",
                        info.name, info.description
                    ),
                    None => format!(
                        "A user asks about a different company that shares the name {brand}."
                    ),
                }
            }
        };
        let english = self.fixed(kind, "en").unwrap_or_default();
        let arabic = self.fixed(kind, "ar").unwrap_or_default();

        format!(
            "Generate a polite refusal message in the language code '{lang}' for the following scenario:\n\n\
             Scenario: {subject}\n\n\
             The refusal message should:\n\
             1. Apologize politely\n\
             2. Explain that you are a specialized assistant ONLY for {brand}\n\
             3. State that you cannot answer questions outside {brand}'s scope\n\
             4. Be concise (1-2 sentences)\n\
             5. Be written ENTIRELY in the target language (code: {lang})\n\n\
             Example templates:\n\
             - English: \"{english}\"\n\
             - Arabic: \"{arabic}\"\n\n\
             Now generate the message in language code '{lang}':"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FailingProvider, SequentialMockProvider, aux_settings};

    fn cache_with(provider: Arc<dyn CompletionProvider>, config: LocalizationConfig) -> LocalizationCache {
        LocalizationCache::new(provider, aux_settings(), config, &DomainProfile::default())
    }

    #[tokio::test]
    async fn fixed_tier_needs_no_model() {
        let provider = Arc::new(SequentialMockProvider::texts(&[]));
        let c = cache_with(provider.clone(), LocalizationConfig::default());
        let en = c.message(&MessageKind::Refusal, "en").await;
        assert_eq!(
            en,
            "Sorry, I'm a specialized assistant for the Kaso platform only. I cannot answer questions outside Kaso's scope."
        );
        let ar = c.message(&MessageKind::Refusal, "ar-SA").await;
        assert!(ar.contains("Kaso"));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn poisoned_cache_lock_still_serves_and_stores() {
        let provider = Arc::new(SequentialMockProvider::texts(&["Samahani, mimi ni msaidizi wa Kaso tu."]));
        let c = cache_with(provider.clone(), LocalizationConfig::default());
        std::thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    let _guard = c.cache.lock().unwrap();
                    panic!("panic while holding the cache lock");
                })
                .join();
        });
        assert!(c.cache.is_poisoned());

        let first = c.message(&MessageKind::Refusal, "sw").await;
        let second = c.message(&MessageKind::Refusal, "sw").await;
        assert_eq!(first, second);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(c.stats().size, 1);
    }

    #[tokio::test]
    async fn synthesis_happens_once_per_pair() {
        let provider = Arc::new(SequentialMockProvider::texts(&["Samahani, mimi ni msaidizi wa Kaso tu."]));
        let c = cache_with(provider.clone(), LocalizationConfig::default());

        let first = c.message(&MessageKind::Refusal, "sw").await;
        let second = c.message(&MessageKind::Refusal, "sw").await;
        assert_eq!(first, "Samahani, mimi ni msaidizi wa Kaso tu.");
        assert_eq!(first, second);
        assert_eq!(provider.call_count(), 1);

        let stats = c.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.synthesized, 1);
        assert_eq!(stats.fixed_languages, 15);
        assert_eq!(stats.capacity, 100);

        let prompt = provider.last_request().unwrap().messages[0].content.clone();
        assert!(prompt.contains("language code 'sw'"));
        assert!(prompt.contains("- English: \"Sorry, I'm a specialized assistant"));
    }

    #[tokio::test]
    async fn failed_synthesis_falls_back_uncached() {
        let c = cache_with(Arc::new(FailingProvider), LocalizationConfig::default());
        let text = c.message(&MessageKind::Refusal, "sw").await;
        assert!(text.starts_with("Sorry, I'm a specialized assistant"));
        assert_eq!(c.stats().size, 0);
        assert_eq!(c.stats().synthesized, 0);
    }

    #[tokio::test]
    async fn disabled_synthesis_uses_default_language() {
        let config = LocalizationConfig {
            synthesis_enabled: false,
            default_language: "fr".into(),
            ..Default::default()
        };
        let provider = Arc::new(SequentialMockProvider::texts(&[]));
        let c = cache_with(provider.clone(), config);
        let text = c.message(&MessageKind::Refusal, "sw").await;
        assert!(text.starts_with("Désolé"));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn entity_refusals() {
        let provider = Arc::new(SequentialMockProvider::texts(&[]));
        let c = cache_with(provider.clone(), LocalizationConfig::default());

        let en = c.message(&MessageKind::entity("kaso_security"), "en").await;
        assert!(en.contains("Kaso Security (the Finnish security and safes company)"));

        let fr = c.message(&MessageKind::entity("kaso_medical"), "fr").await;
        assert!(fr.contains("Kaso Medical"));

        let unknown = c
            .message(&MessageKind::EntityRefusal { entity: None }, "de")
            .await;
        assert!(unknown.contains("namens Kaso"));

        let unregistered = c.message(&MessageKind::entity("kaso_bakery"), "en").await;
        assert!(unregistered.contains("a different company named Kaso"));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn entity_refusal_outside_fixed_tier_is_synthesized() {
        let provider = Arc::new(SequentialMockProvider::texts(&["Извините, это другая компания Kaso."]));
        let c = cache_with(provider.clone(), LocalizationConfig::default());
        let ru = c.message(&MessageKind::entity("kaso_group"), "ru").await;
        assert_eq!(ru, "Извините, это другая компания Kaso.");
        // Generic refusal for ru is pre-written and independent of the cache
        assert!(c.message(&MessageKind::Refusal, "ru").await.starts_with("Извините, я"));
        let prompt = provider.last_request().unwrap().messages[0].content.clone();
        assert!(prompt.contains("Kaso Group (the Iraqi business conglomerate)"));
    }

    #[tokio::test]
    async fn eviction_keeps_capacity() {
        let replies: Vec<String> = (0..3).map(|i| format!("message {i}")).collect();
        let provider = Arc::new(SequentialMockProvider::new(replies));
        let config = LocalizationConfig {
            cache_capacity: 2,
            ..Default::default()
        };
        let c = cache_with(provider.clone(), config);
        for lang in ["sw", "yo", "am"] {
            c.message(&MessageKind::Refusal, lang).await;
        }
        assert_eq!(c.stats().size, 2);
        assert_eq!(provider.call_count(), 3);
    }

    #[test]
    fn language_instructions() {
        assert_eq!(
            LocalizationCache::language_instruction("en"),
            "You must respond in English."
        );
        assert_eq!(
            LocalizationCache::language_instruction("fr-CA"),
            "Vous devez répondre en français."
        );
        assert_eq!(
            LocalizationCache::language_instruction("sw"),
            "You must respond in the language with code 'sw'."
        );
    }

    #[test]
    fn rtl_languages() {
        for lang in ["ar", "he", "fa", "ur", "AR"] {
            assert!(LocalizationCache::is_rtl(lang), "{lang}");
        }
        assert!(!LocalizationCache::is_rtl("en"));
    }
}
