//! Configuration loading, validation, and management for Turnstile.
//!
//! Loads configuration from `~/.turnstile/config.toml` with environment
//! variable overrides. Validates all settings at startup.

pub mod profile;

pub use profile::{BRAND_PLACEHOLDER, CollidingEntity, DomainProfile};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.turnstile/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion and embedding endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// LLM provider ("groq", "openai", "openrouter", "ollama", ...)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL override for OpenAI-compatible endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Model used for user-facing answers
    #[serde(default = "default_model")]
    pub model: String,

    /// Multilingual sentence-embedding model
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Temperature for user-facing answers
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per user-facing answer
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Settings for internal calls (arbitration, rewriting, summaries, synthesis)
    #[serde(default)]
    pub auxiliary: AuxiliaryConfig,

    #[serde(default)]
    pub disambiguation: DisambiguationConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub reformulation: ReformulationConfig,

    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub localization: LocalizationConfig,

    #[serde(default)]
    pub validator: ValidatorConfig,

    /// Domain lexicons and examples
    #[serde(default)]
    pub profile: DomainProfile,
}

fn default_provider() -> String {
    "groq".into()
}
fn default_model() -> String {
    "llama-3.1-8b-instant".into()
}
fn default_embedding_model() -> String {
    "paraphrase-multilingual-MiniLM-L12-v2".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_true() -> bool {
    true
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("auxiliary", &self.auxiliary)
            .field("disambiguation", &self.disambiguation)
            .field("classifier", &self.classifier)
            .field("reformulation", &self.reformulation)
            .field("budget", &self.budget)
            .field("localization", &self.localization)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

/// Model settings for the short internal prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuxiliaryConfig {
    /// Falls back to the main model when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_aux_max_tokens")]
    pub max_tokens: u32,
}

fn default_aux_max_tokens() -> u32 {
    256
}

impl Default for AuxiliaryConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: 0.0,
            max_tokens: default_aux_max_tokens(),
        }
    }
}

/// Resolved model parameters handed to guard components.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisambiguationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// A Reject verdict at or above this confidence blocks the query
    #[serde(default = "default_reject_threshold")]
    pub reject_threshold: f32,

    /// In-domain score at or above which the query is accepted
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f32,

    /// In-domain score below which the query is rejected
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f32,
}

fn default_reject_threshold() -> f32 {
    0.8
}
fn default_high_threshold() -> f32 {
    2.0
}
fn default_low_threshold() -> f32 {
    0.5
}

impl Default for DisambiguationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reject_threshold: default_reject_threshold(),
            high_threshold: default_high_threshold(),
            low_threshold: default_low_threshold(),
        }
    }
}

/// What the classifier does when no stage reaches a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguousPolicy {
    /// Accept with low confidence (0.6)
    #[default]
    FailOpen,
    /// Refuse with confidence 0.8
    FailClosed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Queries shorter than this (in characters) are Uncertain
    #[serde(default = "default_min_query_chars")]
    pub min_query_chars: usize,

    /// Enables the keyword-scoring stage
    #[serde(default)]
    pub lexical_enabled: bool,

    /// Keyword score needed to decide in the lexical stage
    #[serde(default = "default_lexical_threshold")]
    pub lexical_threshold: f32,

    /// Relative similarity beyond which the centroid stage decides
    #[serde(default = "default_centroid_margin")]
    pub centroid_margin: f32,

    /// Ask the auxiliary model when earlier stages are inconclusive
    #[serde(default = "default_true")]
    pub llm_arbitration: bool,

    #[serde(default)]
    pub ambiguous_policy: AmbiguousPolicy,

    /// A Refused verdict above this confidence blocks the query
    #[serde(default = "default_publish_threshold")]
    pub publish_threshold: f32,
}

fn default_min_query_chars() -> usize {
    3
}
fn default_lexical_threshold() -> f32 {
    2.0
}
fn default_centroid_margin() -> f32 {
    0.2
}
fn default_publish_threshold() -> f32 {
    0.75
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            min_query_chars: default_min_query_chars(),
            lexical_enabled: false,
            lexical_threshold: default_lexical_threshold(),
            centroid_margin: default_centroid_margin(),
            llm_arbitration: true,
            ambiguous_policy: AmbiguousPolicy::default(),
            publish_threshold: default_publish_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReformulationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Exchanges (user + assistant pairs) included in the rewrite prompt
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Per-turn character cap inside the rewrite prompt
    #[serde(default = "default_max_turn_chars")]
    pub max_turn_chars: usize,

    /// Rewrites longer than this multiple of the original are discarded
    #[serde(default = "default_max_growth_factor")]
    pub max_growth_factor: usize,
}

fn default_max_turns() -> usize {
    3
}
fn default_max_turn_chars() -> usize {
    300
}
fn default_max_growth_factor() -> usize {
    3
}

impl Default for ReformulationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_turns: default_max_turns(),
            max_turn_chars: default_max_turn_chars(),
            max_growth_factor: default_max_growth_factor(),
        }
    }
}

/// Token budget parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_max_context_window")]
    pub max_context_window: usize,

    #[serde(default = "default_prompt_buffer")]
    pub prompt_buffer: usize,

    #[serde(default = "default_response_reserve")]
    pub response_reserve: usize,

    #[serde(default = "default_safety_margin")]
    pub safety_margin: usize,

    /// Most recent turns always kept verbatim when summarizing
    #[serde(default = "default_recent_keep")]
    pub recent_keep: usize,

    /// Turns dropped per aggressive-truncation attempt
    #[serde(default = "default_truncation_step")]
    pub truncation_step: usize,

    /// Formatting overhead added to every turn's token count
    #[serde(default = "default_turn_overhead")]
    pub turn_overhead: usize,

    /// Transcript length (characters) handed to the summarizer
    #[serde(default = "default_summary_input_chars")]
    pub summary_input_chars: usize,

    /// Summary length cap (characters)
    #[serde(default = "default_summary_output_chars")]
    pub summary_output_chars: usize,
}

fn default_max_context_window() -> usize {
    8000
}
fn default_prompt_buffer() -> usize {
    1000
}
fn default_response_reserve() -> usize {
    1024
}
fn default_safety_margin() -> usize {
    500
}
fn default_recent_keep() -> usize {
    10
}
fn default_truncation_step() -> usize {
    2
}
fn default_turn_overhead() -> usize {
    4
}
fn default_summary_input_chars() -> usize {
    4000
}
fn default_summary_output_chars() -> usize {
    1000
}

impl BudgetConfig {
    /// Tokens available for history and system prompt combined.
    pub fn available_tokens(&self) -> usize {
        self.max_context_window
            .saturating_sub(self.prompt_buffer)
            .saturating_sub(self.response_reserve)
            .saturating_sub(self.safety_margin)
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_context_window: default_max_context_window(),
            prompt_buffer: default_prompt_buffer(),
            response_reserve: default_response_reserve(),
            safety_margin: default_safety_margin(),
            recent_keep: default_recent_keep(),
            truncation_step: default_truncation_step(),
            turn_overhead: default_turn_overhead(),
            summary_input_chars: default_summary_input_chars(),
            summary_output_chars: default_summary_output_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizationConfig {
    /// Ask the auxiliary model for messages in languages without a table entry
    #[serde(default = "default_true")]
    pub synthesis_enabled: bool,

    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_cache_capacity() -> usize {
    100
}
fn default_language() -> String {
    "en".into()
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            synthesis_enabled: true,
            cache_capacity: default_cache_capacity(),
            default_language: default_language(),
        }
    }
}

/// Thresholds for the response validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,

    /// Refusal patterns that must match for a response to count as a refusal
    #[serde(default = "default_refusal_min_matches")]
    pub refusal_min_matches: usize,

    /// Share of ungrounded numbers above which a response is invalid
    #[serde(default = "default_hallucination_threshold")]
    pub hallucination_threshold: f32,

    #[serde(default = "default_min_unique_ratio")]
    pub min_unique_ratio: f32,

    #[serde(default = "default_repetition_min_words")]
    pub repetition_min_words: usize,

    #[serde(default = "default_punctuation_min_chars")]
    pub punctuation_min_chars: usize,

    #[serde(default = "default_min_alnum_ratio")]
    pub min_alnum_ratio: f32,
}

fn default_min_chars() -> usize {
    10
}
fn default_refusal_min_matches() -> usize {
    2
}
fn default_hallucination_threshold() -> f32 {
    0.8
}
fn default_min_unique_ratio() -> f32 {
    0.3
}
fn default_repetition_min_words() -> usize {
    10
}
fn default_punctuation_min_chars() -> usize {
    50
}
fn default_min_alnum_ratio() -> f32 {
    0.5
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
            refusal_min_matches: default_refusal_min_matches(),
            hallucination_threshold: default_hallucination_threshold(),
            min_unique_ratio: default_min_unique_ratio(),
            repetition_min_words: default_repetition_min_words(),
            punctuation_min_chars: default_punctuation_min_chars(),
            min_alnum_ratio: default_min_alnum_ratio(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.turnstile/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `TURNSTILE_API_KEY` (highest priority)
    /// - `GROQ_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("TURNSTILE_API_KEY")
                .ok()
                .or_else(|| std::env::var("GROQ_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("TURNSTILE_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("TURNSTILE_MODEL") {
            config.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".turnstile")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let unit_thresholds = [
            ("disambiguation.reject_threshold", self.disambiguation.reject_threshold),
            ("classifier.centroid_margin", self.classifier.centroid_margin),
            ("classifier.publish_threshold", self.classifier.publish_threshold),
            ("validator.hallucination_threshold", self.validator.hallucination_threshold),
            ("validator.min_unique_ratio", self.validator.min_unique_ratio),
            ("validator.min_alnum_ratio", self.validator.min_alnum_ratio),
        ];
        for (name, value) in unit_thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 1.0"
                )));
            }
        }

        if self.disambiguation.low_threshold > self.disambiguation.high_threshold {
            return Err(ConfigError::ValidationError(
                "disambiguation.low_threshold must not exceed high_threshold".into(),
            ));
        }

        if self.budget.recent_keep == 0 {
            return Err(ConfigError::ValidationError(
                "budget.recent_keep must be at least 1".into(),
            ));
        }

        if self.budget.truncation_step == 0 {
            return Err(ConfigError::ValidationError(
                "budget.truncation_step must be at least 1".into(),
            ));
        }

        if self.localization.cache_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "localization.cache_capacity must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Model settings for internal prompts.
    pub fn auxiliary_settings(&self) -> ModelSettings {
        ModelSettings {
            model: self
                .auxiliary
                .model
                .clone()
                .unwrap_or_else(|| self.model.clone()),
            temperature: self.auxiliary.temperature,
            max_tokens: self.auxiliary.max_tokens,
        }
    }

    /// Model settings for user-facing answers.
    pub fn answer_settings(&self) -> ModelSettings {
        ModelSettings {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            api_url: None,
            model: default_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            auxiliary: AuxiliaryConfig::default(),
            disambiguation: DisambiguationConfig::default(),
            classifier: ClassifierConfig::default(),
            reformulation: ReformulationConfig::default(),
            budget: BudgetConfig::default(),
            localization: LocalizationConfig::default(),
            validator: ValidatorConfig::default(),
            profile: DomainProfile::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for turnstile_core::Error {
    fn from(e: ConfigError) -> Self {
        turnstile_core::Error::Config {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider, "groq");
        assert_eq!(config.model, "llama-3.1-8b-instant");
        assert_eq!(config.budget.recent_keep, 10);
        assert_eq!(config.classifier.ambiguous_policy, AmbiguousPolicy::FailOpen);
    }

    #[test]
    fn available_budget_with_defaults() {
        let budget = BudgetConfig::default();
        assert_eq!(budget.available_tokens(), 8000 - 1000 - 1024 - 500);
    }

    #[test]
    fn available_budget_saturates() {
        let budget = BudgetConfig {
            max_context_window: 1000,
            ..BudgetConfig::default()
        };
        assert_eq!(budget.available_tokens(), 0);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider, config.provider);
        assert_eq!(parsed.profile.colliding_entities.len(), 4);
        assert_eq!(parsed.profile.greeting_patterns, config.profile.greeting_patterns);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let mut config = AppConfig::default();
        config.classifier.publish_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("publish_threshold"));
    }

    #[test]
    fn zero_recent_keep_rejected() {
        let mut config = AppConfig::default();
        config.budget.recent_keep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_disambiguation_thresholds_rejected() {
        let mut config = AppConfig::default();
        config.disambiguation.low_threshold = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider, "groq");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
model = "gpt-4o-mini"

[classifier]
ambiguous_policy = "fail_closed"
lexical_enabled = true

[budget]
recent_keep = 6
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.classifier.ambiguous_policy, AmbiguousPolicy::FailClosed);
        assert!(config.classifier.lexical_enabled);
        assert_eq!(config.budget.recent_keep, 6);
        assert_eq!(config.budget.max_context_window, 8000);
        assert_eq!(config.profile.display_name, "Kaso");
    }

    #[test]
    fn invalid_file_fails_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[budget]\nrecent_keep = 0").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn unparsable_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "temperature = \"hot\"").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn auxiliary_model_falls_back_to_main() {
        let config = AppConfig::default();
        let aux = config.auxiliary_settings();
        assert_eq!(aux.model, config.model);
        assert_eq!(aux.temperature, 0.0);
        assert_eq!(aux.max_tokens, 256);

        let mut config = AppConfig::default();
        config.auxiliary.model = Some("small".into());
        assert_eq!(config.auxiliary_settings().model, "small");
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("gsk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("gsk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("groq"));
        assert!(toml_str.contains("[profile]"));
    }
}
