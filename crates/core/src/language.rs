//! Language detection contract.

/// Tag returned when detection fails or input is empty.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Best-effort language identification.
///
/// Implementations return an ISO 639-1 style tag ("en", "ar", "fr", ...)
/// and must never fail: on uncertainty they return [`DEFAULT_LANGUAGE`]
/// or another configured fallback tag.
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> String;
}

/// A detector that always answers with one fixed tag.
#[derive(Debug, Clone)]
pub struct FixedLanguage(pub String);

impl LanguageDetector for FixedLanguage {
    fn detect(&self, _text: &str) -> String {
        self.0.clone()
    }
}
