pub mod chat;
pub mod check;
pub mod doctor;
pub mod onboard;
pub mod optimize;
pub mod reformulate;
pub mod refusal;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use turnstile_config::AppConfig;
use turnstile_guard::{Collaborators, GuardPipeline};
use turnstile_memory::JsonlMessageStore;
use turnstile_providers::{ScriptLanguageDetector, build_from_config};

pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub fn load_config() -> CliResult<AppConfig> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Wire the pipeline to the configured provider and the JSONL history file.
pub fn build_pipeline(config: &AppConfig) -> CliResult<GuardPipeline> {
    let providers = build_from_config(config);
    let collaborators = Collaborators {
        completion: providers.completion,
        embedding: providers.embedding,
        detector: Arc::new(ScriptLanguageDetector::new(
            config.localization.default_language.clone(),
        )),
        store: Arc::new(JsonlMessageStore::new(JsonlMessageStore::default_path())),
    };
    Ok(GuardPipeline::new(config, collaborators)?)
}

/// Contents of an optional text file; empty when no path is given.
pub fn read_optional(path: Option<&Path>) -> CliResult<String> {
    match path {
        Some(p) => std::fs::read_to_string(p)
            .map_err(|e| format!("Failed to read {}: {e}", p.display()).into()),
        None => Ok(String::new()),
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
