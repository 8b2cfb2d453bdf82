//! `turnstile refusal`: print a localized refusal.

use turnstile_guard::{LocalizationCache, MessageKind};

use super::{CliResult, build_pipeline, load_config};

pub async fn run(lang: String, entity: Option<String>, unknown_entity: bool) -> CliResult {
    let config = load_config()?;
    let pipeline = build_pipeline(&config)?;

    let kind = match entity {
        Some(key) => {
            if pipeline.disambiguator().entity_description(&key).is_none() {
                return Err(format!("Unknown entity key: {key}").into());
            }
            MessageKind::entity(key)
        }
        None if unknown_entity => MessageKind::EntityRefusal { entity: None },
        None => MessageKind::Refusal,
    };

    let message = pipeline.localization().message(&kind, &lang).await;
    if LocalizationCache::is_rtl(&lang) {
        println!("\u{202B}{message}\u{202C}");
    } else {
        println!("{message}");
    }
    Ok(())
}
