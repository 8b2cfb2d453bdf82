//! `turnstile check`: screen a single query.

use turnstile_guard::Query;

use super::{CliResult, build_pipeline, load_config, print_json};

pub async fn run(text: String, lang: Option<String>) -> CliResult {
    let config = load_config()?;
    let pipeline = build_pipeline(&config)?;

    let query = match lang {
        Some(lang) => Query::new(text, lang),
        None => pipeline.query(text),
    };
    let screening = pipeline.screen(&query).await;
    print_json(&screening)
}
