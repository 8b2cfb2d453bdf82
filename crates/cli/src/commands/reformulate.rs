//! `turnstile reformulate`: rewrite a follow-up against stored history.

use turnstile_core::ConversationId;

use super::{CliResult, build_pipeline, load_config, print_json};

pub async fn run(text: String, conversation: String) -> CliResult {
    let config = load_config()?;
    let pipeline = build_pipeline(&config)?;

    let query = pipeline.query(text);
    let context = pipeline
        .contextualize(&ConversationId::from(&conversation), &query)
        .await?;
    print_json(&context.reformulation)
}
