//! `turnstile optimize`: show how a stored conversation fits the budget.

use std::path::PathBuf;

use serde_json::json;
use turnstile_core::{ConversationId, MessageStore};

use super::{CliResult, build_pipeline, load_config, print_json, read_optional};

pub async fn run(conversation: String, system_prompt: Option<PathBuf>) -> CliResult {
    let config = load_config()?;
    let pipeline = build_pipeline(&config)?;
    let system_prompt = read_optional(system_prompt.as_deref())?;

    let history = pipeline
        .store()
        .history(&ConversationId::from(&conversation))
        .await?;
    let budget = pipeline.budget();
    let before = budget.estimate_prompt(&system_prompt, &history);
    let plan = budget.optimize(&history, &system_prompt).await;
    let after = budget.estimate_prompt(&system_prompt, &plan.to_turns());

    print_json(&json!({
        "metadata": plan.metadata,
        "before": before,
        "after": after,
        "turns": plan.turns,
    }))
}
