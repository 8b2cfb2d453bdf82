//! `turnstile chat`: guarded chat, single-message or interactive.

use std::io::Write;
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};
use turnstile_core::ConversationId;
use turnstile_guard::{GuardPipeline, GuardedResponse};

use super::{CliResult, build_pipeline, load_config, read_optional};

pub async fn run(
    message: Option<String>,
    conversation: Option<String>,
    context: Option<PathBuf>,
) -> CliResult {
    let config = load_config()?;

    if !config.has_api_key() && config.provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GROQ_API_KEY      = 'gsk_...'   (default provider)");
        eprintln!("    OPENAI_API_KEY    = 'sk-...'");
        eprintln!("    TURNSTILE_API_KEY = '...'       (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", turnstile_config::AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let grounding = read_optional(context.as_deref())?;
    let pipeline = build_pipeline(&config)?;
    if let Err(e) = pipeline.classifier().warm_up().await {
        warn!(error = %e, "Centroid warm-up failed; will retry on first query");
    }

    let conversation = conversation
        .map(|id| ConversationId::from(&id))
        .unwrap_or_default();

    if let Some(text) = message {
        let response = turn(&pipeline, &conversation, &text, &grounding).await?;
        println!();
        report(&response);
        return Ok(());
    }

    println!();
    println!("  Turnstile Chat: Interactive Mode");
    println!("  ================================");
    println!();
    println!("  Brand:         {}", config.profile.display_name);
    println!("  Provider:      {}", config.provider);
    println!("  Model:         {}", config.model);
    println!("  Conversation:  {conversation}");
    println!("  Context:       {} chars", grounding.chars().count());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
            break;
        }

        print!("  Assistant > ");
        std::io::stdout().flush()?;
        match turn(&pipeline, &conversation, line, &grounding).await {
            Ok(response) => {
                println!();
                report(&response);
            }
            Err(e) => {
                println!();
                eprintln!("  [Error] {e}");
            }
        }
        println!();
    }

    println!();
    println!("  Goodbye! 👋");
    println!();
    Ok(())
}

async fn turn(
    pipeline: &GuardPipeline,
    conversation: &ConversationId,
    text: &str,
    grounding: &str,
) -> CliResult<GuardedResponse> {
    let query = pipeline.query(text);
    let retrieve = |rewritten: String| {
        debug!(query = %rewritten, "Grounding from context file");
        std::future::ready(grounding.to_string())
    };
    let response = pipeline
        .respond(conversation, &query, retrieve, |chunk| {
            print!("{chunk}");
            let _ = std::io::stdout().flush();
        })
        .await?;
    Ok(response)
}

/// One status line under the answer.
fn report(response: &GuardedResponse) {
    let mut notes = vec![format!("lang={}", response.language)];
    if response.refused {
        notes.push("refused".into());
    }
    if let Some(r) = response.reformulation.as_ref().filter(|r| r.changed) {
        notes.push(format!("asked as: {}", r.reformulated));
    }
    if let Some(budget) = &response.budget {
        notes.push(format!("history={}", budget.strategy));
    }
    if let Some(v) = response.validation.as_ref().filter(|v| !v.is_valid) {
        notes.push(format!("flagged: {}", v.reason));
    }
    if response.interrupted {
        notes.push("interrupted".into());
    }
    eprintln!("  ({})", notes.join(", "));
}
