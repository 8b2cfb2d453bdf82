//! Turnstile CLI: the main entry point.
//!
//! Commands:
//! - `onboard`      Write a default config
//! - `doctor`       Check config, key, and provider reachability
//! - `check`        Screen a query (disambiguation + intent cascade)
//! - `reformulate`  Rewrite a follow-up against a stored conversation
//! - `optimize`     Show how a stored conversation fits the token budget
//! - `validate`     Run the response checks on a draft answer
//! - `refusal`      Print the localized refusal for a language
//! - `chat`         Guarded chat, interactive or single-message

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "turnstile",
    about = "Turnstile: a query guard for domain-scoped support assistants",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Onboard,

    /// Diagnose configuration and provider health
    Doctor,

    /// Decide whether a query should be answered
    Check {
        query: String,

        /// Language tag; detected from the query when omitted
        #[arg(short, long)]
        lang: Option<String>,
    },

    /// Rewrite a follow-up question into a self-contained one
    Reformulate {
        query: String,

        /// Conversation whose history is used
        #[arg(short, long)]
        conversation: String,
    },

    /// Fit a stored conversation into the token budget
    Optimize {
        #[arg(short, long)]
        conversation: String,

        /// File holding the system prompt to budget around
        #[arg(short, long)]
        system_prompt: Option<PathBuf>,
    },

    /// Validate a generated answer
    Validate {
        /// The generated answer
        #[arg(short, long)]
        response: String,

        /// The question it answers
        #[arg(short, long, default_value = "")]
        query: String,

        /// File holding the grounding context
        #[arg(short, long)]
        context: Option<PathBuf>,
    },

    /// Print the refusal message for a language
    Refusal {
        #[arg(short, long, default_value = "en")]
        lang: String,

        /// Colliding entity key for an entity-specific refusal
        #[arg(short, long)]
        entity: Option<String>,

        /// Entity refusal without naming a known entity
        #[arg(long, conflicts_with = "entity")]
        unknown_entity: bool,
    },

    /// Chat through the guard pipeline
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Conversation id; a new one is generated when omitted
        #[arg(short, long)]
        conversation: Option<String>,

        /// File holding the grounding context for answers
        #[arg(long)]
        context: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Check { query, lang } => commands::check::run(query, lang).await?,
        Commands::Reformulate {
            query,
            conversation,
        } => commands::reformulate::run(query, conversation).await?,
        Commands::Optimize {
            conversation,
            system_prompt,
        } => commands::optimize::run(conversation, system_prompt).await?,
        Commands::Validate {
            response,
            query,
            context,
        } => commands::validate::run(query, response, context)?,
        Commands::Refusal {
            lang,
            entity,
            unknown_entity,
        } => commands::refusal::run(lang, entity, unknown_entity).await?,
        Commands::Chat {
            message,
            conversation,
            context,
        } => commands::chat::run(message, conversation, context).await?,
    }

    Ok(())
}
