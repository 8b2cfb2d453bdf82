//! `turnstile doctor`: diagnose configuration and provider health.

use turnstile_config::AppConfig;
use turnstile_guard::budget::TokenCounter;
use turnstile_providers::build_from_config;

use super::{CliResult, build_pipeline};

pub async fn run() -> CliResult {
    println!("Turnstile Doctor: System Diagnostics");
    println!("====================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file, using defaults (run `turnstile onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  Fix the config file before continuing.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ API key configured");
    } else if config.provider == "ollama" {
        println!("  ✅ Local provider, no API key needed");
    } else {
        println!("  ⚠️  No API key, set GROQ_API_KEY or api_key in config.toml");
        issues += 1;
    }

    let counter = TokenCounter::new(config.budget.turn_overhead);
    if counter.is_exact() {
        println!("  ✅ BPE tokenizer loaded");
    } else {
        println!("  ⚠️  BPE tokenizer unavailable, token counts are estimates");
    }

    let providers = build_from_config(&config);
    match providers.completion.health_check().await {
        Ok(true) => println!("  ✅ Completion endpoint reachable ({})", config.provider),
        Ok(false) => {
            println!("  ❌ Completion endpoint rejected the health check");
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Completion endpoint unreachable: {e}");
            issues += 1;
        }
    }

    let pipeline = build_pipeline(&config)?;
    println!(
        "  ✅ Guard pipeline built ({} cascade stages)",
        pipeline.classifier().stages().len()
    );

    match pipeline.classifier().warm_up().await {
        Ok(()) => println!("  ✅ Embedding endpoint reachable, centroids built"),
        Err(e) => {
            println!("  ❌ Centroid warm-up failed: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
