//! Prints the models the Gemini API reports and the queue the summarizer would try.

use anyhow::{Context, Result};
use std::sync::Arc;

use common::{credential_from_env, Config};
use vibedigest::digest::DEFAULT_API_KEY_ENV;
use vibedigest::llm::catalog::{build_queue, CatalogPolicy};
use vibedigest::llm::gemini::{GeminiProvider, DEFAULT_API_URL};
use vibedigest::llm::LlmProvider;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load_with_defaults(
        Some(std::path::Path::new("config.default.toml")),
        Some(std::path::Path::new(&config_path)),
    )
    .await?;

    let key_env = config.llm.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV);
    let api_key = credential_from_env(key_env).with_context(|| format!("Set {} to a real API key", key_env))?;
    let base_url = config.llm.api_url.as_deref().unwrap_or(DEFAULT_API_URL);

    println!("\n{}", "=".repeat(60));
    println!("Gemini model discovery");
    println!("Base URL: {}", base_url);
    println!("{}", "=".repeat(60));

    let provider: Arc<dyn LlmProvider> = Arc::new(GeminiProvider::new(base_url, api_key));
    let policy = CatalogPolicy::from_config(&config.llm);

    let discovered = match provider.list_models().await {
        Ok(models) => {
            println!("\n✓ {} models support generateContent:", models.len());
            for model in &models {
                println!("  - {}", model);
            }
            Some(models)
        }
        Err(e) => {
            println!("\n✗ Discovery failed: {:#}", e);
            println!("  The preference list will be used as is.");
            None
        }
    };

    println!("\nAttempt order:");
    for candidate in build_queue(&policy, discovered.as_deref()) {
        println!("  {}. {}", candidate.priority_rank + 1, candidate.identifier);
    }

    Ok(())
}
