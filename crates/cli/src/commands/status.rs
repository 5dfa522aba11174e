//! `dispatch status`: corpus counts per category and configured lanes.
//!
//! Reads the vault directly, so it works before an API key is set.

use dispatch_agent::LaneBook;
use dispatch_config::AppConfig;
use dispatch_core::KnowledgeStore;
use dispatch_vault::FileVault;

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let vault = FileVault::open(&config.vault_path).await?;
    let lanes = LaneBook::from_config(&config)
        .with_prompt_files(&config.vault_path)
        .await;
    let corpus = vault.snapshot();

    println!("Dispatch Status");
    println!("===============");
    println!("  Config dir:     {}", AppConfig::config_dir().display());
    println!("  Vault:          {}", config.vault_path.display());
    println!("  Model:          {}", config.provider.model);
    println!("  Standup model:  {}", config.provider.standup_model);
    println!("  Gateway:        {}:{}", config.gateway.host, config.gateway.port);
    println!("  API key:        {}", if config.has_api_key() { "set" } else { "missing" });

    println!("\n  Notes: {}", corpus.len());
    for (category, count) in corpus.counts() {
        println!("    {:<14}{count}", category.to_string());
    }

    println!("\n  Lanes:");
    for profile in lanes.all() {
        println!("    {} {:<10}{}", profile.emoji, profile.name, profile.lane);
    }
    Ok(())
}
