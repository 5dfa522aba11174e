//! `dispatch standup`: run the standup and print events as they arrive.

use dispatch_agent::DispatchEngine;
use dispatch_config::AppConfig;

use super::terminal_printer;

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if !config.has_api_key() {
        return Err("No API key configured. Set ANTHROPIC_API_KEY or [provider].api_key.".into());
    }
    let engine = DispatchEngine::from_config(&config).await?;
    println!("Daily standup: {} lanes reporting\n", dispatch_core::Lane::STANDUP.len());
    terminal_printer(engine.lanes()).drain(engine.standup()).await
}
