//! `dispatch ask`: one conversation turn printed to the terminal.

use dispatch_agent::{DispatchEngine, detect_lane};
use dispatch_config::AppConfig;
use dispatch_core::Lane;

use super::terminal_printer;

pub async fn run(config: AppConfig, lane: Option<Lane>, message: String) -> Result<(), Box<dyn std::error::Error>> {
    let message = message.trim();
    if message.is_empty() {
        return Err("Message cannot be empty".into());
    }
    if !config.has_api_key() {
        return Err("No API key configured. Set ANTHROPIC_API_KEY or [provider].api_key.".into());
    }

    let lane = lane.unwrap_or_else(|| detect_lane(message));
    let engine = DispatchEngine::from_config(&config).await?;
    let profile = engine.lanes().get(lane);
    eprintln!("{} {}\n", profile.emoji, profile.name);

    terminal_printer(engine.lanes()).drain(engine.chat(lane, message)).await
}
