//! `dispatch history`: print or reset a lane's display history.

use std::sync::Arc;

use dispatch_agent::{ConversationStore, DisplayTurn};
use dispatch_config::AppConfig;
use dispatch_core::{Lane, Role};
use dispatch_vault::FileHistoryStore;

pub async fn run(config: AppConfig, lane: Lane, clear: bool) -> Result<(), Box<dyn std::error::Error>> {
    // History lives beside the vault; no model connection needed.
    let history = Arc::new(FileHistoryStore::new(&config.vault_path));
    let store = ConversationStore::restore(history, config.conversation.history_cap).await;

    if clear {
        if !store.clear(lane).await {
            return Err(format!("Failed to clear history for {lane}").into());
        }
        println!("Cleared {lane} history.");
        return Ok(());
    }

    let turns: Vec<DisplayTurn> = store
        .display(lane)
        .await
        .into_iter()
        .map(|(role, text)| DisplayTurn { role, text })
        .collect();
    if turns.is_empty() {
        println!("No history for {lane}.");
    }
    for turn in turns {
        println!("{}\n", format_turn(&turn));
    }
    Ok(())
}

fn format_turn(turn: &DisplayTurn) -> String {
    let who = match turn.role {
        Role::User => "you",
        _ => "dispatch",
    };
    format!("[{who}] {}", turn.text)
}
