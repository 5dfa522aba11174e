//! `dispatch chat`: an interactive session with one lane at a time.
//!
//! Lines starting with `/` are commands; anything else is sent to the
//! current lane. `exit` (or end of input) leaves the session.

use std::io::Write;

use dispatch_agent::DispatchEngine;
use dispatch_config::AppConfig;
use dispatch_core::Lane;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

use super::EventPrinter;

const HELP: &str = "Type a message. 'exit' to quit. Commands: /lane <id>, /lanes, /refresh, /standup, /remember <note>";

/// One line of session input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    /// Blank line.
    Skip,
    Exit,
    Refresh,
    Lanes,
    Standup,
    SwitchLane(Lane),
    UnknownLane(String),
    Remember(String),
    /// A command used wrong; carries the usage line to show.
    Usage(&'static str),
    /// A `/word` that is not a command.
    UnknownCommand(String),
    Message(String),
}

/// Classify one input line. Command words are case-insensitive.
pub fn parse_input(line: &str) -> ReplInput {
    let line = line.trim();
    if line.is_empty() {
        return ReplInput::Skip;
    }
    if line.eq_ignore_ascii_case("exit") {
        return ReplInput::Exit;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ReplInput::Message(line.to_string());
    };
    let (word, rest) = match command.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (command, ""),
    };
    match word.to_ascii_lowercase().as_str() {
        "refresh" => ReplInput::Refresh,
        "lanes" => ReplInput::Lanes,
        "standup" => ReplInput::Standup,
        "lane" if rest.is_empty() => ReplInput::Usage("/lane <id>"),
        "lane" => match Lane::parse(rest) {
            Some(lane) => ReplInput::SwitchLane(lane),
            None => ReplInput::UnknownLane(rest.to_string()),
        },
        "remember" if rest.is_empty() => ReplInput::Usage("/remember <note>"),
        "remember" => ReplInput::Remember(rest.to_string()),
        _ => ReplInput::UnknownCommand(format!("/{word}")),
    }
}

pub async fn run(config: AppConfig, lane: Option<Lane>) -> Result<(), Box<dyn std::error::Error>> {
    if !config.has_api_key() {
        return Err("No API key configured. Set ANTHROPIC_API_KEY or [provider].api_key.".into());
    }
    let engine = DispatchEngine::from_config(&config).await?;
    let input = BufReader::new(tokio::io::stdin());
    session(&engine, lane.unwrap_or(Lane::Dispatch), input, std::io::stdout(), std::io::stderr()).await
}

/// Run a session until `exit` or end of input.
///
/// Replies go to `out`; prompts, notices and tool activity go to `err`. A
/// failed turn is reported and the session carries on.
pub async fn session<R, O, E>(
    engine: &DispatchEngine,
    mut lane: Lane,
    input: R,
    mut out: O,
    mut err: E,
) -> Result<(), Box<dyn std::error::Error>>
where
    R: AsyncBufRead + Unpin,
    O: Write,
    E: Write,
{
    let profile = engine.lanes().get(lane);
    writeln!(err, "{} {}: {}\n{HELP}\n", profile.emoji, profile.name, profile.description)?;

    let mut lines = input.lines();
    loop {
        write!(err, "{} > ", lane.id())?;
        err.flush()?;
        let Some(line) = lines.next_line().await? else {
            writeln!(err)?;
            break;
        };

        match parse_input(&line) {
            ReplInput::Skip => {}
            ReplInput::Exit => break,
            ReplInput::Refresh => {
                let notes = engine.refresh().await?;
                writeln!(err, "Vault refreshed: {notes} notes.")?;
            }
            ReplInput::Lanes => {
                for profile in engine.lanes().all() {
                    writeln!(err, "  {} {:<10}{}", profile.emoji, profile.lane.id(), profile.description)?;
                }
            }
            ReplInput::Standup => {
                let result = EventPrinter::new(engine.lanes(), &mut out, &mut err)
                    .drain(engine.standup())
                    .await;
                if let Err(e) = result {
                    debug!(error = %e, "Standup failed");
                }
            }
            ReplInput::SwitchLane(next) => {
                lane = next;
                let profile = engine.lanes().get(lane);
                writeln!(err, "Switched to {} {}.", profile.emoji, profile.name)?;
            }
            ReplInput::UnknownLane(id) => {
                let ids: Vec<&str> = Lane::ALL.iter().map(Lane::id).collect();
                writeln!(err, "Unknown lane '{id}'. Options: {}", ids.join(", "))?;
            }
            ReplInput::Remember(note) => match engine.remember(lane, &note).await {
                Ok(()) => writeln!(err, "Noted in {} memory.", lane.id())?,
                Err(e) => writeln!(err, "Error: {e}")?,
            },
            ReplInput::Usage(usage) => writeln!(err, "Usage: {usage}")?,
            ReplInput::UnknownCommand(word) => writeln!(err, "Unknown command {word}. {HELP}")?,
            ReplInput::Message(message) => {
                let result = EventPrinter::new(engine.lanes(), &mut out, &mut err)
                    .drain(engine.chat(lane, message))
                    .await;
                if let Err(e) = result {
                    debug!(lane = %lane, error = %e, "Chat turn failed");
                }
            }
        }
    }
    writeln!(err, "Dispatch out.")?;
    Ok(())
}
