//! `dispatch draft`: have the coordinator write a new note, show it, and
//! save it only once the user agrees.

use std::io::Write;

use dispatch_agent::{DispatchEngine, Draft};
use dispatch_config::AppConfig;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

pub async fn run(config: AppConfig, request: String, yes: bool) -> Result<(), Box<dyn std::error::Error>> {
    let request = request.trim();
    if request.is_empty() {
        return Err("Describe the note to draft".into());
    }
    if !config.has_api_key() {
        return Err("No API key configured. Set ANTHROPIC_API_KEY or [provider].api_key.".into());
    }
    let engine = DispatchEngine::from_config(&config).await?;
    eprintln!("Drafting...\n");
    let draft = engine.draft(request).await?;
    let input = BufReader::new(tokio::io::stdin());
    review(&engine, &draft, yes, input, std::io::stdout(), std::io::stderr()).await?;
    Ok(())
}

/// `y` or `yes`, any case.
pub fn confirmed(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Print the draft and save it if approved. Returns the saved path.
pub async fn review<R, O, E>(
    engine: &DispatchEngine,
    draft: &Draft,
    yes: bool,
    input: R,
    mut out: O,
    mut err: E,
) -> Result<Option<String>, Box<dyn std::error::Error>>
where
    R: AsyncBufRead + Unpin,
    O: Write,
    E: Write,
{
    writeln!(out, "{}", draft.content)?;
    let Some(path) = &draft.save_as else {
        writeln!(err, "\nNo SAVE_AS path was proposed. Nothing saved.")?;
        return Ok(None);
    };
    if draft.replaces {
        writeln!(err, "\n{path} already exists and would be replaced.")?;
    }
    if !yes {
        write!(err, "\nSave to {path}? [y/N] ")?;
        err.flush()?;
        let answer = input.lines().next_line().await?.unwrap_or_default();
        if !confirmed(&answer) {
            writeln!(err, "Discarded.")?;
            return Ok(None);
        }
    }
    let saved = engine.save_draft(draft).await?;
    writeln!(err, "Saved to {saved}")?;
    Ok(Some(saved))
}
