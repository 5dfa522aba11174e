//! CLI subcommand implementations.

pub mod ask;
pub mod chat;
pub mod draft;
pub mod history;
pub mod init;
pub mod search;
pub mod serve;
pub mod standup;
pub mod status;

#[cfg(test)]
mod test_support;

use std::io::Write;

use dispatch_agent::LaneBook;
use dispatch_core::DispatchEvent;
use tokio::sync::mpsc;

/// Renders a lane or standup event stream for a terminal.
///
/// Response text goes to `out` as it arrives; tool activity and errors go
/// to `err`.
pub struct EventPrinter<'a, O: Write, E: Write> {
    lanes: &'a LaneBook,
    out: O,
    err: E,
    in_synthesis: bool,
}

impl<'a, O: Write, E: Write> EventPrinter<'a, O, E> {
    pub fn new(lanes: &'a LaneBook, out: O, err: E) -> Self {
        Self {
            lanes,
            out,
            err,
            in_synthesis: false,
        }
    }

    /// Print one event. Returns the message of an `error` event.
    pub fn print(&mut self, event: &DispatchEvent) -> std::io::Result<Option<String>> {
        match event {
            DispatchEvent::ToolWorking { name, .. } => writeln!(self.err, "  [{name}] working...")?,
            DispatchEvent::ToolDone { name, result } => {
                let mark = if result.success { "ok" } else { "failed" };
                writeln!(self.err, "  [{name}] {mark}: {}", result.message)?;
            }
            DispatchEvent::Text(text) => {
                write!(self.out, "{text}")?;
                self.out.flush()?;
            }
            DispatchEvent::LaneReport { lane, report } => {
                let profile = self.lanes.get(*lane);
                writeln!(self.out, "{} {}\n{}\n", profile.emoji, profile.name, report.trim())?;
            }
            DispatchEvent::Synthesis(text) => {
                if !self.in_synthesis {
                    self.in_synthesis = true;
                    let coordinator = self.lanes.get(dispatch_core::Lane::Dispatch);
                    writeln!(self.out, "{} {} synthesis\n", coordinator.emoji, coordinator.name)?;
                }
                write!(self.out, "{text}")?;
                self.out.flush()?;
            }
            DispatchEvent::Saved(path) => writeln!(self.out, "\n\nSaved to {path}")?,
            DispatchEvent::Done => writeln!(self.out)?,
            DispatchEvent::Error(message) => {
                writeln!(self.err, "\nError: {message}")?;
                return Ok(Some(message.clone()));
            }
        }
        Ok(None)
    }

    /// Print every event until the stream closes.
    ///
    /// An `error` event makes this fail after the stream has been drained.
    pub async fn drain(
        &mut self,
        mut rx: mpsc::Receiver<DispatchEvent>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut failure = None;
        while let Some(event) = rx.recv().await {
            if let Some(message) = self.print(&event)? {
                failure = Some(message);
            }
        }
        match failure {
            Some(message) => Err(message.into()),
            None => Ok(()),
        }
    }
}

/// Print to the process's stdout and stderr.
pub fn terminal_printer(lanes: &LaneBook) -> EventPrinter<'_, std::io::Stdout, std::io::Stderr> {
    EventPrinter::new(lanes, std::io::stdout(), std::io::stderr())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::{Lane, ToolResult};

    fn render(events: &[DispatchEvent]) -> (String, String, Option<String>) {
        let lanes = LaneBook::default();
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let mut failure = None;
        {
            let mut printer = EventPrinter::new(&lanes, &mut out, &mut err);
            for event in events {
                if let Some(message) = printer.print(event).unwrap() {
                    failure = Some(message);
                }
            }
        }
        (String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap(), failure)
    }

    #[test]
    fn chat_text_goes_to_stdout_tools_to_stderr() {
        let (out, err, failure) = render(&[
            DispatchEvent::ToolWorking {
                name: "list_notes".into(),
                input: serde_json::json!({"lane": "Learn"}),
            },
            DispatchEvent::ToolDone {
                name: "list_notes".into(),
                result: ToolResult::ok("Found 2 notes"),
            },
            DispatchEvent::Text("Two notes ".into()),
            DispatchEvent::Text("mention Rust.".into()),
            DispatchEvent::Done,
        ]);
        assert_eq!(out, "Two notes mention Rust.\n");
        assert!(err.contains("[list_notes] working..."));
        assert!(err.contains("[list_notes] ok: Found 2 notes"));
        assert!(failure.is_none());
    }

    #[test]
    fn standup_headers_and_saved_path() {
        let (out, _, _) = render(&[
            DispatchEvent::LaneReport {
                lane: Lane::Build,
                report: "Shipped the parser.\n".into(),
            },
            DispatchEvent::Synthesis("Focus ".into()),
            DispatchEvent::Synthesis("on jobs.".into()),
            DispatchEvent::Saved("Daily/2026-03-02-standup.md".into()),
            DispatchEvent::Done,
        ]);
        assert!(out.starts_with("🔨 Build\nShipped the parser.\n\n"));
        assert_eq!(out.matches("synthesis").count(), 1);
        assert!(out.contains("Focus on jobs."));
        assert!(out.contains("Saved to Daily/2026-03-02-standup.md"));
    }

    #[test]
    fn error_is_reported() {
        let (out, err, failure) = render(&[DispatchEvent::Error("Upstream failure: 529".into())]);
        assert!(out.is_empty());
        assert!(err.contains("Error: Upstream failure: 529"));
        assert_eq!(failure.as_deref(), Some("Upstream failure: 529"));
    }
}
