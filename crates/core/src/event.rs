//! Event stream protocol: what a lane request or a standup pushes to the
//! presentation layer.
//!
//! Every event serializes to one small JSON object and travels as a single
//! `data: <json>` server-sent-event line.

use serde::{Serialize, Serializer};
use serde_json::json;

use crate::lane::Lane;
use crate::tool::ToolResult;

/// One event on a lane or standup stream.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    /// A tool invocation is about to run.
    ToolWorking { name: String, input: serde_json::Value },
    /// A tool invocation finished.
    ToolDone { name: String, result: ToolResult },
    /// An increment of terminal response text.
    Text(String),
    /// Standup phase 1: one lane's report, in completion order.
    LaneReport { lane: Lane, report: String },
    /// Standup phase 2: an increment of synthesis text.
    Synthesis(String),
    /// A document was persisted at this corpus-relative path.
    Saved(String),
    /// End of stream.
    Done,
    /// The request failed; human-readable message.
    Error(String),
}

impl DispatchEvent {
    /// Get the event type as a string (useful for logging and SSE event names).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ToolWorking { .. } => "tool_working",
            Self::ToolDone { .. } => "tool_done",
            Self::Text(_) => "text",
            Self::LaneReport { .. } => "lane_report",
            Self::Synthesis(_) => "synthesis",
            Self::Saved(_) => "saved",
            Self::Done => "done",
            Self::Error(_) => "error",
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }

    /// The wire payload.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::ToolWorking { name, input } => {
                json!({"tool_working": {"name": name, "input": input}})
            }
            Self::ToolDone { name, result } => {
                let mut body = match serde_json::to_value(result) {
                    Ok(serde_json::Value::Object(map)) => map,
                    _ => serde_json::Map::new(),
                };
                body.insert("name".into(), json!(name));
                json!({"tool_done": body})
            }
            Self::Text(text) => json!({"text": text}),
            Self::LaneReport { lane, report } => json!({"phase": 1, "lane": lane, "report": report}),
            Self::Synthesis(text) => json!({"phase": 2, "text": text}),
            Self::Saved(path) => json!({"saved": path}),
            Self::Done => json!({"done": true}),
            Self::Error(message) => json!({"error": message}),
        }
    }

    /// One complete server-sent-event frame.
    pub fn to_sse_frame(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }
}

impl Serialize for DispatchEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
