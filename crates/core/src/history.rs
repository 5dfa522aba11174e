//! History store: durable, capped per-lane message logs.
//!
//! Persistence is best-effort from the caller's point of view: a failed save
//! is logged and ignored, a failed or corrupt load yields an empty history.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::lane::Lane;
use crate::message::Message;

/// Current on-disk schema version.
pub const HISTORY_VERSION: u32 = 1;

/// Hard cap on persisted messages per lane.
pub const MAX_HISTORY: usize = 100;

/// One persisted lane history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub version: u32,
    pub messages: Vec<Message>,
}

impl HistoryRecord {
    /// A record holding the last [`MAX_HISTORY`] of `messages`.
    pub fn capped(messages: &[Message]) -> Self {
        let start = messages.len().saturating_sub(MAX_HISTORY);
        Self {
            version: HISTORY_VERSION,
            messages: messages[start..].to_vec(),
        }
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load a lane's messages. Absent or unreadable records load as empty.
    async fn load(&self, lane: Lane) -> Vec<Message>;

    /// Persist the last [`MAX_HISTORY`] messages atomically.
    async fn save(&self, lane: Lane, messages: &[Message]) -> Result<(), VaultError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_capped_to_newest() {
        let messages: Vec<Message> = (0..130).map(|i| Message::user(format!("m{i}"))).collect();
        let record = HistoryRecord::capped(&messages);
        assert_eq!(record.version, HISTORY_VERSION);
        assert_eq!(record.messages.len(), MAX_HISTORY);
        assert_eq!(record.messages[0].as_text(), Some("m30"));
    }

    #[test]
    fn record_layout() {
        let record = HistoryRecord::capped(&[Message::assistant("hi")]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["messages"][0]["role"], "assistant");
    }
}
