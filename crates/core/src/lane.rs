//! Lanes: the independent topical conversation contexts.
//!
//! The set is closed. Every lane owns a system prompt, a conversation
//! history and a private memory ledger; all but `dispatch` map onto a vault
//! category of the same name.

use serde::{Deserialize, Serialize};

use crate::knowledge::Category;

/// A lane identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    /// The coordinator. Sees every category and runs the standup synthesis.
    Dispatch,
    Jobs,
    Build,
    Learn,
    Home,
    Write,
    #[serde(rename = "self")]
    SelfCare,
}

impl Lane {
    /// Every lane, coordinator first.
    pub const ALL: [Lane; 7] = [
        Lane::Dispatch,
        Lane::Jobs,
        Lane::Build,
        Lane::Learn,
        Lane::Home,
        Lane::Write,
        Lane::SelfCare,
    ];

    /// Lanes that report during a standup, in report order.
    pub const STANDUP: [Lane; 6] = [
        Lane::Jobs,
        Lane::Build,
        Lane::Learn,
        Lane::Home,
        Lane::Write,
        Lane::SelfCare,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Lane::Dispatch => "dispatch",
            Lane::Jobs => "jobs",
            Lane::Build => "build",
            Lane::Learn => "learn",
            Lane::Home => "home",
            Lane::Write => "write",
            Lane::SelfCare => "self",
        }
    }

    /// Parse a lane id, case-insensitively.
    pub fn parse(id: &str) -> Option<Lane> {
        let id = id.trim().to_ascii_lowercase();
        Lane::ALL.into_iter().find(|lane| lane.id() == id)
    }

    /// The vault category this lane focuses on. `None` for the coordinator.
    pub fn category(&self) -> Option<Category> {
        match self {
            Lane::Dispatch => None,
            Lane::Jobs => Some(Category::Jobs),
            Lane::Build => Some(Category::Build),
            Lane::Learn => Some(Category::Learn),
            Lane::Home => Some(Category::Home),
            Lane::Write => Some(Category::Write),
            Lane::SelfCare => Some(Category::SelfCare),
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for Lane {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lane::parse(s).ok_or_else(|| format!("unknown lane '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Lane::parse("Jobs"), Some(Lane::Jobs));
        assert_eq!(Lane::parse(" self "), Some(Lane::SelfCare));
        assert_eq!(Lane::parse("finance"), None);
    }

    #[test]
    fn serde_uses_lane_ids() {
        let json = serde_json::to_string(&Lane::SelfCare).unwrap();
        assert_eq!(json, "\"self\"");
        let lane: Lane = serde_json::from_str("\"dispatch\"").unwrap();
        assert_eq!(lane, Lane::Dispatch);
    }

    #[test]
    fn standup_excludes_coordinator() {
        assert!(!Lane::STANDUP.contains(&Lane::Dispatch));
        assert!(Lane::STANDUP.iter().all(|l| l.category().is_some()));
    }
}
