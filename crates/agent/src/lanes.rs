//! Lane profiles: display name, emoji, and the system prompt each lane runs with.
//!
//! Prompt precedence: `Agents/<lane>/SYSTEM.md` in the vault, then the
//! `[lanes.<id>]` config override, then the built-in persona.

use std::collections::HashMap;
use std::path::Path;

use dispatch_config::AppConfig;
use dispatch_core::Lane;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct LaneProfile {
    pub lane: Lane,
    pub name: &'static str,
    pub emoji: &'static str,
    pub description: &'static str,
    pub system_prompt: String,
}

fn builtin(lane: Lane) -> LaneProfile {
    let (name, emoji, description, prompt) = match lane {
        Lane::Dispatch => (
            "Dispatch",
            "🧭",
            "Coordinator across every lane",
            "You are Dispatch, the coordinating assistant for a personal life system. You see every \
             lane, notice conflicts and dependencies between them, and help decide what matters today. \
             Be direct and specific.",
        ),
        Lane::Jobs => (
            "Jobs",
            "💼",
            "Career, applications and interviews",
            "You are the Jobs lane agent. You track applications, interviews, networking and career \
             decisions. Keep answers concrete and focused on the next action.",
        ),
        Lane::Build => (
            "Build",
            "🔨",
            "Projects and things being made",
            "You are the Build lane agent. You help plan, unblock and ship personal projects. Prefer \
             small, finishable steps over big plans.",
        ),
        Lane::Learn => (
            "Learn",
            "📚",
            "Courses, reading and skills",
            "You are the Learn lane agent. You track what is being studied, suggest practice, and tie \
             learning back to goals.",
        ),
        Lane::Home => (
            "Home",
            "🏠",
            "Household, errands and admin",
            "You are the Home lane agent. You keep chores, bills, appointments and household admin \
             from slipping.",
        ),
        Lane::Write => (
            "Write",
            "✍️",
            "Drafts, essays and publishing",
            "You are the Write lane agent. You help draft, edit and publish writing while keeping the \
             author's voice.",
        ),
        Lane::SelfCare => (
            "Self",
            "🌱",
            "Health, habits and reflection",
            "You are the Self lane agent. You look after health, habits, energy and reflection. Be warm \
             but honest.",
        ),
    };
    LaneProfile {
        lane,
        name,
        emoji,
        description,
        system_prompt: prompt.to_string(),
    }
}

/// The resolved profile of every lane.
#[derive(Debug, Clone)]
pub struct LaneBook {
    profiles: HashMap<Lane, LaneProfile>,
}

impl Default for LaneBook {
    fn default() -> Self {
        Self {
            profiles: Lane::ALL.into_iter().map(|l| (l, builtin(l))).collect(),
        }
    }
}

impl LaneBook {
    /// Built-in profiles with config overrides applied.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut book = Self::default();
        for lane in Lane::ALL {
            if let Some(prompt) = config.lane_prompt(lane) {
                book.set_prompt(lane, prompt);
            }
        }
        book
    }

    /// Apply `Agents/<lane>/SYSTEM.md` files found under the vault root.
    pub async fn with_prompt_files(mut self, vault_root: &Path) -> Self {
        for lane in Lane::ALL {
            let path = vault_root
                .join(dispatch_vault::AGENTS_DIR)
                .join(lane.id())
                .join("SYSTEM.md");
            if let Ok(text) = tokio::fs::read_to_string(&path).await {
                if !text.trim().is_empty() {
                    debug!(lane = %lane, path = %path.display(), "Lane prompt loaded from vault");
                    self.set_prompt(lane, text.trim());
                }
            }
        }
        self
    }

    pub fn set_prompt(&mut self, lane: Lane, prompt: &str) {
        self.profiles
            .entry(lane)
            .or_insert_with(|| builtin(lane))
            .system_prompt = prompt.to_string();
    }

    pub fn get(&self, lane: Lane) -> LaneProfile {
        self.profiles.get(&lane).cloned().unwrap_or_else(|| builtin(lane))
    }

    pub fn prompt(&self, lane: Lane) -> String {
        self.get(lane).system_prompt
    }

    /// Every profile, in lane order.
    pub fn all(&self) -> Vec<LaneProfile> {
        Lane::ALL.into_iter().map(|l| self.get(l)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_lane_has_a_profile() {
        let book = LaneBook::default();
        let all = book.all();
        assert_eq!(all.len(), Lane::ALL.len());
        assert!(all.iter().all(|p| !p.system_prompt.is_empty()));
        assert_eq!(book.get(Lane::SelfCare).name, "Self");
    }

    #[test]
    fn config_override_replaces_prompt() {
        let mut config = AppConfig::default();
        config.lanes.insert(
            Lane::Jobs,
            dispatch_config::LaneConfig {
                system_prompt: Some("Recruiter mode.".into()),
            },
        );
        let book = LaneBook::from_config(&config);
        assert_eq!(book.prompt(Lane::Jobs), "Recruiter mode.");
        assert_ne!(book.prompt(Lane::Build), "Recruiter mode.");
    }

    #[tokio::test]
    async fn vault_prompt_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Agents/home/SYSTEM.md");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "  Household butler.\n").unwrap();

        let mut config = AppConfig::default();
        config.lanes.insert(
            Lane::Home,
            dispatch_config::LaneConfig {
                system_prompt: Some("from config".into()),
            },
        );
        let book = LaneBook::from_config(&config).with_prompt_files(dir.path()).await;
        assert_eq!(book.prompt(Lane::Home), "Household butler.");
    }
}
