//! Draft mode: the coordinator writes a whole note and proposes where it
//! goes with a trailing `SAVE_AS: <path>` line. Nothing is written until the
//! caller confirms.

use std::path::{Component, Path};

use serde::Serialize;

/// Marker line the model ends a draft with.
pub const SAVE_AS: &str = "SAVE_AS:";

/// A drafted note, not yet saved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Draft {
    /// Note body with every `SAVE_AS:` line removed.
    pub content: String,
    /// Proposed corpus-relative path, when the model gave a usable one.
    pub save_as: Option<String>,
    /// Whether saving would replace an existing note.
    pub replaces: bool,
}

impl Draft {
    /// Split a model response into note body and proposed path.
    pub fn parse(response: &str) -> Self {
        let save_as = response
            .lines()
            .find_map(|line| line.trim_start().strip_prefix(SAVE_AS))
            .map(|p| p.trim().trim_matches(|c| c == '`' || c == '"' || c == '\'').to_string())
            .filter(|p| is_vault_relative(p));
        let content = response
            .lines()
            .filter(|line| !line.trim_start().starts_with(SAVE_AS))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();
        Self {
            content,
            save_as,
            replaces: false,
        }
    }
}

/// A non-empty relative path made only of normal components.
pub fn is_vault_relative(path: &str) -> bool {
    !path.is_empty() && Path::new(path).components().all(|c| matches!(c, Component::Normal(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_as_line_is_split_off() {
        let draft = Draft::parse("---\nstatus: applied\n---\n# Acme Corp\n\nNotes.\n\nSAVE_AS: Jobs/Acme-Corp.md\n");
        assert_eq!(draft.save_as.as_deref(), Some("Jobs/Acme-Corp.md"));
        assert_eq!(draft.content, "---\nstatus: applied\n---\n# Acme Corp\n\nNotes.");
    }

    #[test]
    fn quoted_path_is_unwrapped() {
        let draft = Draft::parse("# Idea\nSAVE_AS: `Build/idea.md`");
        assert_eq!(draft.save_as.as_deref(), Some("Build/idea.md"));
    }

    #[test]
    fn missing_or_escaping_path_gives_none() {
        assert_eq!(Draft::parse("# Just text").save_as, None);
        assert_eq!(Draft::parse("x\nSAVE_AS: ../outside.md").save_as, None);
        assert_eq!(Draft::parse("x\nSAVE_AS: /etc/passwd").save_as, None);
        assert_eq!(Draft::parse("x\nSAVE_AS:   ").save_as, None);
        assert_eq!(Draft::parse("x\nSAVE_AS: ../outside.md").content, "x");
    }
}
