//! System prompt composition for lane chats and standup calls.

use chrono::NaiveDate;

const SECTION_BREAK: &str = "\n\n---\n\n";

const MEMORY_TOOL_NOTE: &str = "You have an `update_memory` tool. Use it to log things worth \
remembering: preferences, patterns, decisions and observations specific to your lane. Your memory \
is private to you and persists across conversations. You can also create, update and list notes in \
the vault with `create_note`, `update_note` and `list_notes`.";

/// The lane status report requested from every lane during phase 1.
pub const STANDUP_PROMPT: &str = "It's standup time. Report on your lane using markdown formatting.\n\n\
**Status**: 2-3 sentences on current state.\n\n\
**Priority**: The single most important thing right now.\n\n\
**Cross-lane**: Specific asks or flags for other lanes. Format each as `TO [LANE]: message`, or \
`Nothing to flag.`\n\n\
Be specific and direct. This goes to the other lanes and to Dispatch.";

/// The phase 2 request sent to the coordinating lane.
pub const SYNTHESIS_PROMPT: &str = "You've received standup reports from every lane. Produce a \
complete synthesis with these sections:\n\n\
## Cross-Lane Messages\nExplicit asks or flags between lanes, drawn from their reports. Omit the \
section if there are none.\n\n\
## Dependencies & Conflicts\nCross-lane dependencies, blockers or handoffs that need coordination.\n\n\
## Top 3 Today\nRanked priorities for today, one sentence each.\n\n\
## Today's Schedule\nA time-blocked plan as a markdown table: | Time | Task | Lane |\n\n\
## Anything Being Avoided\nWhat is being dodged across the board, or 'Nothing flagged.'\n\n\
Direct. No filler. This gets saved to the vault.";

/// Draft-mode instruction wrapped around the user's request.
pub fn draft_request(request: &str) -> String {
    format!(
        "The user wants to create a new vault note. Their request: \"{}\"\n\n\
Draft the complete markdown content for this note. Use the established templates and conventions \
from the vault. Include all relevant frontmatter, sections, and placeholder text.\n\n\
After the note content, on a new line write exactly:\n\
SAVE_AS: <suggested relative path within vault, e.g. Jobs/Acme-Corp-Sr-Dev.md>",
        request.trim()
    )
}

fn memory_block(memory: &str) -> String {
    if memory.trim().is_empty() {
        String::new()
    } else {
        format!("{SECTION_BREAK}# YOUR PRIVATE MEMORY\n\n{}", memory.trim())
    }
}

/// Chat system prompt: persona, private memory, tool note, then vault context.
pub fn chat_system(persona: &str, memory: &str, context: &str, today: NaiveDate) -> String {
    format!(
        "{persona}\n\nToday is {}.{}{SECTION_BREAK}# MEMORY TOOL\n\n{MEMORY_TOOL_NOTE}{SECTION_BREAK}# VAULT CONTEXT\n\n{context}",
        today.format("%A, %B %-d %Y"),
        memory_block(memory),
    )
}

/// Phase 1 system prompt: persona, memory and only the lane's own notes.
pub fn lane_report_system(persona: &str, memory: &str, lane_notes: &str) -> String {
    format!(
        "{persona}{}{SECTION_BREAK}# YOUR LANE NOTES\n\n{lane_notes}",
        memory_block(memory)
    )
}

/// Phase 2 system prompt: coordinator persona, its memory and every lane report.
pub fn synthesis_system(persona: &str, memory: &str, reports: &[(String, String)]) -> String {
    let block = reports
        .iter()
        .map(|(lane, report)| format!("**{} REPORT:**\n{}", lane.to_uppercase(), report.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "{persona}{}{SECTION_BREAK}# LANE REPORTS\n\n{block}",
        memory_block(memory)
    )
}
