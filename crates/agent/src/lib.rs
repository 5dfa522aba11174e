//! The Dispatch orchestration engine.
//!
//! A lane request follows a **model → tools → model** cycle:
//!
//! 1. **Lock** the lane's conversation and save the user message
//! 2. **Build context**: lane persona, private memory, bounded vault context
//! 3. **Send to the model** with the last few messages and the tool catalog
//! 4. **If tool use**: run the tools, append both turns, loop back to step 3
//! 5. **If terminal**: persist the conversation, then stream the text
//!
//! The standup fans out one report per lane, emits them as they complete,
//! then streams a synthesis and saves the minutes to the vault.

pub mod context;
pub mod conversation_store;
pub mod draft;
pub mod engine;
pub mod lanes;
pub mod loop_runner;
pub mod prompt;
pub mod routing;
pub mod standup;

pub use context::{AssembledContext, AssemblyInput, AssemblyMetadata, ContextAssembler};
pub use conversation_store::ConversationStore;
pub use draft::Draft;
pub use engine::{DispatchEngine, DisplayTurn, LaneSummary, SearchHit, StatusReport};
pub use lanes::{LaneBook, LaneProfile};
pub use loop_runner::ConversationLoop;
pub use routing::detect_lane;
pub use standup::StandupOrchestrator;

#[cfg(test)]
pub(crate) mod test_helpers;
