//! # Dispatch Core
//!
//! Domain types, traits, and error definitions for the Dispatch lane
//! orchestrator. This crate has **no framework dependencies**: it defines the
//! domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here (model service, knowledge
//! store, memory ledger, history store). Implementations live in their
//! respective crates, so tests swap in mocks and in-memory stores.

pub mod error;
pub mod lane;
pub mod message;
pub mod provider;
pub mod tool;
pub mod knowledge;
pub mod memory;
pub mod history;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::Error;
pub use lane::Lane;
pub use message::{ContentPart, Conversation, Message, MessageContent, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StopReason, StreamChunk};
pub use tool::{ToolDefinition, ToolInvocation, ToolResult};
pub use knowledge::{Category, Corpus, Document, KnowledgeStore, NoteRef};
pub use memory::{LedgerSection, MemoryLedger};
pub use history::{HistoryRecord, HistoryStore, MAX_HISTORY};
pub use event::DispatchEvent;
