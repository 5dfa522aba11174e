//! Storage for Dispatch: the Markdown vault, per-lane memory ledgers and
//! per-lane conversation history.
//!
//! Everything on disk is replaced atomically (temp file, fsync, rename), so a
//! crash mid-write leaves either the old or the new content.

pub mod atomic;
pub mod scan;
pub mod file_vault;
pub mod history;
pub mod in_memory;
pub mod init;

pub use atomic::write_atomic;
pub use file_vault::FileVault;
pub use history::FileHistoryStore;
pub use in_memory::{InMemoryHistory, InMemoryVault};
pub use init::{init_vault, InitReport};

/// Folder holding per-lane private state (memory ledgers, history).
pub const AGENTS_DIR: &str = "Agents";
