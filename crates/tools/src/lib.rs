//! The vault tool set.
//!
//! Exactly four tools exist, modelled as the closed enum [`VaultTool`]:
//! `update_memory`, `create_note`, `update_note` and `list_notes`. The
//! [`ToolDispatcher`] turns a model's invocation into one of them and runs
//! it against the knowledge store and the lane's memory ledger.

pub mod call;
pub mod dispatcher;
pub mod slug;

pub use call::{catalog, VaultTool};
pub use dispatcher::ToolDispatcher;
pub use slug::slugify;
