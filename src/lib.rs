//! Lorgan Chat Store
//!
//! Scoped, versioned persistence for chat conversation lists, plus the
//! display contract of the application top bar.

pub mod logging;
pub mod storage;
pub mod types;
pub mod ui;

pub use storage::backend::{FileBackend, MemoryBackend, StorageBackend};
pub use storage::conversations::{ConversationStore, ImportMode, StorageKey};
pub use storage::StorageError;
pub use types::conversation::Conversation;
