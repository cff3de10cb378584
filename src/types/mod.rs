//! Shared type definitions
//!
//! Records persisted by the conversation store.

pub mod conversation;
pub mod message;
