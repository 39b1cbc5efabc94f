//! # Signal Handlers
//!
//! Application handlers registered in each peer's signal table.

pub mod chat;

pub use chat::{ChatHistory, ChatLine, ChatMessage, LOCAL_SENDER};
