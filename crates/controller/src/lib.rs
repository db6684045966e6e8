//! Conversation controller.
//!
//! Reconciles transport session events with the platform voice subsystem:
//! stops listening when the session drops or a result arrives, restarts
//! listening after displays when auto-listen is on, and turns final
//! transcripts into conversation turns.

pub mod controller;

pub use controller::{ControllerEvent, ConversationController};
