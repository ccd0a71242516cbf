//! # Application Layer
//!
//! The response interpreter, the action handlers and the engine that runs them,
//! the recovery protocol, and the stream and chat-turn drivers tying them together.

pub mod actions;
pub mod diagnosis;
pub mod engine;
pub mod parsing;
pub mod recovery;
pub mod stream;
pub mod turn;
