//! Conversation core
//!
//! A per-session engine that appends each user turn, asks the router which
//! way to answer, and either replies with the scripted recommendation or
//! forwards the transcript to the model client.

mod client;
mod engine;
pub mod prompt;
mod recommendation;
mod router;
mod state;

#[cfg(test)]
mod proptests;
#[cfg(test)]
pub(crate) mod testing;

pub use client::{LlmModelClient, ModelClient};
pub use engine::ConversationEngine;
#[allow(unused_imports)] // Public API re-exports
pub use recommendation::Recommendation;
#[allow(unused_imports)]
pub use router::{decide, Branch};
#[allow(unused_imports)]
pub use state::{ConversationState, Role, Turn};
