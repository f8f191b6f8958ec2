//! Conversation state owned by a single session

use super::recommendation::Recommendation;
use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message exchanged in a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Per-session transcript plus the flags the engine branches on.
///
/// Invariants:
/// - a system turn, if any, is the first element and there is at most one
/// - the transcript only grows; the only way to shrink it is to replace the
///   whole state
/// - `recommendation` is only set by the engine's recommendation branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationState {
    transcript: Vec<Turn>,
    is_first_turn: bool,
    recommendation: Option<Recommendation>,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            transcript: Vec::new(),
            is_first_turn: true,
            recommendation: None,
        }
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn is_first_turn(&self) -> bool {
        self.is_first_turn
    }

    pub fn recommendation(&self) -> Option<&Recommendation> {
        self.recommendation.as_ref()
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.transcript.last()
    }

    pub(super) fn push_user(&mut self, text: impl Into<String>) {
        self.transcript.push(Turn::user(text));
    }

    pub(super) fn push_assistant(&mut self, text: impl Into<String>) {
        self.transcript.push(Turn::assistant(text));
    }

    /// Put the system instruction in front of the transcript, once.
    ///
    /// Does nothing after the first call; `is_first_turn` is cleared by the
    /// first call.
    pub(super) fn prepend_system_instruction(&mut self, text: impl Into<String>) {
        if !self.is_first_turn() {
            return;
        }
        self.transcript.insert(0, Turn::system(text));
        self.is_first_turn = false;
    }

    pub(super) fn set_recommendation(&mut self, recommendation: Recommendation) {
        self.recommendation = Some(recommendation);
    }
}
