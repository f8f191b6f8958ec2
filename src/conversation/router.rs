//! Per-turn branch decision

use super::state::{ConversationState, Role};

/// Terms in the latest user turn that switch to the scripted recommendation
pub const RECOMMEND_KEYWORDS: [&str; 6] = [
    "community",
    "communities",
    "place",
    "facility",
    "location",
    "where",
];

/// Which way the engine answers a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Model-backed free-form reply
    Continue,
    /// Scripted recommendation, no model call
    Recommend,
}

/// Decide the branch for the state right after the user turn was appended.
///
/// Only the last turn is inspected, and only when it is a user turn with
/// non-empty text. Matching is a case-insensitive substring test, so
/// "locations" and "Where's" both match.
pub fn decide(state: &ConversationState) -> Branch {
    let Some(last) = state.last_turn() else {
        return Branch::Continue;
    };
    if last.role != Role::User || last.text.trim().is_empty() {
        return Branch::Continue;
    }

    let text = last.text.to_lowercase();
    if RECOMMEND_KEYWORDS.iter().any(|keyword| text.contains(keyword)) {
        Branch::Recommend
    } else {
        Branch::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_user(text: &str) -> ConversationState {
        let mut state = ConversationState::new();
        state.push_user(text);
        state
    }

    #[test]
    fn test_empty_state_continues() {
        assert_eq!(decide(&ConversationState::new()), Branch::Continue);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(decide(&state_with_user("Where is it located?")), Branch::Recommend);
        assert_eq!(decide(&state_with_user("WHERE")), Branch::Recommend);
        assert_eq!(decide(&state_with_user("What locations do you have?")), Branch::Recommend);
        assert_eq!(decide(&state_with_user("Tell me about the Facility")), Branch::Recommend);
    }

    #[test]
    fn test_plain_text_continues() {
        assert_eq!(decide(&state_with_user("I like the colors")), Branch::Continue);
        assert_eq!(decide(&state_with_user("Hello, I need some guidance.")), Branch::Continue);
    }

    #[test]
    fn test_blank_text_continues() {
        assert_eq!(decide(&state_with_user("")), Branch::Continue);
        assert_eq!(decide(&state_with_user("   \n")), Branch::Continue);
    }

    #[test]
    fn test_only_user_turns_trigger() {
        let mut state = state_with_user("hi");
        state.push_assistant("Which community are you interested in?");
        assert_eq!(decide(&state), Branch::Continue);
    }

    #[test]
    fn test_only_latest_turn_is_inspected() {
        let mut state = state_with_user("where?");
        state.push_assistant("Grand Villa");
        state.push_user("thanks");
        assert_eq!(decide(&state), Branch::Continue);
    }
}
