//! Property-based tests for the conversation engine
//!
//! These tests verify the transcript invariants hold across arbitrary
//! sequences of user turns, model failures and resets.

use super::client::ModelClient;
use super::engine::ConversationEngine;
use super::prompt::{APOLOGY, UNAVAILABLE};
use super::router::{decide, Branch, RECOMMEND_KEYWORDS};
use super::state::{ConversationState, Role};
use super::testing::MockModelClient;
use crate::llm::LlmError;
use proptest::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Say { text: String, model_fails: bool },
    Reset,
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z ,.?]{0,40}",
        (
            "[a-z ]{0,10}",
            proptest::sample::select(RECOMMEND_KEYWORDS.to_vec()),
            "[a-z ]{0,10}",
            any::<bool>()
        )
            .prop_map(|(pre, keyword, post, upper)| {
                let keyword = if upper {
                    keyword.to_uppercase()
                } else {
                    keyword.to_string()
                };
                format!("{pre}{keyword}{post}")
            }),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        8 => (arb_text(), any::<bool>()).prop_map(|(text, model_fails)| Op::Say { text, model_fails }),
        1 => Just(Op::Reset),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("test runtime")
}

fn assert_transcript_invariants(state: &ConversationState) -> Result<(), TestCaseError> {
    let transcript = state.transcript();
    let system_positions: Vec<usize> = transcript
        .iter()
        .enumerate()
        .filter(|(_, t)| t.role == Role::System)
        .map(|(i, _)| i)
        .collect();

    prop_assert!(system_positions.len() <= 1, "system turn repeated: {:?}", transcript);
    if let Some(&pos) = system_positions.first() {
        prop_assert_eq!(pos, 0);
        prop_assert!(!state.is_first_turn());
    } else {
        prop_assert!(state.is_first_turn());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_router_is_pure(text in arb_text()) {
        let mut state = ConversationState::new();
        state.push_user(text);
        let before = state.clone();

        let first = decide(&state);
        let second = decide(&state);

        prop_assert_eq!(first, second);
        prop_assert_eq!(state, before);
    }

    #[test]
    fn prop_router_matches_keyword_membership(text in arb_text()) {
        let mut state = ConversationState::new();
        state.push_user(text.clone());

        let lowered = text.to_lowercase();
        let expected = if RECOMMEND_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            Branch::Recommend
        } else {
            Branch::Continue
        };
        prop_assert_eq!(decide(&state), expected);
    }

    #[test]
    fn prop_engine_preserves_invariants(ops in proptest::collection::vec(arb_op(), 0..25)) {
        let rt = runtime();
        let mock = Arc::new(MockModelClient::new());
        let mut engine = ConversationEngine::new(Some(mock.clone() as Arc<dyn ModelClient>));

        for op in ops {
            match op {
                Op::Reset => {
                    engine.reset();
                    prop_assert_eq!(engine.state(), &ConversationState::new());
                }
                Op::Say { text, model_fails } => {
                    let lowered = text.to_lowercase();
                    let expect_recommend = RECOMMEND_KEYWORDS.iter().any(|k| lowered.contains(k));
                    if !expect_recommend {
                        if model_fails {
                            mock.queue_error(LlmError::server_error("boom"));
                        } else {
                            mock.queue_reply("model reply");
                        }
                    }
                    let before_len = engine.state().transcript().len();
                    let was_first = engine.state().is_first_turn();
                    let had_recommendation = engine.state().recommendation().is_some();
                    let calls_before = mock.recorded_transcripts().len();

                    let reply = rt.block_on(engine.get_response(&text));

                    let state = engine.state();
                    let after_len = state.transcript().len();
                    prop_assert!(after_len > before_len);
                    assert_transcript_invariants(state)?;

                    // Exactly one assistant turn per user turn, and it is the reply
                    let last = state.last_turn().expect("non-empty transcript");
                    prop_assert_eq!(last.role, Role::Assistant);
                    prop_assert_eq!(&last.text, &reply);

                    let calls_after = mock.recorded_transcripts().len();
                    let prepended = usize::from(was_first && !state.is_first_turn());
                    prop_assert_eq!(after_len, before_len + 2 + prepended);

                    if expect_recommend {
                        prop_assert_eq!(calls_after, calls_before);
                        prop_assert!(state.recommendation().is_some());
                        prop_assert!(reply.contains("Grand Villa"));
                    } else {
                        prop_assert_eq!(calls_after, calls_before + 1);
                        prop_assert_eq!(had_recommendation, state.recommendation().is_some());
                        let expected = if model_fails { APOLOGY } else { "model reply" };
                        prop_assert_eq!(reply.as_str(), expected);
                    }
                }
            }
        }
    }

    #[test]
    fn prop_unconfigured_engine_never_changes(texts in proptest::collection::vec(arb_text(), 0..10)) {
        let rt = runtime();
        let mut engine = ConversationEngine::new(None);

        for text in texts {
            let reply = rt.block_on(engine.get_response(&text));
            prop_assert_eq!(reply.as_str(), UNAVAILABLE);
            prop_assert!(engine.state().recommendation().is_none());
            prop_assert!(engine.state().transcript().is_empty());
        }
    }
}
