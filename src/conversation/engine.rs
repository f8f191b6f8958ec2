//! Conversation engine: one per session

use super::client::ModelClient;
use super::prompt::{APOLOGY, SYSTEM_INSTRUCTION, UNAVAILABLE};
use super::recommendation::Recommendation;
use super::router::{decide, Branch};
use super::state::ConversationState;
use std::sync::Arc;

/// Answers user turns for a single session.
///
/// `get_response` takes `&mut self`, so one engine can only ever have one
/// turn in flight. Sessions that share nothing get separate engines.
pub struct ConversationEngine {
    state: ConversationState,
    model: Option<Arc<dyn ModelClient>>,
    recommendation: Recommendation,
}

impl ConversationEngine {
    /// `None` means no model credential was available at startup; every
    /// turn then gets the fixed unavailable reply.
    pub fn new(model: Option<Arc<dyn ModelClient>>) -> Self {
        Self {
            state: ConversationState::new(),
            model,
            recommendation: Recommendation::grand_villa(),
        }
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn is_model_configured(&self) -> bool {
        self.model.is_some()
    }

    /// Drop the transcript and start over as a fresh session
    pub fn reset(&mut self) {
        self.state = ConversationState::new();
    }

    /// Produce the reply for one user turn.
    ///
    /// Never fails: provider errors become the fixed apology, which is
    /// appended in place of the model reply.
    pub async fn get_response(&mut self, user_text: &str) -> String {
        let Some(model) = self.model.clone() else {
            tracing::debug!("Model not configured, returning unavailable reply");
            return UNAVAILABLE.to_string();
        };

        self.state.push_user(user_text);

        match decide(&self.state) {
            Branch::Recommend => {
                let reply = self.recommendation.message();
                self.state.push_assistant(reply.clone());
                self.state.set_recommendation(self.recommendation.clone());
                tracing::info!(
                    community = %self.recommendation.name,
                    care_types = ?self.recommendation.care_types,
                    locations = ?self.recommendation.locations,
                    "Routed turn to scripted recommendation"
                );
                reply
            }
            Branch::Continue => {
                self.state.prepend_system_instruction(SYSTEM_INSTRUCTION);

                let reply = match model.generate(self.state.transcript()).await {
                    Ok(turn) => turn.text,
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            kind = ?e.kind,
                            "Model call failed, substituting apology"
                        );
                        APOLOGY.to_string()
                    }
                };
                self.state.push_assistant(reply.clone());
                reply
            }
        }
    }
}
