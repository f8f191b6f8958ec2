//! WebSocket chat sessions
//!
//! One socket owns one `ConversationEngine`. Frames are handled strictly in
//! order, so the engine never sees two turns at once.

use super::AppState;
use crate::conversation::prompt::GREETING;
use crate::conversation::ConversationEngine;
use crate::db::{Database, MessageType};
use axum::extract::ws::{Message, WebSocket};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const RESET_ACK: &str = "Conversation has been reset.";
pub const INVALID_MESSAGE: &str = "Invalid message format";

/// A decoded client frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Reset,
    Chat(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InboundError {
    #[error("undecodable message: {0}")]
    Undecodable(String),
    #[error("message has no text content")]
    MissingContent,
    #[error("binary frames are not supported")]
    Binary,
}

#[derive(Debug, Deserialize)]
struct RawInbound {
    #[serde(rename = "type")]
    kind: Option<String>,
    content: Option<serde_json::Value>,
}

/// Decode `{"type"?: string, "content"?: string}`
pub fn decode_inbound(text: &str) -> Result<Inbound, InboundError> {
    let raw: RawInbound =
        serde_json::from_str(text).map_err(|e| InboundError::Undecodable(e.to_string()))?;

    if raw.kind.as_deref() == Some("reset") {
        return Ok(Inbound::Reset);
    }
    match raw.content {
        Some(serde_json::Value::String(content)) => Ok(Inbound::Chat(content)),
        _ => Err(InboundError::MissingContent),
    }
}

/// Kind tag of a server frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundKind {
    Bot,
    System,
    Error,
}

/// A server frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outbound {
    #[serde(rename = "type")]
    pub kind: OutboundKind,
    pub content: String,
}

impl Outbound {
    pub fn bot(content: impl Into<String>) -> Self {
        Self {
            kind: OutboundKind::Bot,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            kind: OutboundKind::System,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            kind: OutboundKind::Error,
            content: content.into(),
        }
    }

    fn to_message(&self) -> Message {
        let json = serde_json::json!({ "type": self.kind, "content": self.content });
        Message::Text(json.to_string())
    }
}

/// Per-connection turn handling, independent of the socket
pub struct Session {
    engine: ConversationEngine,
    db: Database,
    user_id: Option<String>,
}

impl Session {
    pub fn new(engine: ConversationEngine, db: Database, user_id: Option<String>) -> Self {
        Self {
            engine,
            db,
            user_id,
        }
    }

    /// Produce the reply frame for one inbound text frame
    pub async fn handle_text(&mut self, text: &str) -> Outbound {
        match decode_inbound(text) {
            Ok(Inbound::Reset) => {
                self.engine.reset();
                tracing::info!("Conversation reset");
                Outbound::system(RESET_ACK)
            }
            Ok(Inbound::Chat(content)) => {
                self.persist(MessageType::User, &content);
                let reply = self.engine.get_response(&content).await;
                self.persist(MessageType::Bot, &reply);
                Outbound::bot(reply)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rejected inbound message");
                Outbound::error(INVALID_MESSAGE)
            }
        }
    }

    /// Persistence failures never affect the reply
    fn persist(&self, message_type: MessageType, content: &str) {
        if let Err(e) = self
            .db
            .save_message(message_type, content, self.user_id.as_deref())
        {
            tracing::warn!(
                message_type = %message_type,
                error = %e,
                "Failed to persist message"
            );
        }
    }

    fn engine(&self) -> &ConversationEngine {
        &self.engine
    }
}

/// Drive one socket until the client goes away
pub async fn run_session(mut socket: WebSocket, state: AppState, user_id: Option<String>) {
    let session_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        session_id = %session_id,
        authenticated = user_id.is_some(),
        "Session opened"
    );

    let engine = ConversationEngine::new(state.model.clone());
    if !engine.is_model_configured() {
        tracing::warn!(session_id = %session_id, "Session opened without a model client");
    }
    let mut session = Session::new(engine, state.db.clone(), user_id);

    if socket
        .send(Outbound::bot(GREETING).to_message())
        .await
        .is_err()
    {
        tracing::info!(session_id = %session_id, "Session closed before greeting");
        return;
    }

    while let Some(frame) = socket.recv().await {
        let reply = match frame {
            Ok(Message::Text(text)) => session.handle_text(&text).await,
            Ok(Message::Binary(_)) => {
                tracing::warn!(session_id = %session_id, error = %InboundError::Binary, "Rejected inbound message");
                Outbound::error(INVALID_MESSAGE)
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Socket error");
                break;
            }
        };

        if let Err(e) = socket.send(reply.to_message()).await {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to send reply");
            break;
        }
    }

    let conversation = session.engine().state();
    tracing::info!(
        session_id = %session_id,
        turns = conversation.transcript().len(),
        recommended = conversation.recommendation().map(|r| r.name.as_str()),
        "Session closed"
    );
}
