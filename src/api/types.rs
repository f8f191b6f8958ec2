//! API request and response types

use crate::db::{HistoryEntry, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to create a password account
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

/// Request to log in with email and password
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request carrying a Google ID token
#[derive(Debug, Deserialize)]
pub struct GoogleAuthRequest {
    pub token: String,
}

/// Request to confirm an email verification code
#[derive(Debug, Deserialize)]
pub struct EmailVerificationRequest {
    pub user_id: String,
    pub code: String,
}

/// Request to send a fresh verification code
#[derive(Debug, Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

/// Query for the history listing
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

/// Issued access token
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer",
        }
    }
}

/// Public view of an account
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

/// Generic acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    pub success: bool,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
        }
    }
}

/// Stored transcript rows, newest first
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<HistoryEntry>,
}

/// Liveness and model configuration
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_configured: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
