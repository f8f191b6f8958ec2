//! HTTP request handlers

use super::session::run_session;
use super::types::{
    EmailVerificationRequest, ErrorResponse, GoogleAuthRequest, HealthResponse, HistoryQuery,
    HistoryResponse, LoginRequest, MessageResponse, RegisterRequest, ResendVerificationRequest,
    TokenResponse, UserResponse,
};
use super::AppState;
use crate::auth::AuthError;
use crate::db::DbError;
use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Deserialize;

const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_HISTORY_LIMIT: u32 = 500;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Chat sessions
        .route("/ws", get(ws_session))
        // Accounts
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/google", post(google_sign_in))
        .route("/api/auth/verify-email", post(verify_email))
        .route("/api/auth/resend-verification", post(resend_verification))
        .route("/api/auth/me", get(me))
        // Stored transcripts
        .route("/api/history", get(history))
        .with_state(state)
}

type BearerHeader = Option<TypedHeader<Authorization<Bearer>>>;

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model_configured: state.model.is_some(),
    })
}

// ============================================================
// Chat sessions
// ============================================================

#[derive(Debug, Deserialize)]
struct SessionQuery {
    token: Option<String>,
}

/// Upgrade to a chat session; an invalid token only makes it anonymous
async fn ws_session(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Response {
    let user_id = query
        .token
        .as_deref()
        .and_then(|token| state.auth.resolve_token(token));
    ws.on_upgrade(move |socket| run_session(socket, state, user_id))
}

// ============================================================
// Accounts
// ============================================================

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .auth
        .register(&req.email, &req.password, req.full_name.as_deref())
        .await?;
    Ok(Json(user.into()))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = state.auth.authenticate(&req.email, &req.password).await?;
    let token = state.auth.issue_token(&user.id)?;
    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(TokenResponse::bearer(token)))
}

async fn google_sign_in(
    State(state): State<AppState>,
    Json(req): Json<GoogleAuthRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = state.auth.google_sign_in(&req.token).await?;
    let token = state.auth.issue_token(&user.id)?;
    tracing::info!(user_id = %user.id, "User signed in with Google");
    Ok(Json(TokenResponse::bearer(token)))
}

async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<EmailVerificationRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.verify_email_code(&req.user_id, &req.code)?;
    Ok(Json(MessageResponse::ok("Email verified successfully")))
}

async fn resend_verification(
    State(state): State<AppState>,
    Json(req): Json<ResendVerificationRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state.auth.resend_verification(&req.email).await?;
    Ok(Json(MessageResponse::ok("Verification email sent")))
}

async fn me(
    State(state): State<AppState>,
    bearer: BearerHeader,
) -> Result<Json<UserResponse>, AppError> {
    let user = authorized_user(&state, bearer_token(bearer.as_ref()))?;
    Ok(Json(user.into()))
}

// ============================================================
// Stored transcripts
// ============================================================

async fn history(
    State(state): State<AppState>,
    bearer: BearerHeader,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let user = authorized_user(&state, bearer_token(bearer.as_ref()))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    let messages = state.db.get_recent_messages(limit, Some(&user.id))?;
    Ok(Json(HistoryResponse { messages }))
}

fn bearer_token(header: Option<&TypedHeader<Authorization<Bearer>>>) -> Option<&str> {
    header.map(|TypedHeader(Authorization(bearer))| bearer.token())
}

fn authorized_user(state: &AppState, token: Option<&str>) -> Result<crate::db::User, AppError> {
    let Some(token) = token else {
        return Err(AppError::Unauthorized("Not authenticated".to_string()));
    };
    state.auth.current_user(token).map_err(|e| match e {
        AuthError::UserNotFound | AuthError::InvalidToken(_) => {
            AppError::Unauthorized("Could not validate credentials".to_string())
        }
        other => other.into(),
    })
}

// ============================================================
// Errors
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Internal(String),
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidInput(_)
            | AuthError::EmailTaken
            | AuthError::UserNotFound
            | AuthError::AlreadyVerified
            | AuthError::InvalidCode
            | AuthError::GoogleAccountInUse => AppError::BadRequest(e.to_string()),
            AuthError::InvalidCredentials
            | AuthError::InvalidToken(_)
            | AuthError::GoogleNotConfigured
            | AuthError::Google(_) => AppError::Unauthorized(e.to_string()),
            AuthError::Hashing(_) | AuthError::Delivery(_) | AuthError::Db(_) => {
                tracing::error!(error = %e, "Request failed");
                AppError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        tracing::error!(error = %e, "Database error");
        AppError::Internal("Internal server error".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthService, TokenIssuer};
    use crate::db::{Database, MessageType};
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let db = Database::open_in_memory().unwrap();
        let auth = AuthService::with_parts(
            db.clone(),
            TokenIssuer::new("test-secret", chrono::Duration::minutes(30)),
            None,
            None,
        );
        AppState::new(db, Arc::new(auth), None)
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with_token(uri: &str, token: &str) -> Request<Body> {
        Request::get(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn register_and_login(state: &AppState, email: &str) -> (String, String) {
        let (status, user) = send(
            state,
            post_json(
                "/api/auth/register",
                &json!({ "email": email, "password": "password123", "full_name": "Test User" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, token) = send(
            state,
            post_json(
                "/api/auth/login",
                &json!({ "email": email, "password": "password123" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(token["token_type"], "bearer");

        (
            user["id"].as_str().unwrap().to_string(),
            token["access_token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn test_health_reports_model_configuration() {
        let state = test_state();
        let request = Request::get("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok", "model_configured": false }));
    }

    #[tokio::test]
    async fn test_register_login_me() {
        let state = test_state();
        let (user_id, token) = register_and_login(&state, "me@example.com").await;

        let (status, body) = send(&state, get_with_token("/api/auth/me", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], user_id.as_str());
        assert_eq!(body["email"], "me@example.com");
        assert_eq!(body["full_name"], "Test User");
        assert_eq!(body["is_verified"], false);
        assert!(body.get("hashed_password").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_bad_request() {
        let state = test_state();
        register_and_login(&state, "dup@example.com").await;

        let (status, body) = send(
            &state,
            post_json(
                "/api/auth/register",
                &json!({ "email": "dup@example.com", "password": "password123" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "User with this email already exists");
    }

    #[tokio::test]
    async fn test_bad_credentials_are_unauthorized() {
        let state = test_state();
        register_and_login(&state, "pw@example.com").await;

        let (status, body) = send(
            &state,
            post_json(
                "/api/auth/login",
                &json!({ "email": "pw@example.com", "password": "wrong-password" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Incorrect email or password");
    }

    #[tokio::test]
    async fn test_me_requires_valid_token() {
        let state = test_state();

        let request = Request::get("/api/auth/me").body(Body::empty()).unwrap();
        let (status, _) = send(&state, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&state, get_with_token("/api/auth/me", "not.a.token")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_google_sign_in_unconfigured() {
        let state = test_state();
        let (status, _) = send(
            &state,
            post_json("/api/auth/google", &json!({ "token": "id-token" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_verify_email_rejects_wrong_code() {
        let state = test_state();
        let (user_id, _) = register_and_login(&state, "code@example.com").await;

        let (status, body) = send(
            &state,
            post_json(
                "/api/auth/verify-email",
                &json!({ "user_id": user_id, "code": "000000" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid or expired verification code");
    }

    #[tokio::test]
    async fn test_resend_for_unknown_email() {
        let state = test_state();
        let (status, _) = send(
            &state,
            post_json(
                "/api/auth/resend-verification",
                &json!({ "email": "ghost@example.com" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_history_is_scoped_to_user_and_limited() {
        let state = test_state();
        let (user_id, token) = register_and_login(&state, "hist@example.com").await;

        for i in 0..3 {
            state
                .db
                .save_message(MessageType::User, &format!("mine {i}"), Some(&user_id))
                .unwrap();
        }
        state
            .db
            .save_message(MessageType::User, "anonymous", None)
            .unwrap();

        let (status, body) = send(&state, get_with_token("/api/history", &token)).await;
        assert_eq!(status, StatusCode::OK);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["content"], "mine 2");
        assert_eq!(messages[0]["message_type"], "user");

        let (_, body) = send(&state, get_with_token("/api/history?limit=1", &token)).await;
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_requires_auth() {
        let state = test_state();
        let request = Request::get("/api/history").body(Body::empty()).unwrap();
        let (status, body) = send(&state, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Not authenticated");
    }
}
