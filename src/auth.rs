//! Accounts and access tokens
//!
//! Password and Google sign-in, bearer token issuance, and email
//! verification codes. The conversation core only ever sees the resolved
//! user id.

mod google;
mod password;
mod token;
mod verification;

#[allow(unused_imports)] // Public API re-exports
pub use google::{GoogleIdentity, GoogleVerifier, TokenInfoVerifier};
#[allow(unused_imports)]
pub use token::{Claims, TokenError, TokenIssuer};
#[allow(unused_imports)]
pub use verification::{SmtpConfig, SmtpVerificationSender, VerificationSender};

use crate::db::{Database, DbError, NewUser, User};
use chrono::{Duration, Utc};
use std::sync::Arc;
use thiserror::Error;

const DEV_SECRET_KEY: &str = "your-secret-key-change-this-in-production";
const DEFAULT_TOKEN_MINUTES: i64 = 30;
/// One year
const MAX_TOKEN_MINUTES: i64 = 525_600;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("User with this email already exists")]
    EmailTaken,
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),
    #[error("User not found")]
    UserNotFound,
    #[error("Email already verified")]
    AlreadyVerified,
    #[error("Invalid or expired verification code")]
    InvalidCode,
    #[error("Google account is linked to another user")]
    GoogleAccountInUse,
    #[error("Google sign-in is not configured")]
    GoogleNotConfigured,
    #[error("Google token verification failed: {0}")]
    Google(String),
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Verification delivery failed: {0}")]
    Delivery(String),
    #[error(transparent)]
    Db(DbError),
}

impl From<DbError> for AuthError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::UserExists(_) => AuthError::EmailTaken,
            DbError::GoogleIdTaken(_) => AuthError::GoogleAccountInUse,
            DbError::UserNotFound(_) => AuthError::UserNotFound,
            other => AuthError::Db(other),
        }
    }
}

/// Auth configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret_key: String,
    pub token_lifetime: Duration,
    pub google_client_id: Option<String>,
    /// Verification delivery is off without it
    pub smtp: Option<SmtpConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: DEV_SECRET_KEY.to_string(),
            token_lifetime: Duration::minutes(DEFAULT_TOKEN_MINUTES),
            google_client_id: None,
            smtp: None,
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let secret_key = std::env::var("SECRET_KEY").unwrap_or_else(|_| {
            tracing::warn!("SECRET_KEY not set, using the development key");
            DEV_SECRET_KEY.to_string()
        });
        let minutes = token_minutes(std::env::var("ACCESS_TOKEN_EXPIRE_MINUTES").ok().as_deref());

        Self {
            secret_key,
            token_lifetime: Duration::minutes(minutes),
            google_client_id: std::env::var("GOOGLE_CLIENT_ID").ok().filter(|v| !v.is_empty()),
            smtp: SmtpConfig::from_env(),
        }
    }
}

/// Token lifetime in minutes, limited to `1..=MAX_TOKEN_MINUTES`
fn token_minutes(raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return DEFAULT_TOKEN_MINUTES;
    };
    match raw.trim().parse::<i64>() {
        Ok(minutes) if (1..=MAX_TOKEN_MINUTES).contains(&minutes) => minutes,
        Ok(minutes) => {
            let clamped = minutes.clamp(1, MAX_TOKEN_MINUTES);
            tracing::warn!(
                requested = minutes,
                using = clamped,
                "ACCESS_TOKEN_EXPIRE_MINUTES out of range"
            );
            clamped
        }
        Err(_) => {
            tracing::warn!(value = %raw, "ACCESS_TOKEN_EXPIRE_MINUTES is not a number, using default");
            DEFAULT_TOKEN_MINUTES
        }
    }
}

/// Account operations shared by all HTTP handlers and sessions
pub struct AuthService {
    db: Database,
    tokens: TokenIssuer,
    google: Option<Arc<dyn GoogleVerifier>>,
    sender: Option<Arc<dyn VerificationSender>>,
}

impl AuthService {
    pub fn new(db: Database, config: &AuthConfig) -> Result<Self, AuthError> {
        let google = match &config.google_client_id {
            Some(client_id) => {
                Some(Arc::new(TokenInfoVerifier::new(client_id.clone())?) as Arc<dyn GoogleVerifier>)
            }
            None => None,
        };
        let sender = match &config.smtp {
            Some(smtp) => Some(Arc::new(
                SmtpVerificationSender::new(smtp).map_err(AuthError::Delivery)?,
            ) as Arc<dyn VerificationSender>),
            None => None,
        };

        Ok(Self::with_parts(
            db,
            TokenIssuer::new(config.secret_key.clone(), config.token_lifetime),
            google,
            sender,
        ))
    }

    pub fn with_parts(
        db: Database,
        tokens: TokenIssuer,
        google: Option<Arc<dyn GoogleVerifier>>,
        sender: Option<Arc<dyn VerificationSender>>,
    ) -> Self {
        Self {
            db,
            tokens,
            google,
            sender,
        }
    }

    // ==================== Tokens ====================

    pub fn issue_token(&self, user_id: &str) -> Result<String, AuthError> {
        Ok(self.tokens.issue(user_id)?)
    }

    /// User id carried by a valid token, `None` otherwise
    pub fn resolve_token(&self, token: &str) -> Option<String> {
        match self.tokens.validate(token) {
            Ok(claims) => Some(claims.sub),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected access token");
                None
            }
        }
    }

    pub fn current_user(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.tokens.validate(token)?;
        Ok(self.db.get_user(&claims.sub)?)
    }

    // ==================== Password accounts ====================

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email)?;
        if password.len() < password::MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidInput(format!(
                "Password must be at least {} characters",
                password::MIN_PASSWORD_LEN
            )));
        }
        if self.db.get_user_by_email(&email)?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let hashed = hash_in_background(password.to_string()).await?;
        let user = self.db.create_user(&NewUser {
            email: &email,
            hashed_password: Some(&hashed),
            full_name: full_name.filter(|n| !n.trim().is_empty()),
            ..NewUser::default()
        })?;
        tracing::info!(user_id = %user.id, "User registered");

        if let Err(e) = self.send_verification(&user).await {
            tracing::error!(user_id = %user.id, error = %e, "Failed to send verification email");
        }
        Ok(user)
    }

    /// Check email and password; Google-only accounts never match
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;
        let user = self
            .db
            .get_user_by_email(&email)?
            .ok_or(AuthError::InvalidCredentials)?;
        let Some(stored) = user.hashed_password.clone() else {
            return Err(AuthError::InvalidCredentials);
        };

        let candidate = password.to_string();
        let matches =
            tokio::task::spawn_blocking(move || password::verify_password(&candidate, &stored))
                .await
                .map_err(|e| AuthError::Hashing(e.to_string()))?;
        if !matches {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    // ==================== Google sign-in ====================

    /// Resolve a Google ID token to a local account, linking or creating one
    pub async fn google_sign_in(&self, id_token: &str) -> Result<User, AuthError> {
        let verifier = self.google.as_ref().ok_or(AuthError::GoogleNotConfigured)?;
        let identity = verifier.verify(id_token).await?;

        if let Some(user) = self.db.get_user_by_google_id(&identity.subject)? {
            return Ok(user);
        }

        let email = identity.email.to_lowercase();
        if let Some(existing) = self.db.get_user_by_email(&email)? {
            tracing::info!(user_id = %existing.id, "Linking Google account to existing user");
            return Ok(self.db.link_google_account(
                &existing.id,
                &identity.subject,
                identity.name.as_deref(),
            )?);
        }

        let user = self.db.create_user(&NewUser {
            email: &email,
            hashed_password: None,
            full_name: identity.name.as_deref(),
            google_id: Some(&identity.subject),
            is_verified: true,
        })?;
        tracing::info!(user_id = %user.id, "User created from Google sign-in");
        Ok(user)
    }

    // ==================== Email verification ====================

    async fn send_verification(&self, user: &User) -> Result<(), AuthError> {
        let Some(sender) = &self.sender else {
            tracing::warn!("Email credentials not configured, skipping email verification");
            return Ok(());
        };

        let code = verification::generate_code();
        let issued = self.db.create_verification_code(
            &user.id,
            &code,
            Duration::minutes(verification::CODE_TTL_MINUTES),
        )?;
        sender
            .send(&user.email, &issued.code)
            .await
            .map_err(AuthError::Delivery)?;
        tracing::info!(
            user_id = %issued.user_id,
            code_id = %issued.id,
            expires_at = %issued.expires_at,
            "Verification email sent"
        );
        Ok(())
    }

    pub fn verify_email_code(&self, user_id: &str, code: &str) -> Result<(), AuthError> {
        if !self.db.consume_verification_code(user_id, code.trim(), Utc::now())? {
            return Err(AuthError::InvalidCode);
        }
        self.db.set_user_verified(user_id, true)?;
        tracing::info!(user_id = %user_id, "Email verified");
        Ok(())
    }

    pub async fn resend_verification(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email)?;
        let user = self
            .db
            .get_user_by_email(&email)?
            .ok_or(AuthError::UserNotFound)?;
        if user.is_verified {
            return Err(AuthError::AlreadyVerified);
        }
        self.send_verification(&user).await
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidInput("Invalid email address".to_string()))
    }
}

async fn hash_in_background(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(|e| AuthError::Hashing(e.to_string()))
}
