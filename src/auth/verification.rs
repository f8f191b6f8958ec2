//! Email verification codes and their delivery

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use rand::Rng;

pub const CODE_LEN: usize = 6;
pub const CODE_TTL_MINUTES: i64 = 15;

const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;
const SUBJECT: &str = "Verify Your Email - Guide Chat";

/// Six random decimal digits
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Delivers a verification code to a user's address
#[async_trait]
pub trait VerificationSender: Send + Sync {
    async fn send(&self, to: &str, code: &str) -> Result<(), String>;
}

/// SMTP account used to deliver verification mail
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    /// Login name, also used as the sender address
    pub username: String,
    pub password: String,
}

impl SmtpConfig {
    /// `None` unless both `EMAIL_USERNAME` and `EMAIL_PASSWORD` are set
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("EMAIL_USERNAME").ok().filter(|v| !v.is_empty())?;
        let password = std::env::var("EMAIL_PASSWORD").ok().filter(|v| !v.is_empty())?;
        Some(Self {
            server: std::env::var("SMTP_SERVER")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_SMTP_SERVER.to_string()),
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            username,
            password,
        })
    }
}

/// Sends verification mail over SMTP with STARTTLS
pub struct SmtpVerificationSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpVerificationSender {
    pub fn new(config: &SmtpConfig) -> Result<Self, String> {
        let from: Mailbox = config
            .username
            .parse()
            .map_err(|e| format!("Invalid sender address: {e}"))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
            .map_err(|e| format!("Invalid SMTP relay {}: {e}", config.server))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl VerificationSender for SmtpVerificationSender {
    async fn send(&self, to: &str, code: &str) -> Result<(), String> {
        let message = build_message(&self.from, to, code)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| format!("SMTP delivery failed: {e}"))?;
        tracing::info!(to = %to, "Verification email delivered");
        Ok(())
    }
}

fn build_message(from: &Mailbox, to: &str, code: &str) -> Result<Message, String> {
    let to: Mailbox = to
        .parse()
        .map_err(|e| format!("Invalid recipient address: {e}"))?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(SUBJECT)
        .header(ContentType::TEXT_PLAIN)
        .body(email_body(code))
        .map_err(|e| format!("Failed to build email: {e}"))
}

/// Renders the plain-text verification email body
pub fn email_body(code: &str) -> String {
    format!(
        "Hello!\n\n\
         Thank you for registering with Guide Chat.\n\n\
         Your verification code is: {code}\n\n\
         This code will expire in {CODE_TTL_MINUTES} minutes.\n\n\
         If you didn't request this, please ignore this email.\n\n\
         Best regards,\n\
         Guide Chat Team\n"
    )
}
