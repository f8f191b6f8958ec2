//! Server configuration from the environment

use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Origins allowed to call the API from a browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl CorsOrigins {
    /// Parse a comma-separated list; `*` anywhere allows any origin
    pub fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();

        if origins.iter().any(|o| o == "*") {
            CorsOrigins::Any
        } else if origins.is_empty() {
            CorsOrigins::List(vec![DEFAULT_CORS_ORIGIN.to_string()])
        } else {
            CorsOrigins::List(origins)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    pub cors_origins: CorsOrigins,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("GUIDE_CHAT_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let db_path = std::env::var("GUIDE_CHAT_DB_PATH").map_or_else(
            |_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".guide-chat").join("guide_chat.db")
            },
            PathBuf::from,
        );

        let cors_origins = CorsOrigins::parse(
            &std::env::var("GUIDE_CHAT_CORS_ORIGINS")
                .unwrap_or_else(|_| DEFAULT_CORS_ORIGIN.to_string()),
        );

        Self {
            port,
            db_path,
            cors_origins,
        }
    }
}
